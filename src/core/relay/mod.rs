// Core relay module - anonymous submission ledger and ban list.

pub mod relay_models;
pub mod relay_service;

pub use relay_models::*;
pub use relay_service::*;
