// Core mutes module - duration parsing and expiry tracking.

pub mod mute_models;
pub mod mute_service;

pub use mute_models::*;
pub use mute_service::*;
