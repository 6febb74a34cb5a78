// Core verification module - credential checks and the per-guild role
// setting. Following the same pattern as the mutes module.

pub mod verification_models;
pub mod verification_service;

pub use verification_models::*;
pub use verification_service::*;
