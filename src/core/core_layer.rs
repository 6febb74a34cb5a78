// The core module contains all business logic.
// Each feature gets its own submodule.

#[path = "verification/mod.rs"]
pub mod verification;

#[path = "mutes/mod.rs"]
pub mod mutes;

#[path = "relay/mod.rs"]
pub mod relay;
