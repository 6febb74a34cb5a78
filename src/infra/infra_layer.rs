// The infra module contains implementations of core traits.
// Each feature implementation goes in its own submodule.

#[path = "verification/sqlite_server_store.rs"]
pub mod verification;

#[path = "mutes/sqlite_mute_store.rs"]
pub mod mutes;

#[path = "relay/sqlite_relay_store.rs"]
pub mod relay;

#[path = "auth/portal_client.rs"]
pub mod auth;

#[path = "health/http_server.rs"]
pub mod health;
