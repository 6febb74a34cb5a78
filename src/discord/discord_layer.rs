// Discord layer - commands and event handlers.

#[path = "commands/command_catalog.rs"]
pub mod commands;

#[path = "events.rs"]
pub mod events;

// Re-export command types for convenience
pub use commands::verification::{Data, Error};
