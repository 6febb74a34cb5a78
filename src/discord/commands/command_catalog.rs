// Discord commands module.
// Each feature gets its own command file.

pub mod verification;

pub mod mutes;

pub mod relay;

pub mod moderator;

pub mod developer;

pub mod presence;
