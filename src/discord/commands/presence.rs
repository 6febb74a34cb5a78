// This module handles bot presence.
//
// Everything here is Discord-layer glue: we only work with Discord SDK types
// (Context, ActivityData, OnlineStatus) and keep the logic extremely short.

use poise::serenity_prelude as serenity;

/// Statuses the bot cycles through. The rotation task in main.rs advances
/// the index every few hours.
pub const STATUSES: &[&str] = &[
    "with campus verifications",
    "with the role hierarchy",
    "with anonymous messages",
    "with the mute timers",
];

/// Show the status at `index` (wrapping), as a "Playing ..." activity.
pub fn rotate_status(ctx: &serenity::Context, index: usize) {
    let status = STATUSES[index % STATUSES.len()];
    let activity = serenity::ActivityData::playing(status);
    ctx.set_presence(Some(activity), serenity::OnlineStatus::Online);
}

/// Called once the bot is ready so a presence shows immediately.
pub fn on_ready(ctx: &serenity::Context) {
    rotate_status(ctx, 0);
}
