// Mute domain models - pure data, no Discord or SQL types.

/// A single active mute. One record per (user, guild); re-muting the same
/// user overwrites the previous expiry. No history is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MuteRecord {
    pub user_id: u64,
    pub guild_id: u64,
    /// Expiry as epoch seconds.
    pub expires_at: i64,
}

impl MuteRecord {
    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.expires_at
    }
}
