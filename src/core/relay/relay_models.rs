// Relay domain models.

/// One anonymous post that went out through the relay. Append-only; we keep
/// the submitter so moderators can act on abuse, but the posted message never
/// exposes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayPost {
    pub user_id: u64,
    /// Id of the message the bot posted in the relay channel.
    pub message_id: u64,
    /// Submission time as epoch seconds.
    pub posted_at: i64,
}
