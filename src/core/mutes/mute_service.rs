// Temporary mute tracking - core business logic.
//
// This service owns duration parsing, the stored expiry records, and the
// "which mutes have lapsed" query that the background sweeper runs every
// minute. Actually granting/revoking the muted role is the Discord layer's
// job.

use super::mute_models::MuteRecord;
use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

/// Mutes are capped at 14 days.
pub const MAX_MUTE_SECS: u64 = 14 * 86_400;

#[derive(Debug, Error)]
pub enum MuteError {
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("'{0}' is not a valid duration (expected tokens like 1d, 2h30m, 45s)")]
    InvalidDuration(String),

    #[error("Duration exceeds the {0} second maximum")]
    DurationTooLong(u64),
}

// ============================================================================
// STORAGE TRAIT (PORT)
// ============================================================================

/// Trait for persisting mute records.
#[async_trait]
pub trait MuteStore: Send + Sync {
    /// Insert or overwrite the mute for (user, guild).
    async fn upsert_mute(&self, record: MuteRecord) -> Result<(), MuteError>;

    /// Delete the mute for (user, guild). Deleting a missing record is not an
    /// error.
    async fn remove_mute(&self, user_id: u64, guild_id: u64) -> Result<(), MuteError>;

    /// All stored mutes, expired or not.
    async fn all_mutes(&self) -> Result<Vec<MuteRecord>, MuteError>;
}

// ============================================================================
// DURATION PARSING
// ============================================================================

/// Parse a duration string like `1h30m` or `2d12h` into seconds.
///
/// Tokens are `<amount><unit>` with units d/h/m/s (case-insensitive).
/// Returns `None` when no token matches; unmatched garbage between tokens is
/// ignored, matching the lenient behavior users expect from `1h 30m`.
pub fn parse_duration(input: &str) -> Option<u64> {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    let token = TOKEN.get_or_init(|| Regex::new(r"(\d+)([dhms])").expect("valid duration regex"));

    let lowered = input.to_lowercase();
    let mut matched = false;
    let mut total: u64 = 0;
    for cap in token.captures_iter(&lowered) {
        matched = true;
        let amount: u64 = cap[1].parse().ok()?;
        let multiplier = match &cap[2] {
            "d" => 86_400,
            "h" => 3_600,
            "m" => 60,
            _ => 1,
        };
        total = total.checked_add(amount.checked_mul(multiplier)?)?;
    }

    if matched {
        Some(total)
    } else {
        None
    }
}

// ============================================================================
// CORE SERVICE
// ============================================================================

/// Tracks temporary mutes and their expiries.
pub struct MuteService<S: MuteStore> {
    store: S,
}

impl<S: MuteStore> MuteService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Record a mute for the user, returning the computed expiry.
    ///
    /// `now` is epoch seconds; keeping it a parameter keeps the expiry math
    /// testable without a clock.
    pub async fn mute(
        &self,
        user_id: u64,
        guild_id: u64,
        duration: &str,
        now: i64,
    ) -> Result<i64, MuteError> {
        let seconds = parse_duration(duration)
            .filter(|&s| s > 0)
            .ok_or_else(|| MuteError::InvalidDuration(duration.to_string()))?;
        if seconds > MAX_MUTE_SECS {
            return Err(MuteError::DurationTooLong(MAX_MUTE_SECS));
        }

        let expires_at = now + seconds as i64;
        self.store
            .upsert_mute(MuteRecord {
                user_id,
                guild_id,
                expires_at,
            })
            .await?;
        Ok(expires_at)
    }

    /// Drop the stored mute for a user. Safe to call when none exists, so
    /// manual unmutes can clear stale records.
    pub async fn unmute(&self, user_id: u64, guild_id: u64) -> Result<(), MuteError> {
        self.store.remove_mute(user_id, guild_id).await
    }

    /// All mutes whose expiry has passed as of `now`.
    pub async fn expired(&self, now: i64) -> Result<Vec<MuteRecord>, MuteError> {
        let mutes = self.store.all_mutes().await?;
        Ok(mutes.into_iter().filter(|m| m.is_expired(now)).collect())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use dashmap::DashMap;

    /// In-memory store for testing
    struct MockMuteStore {
        mutes: DashMap<(u64, u64), i64>,
    }

    impl MockMuteStore {
        fn new() -> Self {
            Self {
                mutes: DashMap::new(),
            }
        }
    }

    #[async_trait]
    impl MuteStore for MockMuteStore {
        async fn upsert_mute(&self, record: MuteRecord) -> Result<(), MuteError> {
            self.mutes
                .insert((record.user_id, record.guild_id), record.expires_at);
            Ok(())
        }

        async fn remove_mute(&self, user_id: u64, guild_id: u64) -> Result<(), MuteError> {
            self.mutes.remove(&(user_id, guild_id));
            Ok(())
        }

        async fn all_mutes(&self) -> Result<Vec<MuteRecord>, MuteError> {
            Ok(self
                .mutes
                .iter()
                .map(|entry| MuteRecord {
                    user_id: entry.key().0,
                    guild_id: entry.key().1,
                    expires_at: *entry.value(),
                })
                .collect())
        }
    }

    #[test]
    fn parses_single_tokens() {
        assert_eq!(parse_duration("45s"), Some(45));
        assert_eq!(parse_duration("10m"), Some(600));
        assert_eq!(parse_duration("2h"), Some(7200));
        assert_eq!(parse_duration("1d"), Some(86_400));
    }

    #[test]
    fn parses_compound_tokens() {
        assert_eq!(parse_duration("1h30m"), Some(5400));
        assert_eq!(parse_duration("2d12h"), Some(2 * 86_400 + 12 * 3_600));
        // Whitespace between tokens is tolerated
        assert_eq!(parse_duration("1h 30m"), Some(5400));
    }

    #[test]
    fn parsing_is_case_insensitive() {
        assert_eq!(parse_duration("1H30M"), Some(5400));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("soon"), None);
        assert_eq!(parse_duration("h30"), None);
    }

    #[tokio::test]
    async fn mute_stores_expiry() {
        let service = MuteService::new(MockMuteStore::new());

        let expires = service.mute(1, 10, "1h", 1_000).await.unwrap();
        assert_eq!(expires, 1_000 + 3_600);

        let expired = service.expired(expires).await.unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].user_id, 1);
    }

    #[tokio::test]
    async fn remute_overwrites_previous_expiry() {
        let service = MuteService::new(MockMuteStore::new());

        service.mute(1, 10, "1h", 1_000).await.unwrap();
        let expires = service.mute(1, 10, "2h", 1_000).await.unwrap();
        assert_eq!(expires, 1_000 + 7_200);

        // The 1h expiry was overwritten, so nothing has lapsed yet
        let expired = service.expired(1_000 + 3_600).await.unwrap();
        assert!(expired.is_empty());
    }

    #[tokio::test]
    async fn mute_rejects_invalid_and_zero_durations() {
        let service = MuteService::new(MockMuteStore::new());

        assert!(matches!(
            service.mute(1, 10, "forever", 0).await,
            Err(MuteError::InvalidDuration(_))
        ));
        assert!(matches!(
            service.mute(1, 10, "0s", 0).await,
            Err(MuteError::InvalidDuration(_))
        ));
    }

    #[tokio::test]
    async fn mute_rejects_durations_over_fourteen_days() {
        let service = MuteService::new(MockMuteStore::new());

        assert!(matches!(
            service.mute(1, 10, "15d", 0).await,
            Err(MuteError::DurationTooLong(_))
        ));
        // Exactly 14 days is still allowed
        assert!(service.mute(1, 10, "14d", 0).await.is_ok());
    }

    #[tokio::test]
    async fn expired_only_returns_lapsed_mutes() {
        let service = MuteService::new(MockMuteStore::new());

        service.mute(1, 10, "1m", 0).await.unwrap();
        service.mute(2, 10, "1h", 0).await.unwrap();

        let expired = service.expired(120).await.unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].user_id, 1);
    }

    #[tokio::test]
    async fn unmute_clears_record_even_when_missing() {
        let service = MuteService::new(MockMuteStore::new());

        service.mute(1, 10, "1h", 0).await.unwrap();
        service.unmute(1, 10).await.unwrap();
        assert!(service.expired(i64::MAX).await.unwrap().is_empty());

        // Unmuting again is a no-op, not an error
        service.unmute(1, 10).await.unwrap();
    }
}
