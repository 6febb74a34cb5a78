// Anonymous message relay - core business logic.
//
// The relay keeps an append-only ledger of who posted what (for moderation)
// and a ban list of users who may no longer submit. Posting the actual
// message is the Discord layer's job.

use super::relay_models::RelayPost;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Storage error: {0}")]
    StorageError(String),
}

// ============================================================================
// STORAGE TRAIT (PORT)
// ============================================================================

/// Trait for persisting relay posts and the submission ban list.
#[async_trait]
pub trait RelayStore: Send + Sync {
    /// Append a post record. Never mutated afterwards.
    async fn record_post(&self, post: RelayPost) -> Result<(), RelayError>;

    /// Add a user to the ban list. Idempotent.
    async fn ban(&self, user_id: u64) -> Result<(), RelayError>;

    /// Remove a user from the ban list. Idempotent.
    async fn unban(&self, user_id: u64) -> Result<(), RelayError>;

    async fn is_banned(&self, user_id: u64) -> Result<bool, RelayError>;
}

// ============================================================================
// CORE SERVICE
// ============================================================================

/// Relay service gating submissions and recording posted messages.
pub struct RelayService<S: RelayStore> {
    store: S,
}

impl<S: RelayStore> RelayService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Whether this user may submit an anonymous message.
    pub async fn submit_allowed(&self, user_id: u64) -> Result<bool, RelayError> {
        Ok(!self.store.is_banned(user_id).await?)
    }

    /// Record that `user_id`'s submission went out as `message_id`.
    pub async fn record_post(
        &self,
        user_id: u64,
        message_id: u64,
        posted_at: i64,
    ) -> Result<(), RelayError> {
        self.store
            .record_post(RelayPost {
                user_id,
                message_id,
                posted_at,
            })
            .await
    }

    pub async fn ban_user(&self, user_id: u64) -> Result<(), RelayError> {
        self.store.ban(user_id).await
    }

    pub async fn unban_user(&self, user_id: u64) -> Result<(), RelayError> {
        self.store.unban(user_id).await
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use dashmap::DashMap;

    /// In-memory store for testing. Posts are behind an `Arc` so tests can
    /// keep a handle after the service takes ownership of the store.
    struct MockRelayStore {
        posts: std::sync::Arc<DashMap<u64, RelayPost>>,
        bans: DashMap<u64, ()>,
    }

    impl MockRelayStore {
        fn new() -> Self {
            Self {
                posts: std::sync::Arc::new(DashMap::new()),
                bans: DashMap::new(),
            }
        }
    }

    #[async_trait]
    impl RelayStore for MockRelayStore {
        async fn record_post(&self, post: RelayPost) -> Result<(), RelayError> {
            self.posts.insert(post.message_id, post);
            Ok(())
        }

        async fn ban(&self, user_id: u64) -> Result<(), RelayError> {
            self.bans.insert(user_id, ());
            Ok(())
        }

        async fn unban(&self, user_id: u64) -> Result<(), RelayError> {
            self.bans.remove(&user_id);
            Ok(())
        }

        async fn is_banned(&self, user_id: u64) -> Result<bool, RelayError> {
            Ok(self.bans.contains_key(&user_id))
        }
    }

    #[tokio::test]
    async fn submissions_allowed_by_default() {
        let service = RelayService::new(MockRelayStore::new());
        assert!(service.submit_allowed(1).await.unwrap());
    }

    #[tokio::test]
    async fn ban_blocks_and_unban_restores() {
        let service = RelayService::new(MockRelayStore::new());

        service.ban_user(1).await.unwrap();
        assert!(!service.submit_allowed(1).await.unwrap());
        // Other users are unaffected
        assert!(service.submit_allowed(2).await.unwrap());

        service.unban_user(1).await.unwrap();
        assert!(service.submit_allowed(1).await.unwrap());
    }

    #[tokio::test]
    async fn posts_are_recorded() {
        let store = MockRelayStore::new();
        let posts = std::sync::Arc::clone(&store.posts);
        let service = RelayService::new(store);

        service.record_post(1, 555, 1_000).await.unwrap();
        service.record_post(1, 556, 1_001).await.unwrap();

        assert_eq!(posts.len(), 2);
        let post = posts.get(&555).unwrap();
        assert_eq!(post.user_id, 1);
        assert_eq!(post.posted_at, 1_000);
    }
}
