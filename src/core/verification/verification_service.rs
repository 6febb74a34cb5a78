// Identity verification - core business logic.
//
// This service decides the outcome of a verification attempt and manages the
// per-guild verification role setting. It knows nothing about Discord roles
// beyond their numeric ids; whether the member already holds the role (and
// actually granting it) is the Discord layer's concern.

use super::verification_models::{CredentialCheck, VerificationOutcome};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Credential API error: {0}")]
    CredentialApiError(String),

    #[error("A verification role is already configured")]
    AlreadyConfigured(u64),

    #[error("No verification role is configured for this server")]
    NotConfigured,
}

// ============================================================================
// STORAGE TRAIT (PORT)
// ============================================================================

/// Trait for persisting per-guild server records.
///
/// One record per guild, created on bot join and removed when the bot leaves.
#[async_trait]
pub trait ServerStore: Send + Sync {
    /// Create the record for a guild. Idempotent.
    async fn add_server(&self, guild_id: u64) -> Result<(), VerificationError>;

    /// Delete the record for a guild.
    async fn remove_server(&self, guild_id: u64) -> Result<(), VerificationError>;

    /// The configured verification role, if any.
    async fn verification_role(&self, guild_id: u64) -> Result<Option<u64>, VerificationError>;

    /// Set (or replace) the verification role for a guild.
    async fn set_verification_role(
        &self,
        guild_id: u64,
        role_id: u64,
    ) -> Result<(), VerificationError>;

    /// Clear the verification role for a guild, keeping the server record.
    async fn clear_verification_role(&self, guild_id: u64) -> Result<(), VerificationError>;
}

// ============================================================================
// CREDENTIAL CHECKER TRAIT (PORT)
// ============================================================================

/// Trait for validating credentials against the external academic API.
#[async_trait]
pub trait CredentialChecker: Send + Sync {
    async fn check(
        &self,
        username: &str,
        password: &str,
    ) -> Result<CredentialCheck, VerificationError>;
}

// ============================================================================
// CORE SERVICE
// ============================================================================

/// Verification service combining the server-record store and the credential
/// API client.
pub struct VerificationService<S: ServerStore, C: CredentialChecker> {
    store: S,
    checker: C,
}

impl<S: ServerStore, C: CredentialChecker> VerificationService<S, C> {
    pub fn new(store: S, checker: C) -> Self {
        Self { store, checker }
    }

    /// Run a verification attempt for a member of `guild_id`.
    pub async fn verify(
        &self,
        guild_id: u64,
        username: &str,
        password: &str,
    ) -> Result<VerificationOutcome, VerificationError> {
        let Some(role_id) = self.store.verification_role(guild_id).await? else {
            return Ok(VerificationOutcome::RoleNotConfigured);
        };

        let check = self.checker.check(username, password).await?;
        if !check.valid {
            return Ok(VerificationOutcome::InvalidCredentials);
        }

        Ok(VerificationOutcome::Verified {
            role_id,
            profile: check.profile,
        })
    }

    /// Configure the verification role for the first time.
    ///
    /// Fails with `AlreadyConfigured` so admins go through `update` instead of
    /// silently replacing an existing role.
    pub async fn setup_role(&self, guild_id: u64, role_id: u64) -> Result<(), VerificationError> {
        if let Some(existing) = self.store.verification_role(guild_id).await? {
            return Err(VerificationError::AlreadyConfigured(existing));
        }
        self.store.set_verification_role(guild_id, role_id).await
    }

    /// Replace the configured verification role, returning the previous one.
    pub async fn update_role(&self, guild_id: u64, role_id: u64) -> Result<u64, VerificationError> {
        let previous = self
            .store
            .verification_role(guild_id)
            .await?
            .ok_or(VerificationError::NotConfigured)?;
        self.store.set_verification_role(guild_id, role_id).await?;
        Ok(previous)
    }

    /// Clear the configured verification role, returning the removed one.
    pub async fn remove_role(&self, guild_id: u64) -> Result<u64, VerificationError> {
        let removed = self
            .store
            .verification_role(guild_id)
            .await?
            .ok_or(VerificationError::NotConfigured)?;
        self.store.clear_verification_role(guild_id).await?;
        Ok(removed)
    }

    /// The configured role id, if any. Used by commands that need to look
    /// before they leap (e.g. checking whether the member already holds it).
    pub async fn configured_role(&self, guild_id: u64) -> Result<Option<u64>, VerificationError> {
        self.store.verification_role(guild_id).await
    }

    /// Called when the bot joins a guild.
    pub async fn register_server(&self, guild_id: u64) -> Result<(), VerificationError> {
        self.store.add_server(guild_id).await
    }

    /// Called when the bot is removed from a guild.
    pub async fn forget_server(&self, guild_id: u64) -> Result<(), VerificationError> {
        self.store.remove_server(guild_id).await
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::verification::verification_models::ProfileField;
    use dashmap::DashMap;

    /// In-memory store for testing
    struct MockServerStore {
        servers: DashMap<u64, Option<u64>>,
    }

    impl MockServerStore {
        fn new() -> Self {
            Self {
                servers: DashMap::new(),
            }
        }
    }

    #[async_trait]
    impl ServerStore for MockServerStore {
        async fn add_server(&self, guild_id: u64) -> Result<(), VerificationError> {
            self.servers.entry(guild_id).or_insert(None);
            Ok(())
        }

        async fn remove_server(&self, guild_id: u64) -> Result<(), VerificationError> {
            self.servers.remove(&guild_id);
            Ok(())
        }

        async fn verification_role(
            &self,
            guild_id: u64,
        ) -> Result<Option<u64>, VerificationError> {
            Ok(self.servers.get(&guild_id).and_then(|v| *v))
        }

        async fn set_verification_role(
            &self,
            guild_id: u64,
            role_id: u64,
        ) -> Result<(), VerificationError> {
            self.servers.insert(guild_id, Some(role_id));
            Ok(())
        }

        async fn clear_verification_role(&self, guild_id: u64) -> Result<(), VerificationError> {
            self.servers.insert(guild_id, None);
            Ok(())
        }
    }

    /// Credential checker that accepts a single known pair.
    struct MockChecker {
        username: &'static str,
        password: &'static str,
    }

    #[async_trait]
    impl CredentialChecker for MockChecker {
        async fn check(
            &self,
            username: &str,
            password: &str,
        ) -> Result<CredentialCheck, VerificationError> {
            if username == self.username && password == self.password {
                Ok(CredentialCheck {
                    valid: true,
                    profile: vec![ProfileField {
                        label: "name".to_string(),
                        value: "Test Student".to_string(),
                    }],
                })
            } else {
                Ok(CredentialCheck {
                    valid: false,
                    profile: Vec::new(),
                })
            }
        }
    }

    fn service() -> VerificationService<MockServerStore, MockChecker> {
        VerificationService::new(
            MockServerStore::new(),
            MockChecker {
                username: "srn123",
                password: "hunter2",
            },
        )
    }

    #[tokio::test]
    async fn verify_without_configured_role() {
        let service = service();

        let outcome = service.verify(10, "srn123", "hunter2").await.unwrap();
        assert!(matches!(outcome, VerificationOutcome::RoleNotConfigured));
    }

    #[tokio::test]
    async fn verify_with_bad_credentials() {
        let service = service();
        service.setup_role(10, 99).await.unwrap();

        let outcome = service.verify(10, "srn123", "wrong").await.unwrap();
        assert!(matches!(outcome, VerificationOutcome::InvalidCredentials));
    }

    #[tokio::test]
    async fn verify_success_carries_role_and_profile() {
        let service = service();
        service.setup_role(10, 99).await.unwrap();

        let outcome = service.verify(10, "srn123", "hunter2").await.unwrap();
        match outcome {
            VerificationOutcome::Verified { role_id, profile } => {
                assert_eq!(role_id, 99);
                assert_eq!(profile.len(), 1);
                assert_eq!(profile[0].value, "Test Student");
            }
            other => panic!("expected Verified, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn setup_refuses_to_overwrite() {
        let service = service();
        service.setup_role(10, 99).await.unwrap();

        assert!(matches!(
            service.setup_role(10, 100).await,
            Err(VerificationError::AlreadyConfigured(99))
        ));
    }

    #[tokio::test]
    async fn update_requires_existing_role() {
        let service = service();

        assert!(matches!(
            service.update_role(10, 100).await,
            Err(VerificationError::NotConfigured)
        ));

        service.setup_role(10, 99).await.unwrap();
        let previous = service.update_role(10, 100).await.unwrap();
        assert_eq!(previous, 99);
        assert_eq!(service.configured_role(10).await.unwrap(), Some(100));
    }

    #[tokio::test]
    async fn remove_clears_role_but_keeps_server() {
        let service = service();
        service.register_server(10).await.unwrap();
        service.setup_role(10, 99).await.unwrap();

        let removed = service.remove_role(10).await.unwrap();
        assert_eq!(removed, 99);
        assert_eq!(service.configured_role(10).await.unwrap(), None);

        assert!(matches!(
            service.remove_role(10).await,
            Err(VerificationError::NotConfigured)
        ));
    }
}
