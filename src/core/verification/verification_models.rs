// Verification domain models.
//
// These are pure domain types with no Discord dependencies. The Discord
// layer turns a `VerificationOutcome` into the right embed.

/// One profile field returned by the credential API, in API order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileField {
    pub label: String,
    pub value: String,
}

/// Result of a credential check against the external API.
#[derive(Debug, Clone)]
pub struct CredentialCheck {
    /// Whether the username/password pair was accepted.
    pub valid: bool,
    /// Profile fields to show on success. Empty when the API returned none.
    pub profile: Vec<ProfileField>,
}

/// What happened when a member tried to verify.
#[derive(Debug, Clone)]
pub enum VerificationOutcome {
    /// The guild has no verification role configured.
    RoleNotConfigured,
    /// The credential API rejected the pair.
    InvalidCredentials,
    /// Credentials accepted; the Discord layer should grant `role_id`.
    Verified {
        role_id: u64,
        profile: Vec<ProfileField>,
    },
}
