use serde::{Deserialize, Serialize};

/// Standalone revocation document for a domain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RevocationDocument {
    pub schemapin_version: String,
    pub domain: String,
    pub updated_at: String,
    #[serde(default)]
    pub revoked_keys: Vec<RevokedKey>,
}

/// A single revoked key entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RevokedKey {
    pub fingerprint: String,
    pub revoked_at: String,
    pub reason: RevocationReason,
}

/// Reason for key revocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevocationReason {
    KeyCompromise,
    Superseded,
    CessationOfOperation,
    PrivilegeWithdrawn,
}
