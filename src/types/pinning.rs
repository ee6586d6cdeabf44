use serde::{Deserialize, Serialize};

/// A pinned tool with its associated domain and keys.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PinnedTool {
    pub tool_id: String,
    pub domain: String,
    pub pinned_keys: Vec<PinnedKey>,
}

/// A single pinned key entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PinnedKey {
    pub fingerprint: String,
    pub first_seen: String,
    pub last_seen: String,
    pub trust_level: TrustLevel,
}

/// Trust level for a pinned key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustLevel {
    Tofu,
    Verified,
    Pinned,
}
