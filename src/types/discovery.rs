use serde::{Deserialize, Serialize};

/// Response from the `.well-known/schemapin.json` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WellKnownResponse {
    pub schema_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub developer_name: Option<String>,
    pub public_key_pem: String,
    #[serde(default)]
    pub revoked_keys: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revocation_endpoint: Option<String>,
}
