use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The `{ "schema": ..., "signature": ... }` shape a tool publisher hands
/// back to a caller alongside a bare schema, bundling the base64 ECDSA
/// signature with the signed payload in one document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignedSchemaEnvelope {
    pub schema: Value,
    pub signature: String,
}

impl SignedSchemaEnvelope {
    pub fn new(schema: Value, signature: String) -> Self {
        Self { schema, signature }
    }
}
