use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;

use crate::error::{Error, ErrorCode};
use crate::types::pinning::{PinnedKey, PinnedTool, TrustLevel};

/// Result of checking a key against the pin store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PinningResult {
    /// First time seeing this tool@domain — key has been pinned.
    FirstUse,
    /// Tool@domain seen before and key matches a pinned key.
    Matched,
    /// Tool@domain seen before but key does NOT match any pinned key.
    Changed,
}

/// In-memory TOFU key pinning store, keyed by `"tool_id@domain"`.
///
/// The map lives behind an `Arc<Mutex<_>>` so a store handle can be cloned
/// cheaply and shared across threads — `check_and_pin` on two clones of the
/// same store serializes on the same underlying map rather than diverging.
#[derive(Debug, Clone, Default)]
pub struct KeyPinStore {
    tools: Arc<Mutex<HashMap<String, PinnedTool>>>,
}

impl KeyPinStore {
    pub fn new() -> Self {
        Self {
            tools: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Composite key for the store.
    fn composite_key(tool_id: &str, domain: &str) -> String {
        format!("{}@{}", tool_id, domain)
    }

    /// Check a key fingerprint against the pin store. If this is the first time
    /// seeing this tool@domain, the key is pinned (TOFU). Returns the pinning result.
    pub fn check_and_pin(
        &mut self,
        tool_id: &str,
        domain: &str,
        fingerprint: &str,
    ) -> PinningResult {
        let key = Self::composite_key(tool_id, domain);
        let now = Utc::now().to_rfc3339();
        let mut tools = self.tools.lock();

        if let Some(pinned) = tools.get_mut(&key) {
            // Tool@domain previously seen — check if key matches
            if let Some(pk) = pinned
                .pinned_keys
                .iter_mut()
                .find(|pk| pk.fingerprint == fingerprint)
            {
                pk.last_seen = now;
                tracing::debug!(tool_id, domain, "pin store: key matched");
                PinningResult::Matched
            } else {
                tracing::warn!(tool_id, domain, fingerprint, "pin store: key changed");
                PinningResult::Changed
            }
        } else {
            // First time seeing this tool@domain — TOFU pin
            tracing::debug!(tool_id, domain, "pin store: first use, pinning key");
            tools.insert(
                key,
                PinnedTool {
                    tool_id: tool_id.to_string(),
                    domain: domain.to_string(),
                    pinned_keys: vec![PinnedKey {
                        fingerprint: fingerprint.to_string(),
                        first_seen: now.clone(),
                        last_seen: now,
                        trust_level: TrustLevel::Tofu,
                    }],
                },
            );
            PinningResult::FirstUse
        }
    }

    /// Add a key to an existing tool@domain's pin set (e.g., during key rotation).
    pub fn add_key(&mut self, tool_id: &str, domain: &str, fingerprint: &str) {
        let key = Self::composite_key(tool_id, domain);
        let now = Utc::now().to_rfc3339();
        let mut tools = self.tools.lock();

        let pinned = tools.entry(key).or_insert_with(|| PinnedTool {
            tool_id: tool_id.to_string(),
            domain: domain.to_string(),
            pinned_keys: vec![],
        });

        if !pinned
            .pinned_keys
            .iter()
            .any(|pk| pk.fingerprint == fingerprint)
        {
            pinned.pinned_keys.push(PinnedKey {
                fingerprint: fingerprint.to_string(),
                first_seen: now.clone(),
                last_seen: now,
                trust_level: TrustLevel::Tofu,
            });
        }
    }

    /// Get pinned tool info.
    pub fn get_tool(&self, tool_id: &str, domain: &str) -> Option<PinnedTool> {
        let key = Self::composite_key(tool_id, domain);
        self.tools.lock().get(&key).cloned()
    }

    /// Return the currently pinned fingerprint for `tool_id@domain`, if any.
    ///
    /// When multiple keys are pinned (after a rotation via [`Self::add_key`]),
    /// this returns the one with the most recent `last_seen` timestamp.
    pub fn get_pinned(&self, tool_id: &str, domain: &str) -> Option<String> {
        let key = Self::composite_key(tool_id, domain);
        let tools = self.tools.lock();
        let pinned = tools.get(&key)?;
        pinned
            .pinned_keys
            .iter()
            .max_by(|a, b| a.last_seen.cmp(&b.last_seen))
            .map(|pk| pk.fingerprint.clone())
    }

    /// Remove all pinned keys for `tool_id@domain`.
    pub fn remove(&mut self, tool_id: &str, domain: &str) {
        let key = Self::composite_key(tool_id, domain);
        self.tools.lock().remove(&key);
        tracing::debug!(tool_id, domain, "pin store: entry removed");
    }

    /// Explicitly replace the pinned key for `tool_id@domain` with
    /// `new_fingerprint`, discarding any previously pinned keys.
    ///
    /// Used when a caller (or an interactive pinning policy decision) has
    /// accepted a key change, as opposed to `add_key`'s additive rotation.
    pub fn replace(&mut self, tool_id: &str, domain: &str, new_fingerprint: &str) {
        let key = Self::composite_key(tool_id, domain);
        let now = Utc::now().to_rfc3339();
        self.tools.lock().insert(
            key,
            PinnedTool {
                tool_id: tool_id.to_string(),
                domain: domain.to_string(),
                pinned_keys: vec![PinnedKey {
                    fingerprint: new_fingerprint.to_string(),
                    first_seen: now.clone(),
                    last_seen: now,
                    trust_level: TrustLevel::Tofu,
                }],
            },
        );
        tracing::debug!(tool_id, domain, "pin store: key replaced");
    }

    /// Serialize the store to JSON.
    pub fn serialize(&self) -> Result<String, Error> {
        let tools = self.tools.lock();
        let values: Vec<&PinnedTool> = tools.values().collect();
        Ok(serde_json::to_string_pretty(&values)?)
    }

    /// Deserialize the store from JSON.
    pub fn deserialize(json: &str) -> Result<Self, Error> {
        let tools: Vec<PinnedTool> = serde_json::from_str(json)?;
        let map = tools
            .into_iter()
            .map(|t| (Self::composite_key(&t.tool_id, &t.domain), t))
            .collect();
        Ok(Self {
            tools: Arc::new(Mutex::new(map)),
        })
    }
}

/// Check pinning and return an error if key has changed (for use in verification flow).
pub fn check_pinning(
    store: &mut KeyPinStore,
    tool_id: &str,
    domain: &str,
    fingerprint: &str,
) -> Result<PinningResult, Error> {
    let result = store.check_and_pin(tool_id, domain, fingerprint);
    if result == PinningResult::Changed {
        return Err(Error::Verification {
            code: ErrorCode::KeyPinMismatch,
            message: format!(
                "Key for '{}@{}' has changed since last pinned (fingerprint: '{}')",
                tool_id, domain, fingerprint
            ),
        });
    }
    Ok(result)
}
