//! Interactive pinning policy layered above the core TOFU verification flow.
//!
//! `verify_schema_offline`/`verify_skill_offline` implement a fixed,
//! deterministic pin/reject decision. Hosts that want to let an operator
//! decide — accept a first-seen key, approve or refuse a rotation — sit this
//! module above those entry points instead of calling them directly.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use crate::error::ErrorCode;
use crate::pinning::KeyPinStore;
use crate::resolver::SchemaResolver;
use crate::skill::{load_signature, verify_skill_offline, SkillSignature};
use crate::types::discovery::WellKnownResponse;
use crate::types::revocation::RevocationDocument;
use crate::verification::{verify_schema_offline, VerificationResult};

/// How aggressively the pinning layer resolves first-use and key-change
/// events without operator input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinningMode {
    /// First use pins silently; a key change is rejected without a prompt.
    Automatic,
    /// Both first use and key change are offered to a [`PromptHandler`].
    Interactive,
    /// First use pins silently; a key change is always rejected, no prompt.
    Strict,
}

/// Per-domain override of the global [`PinningMode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainPolicy {
    /// No override — fall back to the configured [`PinningMode`].
    Default,
    /// Always accept keys for this domain without prompting.
    AlwaysTrust,
    /// Always reject keys for this domain without prompting.
    NeverTrust,
    /// Always prompt for this domain, regardless of mode.
    InteractiveOnly,
}

/// Per-domain [`DomainPolicy`] overrides, shared across concurrent callers.
#[derive(Debug, Clone, Default)]
pub struct PolicyStore {
    overrides: Arc<Mutex<HashMap<String, DomainPolicy>>>,
}

impl PolicyStore {
    pub fn new() -> Self {
        Self {
            overrides: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn get(&self, domain: &str) -> DomainPolicy {
        self.overrides
            .lock()
            .get(domain)
            .copied()
            .unwrap_or(DomainPolicy::Default)
    }

    pub fn set(&self, domain: &str, policy: DomainPolicy) {
        self.overrides.lock().insert(domain.to_string(), policy);
    }
}

/// The kind of pinning event a [`PromptHandler`] is being asked to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    /// This tool@domain has never been seen before.
    FirstUse,
    /// The key no longer matches what was previously pinned.
    KeyChange,
    /// The key is revoked. Informational only — the verification has
    /// already failed by the time this prompt fires; the only decisions
    /// that matter are `Reject` or `NeverTrust`.
    Revoked,
}

/// Context handed to a [`PromptHandler`] for a single pinning decision.
#[derive(Debug, Clone)]
pub struct PromptContext {
    pub tool_id: String,
    pub domain: String,
    pub kind: PromptKind,
    pub fingerprint: String,
    pub existing_fingerprint: Option<String>,
}

/// An operator's resolution of a [`PromptContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Accept this key for this one verification, without installing a
    /// standing pin or domain override.
    TemporaryAccept,
    /// Accept and pin/replace the key for this tool@domain.
    Accept,
    /// Reject this verification.
    Reject,
    /// Accept, and install [`DomainPolicy::AlwaysTrust`] for the domain.
    AlwaysTrust,
    /// Reject, and install [`DomainPolicy::NeverTrust`] for the domain.
    NeverTrust,
}

/// A pluggable capability for resolving pinning prompts — the interactive
/// equivalent of [`SchemaResolver`] for discovery.
pub trait PromptHandler: Send + Sync {
    fn prompt(&self, ctx: &PromptContext) -> Decision;
}

/// A [`PromptHandler`] that never prompts a human — used when
/// [`PinningMode::Automatic`]/[`PinningMode::Strict`] make prompting
/// unreachable, or in tests.
pub struct AutoRejectHandler;

impl PromptHandler for AutoRejectHandler {
    fn prompt(&self, _ctx: &PromptContext) -> Decision {
        Decision::Reject
    }
}

/// Implements the mode × domain-policy × event decision table sitting above
/// the core verification state machine.
pub struct PolicyEngine {
    pub mode: PinningMode,
    pub domain_policy: PolicyStore,
    pub prompt_handler: Box<dyn PromptHandler>,
}

impl PolicyEngine {
    pub fn new(mode: PinningMode, prompt_handler: Box<dyn PromptHandler>) -> Self {
        Self {
            mode,
            domain_policy: PolicyStore::new(),
            prompt_handler,
        }
    }

    /// Decide what to do about a first-use or key-change event.
    ///
    /// `existing_fingerprint` is `None` for first use. Revocation is not
    /// decided here — S3 of the verification state machine already halts
    /// before pinning is ever reached for a revoked key.
    fn decide(
        &self,
        tool_id: &str,
        domain: &str,
        kind: PromptKind,
        fingerprint: &str,
        existing_fingerprint: Option<&str>,
    ) -> Decision {
        let domain_policy = self.domain_policy.get(domain);

        match domain_policy {
            DomainPolicy::AlwaysTrust => return Decision::Accept,
            DomainPolicy::NeverTrust => return Decision::Reject,
            DomainPolicy::InteractiveOnly => {
                return self.ask(tool_id, domain, kind, fingerprint, existing_fingerprint)
            }
            DomainPolicy::Default => {}
        }

        match (self.mode, kind) {
            (PinningMode::Automatic, PromptKind::FirstUse) => Decision::Accept,
            (PinningMode::Automatic, PromptKind::KeyChange) => Decision::Reject,
            (PinningMode::Strict, PromptKind::FirstUse) => Decision::Accept,
            (PinningMode::Strict, PromptKind::KeyChange) => Decision::Reject,
            (PinningMode::Interactive, _) => {
                self.ask(tool_id, domain, kind, fingerprint, existing_fingerprint)
            }
            (_, PromptKind::Revoked) => Decision::Reject,
        }
    }

    fn ask(
        &self,
        tool_id: &str,
        domain: &str,
        kind: PromptKind,
        fingerprint: &str,
        existing_fingerprint: Option<&str>,
    ) -> Decision {
        let ctx = PromptContext {
            tool_id: tool_id.to_string(),
            domain: domain.to_string(),
            kind,
            fingerprint: fingerprint.to_string(),
            existing_fingerprint: existing_fingerprint.map(|s| s.to_string()),
        };
        let decision = self.prompt_handler.prompt(&ctx);
        tracing::debug!(tool_id, domain, ?kind, ?decision, "pinning policy prompt resolved");
        decision
    }

    /// Apply a [`Decision`] to the pin store, installing domain overrides as
    /// needed. Returns `true` if the verification should proceed as valid.
    fn apply(
        &self,
        store: &mut KeyPinStore,
        tool_id: &str,
        domain: &str,
        fingerprint: &str,
        decision: Decision,
    ) -> bool {
        match decision {
            Decision::TemporaryAccept => true,
            Decision::Accept => {
                store.replace(tool_id, domain, fingerprint);
                true
            }
            Decision::Reject => false,
            Decision::AlwaysTrust => {
                self.domain_policy.set(domain, DomainPolicy::AlwaysTrust);
                store.replace(tool_id, domain, fingerprint);
                true
            }
            Decision::NeverTrust => {
                self.domain_policy.set(domain, DomainPolicy::NeverTrust);
                false
            }
        }
    }

    /// Verify a schema, resolving first-use/key-change events through this
    /// policy instead of the core engine's fixed accept/reject rule.
    #[allow(clippy::too_many_arguments)]
    pub fn verify_schema(
        &self,
        schema: &Value,
        signature_b64: &str,
        domain: &str,
        tool_id: &str,
        discovery: &WellKnownResponse,
        revocation: Option<&RevocationDocument>,
        store: &mut KeyPinStore,
    ) -> VerificationResult {
        let existing = store.get_pinned(tool_id, domain);

        let result = verify_schema_offline(
            schema,
            signature_b64,
            domain,
            tool_id,
            discovery,
            revocation,
            store,
        );

        self.resolve(result, store, tool_id, domain, existing)
    }

    /// Verify a schema using a [`SchemaResolver`] for discovery/revocation,
    /// then apply the policy decision.
    pub fn verify_schema_with_resolver(
        &self,
        schema: &Value,
        signature_b64: &str,
        domain: &str,
        tool_id: &str,
        resolver: &dyn SchemaResolver,
        store: &mut KeyPinStore,
    ) -> VerificationResult {
        let discovery = match resolver.resolve_discovery(domain) {
            Ok(doc) => doc,
            Err(e) => {
                return VerificationResult::failure(
                    ErrorCode::DiscoveryFetchFailed,
                    &format!("Failed to resolve discovery document: {}", e),
                )
            }
        };
        let revocation = resolver.resolve_revocation(domain, &discovery).ok().flatten();
        self.verify_schema(
            schema,
            signature_b64,
            domain,
            tool_id,
            &discovery,
            revocation.as_ref(),
            store,
        )
    }

    /// Verify a skill directory, resolving first-use/key-change events
    /// through this policy.
    ///
    /// Loads `.schemapin.sig` itself (unless `signature_data` is given) so
    /// the resolved domain and skill name are known up front for pinning,
    /// mirroring what `verify_skill_offline` would otherwise do internally.
    pub fn verify_skill(
        &self,
        skill_dir: &std::path::Path,
        discovery: &WellKnownResponse,
        signature_data: Option<&SkillSignature>,
        revocation_doc: Option<&RevocationDocument>,
        store: &mut KeyPinStore,
        tool_id: Option<&str>,
    ) -> VerificationResult {
        let owned_sig;
        let sig = match signature_data {
            Some(s) => Some(s),
            None => match load_signature(skill_dir) {
                Ok(s) => {
                    owned_sig = s;
                    Some(&owned_sig)
                }
                Err(_) => None,
            },
        };

        let resolved_tool_id = tool_id
            .map(|s| s.to_string())
            .or_else(|| sig.map(|s| s.skill_name.clone()))
            .unwrap_or_else(|| "unknown".to_string());
        let domain = sig
            .map(|s| s.domain.clone())
            .unwrap_or_else(|| "unknown".to_string());
        let existing = store.get_pinned(&resolved_tool_id, &domain);

        let result = verify_skill_offline(
            skill_dir,
            discovery,
            sig,
            revocation_doc,
            Some(store),
            Some(&resolved_tool_id),
        );

        self.resolve(result, store, &resolved_tool_id, &domain, existing)
    }

    /// Shared post-processing: if the core engine already reported a
    /// `KeyPinMismatch`, re-decide via policy and apply the outcome. The
    /// core engine already pins on first use, so a first-use event that
    /// still needs a prompt (interactive mode, or an interactive-only
    /// domain) is re-decided after the fact here too, undoing the pin if
    /// rejected.
    fn resolve(
        &self,
        core_result: VerificationResult,
        store: &mut KeyPinStore,
        tool_id: &str,
        domain: &str,
        existing: Option<String>,
    ) -> VerificationResult {
        match core_result.error_code {
            Some(ErrorCode::KeyPinMismatch) => {
                let fingerprint = match &core_result.error_message {
                    Some(msg) => extract_fingerprint(msg),
                    None => String::new(),
                };
                let decision = self.decide(
                    tool_id,
                    domain,
                    PromptKind::KeyChange,
                    &fingerprint,
                    existing.as_deref(),
                );
                if self.apply(store, tool_id, domain, &fingerprint, decision) {
                    VerificationResult {
                        valid: true,
                        domain: Some(domain.to_string()),
                        developer_name: None,
                        key_pinning: Some(crate::verification::KeyPinningStatus {
                            status: "pinned".to_string(),
                            first_seen: None,
                        }),
                        error_code: None,
                        error_message: None,
                        warnings: vec!["key_change_accepted_via_policy".to_string()],
                    }
                } else {
                    core_result
                }
            }
            _ => {
                if core_result.valid && existing.is_none() {
                    // First use: the mode/domain-policy may still want a
                    // prompt (Interactive, or an InteractiveOnly domain).
                    if matches!(self.mode, PinningMode::Interactive)
                        || matches!(self.domain_policy.get(domain), DomainPolicy::InteractiveOnly)
                    {
                        let fingerprint = store.get_pinned(tool_id, domain).unwrap_or_default();
                        let decision = self.decide(
                            tool_id,
                            domain,
                            PromptKind::FirstUse,
                            &fingerprint,
                            None,
                        );
                        if !self.apply(store, tool_id, domain, &fingerprint, decision) {
                            store.remove(tool_id, domain);
                            return VerificationResult::failure(
                                ErrorCode::KeyPinMismatch,
                                "First use rejected via interactive pinning policy",
                            );
                        }
                        // The core engine already installed a standing pin
                        // for this first use. `TemporaryAccept` must let the
                        // verification proceed without that pin surviving.
                        if matches!(decision, Decision::TemporaryAccept) {
                            store.remove(tool_id, domain);
                        }
                    }
                }
                core_result
            }
        }
    }
}

/// Pull the fingerprint back out of the core engine's error message.
///
/// The core engine formats `KeyPinMismatch` as `"... (fingerprint:
/// '<fp>')"`; this is a pragmatic extraction rather than plumbing a new
/// structured field through `VerificationResult` for one caller.
fn extract_fingerprint(message: &str) -> String {
    if let Some(start) = message.find("fingerprint: '") {
        let rest = &message[start + "fingerprint: '".len()..];
        if let Some(end) = rest.find('\'') {
            return rest[..end].to_string();
        }
    }
    String::new()
}
