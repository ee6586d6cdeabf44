//! Discovery resolver abstraction.
//!
//! Provides pluggable discovery mechanisms beyond the standard
//! `https://{domain}/.well-known/schemapin.json` endpoint.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::types::bundle::SchemaPinTrustBundle;
use crate::types::discovery::WellKnownResponse;
use crate::types::revocation::RevocationDocument;

#[cfg(feature = "fetch")]
use crate::cancellation::{CancellationToken, Deadline};

// ---------------------------------------------------------------------------
// Sync resolver trait (always available)
// ---------------------------------------------------------------------------

/// Resolve discovery and revocation documents for a given domain.
///
/// Implementations can fetch from `.well-known` URLs, the local filesystem,
/// an in-memory trust bundle, or any other source.
pub trait SchemaResolver: Send + Sync {
    /// Return the well-known response for `domain`.
    fn resolve_discovery(&self, domain: &str) -> Result<WellKnownResponse, Error>;

    /// Return the revocation document for `domain`, if available.
    ///
    /// The default implementation returns `Ok(None)`.
    fn resolve_revocation(
        &self,
        domain: &str,
        _discovery: &WellKnownResponse,
    ) -> Result<Option<RevocationDocument>, Error> {
        let _ = domain;
        Ok(None)
    }
}

// ---------------------------------------------------------------------------
// Async resolver trait (fetch-gated)
// ---------------------------------------------------------------------------

#[cfg(feature = "fetch")]
/// Async equivalent of [`SchemaResolver`].
///
/// Gated behind the `fetch` feature because it brings in `async-trait`.
#[async_trait::async_trait]
pub trait AsyncSchemaResolver: Send + Sync {
    async fn resolve_discovery(&self, domain: &str) -> Result<WellKnownResponse, Error>;

    async fn resolve_revocation(
        &self,
        domain: &str,
        _discovery: &WellKnownResponse,
    ) -> Result<Option<RevocationDocument>, Error> {
        let _ = domain;
        Ok(None)
    }

    /// Cancellable, deadline-bound variant of [`Self::resolve_discovery`].
    ///
    /// The default ignores `token`/`deadline` and falls through to
    /// [`Self::resolve_discovery`] — a resolver with nothing suspending
    /// (e.g. [`TrustBundleResolver`]) has nothing to cancel. Resolvers that
    /// actually suspend (like [`WellKnownResolver`]) override this to honor
    /// both.
    async fn resolve_discovery_cancellable(
        &self,
        domain: &str,
        _token: &CancellationToken,
        _deadline: Option<Deadline>,
    ) -> Result<WellKnownResponse, Error> {
        self.resolve_discovery(domain).await
    }

    /// Cancellable, deadline-bound variant of [`Self::resolve_revocation`].
    async fn resolve_revocation_cancellable(
        &self,
        domain: &str,
        discovery: &WellKnownResponse,
        _token: &CancellationToken,
        _deadline: Option<Deadline>,
    ) -> Result<Option<RevocationDocument>, Error> {
        self.resolve_revocation(domain, discovery).await
    }
}

// ---------------------------------------------------------------------------
// WellKnownResolver (fetch-gated — wraps existing HTTP fetchers)
// ---------------------------------------------------------------------------

#[cfg(feature = "fetch")]
/// Fetches documents from the standard `.well-known` HTTPS endpoint.
pub struct WellKnownResolver;

#[cfg(feature = "fetch")]
#[async_trait::async_trait]
impl AsyncSchemaResolver for WellKnownResolver {
    async fn resolve_discovery(&self, domain: &str) -> Result<WellKnownResponse, Error> {
        tracing::debug!(domain, "resolving discovery via well-known resolver");
        crate::discovery::fetch_well_known(domain).await
    }

    async fn resolve_revocation(
        &self,
        _domain: &str,
        discovery: &WellKnownResponse,
    ) -> Result<Option<RevocationDocument>, Error> {
        if let Some(ref endpoint) = discovery.revocation_endpoint {
            tracing::debug!(endpoint, "resolving revocation document");
            let doc = crate::revocation::fetch_revocation_document(endpoint).await?;
            Ok(Some(doc))
        } else {
            Ok(None)
        }
    }

    async fn resolve_discovery_cancellable(
        &self,
        domain: &str,
        token: &CancellationToken,
        deadline: Option<Deadline>,
    ) -> Result<WellKnownResponse, Error> {
        tracing::debug!(domain, "resolving discovery via well-known resolver (cancellable)");
        crate::discovery::fetch_well_known_cancellable(domain, token, deadline).await
    }

    async fn resolve_revocation_cancellable(
        &self,
        _domain: &str,
        discovery: &WellKnownResponse,
        token: &CancellationToken,
        deadline: Option<Deadline>,
    ) -> Result<Option<RevocationDocument>, Error> {
        if let Some(ref endpoint) = discovery.revocation_endpoint {
            tracing::debug!(endpoint, "resolving revocation document (cancellable)");
            let doc =
                crate::revocation::fetch_revocation_document_cancellable(endpoint, token, deadline)
                    .await?;
            Ok(Some(doc))
        } else {
            Ok(None)
        }
    }
}

// ---------------------------------------------------------------------------
// LocalFileResolver (sync — reads from filesystem)
// ---------------------------------------------------------------------------

/// Reads discovery documents from a local directory.
///
/// Expects files named `{domain}.json` under `discovery_dir`. Optionally
/// reads revocation documents from `{domain}.revocations.json` in the same
/// directory (or a separate `revocation_dir`).
pub struct LocalFileResolver {
    discovery_dir: PathBuf,
    revocation_dir: Option<PathBuf>,
}

impl LocalFileResolver {
    pub fn new(discovery_dir: &Path, revocation_dir: Option<&Path>) -> Self {
        Self {
            discovery_dir: discovery_dir.to_path_buf(),
            revocation_dir: revocation_dir.map(|p| p.to_path_buf()),
        }
    }
}

impl SchemaResolver for LocalFileResolver {
    fn resolve_discovery(&self, domain: &str) -> Result<WellKnownResponse, Error> {
        let path = self.discovery_dir.join(format!("{}.json", domain));
        let data = std::fs::read_to_string(&path)
            .map_err(|e| Error::Discovery(format!("Cannot read {}: {}", path.display(), e)))?;
        let doc: WellKnownResponse = serde_json::from_str(&data)?;
        Ok(doc)
    }

    fn resolve_revocation(
        &self,
        domain: &str,
        _discovery: &WellKnownResponse,
    ) -> Result<Option<RevocationDocument>, Error> {
        let dir = self.revocation_dir.as_ref().unwrap_or(&self.discovery_dir);
        let path = dir.join(format!("{}.revocations.json", domain));
        if !path.exists() {
            return Ok(None);
        }
        let data = std::fs::read_to_string(&path)
            .map_err(|e| Error::Discovery(format!("Cannot read {}: {}", path.display(), e)))?;
        let doc: RevocationDocument = serde_json::from_str(&data)?;
        Ok(Some(doc))
    }
}

// ---------------------------------------------------------------------------
// TrustBundleResolver (sync — in-memory lookup)
// ---------------------------------------------------------------------------

/// Resolves documents from a pre-loaded [`SchemaPinTrustBundle`].
pub struct TrustBundleResolver {
    discovery: HashMap<String, WellKnownResponse>,
    revocations: HashMap<String, RevocationDocument>,
}

impl TrustBundleResolver {
    /// Build from a [`SchemaPinTrustBundle`].
    pub fn new(bundle: &SchemaPinTrustBundle) -> Self {
        let mut discovery = HashMap::new();
        for doc in &bundle.documents {
            discovery.insert(doc.domain.clone(), doc.well_known.clone());
        }
        let mut revocations = HashMap::new();
        for doc in &bundle.revocations {
            revocations.insert(doc.domain.clone(), doc.clone());
        }
        Self {
            discovery,
            revocations,
        }
    }

    /// Build from a JSON string representing a [`SchemaPinTrustBundle`].
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let bundle: SchemaPinTrustBundle = serde_json::from_str(json)?;
        Ok(Self::new(&bundle))
    }
}

impl SchemaResolver for TrustBundleResolver {
    fn resolve_discovery(&self, domain: &str) -> Result<WellKnownResponse, Error> {
        self.discovery
            .get(domain)
            .cloned()
            .ok_or_else(|| Error::Discovery(format!("Domain '{}' not in trust bundle", domain)))
    }

    fn resolve_revocation(
        &self,
        domain: &str,
        _discovery: &WellKnownResponse,
    ) -> Result<Option<RevocationDocument>, Error> {
        Ok(self.revocations.get(domain).cloned())
    }
}

// ---------------------------------------------------------------------------
// ChainResolver (sync — tries resolvers in order)
// ---------------------------------------------------------------------------

/// Composite resolver that tries a sequence of resolvers in order until one
/// succeeds.
pub struct ChainResolver {
    resolvers: Vec<Box<dyn SchemaResolver>>,
}

impl ChainResolver {
    pub fn new(resolvers: Vec<Box<dyn SchemaResolver>>) -> Self {
        Self { resolvers }
    }
}

impl SchemaResolver for ChainResolver {
    fn resolve_discovery(&self, domain: &str) -> Result<WellKnownResponse, Error> {
        let mut last_err = Error::Discovery("No resolvers configured".to_string());
        for (i, resolver) in self.resolvers.iter().enumerate() {
            match resolver.resolve_discovery(domain) {
                Ok(doc) => return Ok(doc),
                Err(e) => {
                    tracing::debug!(domain, resolver_index = i, error = %e, "resolver in chain failed, trying next");
                    last_err = e;
                }
            }
        }
        Err(last_err)
    }

    fn resolve_revocation(
        &self,
        domain: &str,
        discovery: &WellKnownResponse,
    ) -> Result<Option<RevocationDocument>, Error> {
        for resolver in &self.resolvers {
            match resolver.resolve_revocation(domain, discovery) {
                Ok(Some(doc)) => return Ok(Some(doc)),
                Ok(None) => continue,
                Err(_) => continue,
            }
        }
        Ok(None)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
