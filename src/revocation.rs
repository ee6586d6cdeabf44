use chrono::Utc;

use crate::error::{Error, ErrorCode};
use crate::types::revocation::{RevocationDocument, RevocationReason, RevokedKey};

#[cfg(feature = "fetch")]
use crate::cancellation::{self, CancellationToken, Deadline};

/// Build an empty revocation document for a domain.
pub fn build_revocation_document(domain: &str) -> RevocationDocument {
    RevocationDocument {
        schemapin_version: "1.2".to_string(),
        domain: domain.to_string(),
        updated_at: Utc::now().to_rfc3339(),
        revoked_keys: vec![],
    }
}

/// Add a revoked key to the document.
pub fn add_revoked_key(doc: &mut RevocationDocument, fingerprint: &str, reason: RevocationReason) {
    doc.revoked_keys.push(RevokedKey {
        fingerprint: fingerprint.to_string(),
        revoked_at: Utc::now().to_rfc3339(),
        reason,
    });
    doc.updated_at = Utc::now().to_rfc3339();
}

/// Check if a key fingerprint is revoked in a standalone revocation document.
/// Returns `Ok(())` if the key is not revoked, or `Err` if it is.
pub fn check_revocation(doc: &RevocationDocument, fingerprint: &str) -> Result<(), Error> {
    if let Some(rk) = doc
        .revoked_keys
        .iter()
        .find(|rk| rk.fingerprint == fingerprint)
    {
        return Err(Error::Verification {
            code: ErrorCode::KeyRevoked,
            message: format!("Key {} revoked: {:?}", fingerprint, rk.reason),
        });
    }
    Ok(())
}

/// Combined revocation check: checks both the simple revoked_keys list (from
/// the well-known response) and a standalone revocation document.
pub fn check_revocation_combined(
    simple_revoked: &[String],
    revocation_doc: Option<&RevocationDocument>,
    fingerprint: &str,
) -> Result<(), Error> {
    // Check simple list first
    if simple_revoked.iter().any(|k| k == fingerprint) {
        tracing::debug!(fingerprint, "key found in simple revoked_keys list");
        return Err(Error::Verification {
            code: ErrorCode::KeyRevoked,
            message: format!("Key {} found in revoked_keys list", fingerprint),
        });
    }
    // Check standalone doc
    if let Some(doc) = revocation_doc {
        check_revocation(doc, fingerprint)?;
    }
    Ok(())
}

/// Fetch a revocation document from a URL.
#[cfg(feature = "fetch")]
pub async fn fetch_revocation_document(url: &str) -> Result<RevocationDocument, Error> {
    tracing::debug!(url, "fetching revocation document");
    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .map_err(|e| Error::Revocation(e.to_string()))?;

    let resp = client
        .get(url)
        .send()
        .await
        .map_err(|e| Error::Revocation(format!("Failed to fetch {}: {}", url, e)))?;

    if !resp.status().is_success() {
        tracing::warn!(url, status = %resp.status(), "revocation document fetch failed");
        return Err(Error::Revocation(format!(
            "HTTP {} fetching {}",
            resp.status(),
            url
        )));
    }

    let doc: RevocationDocument = resp
        .json()
        .await
        .map_err(|e| Error::Revocation(format!("Invalid JSON from {}: {}", url, e)))?;

    Ok(doc)
}

/// Fetch a revocation document, honoring cancellation and an optional deadline.
#[cfg(feature = "fetch")]
pub async fn fetch_revocation_document_cancellable(
    url: &str,
    token: &CancellationToken,
    deadline: Option<Deadline>,
) -> Result<RevocationDocument, Error> {
    match cancellation::run_cancellable(token, deadline, fetch_revocation_document(url)).await {
        Ok(result) => result,
        Err(outcome) => {
            tracing::warn!(url, ?outcome, "revocation document fetch aborted");
            Err(Error::Revocation(format!(
                "revocation fetch for {} aborted: {:?}",
                url, outcome
            )))
        }
    }
}
