use crate::error::Error;
use crate::types::discovery::WellKnownResponse;

#[cfg(feature = "fetch")]
use crate::cancellation::{self, CancellationToken, Deadline};

/// Construct the `.well-known` URL for a domain.
pub fn construct_well_known_url(domain: &str) -> String {
    format!("https://{}/.well-known/schemapin.json", domain)
}

/// Validate a well-known response for basic structural requirements.
pub fn validate_well_known_response(response: &WellKnownResponse) -> Result<(), Error> {
    if response.public_key_pem.is_empty() {
        return Err(Error::Discovery(
            "public_key_pem must not be empty".to_string(),
        ));
    }
    if !response
        .public_key_pem
        .contains("-----BEGIN PUBLIC KEY-----")
    {
        return Err(Error::Discovery(
            "public_key_pem must be a valid PEM public key".to_string(),
        ));
    }
    if response.schema_version.is_empty() {
        return Err(Error::Discovery(
            "schema_version must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Build a well-known response with the given fields.
#[allow(clippy::too_many_arguments)]
pub fn build_well_known_response(
    public_key_pem: &str,
    developer_name: Option<&str>,
    revoked_keys: Vec<String>,
    schema_version: &str,
    contact: Option<&str>,
    revocation_endpoint: Option<&str>,
) -> WellKnownResponse {
    WellKnownResponse {
        schema_version: schema_version.to_string(),
        developer_name: developer_name.map(|s| s.to_string()),
        public_key_pem: public_key_pem.to_string(),
        revoked_keys,
        contact: contact.map(|s| s.to_string()),
        revocation_endpoint: revocation_endpoint.map(|s| s.to_string()),
    }
}

/// Check if a key fingerprint appears in the revoked keys list.
pub fn check_key_revocation(fingerprint: &str, revoked_keys: &[String]) -> bool {
    revoked_keys.iter().any(|k| k == fingerprint)
}

/// Fetch a well-known response from a domain over HTTPS.
#[cfg(feature = "fetch")]
pub async fn fetch_well_known(domain: &str) -> Result<WellKnownResponse, Error> {
    let url = construct_well_known_url(domain);
    tracing::debug!(domain, %url, "fetching well-known discovery document");
    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .map_err(|e| Error::Discovery(e.to_string()))?;

    let resp = client
        .get(&url)
        .send()
        .await
        .map_err(|e| Error::Discovery(format!("Failed to fetch {}: {}", url, e)))?;

    if resp.status().is_redirection() {
        tracing::warn!(domain, status = %resp.status(), "well-known fetch redirected, rejecting");
        return Err(Error::Discovery(format!(
            "Redirect detected fetching {} (status {}). Redirects are not allowed.",
            url,
            resp.status()
        )));
    }

    if !resp.status().is_success() {
        tracing::warn!(domain, status = %resp.status(), "well-known fetch failed");
        return Err(Error::Discovery(format!(
            "HTTP {} fetching {}",
            resp.status(),
            url
        )));
    }

    let well_known: WellKnownResponse = resp
        .json()
        .await
        .map_err(|e| Error::Discovery(format!("Invalid JSON from {}: {}", url, e)))?;

    validate_well_known_response(&well_known)?;
    tracing::debug!(domain, "well-known discovery document validated");
    Ok(well_known)
}

/// Fetch a well-known response, honoring cancellation and an optional deadline.
///
/// Same semantics as [`fetch_well_known`], wrapped in
/// [`cancellation::run_cancellable`] so callers can abort a stalled fetch.
#[cfg(feature = "fetch")]
pub async fn fetch_well_known_cancellable(
    domain: &str,
    token: &CancellationToken,
    deadline: Option<Deadline>,
) -> Result<WellKnownResponse, Error> {
    match cancellation::run_cancellable(token, deadline, fetch_well_known(domain)).await {
        Ok(result) => result,
        Err(outcome) => {
            tracing::warn!(domain, ?outcome, "well-known fetch aborted");
            Err(Error::Discovery(format!(
                "well-known fetch for {} aborted: {:?}",
                domain, outcome
            )))
        }
    }
}
