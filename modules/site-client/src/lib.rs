//! HTTP clients for tenant sites and the central aggregation endpoint.
//!
//! Expected upstream failure (network error, non-2xx, non-object body) is not
//! an error here: fetches return `None` and log the cause. Callers treat
//! `None` as "no data available for this sub-resource" and continue.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use sitehub_common::HubError;

/// Header carrying the tenant credential on upstream calls.
pub const LICENSE_HEADER: &str = "X-Hub-License";

/// Fetches one JSON sub-resource from a tenant-controlled endpoint.
/// Implemented by `SiteClient`; tests substitute canned-response stubs.
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    async fn fetch(
        &self,
        base_url: &str,
        path: &str,
        credential: &str,
        query: &[(String, String)],
    ) -> Option<Value>;
}

/// Yields the two aggregation documents for a credential.
#[async_trait]
pub trait AggregationSource: Send + Sync {
    async fn all_connections(&self, credential: &str) -> Option<Value>;
    async fn data_streams(&self, credential: &str) -> Option<Value>;
}

/// Client for a tenant's own site endpoints.
///
/// TLS certificate validation is disabled: tenant sites often run
/// self-signed or misconfigured certificates, and refusing them would make
/// whole inventories unreachable. Central-endpoint calls go through
/// `HubClient`, which validates normally.
pub struct SiteClient {
    client: reqwest::Client,
}

impl SiteClient {
    pub fn new(timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .danger_accept_invalid_certs(true)
            .build()
            .expect("Failed to build HTTP client");

        Self { client }
    }
}

impl Default for SiteClient {
    fn default() -> Self {
        Self::new(15)
    }
}

#[async_trait]
impl ResourceFetcher for SiteClient {
    async fn fetch(
        &self,
        base_url: &str,
        path: &str,
        credential: &str,
        query: &[(String, String)],
    ) -> Option<Value> {
        fetch_document(&self.client, base_url, path, credential, query).await
    }
}

/// Client for the central aggregation endpoint. TLS validated.
pub struct HubClient {
    client: reqwest::Client,
    base_url: String,
}

impl HubClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl AggregationSource for HubClient {
    async fn all_connections(&self, credential: &str) -> Option<Value> {
        let query = [("license".to_string(), credential.to_string())];
        fetch_document(&self.client, &self.base_url, "all-connections", "", &query).await
    }

    async fn data_streams(&self, credential: &str) -> Option<Value> {
        let query = [("license".to_string(), credential.to_string())];
        fetch_document(&self.client, &self.base_url, "data-streams", "", &query).await
    }
}

async fn fetch_document(
    client: &reqwest::Client,
    base_url: &str,
    path: &str,
    credential: &str,
    query: &[(String, String)],
) -> Option<Value> {
    match try_fetch(client, base_url, path, credential, query).await {
        Ok(doc) => Some(doc),
        Err(err) => {
            warn!(base_url, path, error = %err, "upstream fetch failed, continuing without this sub-resource");
            None
        }
    }
}

async fn try_fetch(
    client: &reqwest::Client,
    base_url: &str,
    path: &str,
    credential: &str,
    query: &[(String, String)],
) -> Result<Value, HubError> {
    let url = join_url(base_url, path);

    let mut request = client.get(&url);
    if !credential.is_empty() {
        request = request.header(LICENSE_HEADER, credential);
    }
    if !query.is_empty() {
        request = request.query(query);
    }

    let resp = request
        .send()
        .await
        .map_err(|e| HubError::UpstreamUnavailable(e.to_string()))?;

    let status = resp.status();
    if !status.is_success() {
        return Err(HubError::UpstreamUnavailable(format!(
            "status {status} from {path}"
        )));
    }

    let body: Value = resp
        .json()
        .await
        .map_err(|e| HubError::MalformedUpstreamPayload(e.to_string()))?;

    if !body.is_object() {
        return Err(HubError::MalformedUpstreamPayload(format!(
            "non-object body from {path}"
        )));
    }

    Ok(body)
}

fn join_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
