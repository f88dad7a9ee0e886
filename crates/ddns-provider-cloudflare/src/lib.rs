// # Cloudflare DNS Provider
//
// This crate provides the Cloudflare implementation of `DnsProvider` for the
// DDNS system.
//
// ## Behavior
//
// - One logical API call per trait method (list calls follow pagination)
// - Full error propagation to the engine; no retries, no caching, no
//   background tasks
// - HTTP timeout configured (10 seconds)
// - The first machine-readable error of a failed response is surfaced;
//   status-code specific messages when the body carries none
// - Dry-run mode for safe testing: reads go out, writes are only logged
//
// ## Security Requirements
//
// - API token NEVER appears in logs or Debug output
// - Provider fails fast if the token is empty
//
// ## API Reference
//
// - Cloudflare API v4: https://developers.cloudflare.com/api/
// - Verify token: GET `/user/tokens/verify`
// - List zones: GET `/zones`
// - List DNS records: GET `/zones/:zone_id/dns_records`
// - Patch DNS record: PATCH `/zones/:zone_id/dns_records/:record_id`

use async_trait::async_trait;
use ddns_core::traits::{AddressFamily, DnsProvider, ManagedRecord, Zone};
use ddns_core::{Error, Result};
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

/// Cloudflare API base URL
pub const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests (10 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Page size requested from list endpoints
const PAGE_SIZE: u32 = 50;

const PROVIDER: &str = "cloudflare";

/// Cloudflare DNS provider
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the provider will:
/// - Perform every GET request (credential check, zone and record listing)
/// - Log the intended PATCH payload
/// - **NOT** actually modify DNS records
///
/// # Security
///
/// The Debug implementation does NOT expose the API token.
pub struct CloudflareProvider {
    /// Cloudflare API token
    /// ⚠️ NEVER log this value
    api_token: String,

    /// API base URL, overridable for tests
    base_url: String,

    /// HTTP client for API requests
    client: reqwest::Client,

    /// Dry-run mode: if true, perform GET requests but skip PATCH updates
    dry_run: bool,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for CloudflareProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareProvider")
            .field("api_token", &"<REDACTED>")
            .field("base_url", &self.base_url)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

/// Response envelope shared by every Cloudflare endpoint
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiError>,
    result: Option<T>,
    #[serde(default)]
    result_info: Option<ResultInfo>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct ResultInfo {
    #[serde(default)]
    page: u32,
    #[serde(default)]
    total_pages: u32,
}

#[derive(Debug, Deserialize)]
struct TokenStatus {
    status: String,
}

#[derive(Debug, Deserialize)]
struct RawZone {
    id: String,
    name: String,
    #[serde(default)]
    status: String,
}

#[derive(Debug, Deserialize)]
struct RawRecord {
    id: String,
    name: String,
    #[serde(rename = "type")]
    record_type: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    proxied: bool,
}

impl CloudflareProvider {
    /// Create a new Cloudflare provider
    ///
    /// # Parameters
    ///
    /// - `api_token`: Cloudflare API token with Zone:Read and DNS:Edit permissions
    /// - `dry_run`: If true, perform GET requests but skip PATCH updates
    ///
    /// # Security
    ///
    /// The API token will NEVER be logged or displayed in error messages.
    pub fn new(api_token: impl Into<String>, dry_run: bool) -> Result<Self> {
        let api_token = api_token.into();

        if api_token.trim().is_empty() {
            return Err(Error::config("Cloudflare API token cannot be empty"));
        }

        // Build HTTP client with timeout
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        if dry_run {
            tracing::warn!("Cloudflare provider running in DRY-RUN mode - no changes will be made");
        }

        Ok(Self {
            api_token,
            base_url: CLOUDFLARE_API_BASE.to_string(),
            client,
            dry_run,
        })
    }

    /// Point the provider at a different API base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Whether writes are skipped
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Perform one API request and unwrap the envelope
    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<Value>,
    ) -> Result<Envelope<T>> {
        let url = format!("{}{}", self.base_url, path);

        let mut request = self
            .client
            .request(method, &url)
            .bearer_auth(&self.api_token)
            .header("Content-Type", "application/json");
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::provider(PROVIDER, format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read response".to_string());

        match serde_json::from_str::<Envelope<T>>(&text) {
            Ok(envelope) if status.is_success() && envelope.success => Ok(envelope),
            Ok(envelope) => Err(Error::provider(
                PROVIDER,
                envelope
                    .errors
                    .first()
                    .map(|e| format!("{} (code {})", e.message, e.code))
                    .unwrap_or_else(|| status_message(status, &text)),
            )),
            Err(e) if status.is_success() => Err(Error::provider(
                PROVIDER,
                format!("Failed to parse response: {}", e),
            )),
            Err(_) => Err(Error::provider(PROVIDER, status_message(status, &text))),
        }
    }

    /// Fetch every page of a list endpoint
    async fn list_all<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut page = 1;

        loop {
            let envelope: Envelope<Vec<T>> = self
                .request(
                    Method::GET,
                    path,
                    &[("page", page.to_string()), ("per_page", PAGE_SIZE.to_string())],
                    None,
                )
                .await?;

            items.extend(envelope.result.unwrap_or_default());

            match envelope.result_info {
                Some(info) if info.page.max(page) < info.total_pages => page += 1,
                _ => break,
            }
        }

        Ok(items)
    }
}

/// Message for a failed response whose body carries no API error
fn status_message(status: StatusCode, body: &str) -> String {
    match status.as_u16() {
        401 | 403 => format!(
            "Authentication failed: Invalid API token or insufficient permissions. Status: {}",
            status
        ),
        404 => format!("Resource not found. Status: {}", status),
        409 => format!(
            "Conflict: Record is being updated by another process. Status: {}",
            status
        ),
        429 => format!("Rate limit exceeded. Please retry later. Status: {}", status),
        500..=599 => format!("Cloudflare server error (transient): {} - {}", status, body),
        _ if status.is_success() => "Unknown Cloudflare Error".to_string(),
        _ => format!("Request failed: {} - {}", status, body),
    }
}

#[async_trait]
impl DnsProvider for CloudflareProvider {
    /// ```http
    /// GET /user/tokens/verify
    /// Authorization: Bearer <token>
    /// ```
    async fn verify_credential(&self) -> bool {
        match self
            .request::<TokenStatus>(Method::GET, "/user/tokens/verify", &[], None)
            .await
        {
            Ok(envelope) => {
                let status = envelope.result.map(|r| r.status).unwrap_or_default();
                if status != "active" {
                    tracing::error!("Token verification failed: token status is '{}'", status);
                }
                status == "active"
            }
            Err(e) => {
                tracing::error!("Token verification failed: {}", e);
                false
            }
        }
    }

    async fn list_zones(&self) -> Result<Vec<Zone>> {
        let zones: Vec<RawZone> = self.list_all("/zones").await.map_err(|e| {
            tracing::error!("Failed to get zones: {}", e);
            e
        })?;

        Ok(zones
            .into_iter()
            .map(|z| Zone {
                id: z.id,
                name: z.name,
                status: z.status,
            })
            .collect())
    }

    async fn list_managed_records(&self, zone_id: &str) -> Result<Vec<ManagedRecord>> {
        let path = format!("/zones/{}/dns_records", zone_id);
        let records: Vec<RawRecord> = self.list_all(&path).await.map_err(|e| {
            tracing::error!("Failed to get records for zone {}: {}", zone_id, e);
            e
        })?;

        Ok(records
            .into_iter()
            .filter_map(|r| {
                let family = AddressFamily::from_record_type(&r.record_type)?;
                Some(ManagedRecord {
                    id: r.id,
                    zone_id: zone_id.to_string(),
                    name: r.name,
                    family,
                    content: r.content,
                    proxied: r.proxied,
                })
            })
            .collect())
    }

    /// ```http
    /// PATCH /zones/:zone_id/dns_records/:record_id
    /// { "content": "203.0.113.7" }
    /// ```
    async fn update_record(&self, record: &ManagedRecord, content: &str) -> Result<()> {
        let path = format!("/zones/{}/dns_records/{}", record.zone_id, record.id);
        let payload = serde_json::json!({ "content": content });

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would send PATCH request to {} with payload: {}",
                path,
                payload
            );
            return Ok(());
        }

        self.request::<Value>(Method::PATCH, &path, &[], Some(payload))
            .await?;

        tracing::info!(
            "DNS record updated successfully: {} ({}) -> {}",
            record.name,
            record.family.record_type(),
            content
        );
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}
