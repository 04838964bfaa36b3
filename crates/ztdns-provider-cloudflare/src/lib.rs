// # Cloudflare Provider
//
// This crate provides the Cloudflare implementation of the three ztdns
// collaborator traits:
//
// - `DeviceDirectory`: Zero Trust device inventory
// - `AddressLookup`: DEX live fleet status (device IPv4 address)
// - `DnsRecordStore`: zone metadata and DNS record reads/writes
//
// ## Behavior
//
// - ✅ One HTTP request per call (pagination: one request per page, lazily)
// - ✅ Full error propagation to the engine
// - ✅ HTTP timeout configured (30 seconds)
// - ✅ Specific error handling for HTTP status codes (401, 403, 404, 409, 429, 5xx)
// - ✅ Dry-run mode for safe testing
// - ❌ NO retry logic (a failed write is reported; the next cycle converges)
// - ❌ NO caching (every cycle reads fresh state)
// - ❌ NO background tasks
//
// ## Security Requirements
//
// - API token NEVER appears in logs or Debug output
// - Construction fails fast if the token is empty
//
// ## API Reference
//
// - Cloudflare API v4: https://developers.cloudflare.com/api/
// - List Devices: GET `/accounts/:account_id/devices`
// - Live Fleet Status: GET `/accounts/:account_id/dex/devices/:device_id/fleet-status/live`
// - Zone Details: GET `/zones/:zone_id`
// - List DNS Records: GET `/zones/:zone_id/dns_records?type=A`
// - Create DNS Record: POST `/zones/:zone_id/dns_records`
// - Overwrite DNS Record: PUT `/zones/:zone_id/dns_records/:record_id`

use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::pin::Pin;
use std::time::Duration;
use tokio_stream::Stream;
use ztdns_core::model::{DeviceObservation, DnsRecord, RecordSpec, RecordType};
use ztdns_core::traits::{
    AddressLookup, DeviceDirectory, DeviceStream, DnsRecordStore, RecordStream,
};
use ztdns_core::{Error, Result};

/// Cloudflare API base URL
pub const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Default page size for paginated listings
const DEFAULT_PAGE_SIZE: u32 = 100;

/// Window for the live fleet status query
const FLEET_STATUS_SINCE_MINUTES: u32 = 10;

/// Provider name used in errors
const PROVIDER: &str = "cloudflare";

/// Response envelope shared by all v4 endpoints
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default = "default_success")]
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
    result_info: Option<ResultInfo>,
}

fn default_success() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct ResultInfo {
    #[serde(default)]
    total_pages: Option<u32>,
}

/// Device entry of the Zero Trust device listing
#[derive(Debug, Deserialize)]
struct ApiDevice {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    updated: Option<String>,
    #[serde(default)]
    last_seen: Option<String>,
}

impl From<ApiDevice> for DeviceObservation {
    fn from(device: ApiDevice) -> Self {
        // A missing timestamp becomes an unparseable one, which drops just
        // this observation during deduplication
        let last_updated = device.updated.or(device.last_seen).unwrap_or_default();
        DeviceObservation::new(device.id, device.name.unwrap_or_default(), last_updated)
    }
}

/// DNS record entry
#[derive(Debug, Deserialize)]
struct ApiRecord {
    id: String,
    name: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiZone {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ApiCreated {
    id: String,
}

/// Cloudflare API client
///
/// Implements every collaborator the engine needs. The client is cheap to
/// clone (the underlying HTTP client is reference counted), so one instance
/// can back the directory, the lookup and the record store.
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the client will:
/// - Perform all GET requests (devices, addresses, zone, records)
/// - Log the intended POST/PUT payload
/// - **NOT** actually modify DNS records
#[derive(Clone)]
pub struct CloudflareClient {
    /// Cloudflare API token
    /// ⚠️ NEVER log this value
    api_token: String,

    /// API base URL (overridable for tests)
    base_url: String,

    /// HTTP client for API requests
    client: reqwest::Client,

    /// Dry-run mode: if true, perform GET requests but skip writes
    dry_run: bool,

    /// Page size for listings
    per_page: u32,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for CloudflareClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareClient")
            .field("api_token", &"<REDACTED>")
            .field("base_url", &self.base_url)
            .field("dry_run", &self.dry_run)
            .field("per_page", &self.per_page)
            .finish()
    }
}

impl CloudflareClient {
    /// Create a new Cloudflare client
    ///
    /// # Parameters
    ///
    /// - `api_token`: Token with Zero Trust read, DEX read and Zone:DNS:Edit permissions
    /// - `dry_run`: If true, perform GET requests but skip writes
    ///
    /// # Errors
    ///
    /// Fails if the token is empty or the HTTP client cannot be built.
    pub fn new(api_token: impl Into<String>, dry_run: bool) -> Result<Self> {
        let api_token = api_token.into();
        if api_token.trim().is_empty() {
            return Err(Error::config("Cloudflare API token cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_token,
            base_url: CLOUDFLARE_API_BASE.to_string(),
            client,
            dry_run,
            per_page: DEFAULT_PAGE_SIZE,
        })
    }

    /// Create a new Cloudflare client (production/live mode)
    pub fn new_live(api_token: impl Into<String>) -> Result<Self> {
        Self::new(api_token, false)
    }

    /// Create a new Cloudflare client (dry-run mode)
    pub fn new_dry_run(api_token: impl Into<String>) -> Result<Self> {
        Self::new(api_token, true)
    }

    /// Point the client at a different API root
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the listing page size
    pub fn with_page_size(mut self, per_page: u32) -> Self {
        self.per_page = per_page.max(1);
        self
    }

    /// Whether writes are suppressed
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Send a request and return the raw response
    async fn send(
        &self,
        method: Method,
        url: &str,
        payload: Option<&Value>,
    ) -> Result<reqwest::Response> {
        let mut request = self
            .client
            .request(method, url)
            .bearer_auth(&self.api_token)
            .header("Content-Type", "application/json");
        if let Some(payload) = payload {
            request = request.json(payload);
        }

        request
            .send()
            .await
            .map_err(|e| Error::provider(PROVIDER, format!("HTTP request failed: {}", e)))
    }

    /// Send a request and decode the envelope, mapping failures to errors
    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        payload: Option<&Value>,
        what: &str,
    ) -> Result<Envelope<T>> {
        let response = self.send(method, url, payload).await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(status_error(status, &error_text, what));
        }

        let envelope: Envelope<T> = decode(response).await?;

        if !envelope.success {
            let messages: Vec<String> = envelope
                .errors
                .iter()
                .map(|m| format!("{} ({})", m.message, m.code))
                .collect();
            return Err(Error::provider(
                PROVIDER,
                format!("{} failed: {}", what, messages.join("; ")),
            ));
        }

        Ok(envelope)
    }

    /// Lazily page through a listing endpoint
    ///
    /// Pages are requested as the stream is polled; an error ends the stream.
    fn paginate<'a, T>(
        &'a self,
        url: String,
        what: &'static str,
    ) -> Pin<Box<dyn Stream<Item = Result<T>> + Send + 'a>>
    where
        T: DeserializeOwned + Send + 'a,
    {
        let separator = if url.contains('?') { '&' } else { '?' };
        let pages = futures::stream::try_unfold(Some(1u32), move |next| {
            let url = url.clone();
            async move {
                let Some(page) = next else {
                    return Ok(None);
                };

                let page_url = format!("{}{}page={}&per_page={}", url, separator, page, self.per_page);
                tracing::debug!("Fetching {} page {}", what, page);
                let envelope: Envelope<Vec<T>> =
                    self.call(Method::GET, &page_url, None, what).await?;

                let items = envelope.result.unwrap_or_default();
                let total_pages = envelope
                    .result_info
                    .and_then(|info| info.total_pages)
                    .unwrap_or(1);
                let next = (page < total_pages && !items.is_empty()).then_some(page + 1);

                Ok::<_, Error>(Some((items, next)))
            }
        });

        Box::pin(
            pages
                .map_ok(|items| futures::stream::iter(items.into_iter().map(Ok)))
                .try_flatten(),
        )
    }

    /// Issue a record write, or log it in dry-run mode
    async fn write_record(
        &self,
        method: Method,
        url: &str,
        spec: &RecordSpec,
        what: &str,
    ) -> Result<Option<String>> {
        let payload = record_payload(spec);

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would send {} request to {} with payload: {}",
                method,
                url,
                payload
            );
            return Ok(None);
        }

        let envelope: Envelope<ApiCreated> =
            self.call(method, url, Some(&payload), what).await?;
        Ok(envelope.result.map(|created| created.id))
    }
}

/// Build the JSON body for a record write
fn record_payload(spec: &RecordSpec) -> Value {
    serde_json::json!({
        "type": spec.record_type.as_str(),
        "name": spec.name,
        "content": spec.content,
        "ttl": spec.ttl,
        "proxied": false,
    })
}

/// Read a response body and decode it as JSON
///
/// Malformed bodies surface as `Error::Json`.
async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let body = response
        .bytes()
        .await
        .map_err(|e| Error::provider(PROVIDER, format!("Failed to read response body: {}", e)))?;
    Ok(serde_json::from_slice(&body)?)
}

/// Map a non-success HTTP status to an error
fn status_error(status: StatusCode, error_text: &str, what: &str) -> Error {
    match status.as_u16() {
        401 | 403 => Error::auth(format!(
            "Invalid API token or insufficient permissions for {}. Status: {}",
            what, status
        )),
        404 => Error::not_found(format!("{}: {}", what, status)),
        409 => Error::provider(
            PROVIDER,
            format!("{} rejected as conflicting: {} - {}", what, status, error_text),
        ),
        429 => Error::rate_limited(format!(
            "Rate limit exceeded during {}. Please retry later. Status: {}",
            what, status
        )),
        500..=599 => Error::provider(
            PROVIDER,
            format!("Cloudflare server error (transient): {} - {}", status, error_text),
        ),
        _ => Error::provider(
            PROVIDER,
            format!("{} failed: {} - {}", what, status, error_text),
        ),
    }
}

/// Extract the IPv4 address from a live fleet status result
///
/// Missing fields, `null` and an empty object all mean "unknown".
fn fleet_status_address(result: Option<&Value>) -> Option<String> {
    result?
        .get("deviceIpv4")?
        .get("address")?
        .as_str()
        .map(str::trim)
        .filter(|addr| !addr.is_empty())
        .map(str::to_string)
}

impl DeviceDirectory for CloudflareClient {
    fn list_devices<'a>(&'a self, account_id: &'a str) -> DeviceStream<'a> {
        let url = format!("{}/accounts/{}/devices", self.base_url, account_id);
        Box::pin(
            self.paginate::<ApiDevice>(url, "device listing")
                .map_ok(DeviceObservation::from),
        )
    }
}

#[async_trait]
impl AddressLookup for CloudflareClient {
    /// Look up a device's IPv4 address from its live fleet status
    ///
    /// A non-success status is "unknown", not an error: the device may simply
    /// not be reporting telemetry right now.
    async fn lookup_address(&self, account_id: &str, device_id: &str) -> Result<Option<String>> {
        let url = format!(
            "{}/accounts/{}/dex/devices/{}/fleet-status/live?since_minutes={}",
            self.base_url, account_id, device_id, FLEET_STATUS_SINCE_MINUTES
        );

        let response = self.send(Method::GET, &url, None).await?;
        if !response.status().is_success() {
            tracing::debug!(
                "Fleet status for device {} unavailable: {}",
                device_id,
                response.status()
            );
            return Ok(None);
        }

        let envelope: Envelope<Value> = decode(response).await?;

        Ok(fleet_status_address(envelope.result.as_ref()))
    }
}

#[async_trait]
impl DnsRecordStore for CloudflareClient {
    async fn zone_name(&self, zone_id: &str) -> Result<String> {
        let url = format!("{}/zones/{}", self.base_url, zone_id);
        let envelope: Envelope<ApiZone> = self.call(Method::GET, &url, None, "zone lookup").await?;

        envelope
            .result
            .map(|zone| zone.name)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| Error::provider(PROVIDER, "Invalid response format: zone.name missing"))
    }

    fn list_records<'a>(&'a self, zone_id: &'a str, record_type: RecordType) -> RecordStream<'a> {
        let url = format!(
            "{}/zones/{}/dns_records?type={}",
            self.base_url, zone_id, record_type
        );
        Box::pin(
            self.paginate::<ApiRecord>(url, "DNS record listing")
                .map_ok(|record| DnsRecord::new(record.id, record.name, record.content)),
        )
    }

    async fn create_record(&self, zone_id: &str, spec: &RecordSpec) -> Result<String> {
        let url = format!("{}/zones/{}/dns_records", self.base_url, zone_id);
        match self.write_record(Method::POST, &url, spec, "DNS record create").await? {
            Some(id) => Ok(id),
            None if self.dry_run => Ok("dry-run".to_string()),
            None => Err(Error::provider(
                PROVIDER,
                "Invalid response format: created record has no id",
            )),
        }
    }

    async fn update_record(&self, zone_id: &str, record_id: &str, spec: &RecordSpec) -> Result<()> {
        let url = format!("{}/zones/{}/dns_records/{}", self.base_url, zone_id, record_id);
        self.write_record(Method::PUT, &url, spec, "DNS record update").await?;
        Ok(())
    }

    fn store_name(&self) -> &'static str {
        PROVIDER
    }
}
