use std::time::Duration;

use dash_core::{LogEntry, PageRequest, PageResult, Summary, TailBatch, TailLine};
use dash_logging::dash_debug;
use futures_util::StreamExt;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;

use crate::{ApiError, FailureKind};

const SESSION_HEADER: &str = "X-FTL-SID";

#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub base_url: String,
    /// Session id sent with every request when the server requires a login.
    pub session_id: Option<String>,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub max_bytes: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://pi.hole/".to_string(),
            session_id: None,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            max_bytes: 16 * 1024 * 1024,
        }
    }
}

/// Remote dashboard service as seen by the orchestration layer.
#[async_trait::async_trait]
pub trait DashboardApi: Send + Sync {
    async fn query_page(&self, request: &PageRequest) -> Result<PageResult<LogEntry>, ApiError>;

    async fn log_tail(&self, next_id: Option<u64>) -> Result<TailBatch, ApiError>;

    async fn summary(&self) -> Result<Summary, ApiError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestApi {
    settings: ApiSettings,
    base: Url,
    client: reqwest::Client,
}

impl ReqwestApi {
    pub fn new(settings: ApiSettings) -> Result<Self, ApiError> {
        let mut base = Url::parse(settings.base_url.trim())
            .map_err(|err| ApiError::new(FailureKind::InvalidUrl, err.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(ApiError::new(
                FailureKind::InvalidUrl,
                format!("{} cannot be used as a base url", settings.base_url),
            ));
        }
        // Relative joins replace the last path segment unless it ends in '/'.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| ApiError::new(FailureKind::Network, err.to_string()))?;

        Ok(Self {
            settings,
            base,
            client,
        })
    }

    pub fn settings(&self) -> &ApiSettings {
        &self.settings
    }

    fn endpoint(&self, path: &str, query: &[(&str, String)]) -> Result<Url, ApiError> {
        let mut url = self
            .base
            .join(path)
            .map_err(|err| ApiError::new(FailureKind::InvalidUrl, err.to_string()))?;
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(key, value)| (*key, value.as_str())));
        }
        Ok(url)
    }

    async fn get_json<R: DeserializeOwned>(&self, url: Url) -> Result<R, ApiError> {
        dash_debug!("GET {}", url.path());
        let mut request = self.client.get(url.as_str());
        if let Some(session_id) = &self.settings.session_id {
            request = request.header(SESSION_HEADER, session_id.as_str());
        }

        let response = request.send().await.map_err(map_reqwest_error)?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ApiError::new(FailureKind::Unauthorized, status.to_string()));
        }
        if !status.is_success() {
            return Err(ApiError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        let max_bytes = self.settings.max_bytes;
        if let Some(content_len) = response.content_length() {
            if content_len > max_bytes {
                return Err(too_large(max_bytes, content_len));
            }
        }

        // Chunked bodies carry no length, so the cap is enforced while reading.
        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = body.len() as u64 + chunk.len() as u64;
            if next_len > max_bytes {
                return Err(too_large(max_bytes, next_len));
            }
            body.extend_from_slice(&chunk);
        }

        serde_json::from_slice(&body)
            .map_err(|err| ApiError::new(FailureKind::Decode, err.to_string()))
    }
}

#[async_trait::async_trait]
impl DashboardApi for ReqwestApi {
    async fn query_page(&self, request: &PageRequest) -> Result<PageResult<LogEntry>, ApiError> {
        let url = self.endpoint("api/queries", &request.query_pairs())?;
        let wire: QueriesWire = self.get_json(url).await?;
        Ok(PageResult::new(
            wire.cursor.and_then(CursorWire::into_token),
            wire.items,
        ))
    }

    async fn log_tail(&self, next_id: Option<u64>) -> Result<TailBatch, ApiError> {
        let query: Vec<(&str, String)> = next_id
            .map(|id| vec![("nextID", id.to_string())])
            .unwrap_or_default();
        let url = self.endpoint("api/logs/dnsmasq", &query)?;
        let wire: TailWire = self.get_json(url).await?;
        Ok(TailBatch {
            lines: wire.log,
            next_id: wire.next_id,
            pid: wire.pid,
        })
    }

    async fn summary(&self) -> Result<Summary, ApiError> {
        let url = self.endpoint("api/stats/summary", &[])?;
        let wire: SummaryWire = self.get_json(url).await?;
        Ok(Summary {
            total_queries: wire.queries.total,
            blocked_queries: wire.queries.blocked,
            percent_blocked: wire.queries.percent_blocked,
            unique_domains: wire.queries.unique_domains,
            forwarded: wire.queries.forwarded,
            cached: wire.queries.cached,
            active_clients: wire.clients.active,
            domains_on_blocklist: wire.gravity.domains_being_blocked,
        })
    }
}

#[derive(Debug, Deserialize)]
struct QueriesWire {
    #[serde(alias = "queries")]
    items: Vec<LogEntry>,
    #[serde(default)]
    cursor: Option<CursorWire>,
}

/// Servers send the cursor either as a row id or as an opaque string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CursorWire {
    Number(u64),
    Text(String),
}

impl CursorWire {
    fn into_token(self) -> Option<String> {
        match self {
            CursorWire::Number(id) => Some(id.to_string()),
            CursorWire::Text(text) if text.is_empty() => None,
            CursorWire::Text(text) => Some(text),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TailWire {
    #[serde(default)]
    log: Vec<TailLine>,
    #[serde(rename = "nextID")]
    next_id: u64,
    #[serde(default)]
    pid: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SummaryWire {
    queries: QueryCounters,
    clients: ClientCounters,
    gravity: GravityCounters,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct QueryCounters {
    total: u64,
    blocked: u64,
    percent_blocked: f64,
    unique_domains: u64,
    forwarded: u64,
    cached: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ClientCounters {
    active: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GravityCounters {
    domains_being_blocked: u64,
}

fn too_large(max_bytes: u64, actual: u64) -> ApiError {
    ApiError::new(
        FailureKind::TooLarge {
            max_bytes,
            actual: Some(actual),
        },
        "response too large",
    )
}

fn map_reqwest_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        return ApiError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_decode() {
        return ApiError::new(FailureKind::Decode, err.to_string());
    }
    ApiError::new(FailureKind::Network, err.to_string())
}
