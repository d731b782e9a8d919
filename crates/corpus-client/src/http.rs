//! HTTP transport for the corpus API
//!
//! Request execution, status handling and JSON decoding. Every call is
//! attempted once; failures surface to the caller immediately.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

/// Default corpus API endpoint
pub const DEFAULT_BASE_URL: &str = "https://equran.id/api/v2";

/// Failure of a single API call
///
/// # Examples
/// ```
/// use corpus_client::http::ApiError;
///
/// let error = ApiError::Status { status: 404, message: "Surah not found".into() };
/// assert!(error.is_not_found());
/// assert_eq!(error.status(), Some(404));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// The HTTP client could not be built
    #[error("Client setup failed: {0}")]
    Client(String),

    /// No response arrived (DNS, refused connection, timeout, broken body)
    #[error("Request failed: {0}")]
    Transport(String),

    /// The server answered with a non-success status
    #[error("HTTP {status}: {message}")]
    Status {
        /// Status code
        status: u16,
        /// Message from the error body, or the raw body
        message: String,
    },

    /// The body was not the expected JSON
    #[error("Malformed response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Status code, when the server answered
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The server reported the resource does not exist
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND.as_u16())
    }
}

/// Error body the corpus API returns alongside non-success statuses
#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Configuration for the API client
#[derive(Debug, Clone)]
pub struct ApiClientConfig {
    /// Base API URL (e.g. "https://equran.id/api/v2")
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// User-Agent header
    pub user_agent: String,
    /// Extra headers sent with every request
    pub headers: Vec<(String, String)>,
}

impl Default for ApiClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            user_agent: format!("quran-reader/{}", env!("CARGO_PKG_VERSION")),
            headers: Vec::new(),
        }
    }
}

impl ApiClientConfig {
    /// Configuration for a base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), ..Default::default() }
    }

    /// Set the per-request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the User-Agent
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Send `name: value` with every request
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    fn header_map(&self) -> Result<HeaderMap, ApiError> {
        let mut map = HeaderMap::new();
        map.insert(ACCEPT, HeaderValue::from_static("application/json"));
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ApiError::Client(format!("header name {:?}: {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ApiError::Client(format!("header {}: {}", name, e)))?;
            map.insert(name, value);
        }
        Ok(map)
    }
}

/// HTTP client for the corpus API
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    config: ApiClientConfig,
}

impl ApiClient {
    /// Build a client; fails only on unusable configuration
    pub fn new(config: ApiClientConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.as_str())
            .default_headers(config.header_map()?)
            .build()
            .map_err(|e| ApiError::Client(e.to_string()))?;

        Ok(Self { http, config })
    }

    /// Resolve a path against the base URL
    pub fn url(&self, path: &str) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        format!("{}/{}", base, path.trim_start_matches('/'))
    }

    /// GET a path and decode the JSON body
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.url(path);
        tracing::debug!("GET {}", url);

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| ApiError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: error_message(status, &body),
            });
        }

        serde_json::from_slice(&body).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

fn error_message(status: StatusCode, body: &[u8]) -> String {
    if let Ok(ErrorBody { message }) = serde_json::from_slice(body) {
        return message;
    }
    let text = String::from_utf8_lossy(body);
    if text.trim().is_empty() {
        status.canonical_reason().unwrap_or("no reason given").to_string()
    } else {
        text.into_owned()
    }
}
