use std::time::Duration;

use serde_json::Value;

use crate::error::{self, WikiError};

pub const DEFAULT_USER_AGENT: &str = "wikiclient/0.1";
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// What a transport hands back: the numeric status and the raw body.
/// Classification and decoding happen above this seam.
#[derive(Debug, Clone)]
pub struct WireResponse {
    pub status: u16,
    pub body: String,
}

/// Blocking HTTP seam. Implementations must persist cookies across calls
/// made through the same instance; authenticated state lives in that jar.
pub trait Transport {
    fn get(&mut self, url: &str, params: &[(String, String)]) -> Result<WireResponse, WikiError>;
    fn post(&mut self, url: &str, params: &[(String, String)]) -> Result<WireResponse, WikiError>;
}

#[derive(Debug, Clone)]
pub struct HttpOptions {
    pub user_agent: String,
    pub timeout_ms: u64,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

/// Production transport: reqwest blocking client with a cookie jar.
pub struct HttpTransport {
    http: reqwest::blocking::Client,
    user_agent: String,
}

impl HttpTransport {
    pub fn new(options: &HttpOptions) -> Result<Self, WikiError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_millis(options.timeout_ms))
            .cookie_store(true)
            .build()?;
        Ok(Self {
            http,
            user_agent: options.user_agent.clone(),
        })
    }
}

impl Transport for HttpTransport {
    fn get(&mut self, url: &str, params: &[(String, String)]) -> Result<WireResponse, WikiError> {
        let response = self
            .http
            .get(url)
            .header("User-Agent", self.user_agent.clone())
            .query(params)
            .send()?;
        let status = response.status().as_u16();
        let body = response.text()?;
        Ok(WireResponse { status, body })
    }

    fn post(&mut self, url: &str, params: &[(String, String)]) -> Result<WireResponse, WikiError> {
        let response = self
            .http
            .post(url)
            .header("User-Agent", self.user_agent.clone())
            .form(params)
            .send()?;
        let status = response.status().as_u16();
        let body = response.text()?;
        Ok(WireResponse { status, body })
    }
}

/// Per-client transport identity: the cookie-bearing connection, both
/// endpoint URLs, and the request counter. Exclusively owned by one client
/// instance and never shared.
pub(crate) struct Session {
    transport: Box<dyn Transport>,
    api_url: String,
    index_url: String,
    request_count: usize,
}

impl Session {
    pub(crate) fn new(base_url: &str, transport: Box<dyn Transport>) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            api_url: format!("{base}/api.php"),
            index_url: format!("{base}/index.php"),
            transport,
            request_count: 0,
        }
    }

    /// GET against api.php; classifies the status, decodes the body, and
    /// surfaces any platform-reported error.
    pub(crate) fn api_get(&mut self, params: &[(String, String)]) -> Result<Value, WikiError> {
        self.request_count += 1;
        let response = self.transport.get(&self.api_url, &with_format(params))?;
        let payload = error::classify_response(response)?;
        error::check_api_error(&payload)?;
        Ok(payload)
    }

    /// POST against api.php with a form body; same classification as GET.
    pub(crate) fn api_post(&mut self, params: &[(String, String)]) -> Result<Value, WikiError> {
        self.request_count += 1;
        let response = self.transport.post(&self.api_url, &with_format(params))?;
        let payload = error::classify_response(response)?;
        error::check_api_error(&payload)?;
        Ok(payload)
    }

    /// GET against index.php, returning the body verbatim. No format
    /// parameter and no body classification; only the status is checked.
    pub(crate) fn index_get_raw(&mut self, params: &[(String, String)]) -> Result<String, WikiError> {
        self.request_count += 1;
        let response = self.transport.get(&self.index_url, params)?;
        if !(200..300).contains(&response.status) {
            return Err(WikiError::Transport {
                status: response.status,
            });
        }
        Ok(response.body)
    }

    pub(crate) fn request_count(&self) -> usize {
        self.request_count
    }
}

/// Every api.php request selects the JSON response format.
fn with_format(params: &[(String, String)]) -> Vec<(String, String)> {
    let mut pairs = Vec::with_capacity(params.len() + 1);
    pairs.push(("format".to_string(), "json".to_string()));
    pairs.extend(params.iter().cloned());
    pairs
}
