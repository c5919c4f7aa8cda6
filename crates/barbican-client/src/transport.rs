//! Transport abstraction and its reqwest-backed implementation
//!
//! Managers and entities only talk to the [`Transport`] trait, so tests can
//! swap in an in-memory service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Response, Url};
use serde_json::Value;

use crate::error::{Error, Result};

/// Default API version appended to the endpoint
pub const DEFAULT_API_VERSION: &str = "v1";

/// Query parameters as ordered key/value pairs
pub type Query = [(String, String)];

/// Performs authenticated requests against the Barbican API.
///
/// `href` is either a full URL (used as-is) or a collection path such as
/// `"secrets"`, which the transport resolves against its endpoint.
#[async_trait]
pub trait Transport: Send + Sync {
    /// GET a JSON document
    async fn get(&self, href: &str, query: &Query) -> Result<Value>;

    /// GET raw bytes with the given `Accept` content type
    async fn get_raw(&self, href: &str, accept: &str) -> Result<Vec<u8>>;

    /// POST a JSON body and return the JSON response
    async fn post(&self, href: &str, body: &Value) -> Result<Value>;

    /// DELETE a resource, optionally with a JSON body
    async fn delete(&self, href: &str, body: Option<&Value>) -> Result<()>;
}

/// Settings for [`HttpTransport`]
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Service endpoint, e.g. `http://localhost:9311`
    pub endpoint: String,
    /// API version path segment
    pub api_version: String,
    /// Sent as `X-Project-Id` when set
    pub project_id: Option<String>,
    /// Sent as `X-Auth-Token` when set
    pub auth_token: Option<String>,
    /// Per-request timeout
    pub timeout: Option<Duration>,
}

impl HttpTransportConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_version: DEFAULT_API_VERSION.to_string(),
            project_id: None,
            auth_token: None,
            timeout: None,
        }
    }

    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// HTTP transport built on reqwest
pub struct HttpTransport {
    client: Client,
    base_url: String,
    default_headers: HeaderMap,
}

impl HttpTransport {
    pub fn new(config: HttpTransportConfig) -> Result<Self> {
        let endpoint = config.endpoint.trim().trim_end_matches('/');
        if endpoint.is_empty() {
            return Err(Error::Config("Barbican endpoint url must be provided".to_string()));
        }
        Url::parse(endpoint)
            .map_err(|e| Error::Config(format!("invalid endpoint '{endpoint}': {e}")))?;

        let version = config.api_version.trim_matches('/');
        let base_url = if version.is_empty() {
            endpoint.to_string()
        } else {
            format!("{endpoint}/{version}")
        };

        let mut default_headers = HeaderMap::new();
        if let Some(project_id) = &config.project_id {
            default_headers.insert("X-Project-Id", header_value(project_id)?);
        }
        if let Some(token) = &config.auth_token {
            let mut value = header_value(token)?;
            value.set_sensitive(true);
            default_headers.insert("X-Auth-Token", value);
        }

        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            base_url,
            default_headers,
        })
    }

    /// Endpoint with the API version appended, e.g. `http://localhost:9311/v1`
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolve an href: full URLs pass through, paths become `<base>/<path>/`
    pub fn url_for(&self, href: &str) -> String {
        if href.starts_with("http://") || href.starts_with("https://") {
            href.to_string()
        } else {
            format!("{}/{}/", self.base_url, href.trim_matches('/'))
        }
    }

    fn request(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.headers(self.default_headers.clone())
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| Error::Config(format!("invalid header value: {e}")))
}

/// Turn a non-2xx response into an [`Error`]; pass 2xx through
async fn check_status(href: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = error_message(&text);
    tracing::debug!(status = status.as_u16(), href, "request failed: {}", message);
    Err(Error::from_status(status.as_u16(), href, message))
}

/// Prefer the JSON `title`/`description`, fall back to the raw body
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("title")
                .or_else(|| v.get("description"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}

async fn json_body(response: Response) -> Result<Value> {
    let bytes = response.bytes().await?;
    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_slice(&bytes).map_err(|e| Error::InvalidResponse(e.to_string()))
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, href: &str, query: &Query) -> Result<Value> {
        let url = self.url_for(href);
        let response = self
            .request(self.client.get(&url))
            .header(ACCEPT, "application/json")
            .query(query)
            .send()
            .await?;
        json_body(check_status(&url, response).await?).await
    }

    async fn get_raw(&self, href: &str, accept: &str) -> Result<Vec<u8>> {
        let url = self.url_for(href);
        let response = self
            .request(self.client.get(&url))
            .header(ACCEPT, accept)
            .send()
            .await?;
        let bytes = check_status(&url, response).await?.bytes().await?;
        Ok(bytes.to_vec())
    }

    async fn post(&self, href: &str, body: &Value) -> Result<Value> {
        let url = self.url_for(href);
        let response = self
            .request(self.client.post(&url))
            .header(CONTENT_TYPE, "application/json")
            .json(body)
            .send()
            .await?;
        json_body(check_status(&url, response).await?).await
    }

    async fn delete(&self, href: &str, body: Option<&Value>) -> Result<()> {
        let url = self.url_for(href);
        let mut builder = self.request(self.client.delete(&url));
        if let Some(body) = body {
            builder = builder.json(body);
        }
        check_status(&url, builder.send().await?).await?;
        Ok(())
    }
}
