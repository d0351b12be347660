//! Data platform HTTP client.
//!
//! A thin reqwest wrapper that adds the platform's authentication headers
//! (bearer token, API key, organization and sandbox) to every request and
//! turns non-success responses into [`AdapterError::Http`].  The access
//! token is pre-issued and read from configuration; acquiring or refreshing
//! it is out of scope.

use std::time::{Duration, Instant};

use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use tracing::debug;
use url::Url;

use dataops_agent::config::PlatformSettings;

use crate::error::{AdapterError, Result};

const API_KEY_HEADER: &str = "x-api-key";
const ORG_HEADER: &str = "x-gw-ims-org-id";
const SANDBOX_HEADER: &str = "x-sandbox-name";

/// Connection settings for [`PlatformClient`].
#[derive(Debug, Clone)]
pub struct PlatformClientConfig {
    pub base_url: String,
    pub access_token: Option<String>,
    pub api_key: Option<String>,
    pub org_id: Option<String>,
    pub sandbox: String,
    pub timeout: Duration,
}

impl PlatformClientConfig {
    /// Unauthenticated settings for `base_url`, mainly for tests.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            access_token: None,
            api_key: None,
            org_id: None,
            sandbox: "prod".into(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl From<&PlatformSettings> for PlatformClientConfig {
    fn from(s: &PlatformSettings) -> Self {
        Self {
            base_url: s.base_url.clone(),
            access_token: s.access_token.clone(),
            api_key: s.api_key.clone(),
            org_id: s.org_id.clone(),
            sandbox: s.sandbox.clone(),
            timeout: Duration::from_secs(s.request_timeout_secs),
        }
    }
}

/// Authenticated JSON client for the data platform.
#[derive(Debug, Clone)]
pub struct PlatformClient {
    http: reqwest::Client,
    base_url: Url,
    sandbox: String,
    timeout: Duration,
}

impl PlatformClient {
    /// Build a client.  Fails if the base URL or a header value is invalid.
    pub fn new(config: PlatformClientConfig) -> Result<Self> {
        let mut base = config.base_url.trim().to_owned();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base).map_err(|e| {
            AdapterError::ConfigError(format!("invalid platform URL `{}`: {e}", config.base_url))
        })?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(token) = &config.access_token {
            let bearer = format!("Bearer {token}");
            headers.insert(AUTHORIZATION, header_value("authorization", &bearer)?);
        }
        if let Some(key) = &config.api_key {
            headers.insert(
                HeaderName::from_static(API_KEY_HEADER),
                header_value(API_KEY_HEADER, key)?,
            );
        }
        if let Some(org) = &config.org_id {
            headers.insert(HeaderName::from_static(ORG_HEADER), header_value(ORG_HEADER, org)?);
        }
        headers.insert(
            HeaderName::from_static(SANDBOX_HEADER),
            header_value(SANDBOX_HEADER, &config.sandbox)?,
        );

        let http = reqwest::Client::builder()
            .user_agent("DataOpsCopilot/0.1")
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| AdapterError::ConfigError(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url,
            sandbox: config.sandbox,
            timeout: config.timeout,
        })
    }

    /// Sandbox all requests are scoped to.
    pub fn sandbox(&self) -> &str {
        &self.sandbox
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        let url = self.url(path)?;
        self.send(Method::GET, url, query, None).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        let url = self.url(path)?;
        self.send(Method::POST, url, &[], Some(body)).await
    }

    /// GET one member of `collection`.  `id` is sent as a single
    /// percent-encoded path segment.
    pub async fn get_item(&self, collection: &str, id: &str) -> Result<Value> {
        let url = self.item_url(collection, id)?;
        self.send(Method::GET, url, &[], None).await
    }

    /// DELETE one member of `collection`, encoded as in [`Self::get_item`].
    pub async fn delete_item(&self, collection: &str, id: &str) -> Result<Value> {
        let url = self.item_url(collection, id)?;
        self.send(Method::DELETE, url, &[], None).await
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| AdapterError::ConfigError(format!("invalid path `{path}`: {e}")))
    }

    /// `collection/<id>` with `/`, `?`, `#` and `%` in the id escaped.  Ids
    /// that are empty or a dot segment would resolve to another resource.
    fn item_url(&self, collection: &str, id: &str) -> Result<Url> {
        if matches!(id.trim(), "" | "." | "..") {
            return Err(AdapterError::InvalidId { id: id.to_owned() });
        }
        let mut url = self.url(collection)?;
        url.path_segments_mut()
            .map_err(|()| {
                AdapterError::ConfigError(format!("platform URL `{}` cannot hold a path", self.base_url))
            })?
            .pop_if_empty()
            .push(id);
        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Value> {
        let path = url.path().to_owned();
        let mut request = self.http.request(method.clone(), url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let start = Instant::now();
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                AdapterError::Timeout {
                    seconds: self.timeout.as_secs(),
                    reason: format!("{method} {path} timed out"),
                }
            } else {
                AdapterError::Request {
                    path: path.clone(),
                    reason: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| AdapterError::Request {
            path: path.clone(),
            reason: format!("failed to read response body: {e}"),
        })?;

        debug!(
            method = %method,
            path = %path,
            status = status.as_u16(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "platform request"
        );

        if !status.is_success() {
            return Err(AdapterError::Http {
                status: status.as_u16(),
                method: method.to_string(),
                path,
                body: text,
            });
        }

        if status == StatusCode::NO_CONTENT || text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| AdapterError::ConfigError(format!("invalid value for header `{name}`: {e}")))
}
