//! The HTTP seam.
//!
//! The engine talks to the server through [`HttpTransport`], a narrow
//! JSON-in/JSON-out contract. [`ReqwestTransport`] is the production
//! implementation; tests substitute a scripted one.

use async_trait::async_trait;
use lattica_core::MatrixError;
use serde_json::Value as JsonValue;
use url::Url;

use crate::error::{ApiResult, ClientError};

/// A narrow contract over an HTTP/JSON client.
///
/// Implementations must allow short requests to proceed while a long-poll
/// is outstanding. An empty response body (including the literal `""`)
/// yields `None`; an error-shaped body yields [`ClientError::Matrix`].
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Performs a GET request.
    async fn get_json(&self, url: Url) -> ApiResult<Option<JsonValue>>;

    /// Performs a PUT request with a JSON body.
    async fn put_json(&self, url: Url, body: JsonValue) -> ApiResult<Option<JsonValue>>;

    /// Performs a POST request with a JSON body.
    async fn post_json(&self, url: Url, body: JsonValue) -> ApiResult<Option<JsonValue>>;

    /// Performs a DELETE request.
    async fn delete_json(&self, url: Url) -> ApiResult<Option<JsonValue>>;
}

/// Builds endpoint URLs from the configured server, path prefix and the
/// session's access token.
#[derive(Clone, Debug)]
pub struct UrlBuilder {
    base: Url,
    prefix: Vec<String>,
}

impl UrlBuilder {
    /// Creates a builder for the given server and path prefix.
    ///
    /// A server string without a scheme is treated as `https://`.
    pub fn new(server: &str, prefix: &str) -> ApiResult<Self> {
        let base = if server.contains("://") {
            Url::parse(server)?
        } else {
            Url::parse(&format!("https://{server}"))?
        };
        let prefix = prefix
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect();
        Ok(Self { base, prefix })
    }

    /// Builds a URL from path segments and query parameters.
    ///
    /// Segments are percent-encoded individually, so identifiers can be
    /// passed as-is. The access token, when present, is always the first
    /// query parameter.
    pub fn build(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
        access_token: Option<&str>,
    ) -> ApiResult<Url> {
        let mut url = self.base.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| ClientError::protocol("server URL cannot be a base"))?;
            path.clear();
            path.extend(self.prefix.iter().map(String::as_str));
            path.extend(segments);
        }
        if access_token.is_some() || !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            if let Some(token) = access_token {
                pairs.append_pair("access_token", token);
            }
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }
}

/// [`HttpTransport`] implementation over a pooled [`reqwest::Client`].
///
/// One client serves both the long-poll and concurrent short commands;
/// reqwest's pool hands each request its own connection as needed.
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Creates a transport with a default `reqwest` client.
    pub fn new() -> Self {
        Self::default()
    }

    async fn handle_response(&self, response: reqwest::Response) -> ApiResult<Option<JsonValue>> {
        let status = response.status();
        let text = response.text().await?;
        let trimmed = text.trim();
        if trimmed.is_empty() || trimmed == "\"\"" {
            return if status.is_success() {
                Ok(None)
            } else {
                Err(ClientError::protocol(format!("HTTP {status} with empty body")))
            };
        }
        let body: JsonValue = serde_json::from_str(trimmed)
            .map_err(|e| ClientError::protocol(format!("response is not JSON: {e}")))?;
        if let Some(matrix) = MatrixError::from_response(&body) {
            return Err(ClientError::Matrix(matrix));
        }
        if !status.is_success() {
            return Err(ClientError::protocol(format!("HTTP {status}")));
        }
        Ok(Some(body))
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get_json(&self, url: Url) -> ApiResult<Option<JsonValue>> {
        let response = self.client.get(url).send().await?;
        self.handle_response(response).await
    }

    async fn put_json(&self, url: Url, body: JsonValue) -> ApiResult<Option<JsonValue>> {
        let response = self.client.put(url).json(&body).send().await?;
        self.handle_response(response).await
    }

    async fn post_json(&self, url: Url, body: JsonValue) -> ApiResult<Option<JsonValue>> {
        let response = self.client.post(url).json(&body).send().await?;
        self.handle_response(response).await
    }

    async fn delete_json(&self, url: Url) -> ApiResult<Option<JsonValue>> {
        let response = self.client.delete(url).send().await?;
        self.handle_response(response).await
    }
}
