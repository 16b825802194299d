//! GraphQL-over-HTTPS client backed by reqwest

use super::traits::{ClientFactory, QueryClient};
use crate::error::QueryError;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub const GITHUB_GRAPHQL_ENDPOINT: &str = "https://api.github.com/graphql";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

/// A client bound to one endpoint and one credential.
#[derive(Clone)]
pub struct HttpQueryClient {
    client: Client,
    endpoint: String,
}

impl HttpQueryClient {
    pub fn new(
        endpoint: impl Into<String>,
        token: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, QueryError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("octograph"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(token) = token {
            let auth = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| QueryError::transport("invalid auth header", e))?;
            headers.insert(AUTHORIZATION, auth);
        }

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| QueryError::transport("build http client", e))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl QueryClient for HttpQueryClient {
    async fn execute(&self, document: &str, variables: &Value) -> Result<Value, QueryError> {
        debug!(endpoint = %self.endpoint, "executing graphql query");
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&json!({ "query": document, "variables": variables }))
            .send()
            .await
            .map_err(|e| QueryError::transport("send graphql request", e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(QueryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GraphqlResponse = resp
            .json()
            .await
            .map_err(|e| QueryError::transport("decode graphql response", e))?;

        if !parsed.errors.is_empty() {
            return Err(QueryError::Remote(
                parsed.errors.into_iter().map(|e| e.message).collect(),
            ));
        }

        parsed
            .data
            .ok_or_else(|| QueryError::malformed("data", "response has no data"))
    }
}

/// Creates one [`HttpQueryClient`] per module credential.
#[derive(Debug, Clone)]
pub struct HttpClientFactory {
    endpoint: String,
    timeout: Duration,
}

impl Default for HttpClientFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClientFactory {
    pub fn new() -> Self {
        Self {
            endpoint: GITHUB_GRAPHQL_ENDPOINT.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl ClientFactory for HttpClientFactory {
    fn client(&self, token: Option<&str>) -> Result<Arc<dyn QueryClient>, QueryError> {
        Ok(Arc::new(HttpQueryClient::new(
            self.endpoint.clone(),
            token,
            self.timeout,
        )?))
    }
}
