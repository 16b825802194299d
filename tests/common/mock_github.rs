//! Mock GitHub GraphQL endpoint for integration tests
//!
//! Answers queries from a closure and records every call, so tests can
//! assert on how many queries ran and with which variables.

use async_trait::async_trait;
use octograph::asset::LocalAsset;
use octograph::{AssetError, AssetFetcher, ClientFactory, QueryClient, QueryError};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

type Handler = dyn Fn(&str, &Value) -> Result<Value, QueryError> + Send + Sync;

pub struct MockGithub {
    handler: Box<Handler>,
    calls: Mutex<Vec<(String, Value)>>,
}

impl MockGithub {
    pub fn new(
        handler: impl Fn(&str, &Value) -> Result<Value, QueryError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl QueryClient for MockGithub {
    async fn execute(&self, document: &str, variables: &Value) -> Result<Value, QueryError> {
        self.calls
            .lock()
            .unwrap()
            .push((document.to_string(), variables.clone()));
        (self.handler)(document, variables)
    }
}

/// Hands the same mock to every module and records requested tokens.
pub struct MockGithubFactory {
    github: Arc<MockGithub>,
    tokens: Mutex<Vec<Option<String>>>,
}

impl MockGithubFactory {
    pub fn new(github: Arc<MockGithub>) -> Arc<Self> {
        Arc::new(Self {
            github,
            tokens: Mutex::new(Vec::new()),
        })
    }

    pub fn tokens(&self) -> Vec<Option<String>> {
        self.tokens.lock().unwrap().clone()
    }
}

impl ClientFactory for MockGithubFactory {
    fn client(&self, token: Option<&str>) -> Result<Arc<dyn QueryClient>, QueryError> {
        self.tokens.lock().unwrap().push(token.map(str::to_string));
        Ok(self.github.clone())
    }
}

/// Succeeds for URLs containing `ok`, fails for everything else.
#[derive(Default)]
pub struct FakeAssetFetcher {
    pub fetched: Mutex<Vec<String>>,
}

#[async_trait]
impl AssetFetcher for FakeAssetFetcher {
    async fn fetch(&self, url: &str) -> Result<LocalAsset, AssetError> {
        self.fetched.lock().unwrap().push(url.to_string());
        if !url.contains("ok") {
            return Err(AssetError::Status(404));
        }
        Ok(LocalAsset {
            url: url.to_string(),
            path: PathBuf::from("/tmp/octograph-test").join(url.len().to_string()),
            size: 42,
            content_type: Some("image/png".to_string()),
        })
    }
}
