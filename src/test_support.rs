//! Test-only helpers: a scripted query client and connection page builders

use crate::client::{ClientFactory, QueryClient};
use crate::error::QueryError;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

type Handler = dyn Fn(&str, &Value) -> Result<Value, QueryError> + Send + Sync;

/// A `QueryClient` answering from a closure and recording every call.
pub struct ScriptedClient {
    handler: Box<Handler>,
    calls: Mutex<Vec<(String, Value)>>,
}

impl ScriptedClient {
    pub fn new(
        handler: impl Fn(&str, &Value) -> Result<Value, QueryError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl QueryClient for ScriptedClient {
    async fn execute(&self, document: &str, variables: &Value) -> Result<Value, QueryError> {
        self.calls
            .lock()
            .unwrap()
            .push((document.to_string(), variables.clone()));
        (self.handler)(document, variables)
    }
}

/// Hands the same scripted client to every module, recording requested tokens.
pub struct SharedClientFactory {
    client: Arc<ScriptedClient>,
    tokens: Mutex<Vec<Option<String>>>,
}

impl SharedClientFactory {
    pub fn new(client: Arc<ScriptedClient>) -> Self {
        Self {
            client,
            tokens: Mutex::new(Vec::new()),
        }
    }

    pub fn tokens(&self) -> Vec<Option<String>> {
        self.tokens.lock().unwrap().clone()
    }
}

impl ClientFactory for SharedClientFactory {
    fn client(&self, token: Option<&str>) -> Result<Arc<dyn QueryClient>, QueryError> {
        self.tokens.lock().unwrap().push(token.map(str::to_string));
        Ok(self.client.clone())
    }
}

/// Slice `items` into a connection page using `after` (a stringified
/// offset) and `first` from the query variables.
pub fn page_of(items: &[Value], variables: &Value) -> Value {
    page_with(items, variables, "after", "first")
}

pub fn page_with(items: &[Value], variables: &Value, cursor_var: &str, size_var: &str) -> Value {
    let start = variables[cursor_var]
        .as_str()
        .and_then(|c| c.parse::<usize>().ok())
        .unwrap_or(0);
    let size = variables[size_var].as_u64().unwrap_or(100) as usize;
    let end = (start + size).min(items.len());
    let has_next = end < items.len();
    json!({
        "pageInfo": { "endCursor": end.to_string(), "hasNextPage": has_next },
        "nodes": items[start.min(end)..end].to_vec(),
    })
}
