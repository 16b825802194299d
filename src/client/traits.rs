//! Client traits consumed by the aggregation core

use crate::error::QueryError;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Executes a query document with named variables.
///
/// Returns the `data` object of the response. Transport failures and
/// remote-reported query errors both surface as `QueryError`.
#[async_trait]
pub trait QueryClient: Send + Sync {
    async fn execute(&self, document: &str, variables: &Value) -> Result<Value, QueryError>;
}

/// Builds an isolated client per source module.
///
/// `token` is the already-resolved credential for that module.
pub trait ClientFactory: Send + Sync {
    fn client(&self, token: Option<&str>) -> Result<Arc<dyn QueryClient>, QueryError>;
}
