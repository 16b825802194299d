//! Error taxonomy for an ingestion run
//!
//! Everything except asset resolution is fail-fast: configuration, remote
//! query and mapping errors abort the run and no nodes are committed.
//! `AssetError` never escapes the asset resolver.

use crate::graph::TypeRole;
use std::error::Error as StdError;
use thiserror::Error;

/// Invalid or missing options, detected before any remote query.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{module}: missing required option '{field}'")]
    MissingField { module: String, field: &'static str },

    #[error("{module}: {reason}")]
    Invalid { module: String, reason: String },

    #[error("type name '{name}' is assigned to both {first} and {second}")]
    DuplicateTypeName {
        name: String,
        first: TypeRole,
        second: TypeRole,
    },

    #[error("config parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Transport failure or remote-reported error while executing a query.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("transport error: {context}")]
    Transport {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync + 'static>,
    },

    #[error("remote returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("remote query error: {}", .0.join("; "))]
    Remote(Vec<String>),

    #[error("malformed response at '{path}': {reason}")]
    Malformed { path: String, reason: String },
}

impl QueryError {
    /// Wrap a reqwest (or any transport) error.
    pub fn transport(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Transport {
            context: context.into(),
            source: Box::new(source),
        }
    }

    pub fn malformed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Malformed {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// A custom mapper rejected a record.
#[derive(Debug, Error)]
#[error("mapper for {role} failed: {reason}")]
pub struct MappingError {
    pub role: TypeRole,
    pub reason: String,
}

impl MappingError {
    pub fn new(role: TypeRole, reason: impl Into<String>) -> Self {
        Self {
            role,
            reason: reason.into(),
        }
    }
}

/// Failure to fetch or derive an asset. Always non-fatal.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("value is not an absolute http(s) URL")]
    NotAUrl,

    #[error("asset fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("asset fetch returned HTTP {0}")]
    Status(u16),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that abort an ingestion run.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("source module '{module}' failed: {source}")]
    Source {
        module: String,
        #[source]
        source: QueryError,
    },

    #[error(transparent)]
    Mapping(#[from] MappingError),

    #[error("{type_name} record #{index} has no remote 'id'")]
    MissingIdentity { type_name: String, index: usize },

    #[error("node hook failed on {node_type}: {reason}")]
    NodeHook { node_type: String, reason: String },
}

/// Result type for a whole ingestion run
pub type IngestResult<T> = Result<T, IngestError>;
