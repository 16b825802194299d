//! Octograph: GitHub GraphQL aggregation into a typed node graph
//!
//! Independently configured source modules (discussions, sponsors, user
//! repositories, a single user) fetch paginated GraphQL connections,
//! shape the results into records keyed by a fixed set of type roles, and
//! the pipeline materializes them into content-addressed nodes with
//! declared links between them.
//!
//! # Core Concepts
//!
//! - **Source modules**: fetch-and-shape units, run concurrently
//! - **Type roles**: the closed set of record kinds, each mapped to a configurable type name
//! - **Nodes**: identity derived from type name and remote id, plus a content digest
//! - **Links**: field-equality relationships resolved against the store
//! - **Assets**: remote URLs downloaded into local `File` nodes, best-effort
//!
//! # Example
//!
//! ```no_run
//! use octograph::{HttpClientFactory, IngestPipeline, NodeStore, PipelineConfig};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PipelineConfig::load("octograph.yaml")?;
//! let pipeline = IngestPipeline::new(config, Arc::new(HttpClientFactory::default()));
//! let store = NodeStore::new();
//! let report = pipeline.run(&store).await?;
//! println!("{} nodes", report.nodes_materialized);
//! # Ok(())
//! # }
//! ```

pub mod asset;
pub mod client;
pub mod config;
pub mod error;
pub mod fetch;
pub mod graph;
pub mod mapper;
pub mod materialize;
pub mod pipeline;
pub mod source;

#[cfg(test)]
mod test_support;

pub use asset::{AssetFetcher, AssetField, AssetReport, AssetResolver, HttpAssetFetcher};
pub use client::{ClientFactory, HttpClientFactory, HttpQueryClient, QueryClient};
pub use config::{ModuleOptions, PipelineConfig, SourceEntry};
pub use error::{AssetError, ConfigError, IngestError, IngestResult, MappingError, QueryError};
pub use fetch::{MultiFilterFetcher, PageRequest, Paginator};
pub use graph::{
    LinkDeclaration, Node, NodeId, NodeStore, Record, SchemaRegistry, TypeRegistry, TypeRole,
};
pub use mapper::CustomMapper;
pub use materialize::NodeMaterializer;
pub use pipeline::{IngestPipeline, NodeHook, RunReport, SchemaCustomization};
pub use source::{ConfiguredSource, NodeSink, Orchestrator, SourceContext, SourceModule};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
