//! Sub-source modules and the orchestrator that runs them
//!
//! A source module is an independently configured fetch-and-shape unit.
//! It either returns records keyed by role, or creates its nodes itself
//! through the [`NodeSink`] and returns `None`.

pub mod discussions;
mod fields;
pub mod get_user;
mod orchestrator;
pub mod sponsors;
pub mod user_repos;

pub use discussions::{
    DiscussionMap, DiscussionOrderField, DiscussionsOptions, DiscussionsSource, OrderDirection,
};
pub use fields::plain_fields;
pub use get_user::{GetUserOptions, GetUserSource};
pub use orchestrator::{ConfiguredSource, Orchestrator};
pub use sponsors::{SponsorsOptions, SponsorsSource};
pub use user_repos::{
    RepositoryAffiliation, RepositoryPrivacy, UserReposOptions, UserReposSource,
};

use crate::asset::AssetField;
use crate::client::QueryClient;
use crate::error::QueryError;
use crate::graph::{LinkDeclaration, Node, Record, TypeRegistry, TypeRole};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Records emitted by one module, keyed by role
pub type TypedRecords = BTreeMap<TypeRole, Vec<Record>>;

/// Field under which provenance is stamped into every record
pub const META_FIELD: &str = "meta";

/// Which module (and optional free-form label) produced a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub module: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Provenance {
    pub fn new(module: impl Into<String>, source: Option<String>) -> Self {
        Self {
            module: module.into(),
            source,
        }
    }

    /// Write this tag into `record` under [`META_FIELD`].
    pub fn stamp(&self, record: &mut Record) {
        let mut meta = Record::new();
        meta.insert("module".to_string(), self.module.clone().into());
        if let Some(source) = &self.source {
            meta.insert("source".to_string(), source.clone().into());
        }
        record.insert(META_FIELD.to_string(), meta.into());
    }
}

/// Records merged across all modules of a run, keyed by role.
///
/// Within a role, order is module order then within-module order. No
/// deduplication happens here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregate {
    records: BTreeMap<TypeRole, Vec<Record>>,
}

impl Aggregate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one module's output after everything merged so far.
    pub fn extend(&mut self, output: TypedRecords) {
        for (role, records) in output {
            self.records.entry(role).or_default().extend(records);
        }
    }

    pub fn get(&self, role: TypeRole) -> &[Record] {
        self.records.get(&role).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (TypeRole, &[Record])> {
        self.records.iter().map(|(role, r)| (*role, r.as_slice()))
    }

    /// Total number of records across roles
    pub fn len(&self) -> usize {
        self.records.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Per-role record counts
    pub fn counts(&self) -> BTreeMap<TypeRole, usize> {
        self.records.iter().map(|(r, v)| (*r, v.len())).collect()
    }

    pub fn into_inner(self) -> BTreeMap<TypeRole, Vec<Record>> {
        self.records
    }
}

impl From<BTreeMap<TypeRole, Vec<Record>>> for Aggregate {
    fn from(records: BTreeMap<TypeRole, Vec<Record>>) -> Self {
        Self { records }
    }
}

/// Staging buffer for nodes created outside materialization, by modules
/// that create their own nodes and by node hooks.
///
/// Staged nodes are committed together with the materialized ones, and
/// only when the whole run succeeds.
#[derive(Debug, Default)]
pub struct NodeSink {
    nodes: Mutex<Vec<Node>>,
}

impl NodeSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_node(&self, node: Node) {
        self.nodes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(node);
    }

    pub fn len(&self) -> usize {
        self.nodes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drain every staged node in creation order
    pub fn take(&self) -> Vec<Node> {
        std::mem::take(&mut *self.nodes.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

/// Everything a module may use during one run, passed explicitly.
pub struct SourceContext<'a> {
    /// Client authenticated with this module's effective credential
    pub client: Arc<dyn QueryClient>,
    pub types: &'a TypeRegistry,
    pub provenance: Provenance,
    pub sink: &'a NodeSink,
}

/// The contract sub-source modules implement.
#[async_trait]
pub trait SourceModule: Send + Sync {
    /// Module kind identifier, also the default provenance name
    fn id(&self) -> &str;

    /// Fetch and shape records.
    ///
    /// Return `None` after creating nodes directly through `ctx.sink`.
    async fn fetch(&self, ctx: &SourceContext<'_>) -> Result<Option<TypedRecords>, QueryError>;

    /// Relationships this module's records participate in
    fn links(&self, _types: &TypeRegistry) -> Vec<LinkDeclaration> {
        Vec::new()
    }

    /// URL-valued fields this module wants resolved into local assets
    fn asset_fields(&self) -> Vec<AssetField> {
        Vec::new()
    }
}

/// Pull the `nodes` list out of a nested `{ nodes: [...] }` connection
/// field, replacing it with the plain array.
pub(crate) fn flatten_connection(record: &mut Record, field: &str) {
    let flattened = match record.get(field) {
        Some(serde_json::Value::Object(conn)) => conn
            .get("nodes")
            .cloned()
            .unwrap_or_else(|| serde_json::Value::Array(Vec::new())),
        _ => return,
    };
    record.insert(field.to_string(), flattened);
}

/// Object-valued entries of an array field, skipping nulls
pub(crate) fn objects_in(record: &Record, field: &str) -> Vec<Record> {
    record
        .get(field)
        .and_then(serde_json::Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_object().cloned())
                .collect()
        })
        .unwrap_or_default()
}
