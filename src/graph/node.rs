//! Node representation handed to the host content pipeline

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use uuid::Uuid;

/// A record as returned by a remote query: field name → JSON value.
pub type Record = Map<String, Value>;

/// Namespace for deterministic node identities (UUID v5)
const NODE_NAMESPACE: Uuid = Uuid::from_bytes([
    0x4f, 0x63, 0x74, 0x6f, 0x67, 0x72, 0x61, 0x70, 0x68, 0x2d, 0x6e, 0x6f, 0x64, 0x65, 0x69, 0x64,
]);

/// Process-stable identifier for a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(Uuid);

impl NodeId {
    /// Deterministic identity for a remote record of the given type.
    ///
    /// The same `(type_name, remote_id)` pair yields the same id across runs.
    pub fn for_record(type_name: &str, remote_id: &str) -> Self {
        Self::from_key(&format!("{} >>> {}", type_name, remote_id))
    }

    /// Deterministic identity derived from an arbitrary key
    pub fn from_key(key: &str) -> Self {
        Self(Uuid::new_v5(&NODE_NAMESPACE, key.as_bytes()))
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Media kind of a node's primary content payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaType {
    #[serde(rename = "text/markdown")]
    Markdown,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Markdown => "text/markdown",
        }
    }
}

/// Host-facing bookkeeping for a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInternal {
    /// Concrete type name
    #[serde(rename = "type")]
    pub node_type: String,
    /// Hex SHA-256 over the canonical JSON of the source record
    pub content_digest: String,
    /// Primary content for downstream rendering (rich-text types only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<MediaType>,
}

/// A materialized node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,
    /// Remote identity (`id` of the source record), absent for derived nodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_id: Option<String>,
    /// Owning node for derived nodes (e.g. downloaded assets)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<NodeId>,
    /// Record payload as fetched and mapped
    pub data: Record,
    /// Host-managed derived fields (asset references etc.)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, Value>,
    pub internal: NodeInternal,
}

impl Node {
    /// Create a node with no content payload
    pub fn new(id: NodeId, node_type: impl Into<String>, data: Record) -> Self {
        let content_digest = content_digest(&Value::Object(data.clone()));
        Self {
            id,
            github_id: None,
            parent: None,
            data,
            fields: BTreeMap::new(),
            internal: NodeInternal {
                node_type: node_type.into(),
                content_digest,
                content: None,
                media_type: None,
            },
        }
    }

    pub fn with_github_id(mut self, github_id: impl Into<String>) -> Self {
        self.github_id = Some(github_id.into());
        self
    }

    pub fn with_parent(mut self, parent: NodeId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_content(mut self, content: impl Into<String>, media_type: MediaType) -> Self {
        self.internal.content = Some(content.into());
        self.internal.media_type = Some(media_type);
        self
    }

    pub fn node_type(&self) -> &str {
        &self.internal.node_type
    }

    /// Collect every value reachable through a dotted path.
    ///
    /// Roots: `id` is the node identity, `githubId` the remote identity,
    /// `fields.*` the derived fields; anything else is looked up in `data`.
    /// Arrays along the way fan out, so `labels.id` yields one value per label.
    pub fn lookup(&self, path: &str) -> Vec<Value> {
        let mut segments = path.split('.');
        let Some(first) = segments.next() else {
            return Vec::new();
        };
        let rest: Vec<&str> = segments.collect();

        match first {
            "id" if rest.is_empty() => vec![Value::String(self.id.to_string())],
            "githubId" if rest.is_empty() => self
                .github_id
                .as_ref()
                .map(|g| vec![Value::String(g.clone())])
                .unwrap_or_default(),
            "fields" => match rest.split_first() {
                Some((key, tail)) => self
                    .fields
                    .get(*key)
                    .map(|v| collect_path(v, tail))
                    .unwrap_or_default(),
                None => Vec::new(),
            },
            key => self
                .data
                .get(key)
                .map(|v| collect_path(v, &rest))
                .unwrap_or_default(),
        }
    }
}

fn collect_path(value: &Value, path: &[&str]) -> Vec<Value> {
    match value {
        Value::Array(items) => items.iter().flat_map(|v| collect_path(v, path)).collect(),
        Value::Null => Vec::new(),
        _ => match path.split_first() {
            None => vec![value.clone()],
            Some((key, tail)) => value
                .get(*key)
                .map(|v| collect_path(v, tail))
                .unwrap_or_default(),
        },
    }
}

/// Deterministic fingerprint of a JSON value.
///
/// Keys are sorted recursively before hashing so the digest does not depend
/// on field order in the remote response.
pub fn content_digest(value: &Value) -> String {
    let mut canonical = String::new();
    write_canonical(value, &mut canonical);

    sha256_hex(canonical.as_bytes())
}

/// Lowercase hex SHA-256
pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
