//! Best-effort resolution of URL-valued fields into local assets
//!
//! For each eligible node the resolver downloads the URL, creates a
//! `File` node owned by the source node and writes the file node's id into
//! a derived field. Any failure leaves the node untouched. Resolution is
//! awaited by the pipeline, bounded by a semaphore.

use crate::error::AssetError;
use crate::graph::{sha256_hex, Node, NodeId, NodeStore, Record, TypeRegistry, TypeRole};
pub use crate::graph::FILE_TYPE;
use async_trait::async_trait;
use futures::future::join_all;
use reqwest::{Client, Url};
use serde_json::{json, Value};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Default user avatar source field and its derived field
pub const AVATAR_URL_FIELD: &str = "avatarUrl";
pub const OPTIMIZED_AVATAR_FIELD: &str = "avatarUrlSharpOptimized";

const DEFAULT_CONCURRENCY: usize = 8;
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// A field on nodes of `role` holding a remote URL, resolved into
/// `fields.<field_name>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetField {
    pub role: TypeRole,
    pub key: String,
    pub field_name: String,
}

impl AssetField {
    pub fn new(role: TypeRole, key: impl Into<String>, field_name: impl Into<String>) -> Self {
        Self {
            role,
            key: key.into(),
            field_name: field_name.into(),
        }
    }

    /// The user avatar field resolved by default
    pub fn optimized_avatar() -> Self {
        Self::new(TypeRole::User, AVATAR_URL_FIELD, OPTIMIZED_AVATAR_FIELD)
    }
}

/// A downloaded asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalAsset {
    pub url: String,
    pub path: PathBuf,
    pub size: u64,
    pub content_type: Option<String>,
}

#[async_trait]
pub trait AssetFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<LocalAsset, AssetError>;
}

/// Parse `value` as an absolute http(s) URL.
pub fn remote_url(value: &str) -> Result<Url, AssetError> {
    let url = Url::parse(value).map_err(|_| AssetError::NotAUrl)?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        _ => Err(AssetError::NotAUrl),
    }
}

/// Downloads into a content-addressed cache directory.
///
/// The file name is the SHA-256 of the URL and the response content type
/// is kept in a `<name>.content-type` sidecar, so a second run finds the
/// asset on disk and returns exactly what the download returned. Both
/// files are written to a temporary file and renamed into place; an empty
/// cache file counts as a miss.
pub struct HttpAssetFetcher {
    client: Client,
    cache_dir: PathBuf,
}

impl HttpAssetFetcher {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Result<Self, AssetError> {
        let client = Client::builder()
            .timeout(FETCH_TIMEOUT)
            .user_agent("octograph")
            .build()?;
        Ok(Self {
            client,
            cache_dir: cache_dir.into(),
        })
    }

    /// `<user cache dir>/octograph/assets`, or under the temp dir
    pub fn default_cache_dir() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("octograph")
            .join("assets")
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn cache_paths(&self, url: &str) -> (PathBuf, PathBuf) {
        let key = sha256_hex(url.as_bytes());
        (
            self.cache_dir.join(&key),
            self.cache_dir.join(format!("{}.{}", key, CONTENT_TYPE_SUFFIX)),
        )
    }
}

const CONTENT_TYPE_SUFFIX: &str = "content-type";

#[async_trait]
impl AssetFetcher for HttpAssetFetcher {
    async fn fetch(&self, url: &str) -> Result<LocalAsset, AssetError> {
        let parsed = remote_url(url)?;
        let (path, type_path) = self.cache_paths(url);

        if let Some(size) = cached_size(&path).await {
            debug!(url, path = %path.display(), "asset cache hit");
            let content_type = tokio::fs::read_to_string(&type_path)
                .await
                .ok()
                .filter(|t| !t.is_empty());
            return Ok(LocalAsset {
                url: url.to_string(),
                path,
                size,
                content_type,
            });
        }

        let resp = self.client.get(parsed).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(AssetError::Status(status.as_u16()));
        }
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|t| !t.is_empty())
            .map(str::to_string);
        let bytes = resp.bytes().await?;

        tokio::fs::create_dir_all(&self.cache_dir).await?;
        // Sidecar first: a visible data file always has its content type
        let sidecar = content_type.clone().unwrap_or_default().into_bytes();
        write_atomic(&self.cache_dir, &type_path, sidecar).await?;
        write_atomic(&self.cache_dir, &path, bytes.to_vec()).await?;
        debug!(url, bytes = bytes.len(), "asset downloaded");

        Ok(LocalAsset {
            url: url.to_string(),
            path,
            size: bytes.len() as u64,
            content_type,
        })
    }
}

async fn cached_size(path: &Path) -> Option<u64> {
    tokio::fs::metadata(path)
        .await
        .ok()
        .map(|meta| meta.len())
        .filter(|len| *len > 0)
}

/// Write through a temporary file in `dir`, then rename onto `target`.
async fn write_atomic(dir: &Path, target: &Path, bytes: Vec<u8>) -> Result<(), AssetError> {
    let dir = dir.to_path_buf();
    let target = target.to_path_buf();
    tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&target)?;
        Ok(())
    })
    .await
    .map_err(std::io::Error::other)??;
    Ok(())
}

/// Outcome counts of one resolution pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssetReport {
    pub attempted: usize,
    pub resolved: usize,
    pub skipped: usize,
}

pub struct AssetResolver {
    fetcher: Arc<dyn AssetFetcher>,
    concurrency: usize,
}

impl AssetResolver {
    pub fn new(fetcher: Arc<dyn AssetFetcher>) -> Self {
        Self {
            fetcher,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, limit: usize) -> Self {
        self.concurrency = limit.max(1);
        self
    }

    /// Resolve `node.data[key]` into `fields.<field_name>`.
    ///
    /// Returns the created file node id, or `None` when the value is not
    /// a URL or the fetch failed.
    pub async fn resolve_field(
        &self,
        store: &NodeStore,
        node: &Node,
        key: &str,
        field_name: &str,
    ) -> Option<NodeId> {
        let url = node.data.get(key).and_then(Value::as_str)?;
        if remote_url(url).is_err() {
            debug!(node = %node.id, key, "field is not a remote url");
            return None;
        }

        match self.fetcher.fetch(url).await {
            Ok(asset) => {
                let file = file_node(node.id, &asset);
                let file_id = file.id;
                store.create_node(file);
                store.create_node_field(&node.id, field_name, json!(file_id.to_string()));
                Some(file_id)
            }
            Err(e) => {
                warn!(node = %node.id, url, error = %e, "asset resolution skipped");
                None
            }
        }
    }

    /// Resolve every declared asset field across the store.
    pub async fn resolve_all(
        &self,
        store: &NodeStore,
        types: &TypeRegistry,
        fields: &[AssetField],
    ) -> AssetReport {
        let jobs: Vec<(Node, &AssetField)> = fields
            .iter()
            .flat_map(|field| {
                store
                    .nodes_by_type(types.name(field.role))
                    .into_iter()
                    .filter(|node| node.data.contains_key(&field.key))
                    .map(move |node| (node, field))
            })
            .collect();

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let outcomes = join_all(jobs.iter().map(|(node, field)| {
            let semaphore = semaphore.clone();
            async move {
                let _permit = semaphore.acquire().await.ok();
                self.resolve_field(store, node, &field.key, &field.field_name)
                    .await
                    .is_some()
            }
        }))
        .await;

        let resolved = outcomes.iter().filter(|ok| **ok).count();
        let report = AssetReport {
            attempted: outcomes.len(),
            resolved,
            skipped: outcomes.len() - resolved,
        };
        info!(
            attempted = report.attempted,
            resolved = report.resolved,
            skipped = report.skipped,
            "asset resolution complete"
        );
        report
    }
}

fn file_node(parent: NodeId, asset: &LocalAsset) -> Node {
    let mut data = Record::new();
    data.insert("url".to_string(), json!(asset.url));
    data.insert("absolutePath".to_string(), json!(asset.path.display().to_string()));
    data.insert("size".to_string(), json!(asset.size));
    if let Some(content_type) = &asset.content_type {
        data.insert("contentType".to_string(), json!(content_type));
    }
    let id = NodeId::from_key(&format!("{} >>> {} >>> {}", FILE_TYPE, parent, asset.url));
    Node::new(id, FILE_TYPE, data).with_parent(parent)
}
