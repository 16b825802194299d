//! End-to-end ingestion run
//!
//! validate → orchestrate → map → materialize → node hooks → commit →
//! resolve assets. Nothing reaches the store unless every step up to and
//! including the node hooks succeeded; asset resolution afterwards is
//! best-effort.

use crate::asset::{AssetField, AssetReport, AssetResolver, FILE_TYPE, OPTIMIZED_AVATAR_FIELD};
use crate::client::ClientFactory;
use crate::config::PipelineConfig;
use crate::error::{ConfigError, IngestError, IngestResult};
use crate::graph::{
    Cardinality, LinkDeclaration, LinkDirection, Node, NodeStore, SchemaRegistry, TypeRegistry,
    TypeRole,
};
use crate::mapper::CustomMapper;
use crate::materialize::NodeMaterializer;
use crate::source::{ConfiguredSource, NodeSink, Orchestrator};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Extends the declared schema after the built-in and module links.
pub type SchemaCustomization = Arc<dyn Fn(&TypeRegistry, &mut SchemaRegistry) + Send + Sync>;

/// Sees every node before commit and may derive more through the sink.
/// An `Err` aborts the run with nothing committed.
pub type NodeHook = Arc<dyn Fn(&Node, &NodeSink) -> Result<(), String> + Send + Sync>;

/// Summary of a successful run
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Records fetched per role, before mapping
    pub records: BTreeMap<TypeRole, usize>,
    /// Nodes produced by materialization (duplicates included)
    pub nodes_materialized: usize,
    /// Nodes created directly by self-materializing modules
    pub nodes_staged: usize,
    /// Nodes created by node hooks
    pub nodes_derived: usize,
    /// Materialized nodes that reused an identity from the same run
    pub collisions: usize,
    /// Collisions between records of two different modules
    pub cross_module_collisions: usize,
    pub assets: AssetReport,
    /// Type and link declarations for the host schema phase
    pub schema: SchemaRegistry,
}

pub struct IngestPipeline {
    config: PipelineConfig,
    factory: Arc<dyn ClientFactory>,
    mapper: CustomMapper,
    assets: Option<AssetResolver>,
    extra_sources: Vec<ConfiguredSource>,
    fallback_token: Option<String>,
    schema_customizations: Vec<SchemaCustomization>,
    node_hooks: Vec<NodeHook>,
}

impl IngestPipeline {
    pub fn new(config: PipelineConfig, factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            config,
            factory,
            mapper: CustomMapper::new(),
            assets: None,
            extra_sources: Vec::new(),
            fallback_token: None,
            schema_customizations: Vec::new(),
            node_hooks: Vec::new(),
        }
    }

    pub fn with_mapper(mut self, mapper: CustomMapper) -> Self {
        self.mapper = mapper;
        self
    }

    /// Enable asset resolution after commit
    pub fn with_asset_resolver(mut self, resolver: AssetResolver) -> Self {
        self.assets = Some(resolver);
        self
    }

    /// Run an additional module after the configured ones.
    pub fn with_source(mut self, source: ConfiguredSource) -> Self {
        self.extra_sources.push(source);
        self
    }

    /// Credential used when neither the module nor the config sets one
    pub fn with_fallback_token(mut self, token: Option<String>) -> Self {
        self.fallback_token = token;
        self
    }

    /// Declare extra types or links, e.g. a link to nodes a hook derives.
    pub fn with_schema_customization(
        mut self,
        customize: impl Fn(&TypeRegistry, &mut SchemaRegistry) + Send + Sync + 'static,
    ) -> Self {
        self.schema_customizations.push(Arc::new(customize));
        self
    }

    /// Run `hook` on every materialized and staged node before commit.
    ///
    /// Nodes the hook creates through the sink are committed after the
    /// others and are not passed to hooks again.
    pub fn with_node_hook(
        mut self,
        hook: impl Fn(&Node, &NodeSink) -> Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        self.node_hooks.push(Arc::new(hook));
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn sources(&self) -> Vec<ConfiguredSource> {
        let mut sources = self.config.configured_sources();
        sources.extend(self.extra_sources.iter().cloned());
        sources
    }

    /// Validate configuration and declare the schema without fetching.
    pub fn schema(&self) -> Result<SchemaRegistry, ConfigError> {
        let types = self.config.validate()?;
        Ok(self.declare_schema(&types, &self.sources()).0)
    }

    /// Type and link declarations, plus the asset fields to resolve.
    pub fn declare_schema(
        &self,
        types: &TypeRegistry,
        sources: &[ConfiguredSource],
    ) -> (SchemaRegistry, Vec<AssetField>) {
        let mut schema = SchemaRegistry::for_types(types);
        let mut asset_fields = Vec::new();

        if self.config.generate_optimized_avatar {
            schema.declare_links([LinkDeclaration::custom(
                types.name(TypeRole::User),
                OPTIMIZED_AVATAR_FIELD,
                FILE_TYPE,
                format!("fields.{}", OPTIMIZED_AVATAR_FIELD),
                "id",
                Cardinality::One,
                LinkDirection::Forward,
            )]);
            asset_fields.push(AssetField::optimized_avatar());
        }
        for source in sources {
            schema.declare_links(source.module.links(types));
            asset_fields.extend(source.module.asset_fields());
        }
        for customize in &self.schema_customizations {
            customize(types, &mut schema);
        }
        if !asset_fields.is_empty() {
            schema.declare_type(FILE_TYPE);
        }
        (schema, asset_fields)
    }

    #[instrument(skip_all)]
    pub async fn run(&self, store: &NodeStore) -> IngestResult<RunReport> {
        let types = self.config.validate()?;
        let sources = self.sources();
        let (mut schema, asset_fields) = self.declare_schema(&types, &sources);
        info!(modules = sources.len(), "starting ingestion");

        let shared_token = self
            .config
            .token
            .clone()
            .or_else(|| self.fallback_token.clone());
        let sink = NodeSink::new();
        let aggregate = Orchestrator::new(self.factory.as_ref(), &types)
            .with_shared_token(shared_token)
            .run(&sources, &sink)
            .await?;
        let records = aggregate.counts();

        let aggregate = self.mapper.apply(aggregate)?;
        let materialized = NodeMaterializer::new(&types).materialize(aggregate, &mut schema)?;

        let staged = sink.take();
        let derived = self.run_node_hooks(materialized.nodes.iter().chain(&staged))?;
        for node in &derived {
            schema.declare_type(node.node_type());
        }

        let nodes_materialized = materialized.nodes.len();
        let nodes_staged = staged.len();
        let nodes_derived = derived.len();
        for node in materialized.nodes.into_iter().chain(staged).chain(derived) {
            store.create_node(node);
        }
        info!(
            nodes = nodes_materialized + nodes_staged + nodes_derived,
            collisions = materialized.collisions,
            "nodes committed"
        );

        let assets = match &self.assets {
            Some(resolver) if !asset_fields.is_empty() => {
                resolver.resolve_all(store, &types, &asset_fields).await
            }
            _ => AssetReport::default(),
        };

        Ok(RunReport {
            records,
            nodes_materialized,
            nodes_staged,
            nodes_derived,
            collisions: materialized.collisions,
            cross_module_collisions: materialized.cross_module_collisions,
            assets,
            schema,
        })
    }

    fn run_node_hooks<'n>(
        &self,
        nodes: impl Iterator<Item = &'n Node>,
    ) -> IngestResult<Vec<Node>> {
        if self.node_hooks.is_empty() {
            return Ok(Vec::new());
        }
        let derived = NodeSink::new();
        for node in nodes {
            for hook in &self.node_hooks {
                hook(node, &derived).map_err(|reason| IngestError::NodeHook {
                    node_type: node.node_type().to_string(),
                    reason,
                })?;
            }
        }
        debug!(derived = derived.len(), "node hooks finished");
        Ok(derived.take())
    }
}
