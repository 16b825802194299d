//! Runs configured source modules and merges their output

use super::{Aggregate, NodeSink, Provenance, SourceContext, SourceModule, TypedRecords};
use crate::client::ClientFactory;
use crate::error::{IngestError, IngestResult, QueryError};
use crate::graph::{Node, TypeRegistry};
use futures::future::try_join_all;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// A module plus its per-run settings
#[derive(Clone)]
pub struct ConfiguredSource {
    pub module: Arc<dyn SourceModule>,
    /// Provenance name, defaults to the module id
    pub name: String,
    /// Free-form provenance label
    pub source: Option<String>,
    /// Credential override; wins over the shared credential
    pub token: Option<String>,
}

impl ConfiguredSource {
    pub fn new(module: impl SourceModule + 'static) -> Self {
        Self::from_arc(Arc::new(module))
    }

    pub fn from_arc(module: Arc<dyn SourceModule>) -> Self {
        Self {
            name: module.id().to_string(),
            module,
            source: None,
            token: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_source(mut self, source: Option<String>) -> Self {
        self.source = source;
        self
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn provenance(&self) -> Provenance {
        Provenance::new(self.name.clone(), self.source.clone())
    }
}

/// Runs every module concurrently, each with its own client.
///
/// Outputs merge in configured module order regardless of completion
/// order. Nodes a module creates itself are buffered per module and reach
/// the shared sink in configured order too, so a later module's node wins
/// over an earlier one's with the same id. The first module failure
/// aborts the run.
pub struct Orchestrator<'a> {
    factory: &'a dyn ClientFactory,
    types: &'a TypeRegistry,
    shared_token: Option<String>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(factory: &'a dyn ClientFactory, types: &'a TypeRegistry) -> Self {
        Self {
            factory,
            types,
            shared_token: None,
        }
    }

    pub fn with_shared_token(mut self, token: Option<String>) -> Self {
        self.shared_token = token;
        self
    }

    #[instrument(skip_all, fields(modules = sources.len()))]
    pub async fn run(
        &self,
        sources: &[ConfiguredSource],
        sink: &NodeSink,
    ) -> IngestResult<Aggregate> {
        let outputs = try_join_all(sources.iter().map(|entry| self.run_one(entry))).await?;

        let mut aggregate = Aggregate::new();
        for (records, staged) in outputs {
            for node in staged {
                sink.create_node(node);
            }
            if let Some(records) = records {
                aggregate.extend(records);
            }
        }
        info!(records = aggregate.len(), staged = sink.len(), "orchestration complete");
        Ok(aggregate)
    }

    async fn run_one(
        &self,
        entry: &ConfiguredSource,
    ) -> IngestResult<(Option<TypedRecords>, Vec<Node>)> {
        let fail = |source: QueryError| IngestError::Source {
            module: entry.name.clone(),
            source,
        };

        let token = entry.token.as_deref().or(self.shared_token.as_deref());
        let client = self.factory.client(token).map_err(fail)?;
        let provenance = entry.provenance();
        let sink = NodeSink::new();
        let ctx = SourceContext {
            client,
            types: self.types,
            provenance: provenance.clone(),
            sink: &sink,
        };

        info!(module = %entry.name, kind = entry.module.id(), "running source module");
        let fetched = entry.module.fetch(&ctx).await.map_err(fail)?;
        let staged = sink.take();
        let Some(mut output) = fetched else {
            debug!(module = %entry.name, staged = staged.len(), "module created its own nodes");
            return Ok((None, staged));
        };

        for records in output.values_mut() {
            for record in records.iter_mut() {
                provenance.stamp(record);
            }
        }
        debug!(
            module = %entry.name,
            records = output.values().map(Vec::len).sum::<usize>(),
            "module finished"
        );
        Ok((Some(output), staged))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{NodeId, Record, TypeRole};
    use crate::test_support::{ScriptedClient, SharedClientFactory};
    use async_trait::async_trait;
    use serde_json::json;
    use std::time::Duration;

    /// Emits fixed users after an optional delay
    struct FixedUsers {
        ids: Vec<&'static str>,
        delay_ms: u64,
    }

    #[async_trait]
    impl SourceModule for FixedUsers {
        fn id(&self) -> &str {
            "fixed"
        }

        async fn fetch(&self, ctx: &SourceContext<'_>) -> Result<Option<TypedRecords>, QueryError> {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            ctx.client.execute("query { viewer { id } }", &json!({})).await?;
            let users = self
                .ids
                .iter()
                .map(|id| json!({"id": id}).as_object().cloned().unwrap_or_default())
                .collect();
            Ok(Some(TypedRecords::from([(TypeRole::User, users)])))
        }
    }

    struct Failing;

    #[async_trait]
    impl SourceModule for Failing {
        fn id(&self) -> &str {
            "failing"
        }

        async fn fetch(&self, _ctx: &SourceContext<'_>) -> Result<Option<TypedRecords>, QueryError> {
            Err(QueryError::Remote(vec!["boom".into()]))
        }
    }

    /// Creates one `custom` node tagged with its name, after a delay
    struct SelfMaterializing {
        tag: &'static str,
        delay_ms: u64,
    }

    #[async_trait]
    impl SourceModule for SelfMaterializing {
        fn id(&self) -> &str {
            "self"
        }

        async fn fetch(&self, ctx: &SourceContext<'_>) -> Result<Option<TypedRecords>, QueryError> {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            let mut data = Record::new();
            data.insert("tag".into(), json!(self.tag));
            ctx.sink
                .create_node(Node::new(NodeId::from_key("custom"), "Custom", data));
            Ok(None)
        }
    }

    fn factory() -> SharedClientFactory {
        SharedClientFactory::new(Arc::new(ScriptedClient::new(|_, _| Ok(json!({})))))
    }

    #[tokio::test]
    async fn merges_in_module_order_and_stamps_provenance() {
        let factory = factory();
        let types = TypeRegistry::new();
        let sources = vec![
            // Slow first module still merges first
            ConfiguredSource::new(FixedUsers { ids: vec!["a"], delay_ms: 30 })
                .with_name("first")
                .with_source(Some("repo-a".into())),
            ConfiguredSource::new(FixedUsers { ids: vec!["b", "a"], delay_ms: 0 }).with_name("second"),
        ];
        let sink = NodeSink::new();
        let aggregate = Orchestrator::new(&factory, &types)
            .run(&sources, &sink)
            .await
            .unwrap();

        let users = aggregate.get(TypeRole::User);
        let ids: Vec<_> = users.iter().map(|u| u["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["a", "b", "a"]);
        assert_eq!(users[0]["meta"], json!({"module": "first", "source": "repo-a"}));
        assert_eq!(users[2]["meta"], json!({"module": "second"}));
    }

    #[tokio::test]
    async fn module_token_overrides_shared_token() {
        let factory = factory();
        let types = TypeRegistry::new();
        let sources = vec![
            ConfiguredSource::new(FixedUsers { ids: vec![], delay_ms: 0 })
                .with_token(Some("module".into())),
            ConfiguredSource::new(FixedUsers { ids: vec![], delay_ms: 0 }),
        ];
        Orchestrator::new(&factory, &types)
            .with_shared_token(Some("shared".into()))
            .run(&sources, &NodeSink::new())
            .await
            .unwrap();

        assert_eq!(
            factory.tokens(),
            vec![Some("module".to_string()), Some("shared".to_string())]
        );
    }

    #[tokio::test]
    async fn failing_module_aborts_orchestration() {
        let factory = factory();
        let types = TypeRegistry::new();
        let sources = vec![
            ConfiguredSource::new(FixedUsers { ids: vec!["a"], delay_ms: 0 }),
            ConfiguredSource::new(Failing).with_name("broken"),
        ];
        let err = Orchestrator::new(&factory, &types)
            .run(&sources, &NodeSink::new())
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Source { ref module, .. } if module == "broken"));
    }

    #[tokio::test]
    async fn self_materializing_module_contributes_no_records() {
        let factory = factory();
        let types = TypeRegistry::new();
        let sink = NodeSink::new();
        let aggregate = Orchestrator::new(&factory, &types)
            .run(
                &[ConfiguredSource::new(SelfMaterializing { tag: "only", delay_ms: 0 })],
                &sink,
            )
            .await
            .unwrap();
        assert!(aggregate.is_empty());
        assert_eq!(sink.len(), 1);
    }

    #[tokio::test]
    async fn staged_nodes_follow_configured_order() {
        let factory = factory();
        let types = TypeRegistry::new();
        let sink = NodeSink::new();
        let sources = vec![
            ConfiguredSource::new(SelfMaterializing { tag: "early", delay_ms: 30 }),
            // Finishes first but is configured second
            ConfiguredSource::new(SelfMaterializing { tag: "late", delay_ms: 0 }),
        ];
        Orchestrator::new(&factory, &types)
            .run(&sources, &sink)
            .await
            .unwrap();

        let staged = sink.take();
        let tags: Vec<_> = staged.iter().map(|n| n.data["tag"].clone()).collect();
        assert_eq!(tags, vec![json!("early"), json!("late")]);

        let store = crate::graph::NodeStore::new();
        for node in staged {
            store.create_node(node);
        }
        let kept = store.get_node(&NodeId::from_key("custom")).unwrap();
        assert_eq!(kept.data["tag"], "late");
    }
}
