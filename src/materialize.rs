//! Turns aggregate records into identity-bearing nodes

use crate::error::{IngestError, IngestResult};
use crate::graph::{MediaType, Node, NodeId, Record, SchemaRegistry, TypeRegistry, TypeRole};
use crate::source::{Aggregate, META_FIELD};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Nodes produced from one aggregate
#[derive(Debug, Clone, Default)]
pub struct Materialized {
    pub nodes: Vec<Node>,
    /// Nodes whose identity an earlier node in the same run already had
    pub collisions: usize,
    /// Collisions where the earlier node came from a different module
    pub cross_module_collisions: usize,
}

pub struct NodeMaterializer<'a> {
    types: &'a TypeRegistry,
}

impl<'a> NodeMaterializer<'a> {
    pub fn new(types: &'a TypeRegistry) -> Self {
        Self { types }
    }

    /// Build the node for one record.
    ///
    /// Identity is derived from the type name and the record's remote `id`,
    /// so the same record yields the same node id and digest on every run.
    pub fn node_for(&self, role: TypeRole, index: usize, record: Record) -> IngestResult<Node> {
        let type_name = self.types.name(role);
        let github_id = remote_id(&record).ok_or_else(|| IngestError::MissingIdentity {
            type_name: type_name.to_string(),
            index,
        })?;

        let mut node = Node::new(NodeId::for_record(type_name, &github_id), type_name, record)
            .with_github_id(github_id);

        if let Some(field) = role.content_field() {
            node.internal.content = node.data.get(field).and_then(Value::as_str).map(str::to_string);
            node.internal.media_type = Some(MediaType::Markdown);
        }
        Ok(node)
    }

    /// Materialize every record, declaring each emitted type in `schema`.
    ///
    /// Records sharing an identity are not merged: each one becomes a node,
    /// and the later one wins when committed. Repeats within one module are
    /// routine (a shared label on every discussion) and only logged at debug.
    pub fn materialize(
        &self,
        aggregate: Aggregate,
        schema: &mut SchemaRegistry,
    ) -> IngestResult<Materialized> {
        let mut out = Materialized::default();
        // First module to produce each identity
        let mut seen: HashMap<NodeId, Option<String>> = HashMap::new();

        for (role, records) in aggregate.into_inner() {
            schema.declare_identity_type(self.types.name(role));
            for (index, record) in records.into_iter().enumerate() {
                let node = self.node_for(role, index, record)?;
                let module = origin_module(&node);
                match seen.get(&node.id) {
                    None => {
                        seen.insert(node.id, module);
                    }
                    Some(first) if *first == module => {
                        debug!(
                            node_type = node.node_type(),
                            github_id = node.github_id.as_deref().unwrap_or_default(),
                            "repeated identity within module"
                        );
                        out.collisions += 1;
                    }
                    Some(first) => {
                        warn!(
                            node_type = node.node_type(),
                            github_id = node.github_id.as_deref().unwrap_or_default(),
                            earlier = first.as_deref().unwrap_or_default(),
                            later = module.as_deref().unwrap_or_default(),
                            "identity produced by two modules, later record overwrites earlier"
                        );
                        out.collisions += 1;
                        out.cross_module_collisions += 1;
                    }
                }
                out.nodes.push(node);
            }
            debug!(role = %role, "materialized role");
        }
        if out.collisions > 0 {
            info!(
                collisions = out.collisions,
                cross_module = out.cross_module_collisions,
                "duplicate identities collapsed"
            );
        }
        Ok(out)
    }
}

fn origin_module(node: &Node) -> Option<String> {
    node.data
        .get(META_FIELD)?
        .get("module")?
        .as_str()
        .map(str::to_string)
}

fn remote_id(record: &Record) -> Option<String> {
    match record.get("id")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
