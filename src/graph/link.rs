//! Typed link declarations and the schema registry
//!
//! A link says: on nodes of `source_type`, the virtual field `field`
//! resolves to nodes of `target_type` whose value at path `by` equals a
//! value at path `from` on the source node. Links are never validated at
//! declaration time; a link naming a path that no node carries simply
//! resolves to nothing.

use super::node::Node;
use super::store::NodeStore;
use super::types::{TypeRegistry, TypeRole};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;
use thiserror::Error;

/// Identity field every ingestible type carries
pub const IDENTITY_FIELD: &str = "githubId";

/// Errors raised while resolving a link
#[derive(Debug, Error, PartialEq)]
pub enum LinkError {
    #[error("type '{type_name}' has no link field '{field}'")]
    UnknownField { type_name: String, field: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    One,
    Many,
}

/// Which side of the relation declares it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkDirection {
    /// The source node holds the foreign key at `from`
    Forward,
    /// Inverse join: target nodes hold a foreign key at `by` pointing back
    Reverse,
}

/// A declared relationship between two node types
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkDeclaration {
    pub source_type: String,
    pub field: String,
    pub target_type: String,
    pub from: String,
    pub by: String,
    pub cardinality: Cardinality,
    pub direction: LinkDirection,
}

impl LinkDeclaration {
    /// Forward link: `source.from` references the target's identity field.
    pub fn forward(
        types: &TypeRegistry,
        source: TypeRole,
        field: impl Into<String>,
        target: TypeRole,
        from: impl Into<String>,
        cardinality: Cardinality,
    ) -> Self {
        Self {
            source_type: types.name(source).to_string(),
            field: field.into(),
            target_type: types.name(target).to_string(),
            from: from.into(),
            by: IDENTITY_FIELD.to_string(),
            cardinality,
            direction: LinkDirection::Forward,
        }
    }

    /// Reverse link: target nodes reference this node's identity at `by`.
    pub fn reverse(
        types: &TypeRegistry,
        source: TypeRole,
        field: impl Into<String>,
        target: TypeRole,
        by: impl Into<String>,
    ) -> Self {
        Self {
            source_type: types.name(source).to_string(),
            field: field.into(),
            target_type: types.name(target).to_string(),
            from: IDENTITY_FIELD.to_string(),
            by: by.into(),
            cardinality: Cardinality::Many,
            direction: LinkDirection::Reverse,
        }
    }

    /// Fully explicit declaration, for joins on non-identity fields or
    /// targets outside the role registry.
    pub fn custom(
        source_type: impl Into<String>,
        field: impl Into<String>,
        target_type: impl Into<String>,
        from: impl Into<String>,
        by: impl Into<String>,
        cardinality: Cardinality,
        direction: LinkDirection,
    ) -> Self {
        Self {
            source_type: source_type.into(),
            field: field.into(),
            target_type: target_type.into(),
            from: from.into(),
            by: by.into(),
            cardinality,
            direction,
        }
    }
}

/// Declared node type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeDeclaration {
    pub name: String,
    pub identity_field: Option<String>,
}

/// Type and link declarations consumed by the host's schema phase.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchemaRegistry {
    types: Vec<TypeDeclaration>,
    links: Vec<LinkDeclaration>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare every registry type with its mandatory identity field.
    pub fn for_types(types: &TypeRegistry) -> Self {
        let mut schema = Self::new();
        for (_, name) in types.iter() {
            schema.declare_identity_type(name);
        }
        schema
    }

    /// Declare a type carrying the remote identity field.
    ///
    /// Returns `false` if the type was already declared.
    pub fn declare_identity_type(&mut self, name: &str) -> bool {
        self.declare(TypeDeclaration {
            name: name.to_string(),
            identity_field: Some(IDENTITY_FIELD.to_string()),
        })
    }

    /// Declare a derived type without remote identity (e.g. `File`).
    pub fn declare_type(&mut self, name: &str) -> bool {
        self.declare(TypeDeclaration {
            name: name.to_string(),
            identity_field: None,
        })
    }

    fn declare(&mut self, decl: TypeDeclaration) -> bool {
        if self.types.iter().any(|t| t.name == decl.name) {
            return false;
        }
        self.types.push(decl);
        true
    }

    /// Declare links. A later declaration of the same `(source_type, field)`
    /// replaces the earlier one.
    pub fn declare_links(&mut self, links: impl IntoIterator<Item = LinkDeclaration>) {
        for link in links {
            match self
                .links
                .iter_mut()
                .find(|l| l.source_type == link.source_type && l.field == link.field)
            {
                Some(existing) => *existing = link,
                None => self.links.push(link),
            }
        }
    }

    pub fn types(&self) -> &[TypeDeclaration] {
        &self.types
    }

    pub fn links(&self) -> &[LinkDeclaration] {
        &self.links
    }

    pub fn has_type(&self, name: &str) -> bool {
        self.types.iter().any(|t| t.name == name)
    }

    /// Links declared on a type
    pub fn links_for(&self, type_name: &str) -> Vec<&LinkDeclaration> {
        self.links
            .iter()
            .filter(|l| l.source_type == type_name)
            .collect()
    }

    pub fn link(&self, type_name: &str, field: &str) -> Option<&LinkDeclaration> {
        self.links
            .iter()
            .find(|l| l.source_type == type_name && l.field == field)
    }

    /// Resolve a link field on `node` by field-equality join against the store.
    ///
    /// Forward links return targets in the order their keys appear on the
    /// source node; reverse links return targets in identity order.
    /// `Cardinality::One` yields at most one node.
    pub fn resolve(
        &self,
        store: &NodeStore,
        node: &Node,
        field: &str,
    ) -> Result<Vec<Node>, LinkError> {
        let link = self
            .link(node.node_type(), field)
            .ok_or_else(|| LinkError::UnknownField {
                type_name: node.node_type().to_string(),
                field: field.to_string(),
            })?;

        let keys: Vec<Value> = node.lookup(&link.from);
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let candidates = store.nodes_by_type(&link.target_type);

        let mut resolved: Vec<Node> = match link.direction {
            LinkDirection::Forward => {
                let mut seen = BTreeSet::new();
                let mut out = Vec::new();
                for key in &keys {
                    for candidate in &candidates {
                        if candidate.lookup(&link.by).contains(key) && seen.insert(candidate.id) {
                            out.push(candidate.clone());
                        }
                    }
                }
                out
            }
            LinkDirection::Reverse => candidates
                .into_iter()
                .filter(|c| c.lookup(&link.by).iter().any(|v| keys.contains(v)))
                .collect(),
        };

        if link.cardinality == Cardinality::One {
            resolved.truncate(1);
        }
        Ok(resolved)
    }
}

impl std::fmt::Display for SchemaRegistry {
    /// Renders the declarations as GraphQL-style type definitions.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for decl in &self.types {
            writeln!(f, "type {} implements Node {{", decl.name)?;
            if let Some(identity) = &decl.identity_field {
                writeln!(f, "  {}: String!", identity)?;
            }
            for link in self.links_for(&decl.name) {
                let target = match link.cardinality {
                    Cardinality::One => link.target_type.clone(),
                    Cardinality::Many => format!("[{}]", link.target_type),
                };
                writeln!(
                    f,
                    "  {}: {} @link(from: \"{}\", by: \"{}\")",
                    link.field, target, link.from, link.by
                )?;
            }
            writeln!(f, "}}")?;
        }
        Ok(())
    }
}
