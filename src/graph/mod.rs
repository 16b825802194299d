//! Core graph data structures: node types, nodes, links and the host store

mod link;
mod node;
mod store;
mod types;

#[cfg(test)]
mod tests;

pub use link::{
    Cardinality, LinkDeclaration, LinkDirection, LinkError, SchemaRegistry, TypeDeclaration,
    IDENTITY_FIELD,
};
pub use node::{content_digest, sha256_hex, MediaType, Node, NodeId, NodeInternal, Record};
pub use store::NodeStore;
pub use types::{TypeRegistry, TypeRole, FILE_TYPE, RESERVED_TYPE_NAMES};
