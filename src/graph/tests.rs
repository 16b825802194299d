//! Serialization tests against the node shape the host pipeline consumes

use serde_json::{json, Value};

/// Fixture: a materialized discussion as the host receives it
fn discussion_node_fixture() -> Value {
    json!({
        "id": "6c1b4f3e-3c2f-5a4e-9d1a-0f6f2f0c8a11",
        "githubId": "D_kwDOGx1",
        "data": {
            "id": "D_kwDOGx1",
            "title": "Hello",
            "body": "## Hi",
            "meta": { "module": "discussions", "source": "blog" }
        },
        "internal": {
            "type": "GithubDiscussion",
            "contentDigest": "00ff",
            "content": "## Hi",
            "mediaType": "text/markdown"
        }
    })
}

#[cfg(test)]
mod serialization_tests {
    use super::*;
    use crate::graph::{MediaType, Node, NodeId};

    #[test]
    fn node_id_serializes_as_plain_uuid_string() {
        let id = NodeId::for_record("GithubUser", "u1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id));
    }

    #[test]
    fn node_deserializes_from_fixture() {
        let node: Node = serde_json::from_value(discussion_node_fixture()).unwrap();
        assert_eq!(node.github_id.as_deref(), Some("D_kwDOGx1"));
        assert_eq!(node.node_type(), "GithubDiscussion");
        assert_eq!(node.internal.media_type, Some(MediaType::Markdown));
        assert_eq!(node.data["meta"]["source"], "blog");
        assert!(node.fields.is_empty());
        assert!(node.parent.is_none());
    }

    #[test]
    fn node_roundtrips_through_json() {
        let node: Node = serde_json::from_value(discussion_node_fixture()).unwrap();
        let back: Node = serde_json::from_value(serde_json::to_value(&node).unwrap()).unwrap();
        assert_eq!(node, back);
    }
}
