//! Record fixtures shaped like GitHub GraphQL responses

use serde_json::{json, Value};

pub fn user(id: &str, login: &str, avatar: &str) -> Value {
    json!({ "id": id, "login": login, "avatarUrl": avatar })
}

pub fn discussion(id: &str, author: Value, created_at: &str) -> Value {
    json!({
        "id": id,
        "title": format!("Post {}", id),
        "body": format!("# {}", id),
        "createdAt": created_at,
        "updatedAt": created_at,
        "category": { "id": "cat-blog", "name": "Blog", "slug": "blog" },
        "labels": { "nodes": [{ "id": "label-rust", "name": "rust" }] },
        "author": author,
    })
}

/// Slice `items` into a connection page from the `after`/`first` variables.
pub fn page_of(items: &[Value], variables: &Value) -> Value {
    let start = variables["after"]
        .as_str()
        .and_then(|c| c.parse::<usize>().ok())
        .unwrap_or(0);
    let size = variables["first"].as_u64().unwrap_or(100) as usize;
    let end = (start + size).min(items.len());
    json!({
        "pageInfo": { "endCursor": end.to_string(), "hasNextPage": end < items.len() },
        "nodes": items[start.min(end)..end].to_vec(),
    })
}
