//! Repository discussions, one pagination per category filter

use super::fields::plain_fields;
use super::{flatten_connection, objects_in, SourceContext, SourceModule, TypedRecords};
use crate::client::QueryClient;
use crate::error::{ConfigError, QueryError};
use crate::fetch::{
    value_at, FetchFilter, MultiFilterFetcher, PageRequest, SortDirection, SortSpec, StaticFilter,
};
use crate::graph::{Cardinality, LinkDeclaration, Record, TypeRegistry, TypeRole};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{info, instrument};

pub const MODULE_ID: &str = "discussions";

const CATEGORY_ID_QUERY: &str = "query GetRepoDiscussionCategoryId($owner: String!, $name: String!, $slug: String!) {
  repository(owner: $owner, name: $name) {
    discussionCategory(slug: $slug) { id }
  }
}";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscussionOrderField {
    #[default]
    CreatedAt,
    UpdatedAt,
}

impl DiscussionOrderField {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreatedAt => "CREATED_AT",
            Self::UpdatedAt => "UPDATED_AT",
        }
    }

    /// Record field compared when sorting merged results
    pub fn record_field(self) -> &'static str {
        match self {
            Self::CreatedAt => "createdAt",
            Self::UpdatedAt => "updatedAt",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderDirection {
    Asc,
    #[default]
    Desc,
}

impl OrderDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl From<OrderDirection> for SortDirection {
    fn from(direction: OrderDirection) -> Self {
        match direction {
            OrderDirection::Asc => SortDirection::Asc,
            OrderDirection::Desc => SortDirection::Desc,
        }
    }
}

/// Options of the `discussions` module
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct DiscussionsOptions {
    /// Account owning the repository
    #[serde(default)]
    pub owner: String,
    /// Repository name under `owner`
    #[serde(default)]
    pub repo: String,
    /// Fetch only these category ids (one pagination each)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_ids: Option<Vec<String>>,
    /// Fetch only these category slugs, resolved to ids before paging
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_slugs: Option<Vec<String>>,
    /// Soft cap per category, also used as the page size
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_discussions_count: Option<usize>,
    #[serde(default)]
    pub order_by_field: DiscussionOrderField,
    #[serde(default)]
    pub order_by_direction: OrderDirection,
}

impl DiscussionsOptions {
    pub fn validate(&self, module: &str) -> Result<(), ConfigError> {
        if self.owner.trim().is_empty() {
            return Err(ConfigError::MissingField {
                module: module.to_string(),
                field: "owner",
            });
        }
        if self.repo.trim().is_empty() {
            return Err(ConfigError::MissingField {
                module: module.to_string(),
                field: "repo",
            });
        }
        if self.category_ids.is_some() && self.category_slugs.is_some() {
            return Err(ConfigError::Invalid {
                module: module.to_string(),
                reason: "category_ids and category_slugs are mutually exclusive".to_string(),
            });
        }
        if self.max_discussions_count == Some(0) {
            return Err(ConfigError::Invalid {
                module: module.to_string(),
                reason: "max_discussions_count must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Category slug, looked up into a category id once before paging
struct CategorySlug {
    owner: String,
    repo: String,
    slug: String,
}

#[async_trait]
impl FetchFilter for CategorySlug {
    async fn resolve(&self, client: &dyn QueryClient) -> Result<Map<String, Value>, QueryError> {
        let data = client
            .execute(
                CATEGORY_ID_QUERY,
                &json!({ "owner": self.owner, "name": self.repo, "slug": self.slug }),
            )
            .await?;
        let id = value_at(&data, "repository.discussionCategory.id")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                QueryError::malformed(
                    "repository.discussionCategory.id",
                    format!("no discussion category with slug '{}'", self.slug),
                )
            })?;

        let mut vars = Map::new();
        vars.insert("categoryId".to_string(), Value::String(id.to_string()));
        Ok(vars)
    }
}

fn list_discussions_query() -> String {
    format!(
        "query ListDiscussionsOfRepo($owner: String!, $name: String!, $after: String, $first: Int!, $categoryId: ID, $orderBy: DiscussionOrder!) {{
  repository(owner: $owner, name: $name) {{
    discussions(categoryId: $categoryId, after: $after, first: $first, orderBy: $orderBy) {{
      pageInfo {{ endCursor hasNextPage }}
      nodes {{
        {discussion}
        category {{ {category} }}
        labels(first: 100, orderBy: {{ field: CREATED_AT, direction: DESC }}) {{ nodes {{ {label} }} }}
        author {{ ... on User {{ {user} }} }}
      }}
    }}
  }}
}}",
        discussion = plain_fields(TypeRole::Discussion),
        category = plain_fields(TypeRole::DiscussionCategory),
        label = plain_fields(TypeRole::Label),
        user = plain_fields(TypeRole::User),
    )
}

/// Rewrites one fetched discussion before related records are extracted
pub type DiscussionMap = Arc<dyn Fn(Record) -> Record + Send + Sync>;

/// Discussions of one repository, with their labels, authors and categories.
pub struct DiscussionsSource {
    options: DiscussionsOptions,
    map_discussions: Option<DiscussionMap>,
}

impl DiscussionsSource {
    pub fn new(options: DiscussionsOptions) -> Self {
        Self {
            options,
            map_discussions: None,
        }
    }

    /// Transform each discussion after its labels are flattened.
    ///
    /// Labels, authors and categories are read from the mapped record, so
    /// the map can drop or rewrite them too.
    pub fn with_map_discussions(
        mut self,
        map: impl Fn(Record) -> Record + Send + Sync + 'static,
    ) -> Self {
        self.map_discussions = Some(Arc::new(map));
        self
    }

    fn filters(&self) -> Vec<Box<dyn FetchFilter>> {
        let opts = &self.options;
        if let Some(ids) = &opts.category_ids {
            return ids
                .iter()
                .map(|id| Box::new(StaticFilter::new("categoryId", id.clone())) as Box<dyn FetchFilter>)
                .collect();
        }
        if let Some(slugs) = &opts.category_slugs {
            return slugs
                .iter()
                .map(|slug| {
                    Box::new(CategorySlug {
                        owner: opts.owner.clone(),
                        repo: opts.repo.clone(),
                        slug: slug.clone(),
                    }) as Box<dyn FetchFilter>
                })
                .collect();
        }
        Vec::new()
    }
}

#[async_trait]
impl SourceModule for DiscussionsSource {
    fn id(&self) -> &str {
        MODULE_ID
    }

    #[instrument(skip_all, fields(owner = %self.options.owner, repo = %self.options.repo))]
    async fn fetch(&self, ctx: &SourceContext<'_>) -> Result<Option<TypedRecords>, QueryError> {
        let opts = &self.options;
        let request = PageRequest::new(list_discussions_query(), "repository.discussions")
            .with_variable("owner", opts.owner.clone())
            .with_variable("name", opts.repo.clone())
            .with_variable(
                "orderBy",
                json!({
                    "field": opts.order_by_field.as_str(),
                    "direction": opts.order_by_direction.as_str(),
                }),
            )
            .with_page_size(opts.max_discussions_count)
            .with_result_limit(opts.max_discussions_count);

        let sort = SortSpec::new(
            opts.order_by_field.record_field(),
            opts.order_by_direction.into(),
        );
        let mut discussions = MultiFilterFetcher::new(ctx.client.as_ref())
            .with_sort(sort)
            .fetch(&request, &self.filters())
            .await?;

        for discussion in &mut discussions {
            flatten_connection(discussion, "labels");
        }
        if let Some(map) = &self.map_discussions {
            discussions = discussions.into_iter().map(|d| map(d)).collect();
        }

        let labels: Vec<Record> = discussions
            .iter()
            .flat_map(|d| objects_in(d, "labels"))
            .collect();
        // Non-User authors (bots, deleted accounts) arrive as empty objects
        let authors: Vec<Record> = discussions
            .iter()
            .filter_map(|d| d.get("author").and_then(Value::as_object))
            .filter(|a| a.contains_key("id"))
            .cloned()
            .collect();
        let categories: Vec<Record> = discussions
            .iter()
            .filter_map(|d| d.get("category").and_then(Value::as_object))
            .cloned()
            .collect();

        info!(
            discussions = discussions.len(),
            labels = labels.len(),
            authors = authors.len(),
            "fetched discussions"
        );

        Ok(Some(TypedRecords::from([
            (TypeRole::Discussion, discussions),
            (TypeRole::Label, labels),
            (TypeRole::User, authors),
            (TypeRole::DiscussionCategory, categories),
        ])))
    }

    fn links(&self, types: &TypeRegistry) -> Vec<LinkDeclaration> {
        vec![
            LinkDeclaration::reverse(types, TypeRole::User, "discussions", TypeRole::Discussion, "author.id"),
            LinkDeclaration::forward(
                types,
                TypeRole::Discussion,
                "author",
                TypeRole::User,
                "author.id",
                Cardinality::One,
            ),
            LinkDeclaration::forward(
                types,
                TypeRole::Discussion,
                "labels",
                TypeRole::Label,
                "labels.id",
                Cardinality::Many,
            ),
            LinkDeclaration::forward(
                types,
                TypeRole::Discussion,
                "category",
                TypeRole::DiscussionCategory,
                "category.id",
                Cardinality::One,
            ),
            LinkDeclaration::reverse(
                types,
                TypeRole::DiscussionCategory,
                "discussions",
                TypeRole::Discussion,
                "category.id",
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{NodeSink, Provenance};
    use crate::test_support::{page_of, ScriptedClient};

    fn options() -> DiscussionsOptions {
        DiscussionsOptions {
            owner: "octo".into(),
            repo: "blog".into(),
            ..Default::default()
        }
    }

    fn discussion(id: &str, category: &str, created_at: &str) -> Value {
        json!({
            "id": id,
            "title": format!("Post {}", id),
            "body": "# hello",
            "createdAt": created_at,
            "updatedAt": created_at,
            "category": { "id": category, "name": category },
            "labels": { "nodes": [{ "id": format!("label-{}", id), "name": "rust" }] },
            "author": { "id": "u1", "login": "octocat" },
        })
    }

    async fn run(client: ScriptedClient, options: DiscussionsOptions) -> (Arc<ScriptedClient>, TypedRecords) {
        run_source(client, DiscussionsSource::new(options)).await
    }

    async fn run_source(
        client: ScriptedClient,
        source: DiscussionsSource,
    ) -> (Arc<ScriptedClient>, TypedRecords) {
        let client = Arc::new(client);
        let types = TypeRegistry::new();
        let sink = NodeSink::new();
        let ctx = SourceContext {
            client: client.clone(),
            types: &types,
            provenance: Provenance::new(MODULE_ID, None),
            sink: &sink,
        };
        let out = source.fetch(&ctx).await.unwrap().unwrap();
        (client, out)
    }

    #[test]
    fn validate_requires_owner_and_repo() {
        let err = DiscussionsOptions::default().validate("blog").unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { field: "owner", .. }));

        let err = DiscussionsOptions { owner: "octo".into(), ..Default::default() }
            .validate("blog")
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { field: "repo", .. }));
    }

    #[test]
    fn validate_rejects_ids_and_slugs_together() {
        let opts = DiscussionsOptions {
            category_ids: Some(vec!["a".into()]),
            category_slugs: Some(vec!["b".into()]),
            ..options()
        };
        assert!(matches!(opts.validate("blog"), Err(ConfigError::Invalid { .. })));
    }

    #[tokio::test]
    async fn unfiltered_fetch_emits_all_roles() {
        let items = vec![
            discussion("d1", "c1", "2023-01-01T00:00:00Z"),
            json!({ "id": "d2", "createdAt": "2023-02-01T00:00:00Z", "category": null,
                    "labels": { "nodes": [] }, "author": {} }),
        ];
        let client = ScriptedClient::new(move |_, vars| {
            Ok(json!({ "repository": { "discussions": page_of(&items, vars) } }))
        });
        let (client, out) = run(client, options()).await;

        assert_eq!(client.call_count(), 1);
        let discussions = &out[&TypeRole::Discussion];
        // Default order is createdAt descending
        assert_eq!(discussions[0]["id"], "d2");
        assert_eq!(discussions[1]["labels"], json!([{ "id": "label-d1", "name": "rust" }]));
        assert_eq!(out[&TypeRole::Label].len(), 1);
        assert_eq!(out[&TypeRole::User].len(), 1);
        assert_eq!(out[&TypeRole::DiscussionCategory].len(), 1);

        let vars = &client.calls()[0].1;
        assert_eq!(vars["orderBy"], json!({ "field": "CREATED_AT", "direction": "DESC" }));
        assert_eq!(vars["first"], 100);
    }

    #[tokio::test]
    async fn mapped_discussions_feed_label_extraction() {
        let items = vec![discussion("d1", "c1", "2023-01-01T00:00:00Z")];
        let client = ScriptedClient::new(move |_, vars| {
            Ok(json!({ "repository": { "discussions": page_of(&items, vars) } }))
        });
        let source = DiscussionsSource::new(options()).with_map_discussions(|mut d| {
            // Labels are already a plain array here
            let tagged: Vec<Value> = d["labels"]
                .as_array()
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .filter(|l| l["name"] != "rust")
                .collect();
            d.insert("labels".into(), Value::Array(tagged));
            d.insert("slug".into(), json!("post-d1"));
            d
        });
        let (_, out) = run_source(client, source).await;

        assert_eq!(out[&TypeRole::Discussion][0]["slug"], "post-d1");
        assert!(out[&TypeRole::Label].is_empty());
        assert_eq!(out[&TypeRole::User].len(), 1);
    }

    #[tokio::test]
    async fn slugs_resolve_once_then_paginate_per_category() {
        let client = ScriptedClient::new(|doc, vars| {
            if doc.contains("discussionCategory(slug") {
                let slug = vars["slug"].as_str().unwrap_or_default();
                return Ok(json!({ "repository": { "discussionCategory": { "id": format!("cat-{}", slug) } } }));
            }
            let category = vars["categoryId"].as_str().unwrap_or_default().to_string();
            let items = vec![
                discussion(&format!("{}-old", category), &category, "2022-01-01T00:00:00Z"),
                discussion(&format!("{}-new", category), &category, "2024-01-01T00:00:00Z"),
            ];
            Ok(json!({ "repository": { "discussions": page_of(&items, vars) } }))
        });
        let opts = DiscussionsOptions {
            category_slugs: Some(vec!["published".into(), "drafts".into()]),
            max_discussions_count: Some(1),
            order_by_direction: OrderDirection::Asc,
            ..options()
        };
        let (client, out) = run(client, opts).await;

        // Two lookups plus one single-item page per category
        assert_eq!(client.call_count(), 4);
        let ids: Vec<_> = out[&TypeRole::Discussion]
            .iter()
            .map(|d| d["id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["cat-published-old", "cat-drafts-old"]);
    }

    #[tokio::test]
    async fn unknown_slug_is_a_malformed_response() {
        let client = Arc::new(ScriptedClient::new(|_, _| {
            Ok(json!({ "repository": { "discussionCategory": null } }))
        }));
        let types = TypeRegistry::new();
        let sink = NodeSink::new();
        let ctx = SourceContext {
            client: client.clone(),
            types: &types,
            provenance: Provenance::new(MODULE_ID, None),
            sink: &sink,
        };
        let opts = DiscussionsOptions {
            category_slugs: Some(vec!["missing".into()]),
            ..options()
        };
        let err = DiscussionsSource::new(opts).fetch(&ctx).await.unwrap_err();
        assert!(matches!(err, QueryError::Malformed { .. }));
        assert_eq!(client.call_count(), 1);
    }

    #[test]
    fn links_cover_author_labels_and_category() {
        let types = TypeRegistry::new();
        let links = DiscussionsSource::new(options()).links(&types);
        let fields: Vec<_> = links
            .iter()
            .map(|l| format!("{}.{}", l.source_type, l.field))
            .collect();
        assert!(fields.contains(&"GithubDiscussion.author".to_string()));
        assert!(fields.contains(&"GithubDiscussion.labels".to_string()));
        assert!(fields.contains(&"GithubDiscussionCategory.discussions".to_string()));
    }
}
