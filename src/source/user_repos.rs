//! Repositories of a user, with each repository's topics

use super::fields::plain_fields;
use super::{SourceContext, SourceModule, TypedRecords};
use crate::error::{ConfigError, QueryError};
use crate::fetch::{value_at, PageRequest, Paginator};
use crate::graph::{Cardinality, LinkDeclaration, LinkDirection, Record, TypeRegistry, TypeRole};
use async_trait::async_trait;
use futures::future::try_join_all;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument};

pub const MODULE_ID: &str = "user-repos";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RepositoryAffiliation {
    Owner,
    Collaborator,
    OrganizationMember,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RepositoryPrivacy {
    Public,
    Private,
}

/// Options of the `user-repos` module
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct UserReposOptions {
    #[serde(default)]
    pub login: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affiliations: Option<Vec<RepositoryAffiliation>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_affiliations: Option<Vec<RepositoryAffiliation>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub privacy: Option<RepositoryPrivacy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_locked: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_fork: Option<bool>,
    /// Soft cap on repositories, also used as the page size
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl UserReposOptions {
    pub fn validate(&self, module: &str) -> Result<(), ConfigError> {
        if self.login.trim().is_empty() {
            return Err(ConfigError::MissingField {
                module: module.to_string(),
                field: "login",
            });
        }
        if self.limit == Some(0) {
            return Err(ConfigError::Invalid {
                module: module.to_string(),
                reason: "limit must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

fn repositories_query() -> String {
    format!(
        "query GetUserRepositories($login: String!, $perPage: Int!, $cursor: String, $affiliations: [RepositoryAffiliation], $ownerAffiliations: [RepositoryAffiliation], $isLocked: Boolean, $isFork: Boolean, $privacy: RepositoryPrivacy) {{
  user(login: $login) {{
    {user}
    repositories(after: $cursor, first: $perPage, affiliations: $affiliations, ownerAffiliations: $ownerAffiliations, privacy: $privacy, isLocked: $isLocked, isFork: $isFork) {{
      pageInfo {{ hasNextPage endCursor }}
      nodes {{
        {repository}
        owner {{ login }}
        primaryLanguage {{ id name color }}
      }}
    }}
  }}
}}",
        user = plain_fields(TypeRole::User),
        repository = plain_fields(TypeRole::Repository),
    )
}

fn topics_query() -> String {
    format!(
        "query GetAllRepositoryTopics($owner: String!, $repo: String!, $cursor: String, $perPage: Int!) {{
  repository(owner: $owner, name: $repo) {{
    id
    repositoryTopics(after: $cursor, first: $perPage) {{
      pageInfo {{ endCursor hasNextPage }}
      nodes {{ {repository_topic} topic {{ {topic} }} }}
    }}
  }}
}}",
        repository_topic = plain_fields(TypeRole::RepositoryTopic),
        topic = plain_fields(TypeRole::Topic),
    )
}

pub struct UserReposSource {
    options: UserReposOptions,
}

impl UserReposSource {
    pub fn new(options: UserReposOptions) -> Self {
        Self { options }
    }

    fn repositories_request(&self) -> PageRequest {
        let opts = &self.options;
        let mut request = PageRequest::new(repositories_query(), "user.repositories")
            .with_cursor_variable("cursor")
            .with_size_variable("perPage")
            .with_variable("login", opts.login.clone())
            .with_page_size(opts.limit)
            .with_result_limit(opts.limit);
        if let Some(affiliations) = &opts.affiliations {
            request = request.with_variable("affiliations", to_value(affiliations));
        }
        if let Some(affiliations) = &opts.owner_affiliations {
            request = request.with_variable("ownerAffiliations", to_value(affiliations));
        }
        if let Some(privacy) = opts.privacy {
            request = request.with_variable("privacy", to_value(&privacy));
        }
        if let Some(is_locked) = opts.is_locked {
            request = request.with_variable("isLocked", is_locked);
        }
        if let Some(is_fork) = opts.is_fork {
            request = request.with_variable("isFork", is_fork);
        }
        request
    }
}

fn to_value<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

/// Page through every topic of one repository.
async fn fetch_repository_topics(
    paginator: &Paginator<'_>,
    repository: &Record,
) -> Result<Vec<Record>, QueryError> {
    let owner = repository
        .get("owner")
        .and_then(|owner| owner.get("login"))
        .and_then(Value::as_str)
        .ok_or_else(|| QueryError::malformed("user.repositories.nodes.owner.login", "missing"))?;
    let name = repository
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| QueryError::malformed("user.repositories.nodes.name", "missing"))?;

    let request = PageRequest::new(topics_query(), "repository.repositoryTopics")
        .with_cursor_variable("cursor")
        .with_size_variable("perPage")
        .with_variable("owner", owner)
        .with_variable("repo", name);
    paginator.paginate(&request).await
}

#[async_trait]
impl SourceModule for UserReposSource {
    fn id(&self) -> &str {
        MODULE_ID
    }

    #[instrument(skip_all, fields(login = %self.options.login))]
    async fn fetch(&self, ctx: &SourceContext<'_>) -> Result<Option<TypedRecords>, QueryError> {
        let paginator = Paginator::new(ctx.client.as_ref());
        let page = paginator.run(&self.repositories_request()).await?;

        let mut user = value_at(&page.last_data, "user")
            .and_then(Value::as_object)
            .cloned()
            .ok_or_else(|| QueryError::malformed("user", "missing from last page"))?;
        user.remove("repositories");

        let mut repositories = page.records;
        let topics = try_join_all(repositories.iter().map(|r| fetch_repository_topics(&paginator, r))).await?;
        debug!(repositories = repositories.len(), "fetched repository topics");

        let mut repository_topics = Vec::new();
        for (repository, topics) in repositories.iter_mut().zip(topics) {
            repository.insert(
                "repositoryTopics".to_string(),
                Value::Array(topics.iter().cloned().map(Value::Object).collect()),
            );
            repository_topics.extend(topics);
        }
        let topics: Vec<Record> = repository_topics
            .iter()
            .filter_map(|rt| rt.get("topic").and_then(Value::as_object))
            .cloned()
            .collect();

        info!(
            repositories = repositories.len(),
            topics = topics.len(),
            "fetched user repositories"
        );

        Ok(Some(TypedRecords::from([
            (TypeRole::User, vec![user]),
            (TypeRole::Repository, repositories),
            (TypeRole::RepositoryTopic, repository_topics),
            (TypeRole::Topic, topics),
        ])))
    }

    fn links(&self, types: &TypeRegistry) -> Vec<LinkDeclaration> {
        let user = types.name(TypeRole::User);
        let repository = types.name(TypeRole::Repository);
        vec![
            LinkDeclaration::custom(
                user,
                "repositories",
                repository,
                "login",
                "owner.login",
                Cardinality::Many,
                LinkDirection::Reverse,
            ),
            LinkDeclaration::custom(
                repository,
                "owner",
                user,
                "owner.login",
                "login",
                Cardinality::One,
                LinkDirection::Forward,
            ),
            LinkDeclaration::forward(
                types,
                TypeRole::Repository,
                "repositoryTopics",
                TypeRole::RepositoryTopic,
                "repositoryTopics.id",
                Cardinality::Many,
            ),
            LinkDeclaration::forward(
                types,
                TypeRole::Repository,
                "topics",
                TypeRole::Topic,
                "repositoryTopics.topic.id",
                Cardinality::Many,
            ),
            LinkDeclaration::reverse(
                types,
                TypeRole::RepositoryTopic,
                "repositories",
                TypeRole::Repository,
                "repositoryTopics.id",
            ),
            LinkDeclaration::reverse(
                types,
                TypeRole::Topic,
                "repositories",
                TypeRole::Repository,
                "repositoryTopics.topic.id",
            ),
        ]
    }
}
