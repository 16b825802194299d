//! A user's sponsor network: who sponsors them and whom they sponsor

use super::fields::plain_fields;
use super::{SourceContext, SourceModule, TypedRecords};
use crate::error::{ConfigError, QueryError};
use crate::fetch::{value_at, PageRequest, Paginator};
use crate::graph::{Cardinality, LinkDeclaration, Record, TypeRegistry, TypeRole};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, instrument};

pub const MODULE_ID: &str = "sponsors";

/// Options of the `sponsors` module
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SponsorsOptions {
    /// Account whose sponsor network is fetched
    #[serde(default)]
    pub login: String,
}

impl SponsorsOptions {
    pub fn validate(&self, module: &str) -> Result<(), ConfigError> {
        if self.login.trim().is_empty() {
            return Err(ConfigError::MissingField {
                module: module.to_string(),
                field: "login",
            });
        }
        Ok(())
    }
}

fn get_user_query() -> String {
    format!(
        "query GetUser($login: String!) {{ user(login: $login) {{ {} }} }}",
        plain_fields(TypeRole::User)
    )
}

/// `connection` is either `sponsors` or `sponsoring`
fn network_query(connection: &str) -> String {
    format!(
        "query GetUserSponsorNetwork($login: String!, $after: String, $first: Int!) {{
  user(login: $login) {{
    {connection}(after: $after, first: $first) {{
      pageInfo {{ endCursor hasNextPage }}
      nodes {{ __typename ... on User {{ {user} }} }}
    }}
  }}
}}",
        connection = connection,
        user = plain_fields(TypeRole::User),
    )
}

/// Sponsor entities that are Users; organizations carry no User identity
fn users_only(entities: Vec<Record>) -> Vec<Record> {
    entities
        .into_iter()
        .filter(|e| e.get("__typename").and_then(Value::as_str) == Some("User"))
        .collect()
}

pub struct SponsorsSource {
    options: SponsorsOptions,
}

impl SponsorsSource {
    pub fn new(options: SponsorsOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl SourceModule for SponsorsSource {
    fn id(&self) -> &str {
        MODULE_ID
    }

    #[instrument(skip_all, fields(login = %self.options.login))]
    async fn fetch(&self, ctx: &SourceContext<'_>) -> Result<Option<TypedRecords>, QueryError> {
        let login = self.options.login.as_str();
        let client = ctx.client.as_ref();

        let data = client
            .execute(&get_user_query(), &json!({ "login": login }))
            .await?;
        let mut user = value_at(&data, "user")
            .and_then(Value::as_object)
            .cloned()
            .ok_or_else(|| QueryError::malformed("user", format!("no user with login '{}'", login)))?;

        // Two independent cursor spaces
        let sponsors_request =
            PageRequest::new(network_query("sponsors"), "user.sponsors").with_variable("login", login);
        let sponsoring_request = PageRequest::new(network_query("sponsoring"), "user.sponsoring")
            .with_variable("login", login);
        let paginator = Paginator::new(client);
        let (sponsors, sponsoring) = futures::try_join!(
            paginator.paginate(&sponsors_request),
            paginator.paginate(&sponsoring_request),
        )?;
        let sponsors = users_only(sponsors);
        let sponsoring = users_only(sponsoring);

        info!(
            sponsors = sponsors.len(),
            sponsoring = sponsoring.len(),
            "fetched sponsor network"
        );

        user.insert("sponsors".to_string(), to_array(&sponsors));
        user.insert("sponsoring".to_string(), to_array(&sponsoring));

        let mut users = Vec::with_capacity(1 + sponsors.len() + sponsoring.len());
        users.push(user);
        users.extend(sponsors);
        users.extend(sponsoring);
        Ok(Some(TypedRecords::from([(TypeRole::User, users)])))
    }

    fn links(&self, types: &TypeRegistry) -> Vec<LinkDeclaration> {
        vec![
            LinkDeclaration::forward(
                types,
                TypeRole::User,
                "sponsors",
                TypeRole::User,
                "sponsors.id",
                Cardinality::Many,
            ),
            LinkDeclaration::forward(
                types,
                TypeRole::User,
                "sponsoring",
                TypeRole::User,
                "sponsoring.id",
                Cardinality::Many,
            ),
        ]
    }
}

fn to_array(records: &[Record]) -> Value {
    Value::Array(records.iter().cloned().map(Value::Object).collect())
}
