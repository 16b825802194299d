//! A single user by login, or the authenticated viewer

use super::fields::plain_fields;
use super::{SourceContext, SourceModule, TypedRecords};
use crate::asset::{AssetField, FILE_TYPE};
use crate::error::QueryError;
use crate::graph::{Cardinality, LinkDeclaration, LinkDirection, TypeRegistry, TypeRole};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, instrument};

pub const MODULE_ID: &str = "get-user";

/// Derived field holding the second avatar asset
pub const CUSTOM_AVATAR_FIELD: &str = "optimizedAvatarField";

/// Options of the `get-user` module
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct GetUserOptions {
    /// Target account; the authenticated viewer when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login: Option<String>,
}

pub struct GetUserSource {
    options: GetUserOptions,
}

impl GetUserSource {
    pub fn new(options: GetUserOptions) -> Self {
        Self { options }
    }

    fn query(&self) -> (String, Value, &'static str) {
        let fields = plain_fields(TypeRole::User);
        match &self.options.login {
            Some(login) => (
                format!("query GetUser($login: String!) {{ user(login: $login) {{ {} }} }}", fields),
                json!({ "login": login }),
                "user",
            ),
            None => (
                format!("query GetViewer {{ viewer {{ {} }} }}", fields),
                json!({}),
                "viewer",
            ),
        }
    }
}

#[async_trait]
impl SourceModule for GetUserSource {
    fn id(&self) -> &str {
        MODULE_ID
    }

    #[instrument(skip_all, fields(login = ?self.options.login))]
    async fn fetch(&self, ctx: &SourceContext<'_>) -> Result<Option<TypedRecords>, QueryError> {
        let (document, variables, root) = self.query();
        let data = ctx.client.execute(&document, &variables).await?;
        let user = data
            .get(root)
            .and_then(Value::as_object)
            .cloned()
            .ok_or_else(|| QueryError::malformed(root, "user not found"))?;

        info!(login = ?user.get("login"), "fetched user");
        Ok(Some(TypedRecords::from([(TypeRole::User, vec![user])])))
    }

    fn links(&self, types: &TypeRegistry) -> Vec<LinkDeclaration> {
        vec![LinkDeclaration::custom(
            types.name(TypeRole::User),
            "optimizedAvatar",
            FILE_TYPE,
            format!("fields.{}", CUSTOM_AVATAR_FIELD),
            "id",
            Cardinality::One,
            LinkDirection::Forward,
        )]
    }

    fn asset_fields(&self) -> Vec<AssetField> {
        vec![AssetField::new(TypeRole::User, "avatarUrl", CUSTOM_AVATAR_FIELD)]
    }
}
