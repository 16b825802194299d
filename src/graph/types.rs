//! Node type roles and the role → type-name registry

use crate::error::ConfigError;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The closed set of semantic roles a record can play.
///
/// Concrete type names are looked up through a [`TypeRegistry`] so two
/// deployments in one process can use distinct names.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TypeRole {
    User,
    Discussion,
    Label,
    Repository,
    Topic,
    RepositoryTopic,
    DiscussionCategory,
    Issue,
}

impl TypeRole {
    pub const ALL: [TypeRole; 8] = [
        TypeRole::User,
        TypeRole::Discussion,
        TypeRole::Label,
        TypeRole::Repository,
        TypeRole::Topic,
        TypeRole::RepositoryTopic,
        TypeRole::DiscussionCategory,
        TypeRole::Issue,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TypeRole::User => "USER",
            TypeRole::Discussion => "DISCUSSION",
            TypeRole::Label => "LABEL",
            TypeRole::Repository => "REPOSITORY",
            TypeRole::Topic => "TOPIC",
            TypeRole::RepositoryTopic => "REPOSITORY_TOPIC",
            TypeRole::DiscussionCategory => "DISCUSSION_CATEGORY",
            TypeRole::Issue => "ISSUE",
        }
    }

    /// Type name used when configuration does not override it
    pub fn default_name(self) -> &'static str {
        match self {
            TypeRole::User => "GithubUser",
            TypeRole::Discussion => "GithubDiscussion",
            TypeRole::Label => "GithubLabel",
            TypeRole::Repository => "GithubRepository",
            TypeRole::Topic => "GithubTopic",
            TypeRole::RepositoryTopic => "GithubRepositoryTopic",
            TypeRole::DiscussionCategory => "GithubDiscussionCategory",
            TypeRole::Issue => "GithubIssue",
        }
    }

    /// Field carrying markdown content for rich-text roles.
    pub fn content_field(self) -> Option<&'static str> {
        match self {
            TypeRole::Discussion | TypeRole::Issue => Some("body"),
            _ => None,
        }
    }
}

impl std::fmt::Display for TypeRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Injective mapping from role to concrete type name.
///
/// Built once before orchestration and shared read-only afterwards.
/// Type name of derived asset nodes
pub const FILE_TYPE: &str = "File";

/// Names owned by the crate itself; no role may be renamed to one
pub const RESERVED_TYPE_NAMES: [&str; 1] = [FILE_TYPE];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRegistry {
    names: BTreeMap<TypeRole, String>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    /// Registry with every role mapped to its default name
    pub fn new() -> Self {
        Self {
            names: TypeRole::ALL
                .iter()
                .map(|role| (*role, role.default_name().to_string()))
                .collect(),
        }
    }

    /// Apply name overrides, rejecting empty or reserved names and any
    /// two roles sharing a name.
    pub fn with_overrides(
        overrides: &BTreeMap<TypeRole, String>,
    ) -> Result<Self, ConfigError> {
        let mut registry = Self::new();
        for (role, name) in overrides {
            let name = name.trim();
            if name.is_empty() {
                return Err(ConfigError::Invalid {
                    module: "node_types".to_string(),
                    reason: format!("type name for {} is empty", role),
                });
            }
            if RESERVED_TYPE_NAMES.contains(&name) {
                return Err(ConfigError::Invalid {
                    module: "node_types".to_string(),
                    reason: format!("type name '{}' for {} is reserved", name, role),
                });
            }
            registry.names.insert(*role, name.to_string());
        }

        let mut seen: BTreeMap<&str, TypeRole> = BTreeMap::new();
        for (role, name) in &registry.names {
            if let Some(first) = seen.insert(name.as_str(), *role) {
                return Err(ConfigError::DuplicateTypeName {
                    name: name.clone(),
                    first,
                    second: *role,
                });
            }
        }

        Ok(registry)
    }

    /// Concrete type name for a role
    pub fn name(&self, role: TypeRole) -> &str {
        self.names
            .get(&role)
            .map(String::as_str)
            .unwrap_or_else(|| role.default_name())
    }

    /// Reverse lookup. Unique because the mapping is injective.
    pub fn role_of(&self, name: &str) -> Option<TypeRole> {
        self.names
            .iter()
            .find(|(_, n)| n.as_str() == name)
            .map(|(role, _)| *role)
    }

    /// All (role, name) pairs in role order
    pub fn iter(&self) -> impl Iterator<Item = (TypeRole, &str)> {
        self.names.iter().map(|(role, name)| (*role, name.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_every_role() {
        let registry = TypeRegistry::new();
        assert_eq!(registry.iter().count(), TypeRole::ALL.len());
        assert_eq!(registry.name(TypeRole::User), "GithubUser");
        assert_eq!(registry.role_of("GithubDiscussion"), Some(TypeRole::Discussion));
    }

    #[test]
    fn override_replaces_single_name() {
        let overrides = BTreeMap::from([(TypeRole::User, "BlogAuthor".to_string())]);
        let registry = TypeRegistry::with_overrides(&overrides).unwrap();
        assert_eq!(registry.name(TypeRole::User), "BlogAuthor");
        assert_eq!(registry.name(TypeRole::Label), "GithubLabel");
        assert_eq!(registry.role_of("GithubUser"), None);
    }

    #[test]
    fn override_colliding_with_default_is_rejected() {
        let overrides = BTreeMap::from([(TypeRole::Topic, "GithubLabel".to_string())]);
        let err = TypeRegistry::with_overrides(&overrides).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateTypeName { .. }));
    }

    #[test]
    fn empty_override_is_rejected() {
        let overrides = BTreeMap::from([(TypeRole::Issue, "  ".to_string())]);
        assert!(TypeRegistry::with_overrides(&overrides).is_err());
    }

    #[test]
    fn reserved_asset_type_name_is_rejected() {
        let overrides = BTreeMap::from([(TypeRole::Topic, FILE_TYPE.to_string())]);
        let err = TypeRegistry::with_overrides(&overrides).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref reason, .. } if reason.contains("reserved")));
    }

    #[test]
    fn role_deserializes_from_screaming_snake_case() {
        let role: TypeRole = serde_json::from_str("\"DISCUSSION_CATEGORY\"").unwrap();
        assert_eq!(role, TypeRole::DiscussionCategory);
        assert!(serde_json::from_str::<TypeRole>("\"PULL_REQUEST\"").is_err());
    }
}
