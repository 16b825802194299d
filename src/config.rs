//! Pipeline configuration (YAML)
//!
//! ```yaml
//! token: ghp_xxx
//! generate_optimized_avatar: true
//! node_types:
//!   USER: BlogAuthor
//! sources:
//!   - module: discussions
//!     source: blog-posts
//!     owner: octocat
//!     repo: blog
//!     category_slugs: [published]
//!   - module: get-user
//!     token: ghp_other
//! ```

use crate::error::ConfigError;
use crate::graph::{TypeRegistry, TypeRole};
use crate::source::{
    discussions, get_user, sponsors, user_repos, ConfiguredSource, DiscussionsOptions,
    DiscussionsSource, GetUserOptions, GetUserSource, SourceModule, SponsorsOptions,
    SponsorsSource, UserReposOptions, UserReposSource,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Options of one configured module, tagged by `module`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "module", rename_all = "kebab-case")]
pub enum ModuleOptions {
    Discussions(DiscussionsOptions),
    Sponsors(SponsorsOptions),
    UserRepos(UserReposOptions),
    GetUser(GetUserOptions),
}

impl ModuleOptions {
    pub fn id(&self) -> &'static str {
        match self {
            Self::Discussions(_) => discussions::MODULE_ID,
            Self::Sponsors(_) => sponsors::MODULE_ID,
            Self::UserRepos(_) => user_repos::MODULE_ID,
            Self::GetUser(_) => get_user::MODULE_ID,
        }
    }

    pub fn validate(&self, name: &str) -> Result<(), ConfigError> {
        match self {
            Self::Discussions(opts) => opts.validate(name),
            Self::Sponsors(opts) => opts.validate(name),
            Self::UserRepos(opts) => opts.validate(name),
            Self::GetUser(_) => Ok(()),
        }
    }

    pub fn build(&self) -> Arc<dyn SourceModule> {
        match self {
            Self::Discussions(opts) => Arc::new(DiscussionsSource::new(opts.clone())),
            Self::Sponsors(opts) => Arc::new(SponsorsSource::new(opts.clone())),
            Self::UserRepos(opts) => Arc::new(UserReposSource::new(opts.clone())),
            Self::GetUser(opts) => Arc::new(GetUserSource::new(opts.clone())),
        }
    }
}

/// One entry of `sources`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SourceEntry {
    /// Provenance name; defaults to the module id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Free-form provenance label copied into every record's `meta`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Credential for this module only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(flatten)]
    pub module: ModuleOptions,
}

impl SourceEntry {
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or_else(|| self.module.id())
    }

    pub fn to_configured(&self) -> ConfiguredSource {
        ConfiguredSource::from_arc(self.module.build())
            .with_name(self.name())
            .with_source(self.source.clone())
            .with_token(self.token.clone())
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Credential shared by every module without its own `token`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Resolve user avatars into `fields.avatarUrlSharpOptimized`
    #[serde(default = "default_true")]
    pub generate_optimized_avatar: bool,
    /// Role → type name overrides
    #[serde(default)]
    pub node_types: BTreeMap<TypeRole, String>,
    #[serde(default)]
    pub sources: Vec<SourceEntry>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            token: None,
            generate_optimized_avatar: true,
            node_types: BTreeMap::new(),
            sources: Vec::new(),
        }
    }
}

impl PipelineConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    /// Check every option and build the type registry.
    ///
    /// Runs before any remote query.
    pub fn validate(&self) -> Result<TypeRegistry, ConfigError> {
        let types = TypeRegistry::with_overrides(&self.node_types)?;
        for entry in &self.sources {
            if entry.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
                return Err(ConfigError::Invalid {
                    module: entry.module.id().to_string(),
                    reason: "name must not be empty".to_string(),
                });
            }
            entry.module.validate(entry.name())?;
        }
        Ok(types)
    }

    pub fn configured_sources(&self) -> Vec<ConfiguredSource> {
        self.sources.iter().map(SourceEntry::to_configured).collect()
    }

    /// JSON schema of the configuration document
    pub fn json_schema() -> Value {
        serde_json::to_value(schemars::schema_for!(PipelineConfig)).unwrap_or(Value::Null)
    }
}
