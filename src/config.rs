//! Configuration for the QueryLens server and pipeline.
//!
//! Configuration is read from a TOML file; every section and field has a
//! default so an empty file (or no file) is a valid configuration.
//!
//! ```toml
//! [server]
//! bind = "127.0.0.1:5862"
//!
//! [evaluation]
//! mode = "judged_pool"
//! cache_scope = "session"
//!
//! [resources]
//! model = "plugin/querylens/balanced.json"
//! collection = "data/collection.jsonl"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::dialect::DEFAULT_DIALECT;
use crate::error::{QueryLensError, Result};

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LensConfig {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Dialect configuration
    #[serde(default)]
    pub dialect: DialectConfig,

    /// Retrieval evaluation configuration
    #[serde(default)]
    pub evaluation: EvaluationConfig,

    /// Paths to heavyweight resources
    #[serde(default)]
    pub resources: ResourcesConfig,
}

impl LensConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            QueryLensError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self> {
        let config: LensConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        if self.evaluation.cache_scope == CacheScope::Shared && self.evaluation.cache_dir.is_none() {
            return Err(QueryLensError::config(
                "evaluation.cache_dir is required when cache_scope = \"shared\"",
            ));
        }
        if self.dialect.default.trim().is_empty() {
            return Err(QueryLensError::config("dialect.default must not be empty"));
        }
        Ok(())
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| QueryLensError::config(e.to_string()))
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address to bind
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Route the plugin is mounted on
    #[serde(default = "default_route")]
    pub route: String,
}

fn default_bind() -> String {
    "127.0.0.1:5862".to_string()
}

fn default_route() -> String {
    "/plugin/querylens".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            route: default_route(),
        }
    }
}

/// Dialect configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialectConfig {
    /// Dialect used when a request names an unknown one
    #[serde(default = "default_dialect")]
    pub default: String,
}

fn default_dialect() -> String {
    DEFAULT_DIALECT.to_string()
}

impl Default for DialectConfig {
    fn default() -> Self {
        Self {
            default: default_dialect(),
        }
    }
}

/// Where retrieval runs for evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationMode {
    /// Retrieve from the full collection.
    Collection,
    /// Retrieve only among the judged documents of the session.
    #[default]
    JudgedPool,
}

/// Lifetime of cached retrieval results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CacheScope {
    /// Private to one connection, in memory.
    #[default]
    Session,
    /// Shared by all sessions and persisted to `cache_dir`.
    Shared,
}

/// Retrieval evaluation configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EvaluationConfig {
    /// Collection or judged-pool retrieval
    #[serde(default)]
    pub mode: EvaluationMode,

    /// Session or shared cache
    #[serde(default)]
    pub cache_scope: CacheScope,

    /// Directory for the shared cache
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
}

/// Paths to heavyweight resources. All optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ResourcesConfig {
    /// Ranking model (JSON tree ensemble)
    #[serde(default)]
    pub model: Option<PathBuf>,

    /// MeSH ontology (`heading<TAB>tree number` lines)
    #[serde(default)]
    pub ontology: Option<PathBuf>,

    /// Concept embeddings (`CONCEPT v1 v2 ...` lines)
    #[serde(default)]
    pub embeddings: Option<PathBuf>,

    /// Term to concept mapping (`term<TAB>CONCEPT` lines)
    #[serde(default)]
    pub concept_mapping: Option<PathBuf>,

    /// Document collection (JSON lines)
    #[serde(default)]
    pub collection: Option<PathBuf>,
}
