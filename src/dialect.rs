//! Query dialects: compilers between surface syntax and the query tree.
//!
//! Every dialect can compile text into a [`Query`] and render a query back to
//! text. The [`DialectRegistry`] maps dialect tags to dialects and always has
//! a default entry, so an unknown tag never fails a request.

pub mod medline;
pub mod parser;
pub mod pubmed;

use std::fmt::Debug;
use std::sync::Arc;

use ahash::AHashMap;

use crate::error::{QueryLensError, Result};
use crate::query::Query;

pub use medline::MedlineDialect;
pub use pubmed::PubmedDialect;

/// Tag of the dialect used when a request names none or an unknown one.
pub const DEFAULT_DIALECT: &str = "medline";

/// A concrete textual syntax for boolean search queries.
pub trait Dialect: Send + Sync + Debug {
    /// Tag under which the dialect is registered.
    fn name(&self) -> &str;

    /// Compile query text into a tree.
    fn compile(&self, text: &str) -> Result<Query>;

    /// Render a tree back to query text.
    fn render(&self, query: &Query) -> Result<String>;
}

/// Mapping from dialect tag to dialect with an explicit default entry.
#[derive(Debug, Clone)]
pub struct DialectRegistry {
    dialects: AHashMap<String, Arc<dyn Dialect>>,
    default_tag: String,
}

impl Default for DialectRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl DialectRegistry {
    /// Create a registry holding only `default`.
    pub fn new(default: Arc<dyn Dialect>) -> Self {
        let default_tag = default.name().to_string();
        let mut dialects = AHashMap::new();
        dialects.insert(default_tag.clone(), default);
        DialectRegistry {
            dialects,
            default_tag,
        }
    }

    /// Registry with MEDLINE (default) and PubMed.
    pub fn with_defaults() -> Self {
        let mut registry = DialectRegistry::new(Arc::new(MedlineDialect::new()));
        registry.register(Arc::new(PubmedDialect::new()));
        registry
    }

    /// Add or replace a dialect under its own tag.
    pub fn register(&mut self, dialect: Arc<dyn Dialect>) {
        self.dialects.insert(dialect.name().to_string(), dialect);
    }

    /// Change the default entry. The tag must already be registered.
    pub fn set_default(&mut self, tag: &str) -> Result<()> {
        if !self.dialects.contains_key(tag) {
            return Err(QueryLensError::config(format!("unknown dialect '{tag}'")));
        }
        self.default_tag = tag.to_string();
        Ok(())
    }

    pub fn default_tag(&self) -> &str {
        &self.default_tag
    }

    /// Look up a dialect by tag.
    pub fn get(&self, tag: &str) -> Option<Arc<dyn Dialect>> {
        self.dialects.get(&tag.to_lowercase()).cloned()
    }

    /// The dialect for `tag`, or the default dialect when the tag is absent
    /// or unknown.
    pub fn resolve(&self, tag: Option<&str>) -> Arc<dyn Dialect> {
        if let Some(dialect) = tag.and_then(|t| self.get(t.trim())) {
            return dialect;
        }
        tracing::debug!(
            requested = tag.unwrap_or(""),
            fallback = %self.default_tag,
            "unknown dialect, using default"
        );
        self.dialects
            .get(&self.default_tag)
            .cloned()
            .unwrap_or_else(|| Arc::new(MedlineDialect::new()))
    }

    /// Registered tags, sorted.
    pub fn tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.dialects.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let registry = DialectRegistry::with_defaults();
        assert_eq!(registry.default_tag(), DEFAULT_DIALECT);
        assert_eq!(registry.tags(), vec!["medline", "pubmed"]);
    }

    #[test]
    fn test_resolve_known() {
        let registry = DialectRegistry::with_defaults();
        assert_eq!(registry.resolve(Some("pubmed")).name(), "pubmed");
        assert_eq!(registry.resolve(Some("PubMed")).name(), "pubmed");
    }

    #[test]
    fn test_resolve_falls_back_to_default() {
        let registry = DialectRegistry::with_defaults();
        assert_eq!(registry.resolve(Some("xyz")).name(), "medline");
        assert_eq!(registry.resolve(Some("")).name(), "medline");
        assert_eq!(registry.resolve(None).name(), "medline");
    }

    #[test]
    fn test_set_default() {
        let mut registry = DialectRegistry::with_defaults();
        registry.set_default("pubmed").unwrap();
        assert_eq!(registry.resolve(Some("xyz")).name(), "pubmed");
        assert!(registry.set_default("cochrane").is_err());
    }
}
