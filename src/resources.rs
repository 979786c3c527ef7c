//! Heavyweight shared resources: the MeSH ontology, concept embeddings, the
//! document collection and the ranking model.
//!
//! Resources are loaded from disk once per process through
//! [`Resources::global`]. The first caller performs the load; concurrent
//! callers block on the same [`OnceCell`] and never load twice. A failed load
//! leaves the cell empty so the next request tries again.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use ahash::AHashMap;
use once_cell::sync::OnceCell;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::config::ResourcesConfig;
use crate::error::{QueryLensError, Result};
use crate::retrieval::collection::DocumentCollection;
use crate::select::model::TreeEnsemble;

static GLOBAL: OnceCell<(ResourcesConfig, Arc<Resources>)> = OnceCell::new();

/// MeSH heading hierarchy built from tree numbers.
///
/// Each heading has one or more tree numbers such as `C18.452.394.750`. The
/// parent of a tree number drops its last segment.
#[derive(Debug, Clone, Default)]
pub struct Ontology {
    tree_numbers: AHashMap<String, Vec<String>>,
    headings: AHashMap<String, String>,
    digest: OnceCell<String>,
}

impl Ontology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a heading under a tree number.
    pub fn insert<S: Into<String>>(&mut self, heading: S, tree_number: S) {
        self.digest = OnceCell::new();
        let heading = heading.into();
        let tree_number = tree_number.into();
        self.headings.insert(tree_number.clone(), heading.clone());
        self.tree_numbers
            .entry(heading.to_lowercase())
            .or_default()
            .push(tree_number);
    }

    /// Parse `heading<TAB>tree number` lines. Blank lines and `#` comments
    /// are skipped.
    pub fn parse(content: &str) -> Result<Self> {
        let mut ontology = Ontology::new();
        for (line_no, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (heading, tree_number) = line.split_once('\t').ok_or_else(|| {
                QueryLensError::resource(format!("ontology line {}: expected a tab", line_no + 1))
            })?;
            ontology.insert(heading.trim(), tree_number.trim());
        }
        Ok(ontology)
    }

    /// Hex SHA-256 over the sorted `(tree number, heading)` pairs.
    pub fn digest(&self) -> &str {
        self.digest.get_or_init(|| {
            let mut entries: Vec<(&String, &String)> = self.headings.iter().collect();
            entries.sort_unstable();
            let mut hasher = Sha256::new();
            for (tree_number, heading) in entries {
                hasher.update(tree_number.as_bytes());
                hasher.update([0u8]);
                hasher.update(heading.as_bytes());
                hasher.update([0x1e]);
            }
            hasher
                .finalize()
                .iter()
                .map(|b| format!("{b:02x}"))
                .collect()
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            QueryLensError::resource(format!("cannot read ontology {}: {e}", path.display()))
        })?;
        Self::parse(&content)
    }

    pub fn len(&self) -> usize {
        self.tree_numbers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree_numbers.is_empty()
    }

    pub fn contains(&self, heading: &str) -> bool {
        self.tree_numbers.contains_key(&heading.to_lowercase())
    }

    /// The heading one level up from the first tree number of `heading`.
    pub fn parent(&self, heading: &str) -> Option<&str> {
        let tree_numbers = self.tree_numbers.get(&heading.to_lowercase())?;
        tree_numbers.iter().find_map(|tree_number| {
            let (parent, _) = tree_number.rsplit_once('.')?;
            self.headings.get(parent).map(String::as_str)
        })
    }

    /// Lower-cased headings below `heading` in any of its branches.
    pub fn descendants(&self, heading: &str) -> Vec<String> {
        let Some(roots) = self.tree_numbers.get(&heading.to_lowercase()) else {
            return Vec::new();
        };
        let mut found: Vec<String> = self
            .headings
            .iter()
            .filter(|(tree_number, _)| roots.iter().any(|root| is_below(tree_number, root)))
            .map(|(_, heading)| heading.to_lowercase())
            .collect();
        found.sort();
        found.dedup();
        found
    }
}

fn is_below(tree_number: &str, root: &str) -> bool {
    tree_number
        .strip_prefix(root)
        .is_some_and(|rest| rest.starts_with('.'))
}

/// Concept embeddings with a term-to-concept mapping (cui2vec style).
#[derive(Debug, Clone, Default)]
pub struct ConceptEmbeddings {
    vectors: AHashMap<String, Vec<f32>>,
    term_to_concept: AHashMap<String, String>,
    preferred_terms: AHashMap<String, String>,
}

impl ConceptEmbeddings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an embedding for `concept`.
    pub fn insert_vector<S: Into<String>>(&mut self, concept: S, vector: Vec<f32>) {
        self.vectors.insert(concept.into(), vector);
    }

    /// Map `term` to `concept`. The first term mapped to a concept becomes
    /// its preferred term.
    pub fn insert_term<S: Into<String>>(&mut self, term: S, concept: S) {
        let term = term.into();
        let concept = concept.into();
        self.preferred_terms
            .entry(concept.clone())
            .or_insert_with(|| term.clone());
        self.term_to_concept.insert(term.to_lowercase(), concept);
    }

    /// Parse whitespace separated `CONCEPT v1 v2 ...` lines.
    pub fn parse_vectors(&mut self, content: &str) -> Result<()> {
        for (line_no, line) in content.lines().enumerate() {
            let mut parts = line.split_whitespace();
            let Some(concept) = parts.next() else {
                continue;
            };
            let vector = parts
                .map(str::parse::<f32>)
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| {
                    QueryLensError::resource(format!("embedding line {}: {e}", line_no + 1))
                })?;
            if vector.is_empty() {
                return Err(QueryLensError::resource(format!(
                    "embedding line {}: no components",
                    line_no + 1
                )));
            }
            self.insert_vector(concept, vector);
        }
        Ok(())
    }

    /// Parse `term<TAB>CONCEPT` lines.
    pub fn parse_mapping(&mut self, content: &str) -> Result<()> {
        for (line_no, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (term, concept) = line.split_once('\t').ok_or_else(|| {
                QueryLensError::resource(format!("mapping line {}: expected a tab", line_no + 1))
            })?;
            self.insert_term(term.trim(), concept.trim());
        }
        Ok(())
    }

    pub fn load(vectors: &Path, mapping: &Path) -> Result<Self> {
        let mut embeddings = ConceptEmbeddings::new();
        embeddings.parse_mapping(&read(mapping)?)?;
        embeddings.parse_vectors(&read(vectors)?)?;
        Ok(embeddings)
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn concept_for(&self, term: &str) -> Option<&str> {
        self.term_to_concept
            .get(&term.to_lowercase())
            .map(String::as_str)
    }

    pub fn preferred_term(&self, concept: &str) -> Option<&str> {
        self.preferred_terms.get(concept).map(String::as_str)
    }

    /// The most cosine-similar other concept. Ties resolve to the smaller
    /// concept identifier so results are deterministic.
    pub fn nearest(&self, concept: &str) -> Option<(&str, f32)> {
        let target = self.vectors.get(concept)?;
        let mut best: Option<(&str, f32)> = None;
        for (other, vector) in &self.vectors {
            if other == concept || vector.len() != target.len() {
                continue;
            }
            let similarity = cosine(target, vector);
            let better = match best {
                None => true,
                Some((best_id, best_sim)) => {
                    similarity > best_sim || (similarity == best_sim && other.as_str() < best_id)
                }
            };
            if better {
                best = Some((other.as_str(), similarity));
            }
        }
        best
    }

    /// Preferred term of the nearest concept to `term`, if both are known.
    pub fn expand_term(&self, term: &str) -> Option<&str> {
        let concept = self.concept_for(term)?;
        let (neighbour, _) = self.nearest(concept)?;
        self.preferred_term(neighbour)
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .map_err(|e| QueryLensError::resource(format!("cannot read {}: {e}", path.display())))
}

/// Everything the pipeline needs from disk.
#[derive(Debug, Default)]
pub struct Resources {
    pub ontology: Arc<Ontology>,
    pub concepts: Arc<ConceptEmbeddings>,
    pub collection: Arc<DocumentCollection>,
    pub model: Option<Arc<TreeEnsemble>>,
}

impl Resources {
    /// Load every configured resource. Unconfigured resources stay empty;
    /// the operators that need them then produce no variations.
    pub fn load(config: &ResourcesConfig) -> Result<Self> {
        let ontology = match &config.ontology {
            Some(path) => {
                info!(path = %path.display(), "loading MeSH ontology");
                Ontology::load(path)?
            }
            None => Ontology::new(),
        };

        let concepts = match (&config.embeddings, &config.concept_mapping) {
            (Some(vectors), Some(mapping)) => {
                info!(path = %vectors.display(), "loading concept embeddings");
                ConceptEmbeddings::load(vectors, mapping)?
            }
            _ => ConceptEmbeddings::new(),
        };

        let collection = match &config.collection {
            Some(path) => {
                info!(path = %path.display(), "loading document collection");
                DocumentCollection::load_jsonl(path)?
            }
            None => DocumentCollection::new(),
        };

        let model = match &config.model {
            Some(path) => {
                info!(path = %path.display(), "loading ranking model");
                Some(Arc::new(TreeEnsemble::load(path)?))
            }
            None => None,
        };

        Ok(Resources {
            ontology: Arc::new(ontology),
            concepts: Arc::new(concepts),
            collection: Arc::new(collection),
            model,
        })
    }

    /// The process-wide resources, loaded on first use.
    ///
    /// Later calls return the same resources whatever `config` says; a
    /// differing config is logged and otherwise ignored.
    pub fn global(config: &ResourcesConfig) -> Result<Arc<Resources>> {
        let (loaded_from, resources) = GLOBAL.get_or_try_init(|| {
            Resources::load(config).map(|resources| (config.clone(), Arc::new(resources)))
        })?;
        warn_if_reconfigured(loaded_from, config);
        Ok(Arc::clone(resources))
    }

    /// True once [`Resources::global`] has completed successfully.
    pub fn is_loaded() -> bool {
        GLOBAL.get().is_some()
    }

    /// Summary counts for logging.
    pub fn summary(&self) -> HashMap<&'static str, usize> {
        HashMap::from([
            ("mesh_headings", self.ontology.len()),
            ("concepts", self.concepts.len()),
            ("documents", self.collection.len()),
            ("model_trees", self.model.as_ref().map_or(0, |m| m.len())),
        ])
    }
}

/// Warn when `requested` names other files than the ones already loaded.
/// Returns whether the two agree.
fn warn_if_reconfigured(loaded_from: &ResourcesConfig, requested: &ResourcesConfig) -> bool {
    if loaded_from == requested {
        return true;
    }
    warn!(
        loaded = ?loaded_from,
        requested = ?requested,
        "resources already loaded from other paths, ignoring new configuration"
    );
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn ontology() -> Ontology {
        Ontology::parse(
            "# heading\ttree\n\
             Endocrine System Diseases\tC19\n\
             Diabetes Mellitus\tC19.246\n\
             Diabetes Mellitus, Type 1\tC19.246.267\n\
             Diabetes Mellitus, Type 2\tC19.246.300\n\
             Diabetes Insipidus\tC19.700\n",
        )
        .unwrap()
    }

    #[test]
    fn test_ontology_parent() {
        let ontology = ontology();
        assert_eq!(ontology.len(), 5);
        assert_eq!(
            ontology.parent("diabetes mellitus, type 2"),
            Some("Diabetes Mellitus")
        );
        assert_eq!(ontology.parent("Endocrine System Diseases"), None);
        assert_eq!(ontology.parent("Unknown"), None);
    }

    #[test]
    fn test_ontology_descendants() {
        let ontology = ontology();
        assert_eq!(
            ontology.descendants("Diabetes Mellitus"),
            vec!["diabetes mellitus, type 1", "diabetes mellitus, type 2"]
        );
        assert_eq!(ontology.descendants("Endocrine System Diseases").len(), 4);
        assert!(ontology.descendants("Diabetes Insipidus").is_empty());
    }

    #[test]
    fn test_ontology_rejects_malformed_lines() {
        assert!(Ontology::parse("no tab here").is_err());
    }

    #[test]
    fn test_concept_nearest() {
        let mut concepts = ConceptEmbeddings::new();
        concepts
            .parse_mapping("insulin\tC0021641\nhumulin\tC0021655\nglucose\tC0017725\n")
            .unwrap();
        concepts
            .parse_vectors("C0021641 1.0 0.0 0.1\nC0021655 0.9 0.1 0.1\nC0017725 0.0 1.0 0.0\n")
            .unwrap();

        assert_eq!(concepts.len(), 3);
        assert_eq!(concepts.concept_for("Insulin"), Some("C0021641"));
        assert_eq!(concepts.nearest("C0021641").map(|(c, _)| c), Some("C0021655"));
        assert_eq!(concepts.expand_term("insulin"), Some("humulin"));
        assert_eq!(concepts.expand_term("unknown"), None);
    }

    #[test]
    fn test_concept_vectors_reject_garbage() {
        let mut concepts = ConceptEmbeddings::new();
        assert!(concepts.parse_vectors("C1 1.0 abc").is_err());
        assert!(concepts.parse_vectors("C1").is_err());
    }

    #[test]
    fn test_ontology_digest() {
        let mut ontology = ontology();
        let before = ontology.digest().to_string();
        assert_eq!(before, self::ontology().digest());
        assert_eq!(before.len(), 64);

        ontology.insert("Prediabetic State", "C19.246.700");
        assert_ne!(before, ontology.digest());
    }

    #[test]
    fn test_reconfiguration_is_detected() {
        let loaded = ResourcesConfig::default();
        assert!(warn_if_reconfigured(&loaded, &ResourcesConfig::default()));

        let requested = ResourcesConfig {
            collection: Some(PathBuf::from("other.jsonl")),
            ..ResourcesConfig::default()
        };
        assert!(!warn_if_reconfigured(&loaded, &requested));
    }

    #[test]
    fn test_global_keeps_first_load() {
        let first = Resources::global(&ResourcesConfig::default()).unwrap();
        // Already loaded, so the missing file is never opened.
        let requested = ResourcesConfig {
            collection: Some(PathBuf::from("/nonexistent/collection.jsonl")),
            ..ResourcesConfig::default()
        };
        let second = Resources::global(&requested).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(Resources::is_loaded());
    }

    #[test]
    fn test_cosine_zero_vector() {
        assert_eq!(cosine(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }
}
