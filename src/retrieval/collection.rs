//! In-memory document collection and the boolean matcher over it.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use ahash::{AHashMap, AHashSet};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use unicode_segmentation::UnicodeSegmentation;

use crate::error::{QueryLensError, Result};
use crate::query::{Field, Keyword, Operator, Query};
use crate::resources::Ontology;
use crate::retrieval::{ResultSet, RetrievalBackend, ScoredDocument};

/// A bibliographic record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, rename = "abstract")]
    pub abstract_text: String,
    #[serde(default)]
    pub mesh_headings: Vec<String>,
    #[serde(default)]
    pub publication_types: Vec<String>,
}

/// A document with its searchable fields pre-tokenized.
#[derive(Debug, Clone)]
struct IndexedDocument {
    document: Document,
    title: Vec<String>,
    abstract_text: Vec<String>,
    mesh_headings: Vec<Vec<String>>,
    publication_types: Vec<String>,
}

fn tokenize(text: &str) -> Vec<String> {
    text.unicode_words().map(str::to_lowercase).collect()
}

impl IndexedDocument {
    fn new(document: Document) -> Self {
        IndexedDocument {
            title: tokenize(&document.title),
            abstract_text: tokenize(&document.abstract_text),
            mesh_headings: document.mesh_headings.iter().map(|h| tokenize(h)).collect(),
            publication_types: document
                .publication_types
                .iter()
                .map(|p| p.to_lowercase())
                .collect(),
            document,
        }
    }
}

/// Documents held in memory, in load order.
#[derive(Debug, Clone, Default)]
pub struct DocumentCollection {
    documents: Vec<IndexedDocument>,
    ids: AHashMap<String, usize>,
    digest: OnceCell<String>,
}

impl DocumentCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document. A document with an existing id replaces it.
    pub fn add(&mut self, document: Document) {
        self.digest = OnceCell::new();
        let indexed = IndexedDocument::new(document);
        match self.ids.get(&indexed.document.id) {
            Some(&position) => self.documents[position] = indexed,
            None => {
                self.ids
                    .insert(indexed.document.id.clone(), self.documents.len());
                self.documents.push(indexed);
            }
        }
    }

    /// Parse one JSON document per line. Blank lines are skipped.
    pub fn parse_jsonl(content: &str) -> Result<Self> {
        let mut collection = DocumentCollection::new();
        for (line_no, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let document: Document = serde_json::from_str(line).map_err(|e| {
                QueryLensError::resource(format!("collection line {}: {e}", line_no + 1))
            })?;
            collection.add(document);
        }
        Ok(collection)
    }

    pub fn load_jsonl(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            QueryLensError::resource(format!("cannot read collection {}: {e}", path.display()))
        })?;
        Self::parse_jsonl(&content)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Document> {
        self.ids.get(id).map(|&i| &self.documents[i].document)
    }

    /// Hex SHA-256 over every document, in load order. Computed once and
    /// reset by [`DocumentCollection::add`].
    pub fn digest(&self) -> &str {
        self.digest.get_or_init(|| {
            let mut hasher = Sha256::new();
            for indexed in &self.documents {
                let document = &indexed.document;
                for field in [&document.id, &document.title, &document.abstract_text] {
                    hasher.update(field.as_bytes());
                    hasher.update([0u8]);
                }
                for list in [&document.mesh_headings, &document.publication_types] {
                    for item in list {
                        hasher.update(item.as_bytes());
                        hasher.update([0x1f]);
                    }
                    hasher.update([0u8]);
                }
                hasher.update([0x1e]);
            }
            hasher
                .finalize()
                .iter()
                .map(|b| format!("{b:02x}"))
                .collect()
        })
    }
}

/// Boolean retrieval over a [`DocumentCollection`].
///
/// Documents are ranked by the number of query keywords they match, ties
/// broken by document id.
#[derive(Debug, Clone)]
pub struct CollectionBackend {
    collection: Arc<DocumentCollection>,
    ontology: Arc<Ontology>,
    namespace: String,
}

impl CollectionBackend {
    /// The namespace identifies the collection and ontology contents, so
    /// durable cache entries never outlive a change to either.
    pub fn new(collection: Arc<DocumentCollection>, ontology: Arc<Ontology>) -> Self {
        let namespace = format!(
            "collection:{}/mesh:{}",
            &collection.digest()[..16],
            &ontology.digest()[..16]
        );
        CollectionBackend {
            collection,
            ontology,
            namespace,
        }
    }

    /// Positions of documents matching `query`.
    fn evaluate(&self, query: &Query) -> AHashSet<usize> {
        match query {
            Query::Keyword(keyword) => {
                let matcher = KeywordMatcher::new(keyword, &self.ontology);
                (0..self.collection.len())
                    .filter(|&i| matcher.matches(&self.collection.documents[i]))
                    .collect()
            }
            Query::Boolean(boolean) => {
                let mut children = boolean.children().iter().map(|c| self.evaluate(c));
                let first = children.next().unwrap_or_default();
                match boolean.operator() {
                    Operator::And => {
                        children.fold(first, |acc, set| acc.intersection(&set).copied().collect())
                    }
                    Operator::Or => children.fold(first, |mut acc, set| {
                        acc.extend(set);
                        acc
                    }),
                    Operator::Not => children.fold(first, |acc, set| {
                        acc.difference(&set).copied().collect()
                    }),
                }
            }
        }
    }

    /// Number of positive keywords of `query` matching the document.
    fn score(&self, query: &Query, document: &IndexedDocument) -> f64 {
        match query {
            Query::Keyword(keyword) => {
                let matcher = KeywordMatcher::new(keyword, &self.ontology);
                if matcher.matches(document) { 1.0 } else { 0.0 }
            }
            Query::Boolean(boolean) if boolean.operator() == Operator::Not => boolean
                .children()
                .first()
                .map_or(0.0, |first| self.score(first, document)),
            Query::Boolean(boolean) => boolean
                .children()
                .iter()
                .map(|child| self.score(child, document))
                .sum(),
        }
    }
}

impl RetrievalBackend for CollectionBackend {
    fn namespace(&self) -> String {
        self.namespace.clone()
    }

    fn retrieve(&self, query: &Query) -> Result<ResultSet> {
        let mut documents: Vec<ScoredDocument> = self
            .evaluate(query)
            .into_iter()
            .map(|i| {
                let indexed = &self.collection.documents[i];
                ScoredDocument {
                    doc_id: indexed.document.id.clone(),
                    score: self.score(query, indexed),
                }
            })
            .collect();
        documents.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.doc_id.cmp(&b.doc_id))
        });
        Ok(ResultSet::new(documents))
    }
}

/// A keyword prepared for matching against documents.
struct KeywordMatcher<'a> {
    keyword: &'a Keyword,
    tokens: Vec<String>,
    headings: Vec<Vec<String>>,
}

impl<'a> KeywordMatcher<'a> {
    fn new(keyword: &'a Keyword, ontology: &Ontology) -> Self {
        let tokens = tokenize(keyword.text());
        let mut headings = vec![tokens.clone()];
        if keyword.exploded() {
            headings.extend(
                ontology
                    .descendants(keyword.text())
                    .iter()
                    .map(|h| tokenize(h)),
            );
        }
        KeywordMatcher {
            keyword,
            tokens,
            headings,
        }
    }

    fn matches(&self, document: &IndexedDocument) -> bool {
        if self.tokens.is_empty() {
            return false;
        }
        self.keyword.fields().iter().any(|field| match field {
            Field::Title => self.matches_text(&document.title),
            Field::Abstract => self.matches_text(&document.abstract_text),
            Field::MeshHeadings => self.matches_heading(document),
            Field::PublicationType => self.matches_publication_type(document),
            Field::AllFields => {
                self.matches_text(&document.title)
                    || self.matches_text(&document.abstract_text)
                    || document.mesh_headings.iter().any(|h| self.matches_text(h))
                    || self.matches_publication_type(document)
            }
        })
    }

    /// Phrase match; with truncation the last token is a prefix.
    fn matches_text(&self, text: &[String]) -> bool {
        let n = self.tokens.len();
        if text.len() < n {
            return false;
        }
        text.windows(n).any(|window| {
            window.iter().zip(&self.tokens).enumerate().all(|(i, (word, token))| {
                if self.keyword.truncated() && i == n - 1 {
                    word.starts_with(token.as_str())
                } else {
                    word == token
                }
            })
        })
    }

    fn matches_heading(&self, document: &IndexedDocument) -> bool {
        document
            .mesh_headings
            .iter()
            .any(|heading| self.headings.iter().any(|wanted| wanted == heading))
    }

    fn matches_publication_type(&self, document: &IndexedDocument) -> bool {
        let wanted = self.tokens.join(" ");
        document
            .publication_types
            .iter()
            .any(|pt| tokenize(pt).join(" ") == wanted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCS: &str = r#"
{"id": "doc1", "title": "Insulin therapy in type 2 diabetes", "abstract": "Basal insulin was compared.", "mesh_headings": ["Diabetes Mellitus, Type 2", "Insulin"], "publication_types": ["Randomized Controlled Trial"]}
{"id": "doc2", "title": "Diabetic retinopathy screening", "abstract": "Screening of diabetic patients.", "mesh_headings": ["Diabetic Retinopathy"]}
{"id": "doc3", "title": "Metformin and weight", "abstract": "Metformin reduces weight in diabetes.", "mesh_headings": ["Diabetes Mellitus", "Metformin"]}
"#;

    fn backend() -> CollectionBackend {
        let collection = DocumentCollection::parse_jsonl(DOCS).unwrap();
        let ontology = Ontology::parse(
            "Diabetes Mellitus\tC19.246\nDiabetes Mellitus, Type 2\tC19.246.300\n",
        )
        .unwrap();
        CollectionBackend::new(Arc::new(collection), Arc::new(ontology))
    }

    fn ids(results: &ResultSet) -> Vec<&str> {
        results.doc_ids().collect()
    }

    fn kw(text: &str, fields: &[Field]) -> Query {
        Keyword::new(text, fields.iter().copied()).into()
    }

    #[test]
    fn test_parse_jsonl() {
        let collection = DocumentCollection::parse_jsonl(DOCS).unwrap();
        assert_eq!(collection.len(), 3);
        assert_eq!(
            collection.get("doc2").map(|d| d.title.as_str()),
            Some("Diabetic retinopathy screening")
        );
        assert!(DocumentCollection::parse_jsonl("{oops").is_err());
    }

    #[test]
    fn test_namespace_tracks_contents() {
        let ontology = Arc::new(Ontology::new());
        let namespace = |docs: &str| {
            let collection = DocumentCollection::parse_jsonl(docs).unwrap();
            CollectionBackend::new(Arc::new(collection), Arc::clone(&ontology)).namespace()
        };

        let original = namespace(DOCS);
        assert_eq!(original, namespace(DOCS));
        assert!(original.starts_with("collection:"));

        // Same size, one edited title.
        let edited = DOCS.replace("Metformin and weight", "Metformin and appetite");
        assert_ne!(original, namespace(&edited));

        let mut collection = DocumentCollection::parse_jsonl(DOCS).unwrap();
        let before = collection.digest().to_string();
        collection.add(Document {
            id: "doc1".to_string(),
            title: "Replaced".to_string(),
            abstract_text: String::new(),
            mesh_headings: Vec::new(),
            publication_types: Vec::new(),
        });
        assert_eq!(collection.len(), 3);
        assert_ne!(before, collection.digest());
    }

    #[test]
    fn test_namespace_tracks_ontology() {
        let collection = Arc::new(DocumentCollection::parse_jsonl(DOCS).unwrap());
        let flat = CollectionBackend::new(Arc::clone(&collection), Arc::new(Ontology::new()));
        assert_ne!(flat.namespace(), backend().namespace());
    }

    #[test]
    fn test_all_fields_keyword() {
        let results = backend()
            .retrieve(&kw("diabetes", &[Field::AllFields]))
            .unwrap();
        assert_eq!(ids(&results), vec!["doc1", "doc3"]);
    }

    #[test]
    fn test_field_restriction() {
        let results = backend().retrieve(&kw("diabetes", &[Field::Title])).unwrap();
        assert_eq!(ids(&results), vec!["doc1"]);
    }

    #[test]
    fn test_truncation() {
        let query: Query = Keyword::new("diabet", [Field::Title])
            .with_truncated(true)
            .into();
        let results = backend().retrieve(&query).unwrap();
        assert_eq!(ids(&results), vec!["doc1", "doc2"]);
    }

    #[test]
    fn test_mesh_explosion() {
        let backend = backend();
        let plain = backend
            .retrieve(&Keyword::mesh("Diabetes Mellitus", false).into())
            .unwrap();
        assert_eq!(ids(&plain), vec!["doc3"]);

        let exploded = backend
            .retrieve(&Keyword::mesh("Diabetes Mellitus", true).into())
            .unwrap();
        assert_eq!(ids(&exploded), vec!["doc1", "doc3"]);
    }

    #[test]
    fn test_boolean_operators() {
        let backend = backend();
        let and = Query::and(vec![
            kw("diabetes", &[Field::AllFields]),
            kw("insulin", &[Field::AllFields]),
        ])
        .unwrap();
        assert_eq!(ids(&backend.retrieve(&and).unwrap()), vec!["doc1"]);

        let or = Query::or(vec![
            kw("metformin", &[Field::Title]),
            kw("retinopathy", &[Field::Title]),
        ])
        .unwrap();
        assert_eq!(ids(&backend.retrieve(&or).unwrap()), vec!["doc2", "doc3"]);

        let not = Query::boolean(
            Operator::Not,
            vec![
                kw("diabetes", &[Field::AllFields]),
                kw("metformin", &[Field::AllFields]),
            ],
        )
        .unwrap();
        assert_eq!(ids(&backend.retrieve(&not).unwrap()), vec!["doc1"]);
    }

    #[test]
    fn test_ranking_by_matched_keywords() {
        let query = Query::or(vec![
            kw("weight", &[Field::AllFields]),
            kw("metformin", &[Field::AllFields]),
            kw("insulin", &[Field::AllFields]),
        ])
        .unwrap();
        let results = backend().retrieve(&query).unwrap();
        assert_eq!(ids(&results), vec!["doc3", "doc1"]);
        assert_eq!(results.documents[0].score, 2.0);
    }

    #[test]
    fn test_publication_type() {
        let results = backend()
            .retrieve(&kw("randomized controlled trial", &[Field::PublicationType]))
            .unwrap();
        assert_eq!(ids(&results), vec!["doc1"]);
    }
}
