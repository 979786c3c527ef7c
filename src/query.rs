//! Dialect-independent boolean query tree.
//!
//! A [`Query`] is produced by a [`Dialect`](crate::dialect::Dialect) compiler,
//! rewritten by the transformation operators and executed by a retrieval
//! backend. Trees are immutable: every rewrite clones the path it touches.
//!
//! Boolean nodes always have at least two children. The [`Query::boolean`]
//! constructor collapses a single child into the child itself so that trees
//! rendered to text and compiled back compare equal.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A searchable document field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Title,
    Abstract,
    MeshHeadings,
    PublicationType,
    AllFields,
}

impl Field {
    /// Short identifier used in fingerprints and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::Abstract => "abstract",
            Field::MeshHeadings => "mesh_headings",
            Field::PublicationType => "publication_type",
            Field::AllFields => "all_fields",
        }
    }
}

/// A leaf clause: some text searched in a set of fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Keyword {
    text: String,
    fields: Vec<Field>,
    exploded: bool,
    truncated: bool,
}

impl Keyword {
    /// Create a keyword. Fields are kept sorted and de-duplicated.
    pub fn new<S: Into<String>>(text: S, fields: impl IntoIterator<Item = Field>) -> Self {
        let mut fields: Vec<Field> = fields.into_iter().collect();
        fields.sort();
        fields.dedup();
        Keyword {
            text: text.into(),
            fields,
            exploded: false,
            truncated: false,
        }
    }

    /// Create a MeSH heading keyword.
    pub fn mesh<S: Into<String>>(heading: S, exploded: bool) -> Self {
        Keyword::new(heading, [Field::MeshHeadings]).with_exploded(exploded)
    }

    /// Set whether the heading is exploded to its descendants.
    pub fn with_exploded(mut self, exploded: bool) -> Self {
        self.exploded = exploded;
        self
    }

    /// Set whether the text is a prefix (wildcard) match.
    pub fn with_truncated(mut self, truncated: bool) -> Self {
        self.truncated = truncated;
        self
    }

    /// Replace the searched fields.
    pub fn with_fields(mut self, fields: impl IntoIterator<Item = Field>) -> Self {
        let mut fields: Vec<Field> = fields.into_iter().collect();
        fields.sort();
        fields.dedup();
        self.fields = fields;
        self
    }

    /// Replace the text.
    pub fn with_text<S: Into<String>>(mut self, text: S) -> Self {
        self.text = text.into();
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn exploded(&self) -> bool {
        self.exploded
    }

    pub fn truncated(&self) -> bool {
        self.truncated
    }

    /// True when this keyword only searches the MeSH headings field.
    pub fn is_mesh(&self) -> bool {
        self.fields == [Field::MeshHeadings]
    }

    /// True when this keyword searches title and/or abstract and nothing else.
    pub fn is_title_abstract(&self) -> bool {
        !self.fields.is_empty()
            && self
                .fields
                .iter()
                .all(|f| matches!(f, Field::Title | Field::Abstract))
    }

    fn fingerprint_into(&self, out: &mut String) {
        out.push_str("kw(");
        out.push_str(&format!("{:?}", self.text.to_lowercase()));
        out.push(';');
        let fields: Vec<&str> = self.fields.iter().map(|f| f.as_str()).collect();
        out.push_str(&fields.join(","));
        if self.exploded {
            out.push_str(";exp");
        }
        if self.truncated {
            out.push_str(";trunc");
        }
        out.push(')');
    }
}

/// Boolean operator of an inner node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    And,
    Or,
    /// The first child minus the union of the remaining children.
    Not,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::And => "and",
            Operator::Or => "or",
            Operator::Not => "not",
        }
    }
}

/// An inner node combining child queries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BooleanQuery {
    operator: Operator,
    children: Vec<Query>,
}

impl BooleanQuery {
    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn children(&self) -> &[Query] {
        &self.children
    }
}

/// A boolean search expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Query {
    Keyword(Keyword),
    Boolean(BooleanQuery),
}

impl From<Keyword> for Query {
    fn from(keyword: Keyword) -> Self {
        Query::Keyword(keyword)
    }
}

impl Query {
    /// Build a boolean node, collapsing a single child into itself.
    ///
    /// Returns `None` when `children` is empty.
    pub fn boolean(operator: Operator, mut children: Vec<Query>) -> Option<Query> {
        match children.len() {
            0 => None,
            1 => children.pop(),
            _ => Some(Query::Boolean(BooleanQuery { operator, children })),
        }
    }

    /// Conjunction of two or more queries.
    pub fn and(children: Vec<Query>) -> Option<Query> {
        Query::boolean(Operator::And, children)
    }

    /// Disjunction of two or more queries.
    pub fn or(children: Vec<Query>) -> Option<Query> {
        Query::boolean(Operator::Or, children)
    }

    pub fn as_keyword(&self) -> Option<&Keyword> {
        match self {
            Query::Keyword(keyword) => Some(keyword),
            Query::Boolean(_) => None,
        }
    }

    pub fn as_boolean(&self) -> Option<&BooleanQuery> {
        match self {
            Query::Boolean(boolean) => Some(boolean),
            Query::Keyword(_) => None,
        }
    }

    /// Canonical, dialect-independent identity of this tree.
    ///
    /// Two queries with equal fingerprints retrieve the same documents from
    /// a fixed collection. Keyword text is compared case-insensitively.
    pub fn fingerprint(&self) -> String {
        let mut out = String::new();
        self.fingerprint_into(&mut out);
        out
    }

    fn fingerprint_into(&self, out: &mut String) {
        match self {
            Query::Keyword(keyword) => keyword.fingerprint_into(out),
            Query::Boolean(boolean) => {
                out.push_str(boolean.operator.as_str());
                out.push('(');
                for (i, child) in boolean.children.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    child.fingerprint_into(out);
                }
                out.push(')');
            }
        }
    }

    /// All keywords in pre-order.
    pub fn keywords(&self) -> Vec<&Keyword> {
        let mut keywords = Vec::new();
        self.walk(&mut |node| {
            if let Query::Keyword(keyword) = node {
                keywords.push(keyword);
            }
        });
        keywords
    }

    /// Number of nodes (keywords and boolean nodes) in the tree.
    pub fn node_count(&self) -> usize {
        match self {
            Query::Keyword(_) => 1,
            Query::Boolean(boolean) => {
                1 + boolean
                    .children
                    .iter()
                    .map(Query::node_count)
                    .sum::<usize>()
            }
        }
    }

    /// Number of boolean nodes in the tree.
    pub fn boolean_count(&self) -> usize {
        self.node_count() - self.keywords().len()
    }

    /// Height of the tree; a single keyword has depth 1.
    pub fn depth(&self) -> usize {
        match self {
            Query::Keyword(_) => 1,
            Query::Boolean(boolean) => {
                1 + boolean
                    .children
                    .iter()
                    .map(Query::depth)
                    .max()
                    .unwrap_or(0)
            }
        }
    }

    /// Visit every node in pre-order.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a Query)) {
        visit(self);
        if let Query::Boolean(boolean) = self {
            for child in &boolean.children {
                child.walk(visit);
            }
        }
    }

    /// The node at pre-order position `index`.
    pub fn node_at(&self, index: usize) -> Option<&Query> {
        let mut position = 0;
        let mut found = None;
        self.walk(&mut |node| {
            if position == index {
                found = Some(node);
            }
            position += 1;
        });
        found
    }

    /// A copy of this tree with the node at pre-order position `index`
    /// replaced by `replacement`. Returns `None` if `index` is out of range.
    pub fn replace_at(&self, index: usize, replacement: Query) -> Option<Query> {
        let mut position = 0;
        let mut replacement = Some(replacement);
        let result = self.replace_inner(index, &mut position, &mut replacement);
        if replacement.is_none() { Some(result) } else { None }
    }

    fn replace_inner(
        &self,
        index: usize,
        position: &mut usize,
        replacement: &mut Option<Query>,
    ) -> Query {
        let current = *position;
        *position += 1;
        if current == index {
            if let Some(new_node) = replacement.take() {
                // Skip the positions of the replaced subtree.
                *position += self.node_count() - 1;
                return new_node;
            }
        }
        match self {
            Query::Keyword(_) => self.clone(),
            Query::Boolean(boolean) => {
                let children = boolean
                    .children
                    .iter()
                    .map(|child| child.replace_inner(index, position, replacement))
                    .collect();
                Query::Boolean(BooleanQuery {
                    operator: boolean.operator,
                    children,
                })
            }
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::Keyword(keyword) => {
                let fields: Vec<&str> = keyword.fields.iter().map(|f| f.as_str()).collect();
                write!(f, "{}[{}]", keyword.text, fields.join(","))?;
                if keyword.exploded {
                    write!(f, "+exp")?;
                }
                if keyword.truncated {
                    write!(f, "*")?;
                }
                Ok(())
            }
            Query::Boolean(boolean) => {
                write!(f, "(")?;
                for (i, child) in boolean.children.iter().enumerate() {
                    if i > 0 {
                        write!(f, " {} ", boolean.operator.as_str().to_uppercase())?;
                    }
                    write!(f, "{child}")?;
                }
                write!(f, ")")
            }
        }
    }
}
