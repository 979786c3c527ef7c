//! PubMed query syntax.
//!
//! Atoms are terms with an optional field tag: `insulin[tiab]`,
//! `"heart attack"[ti]`, `Diabetes Mellitus[mh]`, `Insulin[mh:noexp]`,
//! `randomized controlled trial[pt]`, `diabet*`. Untagged terms search all
//! fields.

use std::sync::LazyLock;

use regex::Regex;

use crate::dialect::Dialect;
use crate::dialect::parser::{AtomSyntax, parse_expression, quote_if_needed, unquote};
use crate::error::{QueryLensError, Result};
use crate::query::{Field, Keyword, Query};

static FIELD_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*?)\s*\[([^\]]+)\]$").expect("valid regex"));

/// The PubMed dialect.
#[derive(Debug, Clone, Default)]
pub struct PubmedDialect;

impl PubmedDialect {
    pub fn new() -> Self {
        PubmedDialect
    }
}

impl Dialect for PubmedDialect {
    fn name(&self) -> &str {
        "pubmed"
    }

    fn compile(&self, text: &str) -> Result<Query> {
        parse_expression(text, &PubmedAtoms)
    }

    fn render(&self, query: &Query) -> Result<String> {
        render_query(query, true)
    }
}

struct PubmedAtoms;

impl AtomSyntax for PubmedAtoms {
    fn parse_atom(&self, atom: &str) -> Result<Query> {
        let (text, tag) = match FIELD_TAG.captures(atom.trim()) {
            Some(captures) => (
                captures.get(1).map_or("", |m| m.as_str()).to_string(),
                Some(captures[2].trim().to_lowercase()),
            ),
            None => (atom.trim().to_string(), None),
        };

        let (text, truncated) = match text.strip_suffix('*') {
            Some(stem) => (unquote(stem).to_string(), true),
            None => (unquote(&text).to_string(), false),
        };
        if text.trim().is_empty() {
            return Err(QueryLensError::compile(format!("empty search term in {atom}")));
        }

        let keyword = match tag.as_deref() {
            None | Some("all fields") | Some("all") => Keyword::new(text, [Field::AllFields]),
            Some("tiab") | Some("title/abstract") | Some("tw") | Some("text word") => {
                Keyword::new(text, [Field::Title, Field::Abstract])
            }
            Some("ti") | Some("title") => Keyword::new(text, [Field::Title]),
            Some("ab") | Some("abstract") => Keyword::new(text, [Field::Abstract]),
            Some("pt") | Some("publication type") => {
                Keyword::new(text, [Field::PublicationType])
            }
            Some("mh") | Some("mesh") | Some("mesh terms") => Keyword::mesh(text, true),
            Some("mh:noexp") | Some("mesh:noexp") | Some("mesh terms:noexp") => {
                Keyword::mesh(text, false)
            }
            Some(other) => {
                return Err(QueryLensError::compile(format!("unknown field tag [{other}]")));
            }
        };

        Ok(keyword.with_truncated(truncated).into())
    }
}

fn render_query(query: &Query, top_level: bool) -> Result<String> {
    match query {
        Query::Keyword(keyword) => render_keyword(keyword),
        Query::Boolean(boolean) => {
            let operator = format!(" {} ", boolean.operator().as_str().to_uppercase());
            let parts = boolean
                .children()
                .iter()
                .map(|child| render_query(child, false))
                .collect::<Result<Vec<_>>>()?;
            let rendered = parts.join(&operator);
            Ok(if top_level {
                rendered
            } else {
                format!("({rendered})")
            })
        }
    }
}

fn render_keyword(keyword: &Keyword) -> Result<String> {
    if keyword.text().trim().is_empty() {
        return Err(QueryLensError::render("empty search term"));
    }

    let text = if keyword.text().contains(char::is_whitespace) {
        format!("\"{}\"", keyword.text())
    } else {
        quote_if_needed(keyword.text())
    };
    let text = if keyword.truncated() {
        format!("{text}*")
    } else {
        text
    };

    let tag = match keyword.fields() {
        [] | [Field::AllFields] => "all fields",
        [Field::Title, Field::Abstract] => "tiab",
        [Field::Title] => "ti",
        [Field::Abstract] => "ab",
        [Field::PublicationType] => "pt",
        [Field::MeshHeadings] if keyword.exploded() => "mh",
        [Field::MeshHeadings] => "mh:noexp",
        fields => {
            // No single tag covers this combination: split into a disjunction.
            let parts = fields
                .iter()
                .map(|f| render_keyword(&keyword.clone().with_fields([*f])))
                .collect::<Result<Vec<_>>>()?;
            return Ok(format!("({})", parts.join(" OR ")));
        }
    };

    Ok(format!("{text}[{tag}]"))
}
