//! MEDLINE (Ovid) query syntax.
//!
//! Supported atoms:
//! - `exp Diabetes Mellitus/` exploded MeSH heading
//! - `Insulin/` MeSH heading without explosion
//! - `insulin.tw.`, `insulin.ti,ab.`, `insulin.ab.`, `insulin.mp.`, `rct.pt.`
//! - `diabet*` truncation, `"heart attack"` phrases
//!
//! Queries may be written as numbered lines, Ovid style:
//!
//! ```text
//! 1. exp Diabetes Mellitus/
//! 2. insulin.tw.
//! 3. 1 and 2
//! ```
//!
//! Lines reference earlier lines by number, either inline (`1 and 2`) or with
//! the `or/1-3` and `and/1,2` shorthands. The last line is the query.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::dialect::Dialect;
use crate::dialect::parser::{AtomSyntax, parse_expression, quote_if_needed, unquote};
use crate::error::{QueryLensError, Result};
use crate::query::{BooleanQuery, Field, Keyword, Operator, Query};

static NUMBERED_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+)[.)]?\s+(.+?)\s*$").expect("valid regex"));
static FIELD_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+)\.([a-z]{2}(?:,[a-z]{2})*)\.$").expect("valid regex"));
static LINE_COMBINATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(and|or)/([\d,\-\s]+)$").expect("valid regex"));

/// The MEDLINE (Ovid) dialect.
#[derive(Debug, Clone, Default)]
pub struct MedlineDialect;

impl MedlineDialect {
    pub fn new() -> Self {
        MedlineDialect
    }
}

impl Dialect for MedlineDialect {
    fn name(&self) -> &str {
        "medline"
    }

    fn compile(&self, text: &str) -> Result<Query> {
        let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
        let numbered = lines.len() > 1 && lines.iter().all(|l| NUMBERED_LINE.is_match(l));

        if !numbered {
            return parse_expression(text, &MedlineAtoms { lines: None });
        }

        let mut resolved: HashMap<usize, Query> = HashMap::new();
        let mut last = None;
        for line in lines {
            let captures = NUMBERED_LINE
                .captures(line)
                .ok_or_else(|| QueryLensError::compile(format!("bad line: {line}")))?;
            let number: usize = captures[1]
                .parse()
                .map_err(|_| QueryLensError::compile(format!("bad line number: {line}")))?;
            let syntax = MedlineAtoms {
                lines: Some(&resolved),
            };
            let query = parse_expression(&captures[2], &syntax)?;
            resolved.insert(number, query.clone());
            last = Some(query);
        }

        last.ok_or_else(|| QueryLensError::compile("empty query"))
    }

    fn render(&self, query: &Query) -> Result<String> {
        render_query(query, true)
    }
}

struct MedlineAtoms<'a> {
    lines: Option<&'a HashMap<usize, Query>>,
}

impl MedlineAtoms<'_> {
    fn line(&self, number: usize) -> Result<Query> {
        self.lines
            .and_then(|lines| lines.get(&number))
            .cloned()
            .ok_or_else(|| QueryLensError::compile(format!("reference to unknown line {number}")))
    }

    fn parse_line_list(&self, list: &str) -> Result<Vec<Query>> {
        let mut queries = Vec::new();
        for item in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let numbers: Vec<usize> = item
                .split('-')
                .map(|n| n.trim().parse::<usize>())
                .collect::<std::result::Result<_, _>>()
                .map_err(|_| QueryLensError::compile(format!("bad line range: {item}")))?;
            match numbers.as_slice() {
                [single] => queries.push(self.line(*single)?),
                [from, to] if from <= to => {
                    for number in *from..=*to {
                        queries.push(self.line(number)?);
                    }
                }
                _ => return Err(QueryLensError::compile(format!("bad line range: {item}"))),
            }
        }
        Ok(queries)
    }
}

impl AtomSyntax for MedlineAtoms<'_> {
    fn parse_atom(&self, atom: &str) -> Result<Query> {
        let atom = atom.trim();

        if self.lines.is_some() {
            if let Ok(number) = atom.parse::<usize>() {
                return self.line(number);
            }
            if let Some(captures) = LINE_COMBINATION.captures(atom) {
                let operator = if captures[1].eq_ignore_ascii_case("and") {
                    Operator::And
                } else {
                    Operator::Or
                };
                let children = self.parse_line_list(&captures[2])?;
                return Query::boolean(operator, children)
                    .ok_or_else(|| QueryLensError::compile(format!("empty combination: {atom}")));
            }
        }

        parse_keyword(atom).map(Query::from)
    }
}

fn parse_keyword(atom: &str) -> Result<Keyword> {
    if let Some(heading) = atom
        .strip_prefix("exp ")
        .or_else(|| atom.strip_prefix("EXP "))
    {
        let heading = heading
            .trim()
            .strip_suffix('/')
            .ok_or_else(|| QueryLensError::compile(format!("exploded heading without '/': {atom}")))?;
        return non_empty(Keyword::mesh(unquote(heading), true));
    }

    if let Some(heading) = atom.strip_suffix('/') {
        return non_empty(Keyword::mesh(unquote(heading.trim_start_matches('*')), false));
    }

    let (text, fields) = match FIELD_SUFFIX.captures(atom) {
        Some(captures) => {
            let text = captures.get(1).map_or("", |m| m.as_str()).to_string();
            let mut fields = Vec::new();
            for code in captures[2].split(',') {
                fields.extend(field_code(code)?);
            }
            (text, fields)
        }
        None => (atom.to_string(), vec![Field::AllFields]),
    };

    let text = text.trim();
    let (text, truncated) = match text.strip_suffix('*').or_else(|| text.strip_suffix('$')) {
        Some(stem) => (unquote(stem), true),
        None => (unquote(text), false),
    };

    // `.sh.` is a subject heading search without explosion.
    if fields == [Field::MeshHeadings] {
        return non_empty(Keyword::mesh(text, false));
    }

    non_empty(Keyword::new(text, fields).with_truncated(truncated))
}

fn non_empty(keyword: Keyword) -> Result<Keyword> {
    if keyword.text().trim().is_empty() {
        Err(QueryLensError::compile("empty search term"))
    } else {
        Ok(keyword)
    }
}

fn field_code(code: &str) -> Result<Vec<Field>> {
    match code {
        "ti" => Ok(vec![Field::Title]),
        "ab" => Ok(vec![Field::Abstract]),
        "tw" | "tiab" => Ok(vec![Field::Title, Field::Abstract]),
        "sh" => Ok(vec![Field::MeshHeadings]),
        "pt" => Ok(vec![Field::PublicationType]),
        "mp" | "af" => Ok(vec![Field::AllFields]),
        other => Err(QueryLensError::compile(format!("unknown field code .{other}."))),
    }
}

fn render_query(query: &Query, top_level: bool) -> Result<String> {
    match query {
        Query::Keyword(keyword) => render_keyword(keyword),
        Query::Boolean(boolean) => {
            let rendered = render_boolean(boolean)?;
            Ok(if top_level {
                rendered
            } else {
                format!("({rendered})")
            })
        }
    }
}

fn render_boolean(boolean: &BooleanQuery) -> Result<String> {
    let parts = boolean
        .children()
        .iter()
        .map(|child| render_query(child, false))
        .collect::<Result<Vec<_>>>()?;
    Ok(parts.join(&format!(" {} ", boolean.operator().as_str())))
}

/// Quote text that the atom parser would otherwise read as a heading.
fn quote_atom(text: &str) -> String {
    let looks_like_heading = text
        .get(..4)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("exp "))
        || text.trim_end().ends_with('/');
    if looks_like_heading {
        format!("\"{text}\"")
    } else {
        quote_if_needed(text)
    }
}

fn render_text(keyword: &Keyword) -> String {
    let mut text = quote_atom(keyword.text());
    if keyword.truncated() {
        text.push('*');
    }
    text
}

fn render_keyword(keyword: &Keyword) -> Result<String> {
    if keyword.text().trim().is_empty() {
        return Err(QueryLensError::render("empty search term"));
    }

    if keyword.is_mesh() {
        let heading = quote_atom(keyword.text());
        return Ok(if keyword.exploded() {
            format!("exp {heading}/")
        } else {
            format!("{heading}/")
        });
    }

    let text = render_text(keyword);
    let codes = match keyword.fields() {
        [] | [Field::AllFields] => return Ok(format!("{text}.mp.")),
        [Field::Title, Field::Abstract] => "tw".to_string(),
        fields if !fields.contains(&Field::MeshHeadings) => fields
            .iter()
            .map(|f| match f {
                Field::Title => "ti",
                Field::Abstract => "ab",
                Field::PublicationType => "pt",
                _ => "mp",
            })
            .collect::<Vec<_>>()
            .join(","),
        fields => {
            // Heading plus text fields: split into a disjunction.
            let parts = fields
                .iter()
                .map(|f| render_keyword(&keyword.clone().with_fields([*f])))
                .collect::<Result<Vec<_>>>()?;
            return Ok(format!("({})", parts.join(" or ")));
        }
    };
    Ok(format!("{text}.{codes}."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_simple() {
        let query = MedlineDialect.compile("diabetes AND insulin").unwrap();
        let root = query.as_boolean().unwrap();
        assert_eq!(root.operator(), Operator::And);
        let keywords = query.keywords();
        assert_eq!(keywords[0].text(), "diabetes");
        assert_eq!(keywords[0].fields(), &[Field::AllFields]);
    }

    #[test]
    fn test_compile_atoms() {
        let query = MedlineDialect
            .compile("exp Diabetes Mellitus/ or Insulin/ or diabet*.tw. or rct.pt.")
            .unwrap();
        let keywords = query.keywords();
        assert!(keywords[0].is_mesh() && keywords[0].exploded());
        assert_eq!(keywords[0].text(), "Diabetes Mellitus");
        assert!(keywords[1].is_mesh() && !keywords[1].exploded());
        assert_eq!(keywords[2].text(), "diabet");
        assert!(keywords[2].truncated());
        assert_eq!(keywords[2].fields(), &[Field::Title, Field::Abstract]);
        assert_eq!(keywords[3].fields(), &[Field::PublicationType]);
    }

    #[test]
    fn test_compile_numbered_lines() {
        let text = "1. exp Diabetes Mellitus/\n2. insulin.tw.\n3. metformin.ti,ab.\n4. or/2-3\n5. 1 and 4";
        let query = MedlineDialect.compile(text).unwrap();
        let root = query.as_boolean().unwrap();
        assert_eq!(root.operator(), Operator::And);
        let disjunction = root.children()[1].as_boolean().unwrap();
        assert_eq!(disjunction.operator(), Operator::Or);
        assert_eq!(disjunction.children().len(), 2);
    }

    #[test]
    fn test_compile_unknown_line_reference() {
        let text = "1. insulin.tw.\n2. 1 and 7";
        assert!(MedlineDialect.compile(text).is_err());
    }

    #[test]
    fn test_compile_unknown_field_code() {
        assert!(MedlineDialect.compile("insulin.zz.").is_err());
    }

    #[test]
    fn test_render() {
        let query = MedlineDialect
            .compile("(exp Diabetes/ or diabetes.tw.) and insulin.ab.")
            .unwrap();
        assert_eq!(
            MedlineDialect.render(&query).unwrap(),
            "(exp Diabetes/ or diabetes.tw.) and insulin.ab."
        );
    }

    #[test]
    fn test_headings_with_operator_words_are_quoted() {
        let query: Query = Keyword::mesh("Signs and Symptoms", true).into();
        let rendered = MedlineDialect.render(&query).unwrap();
        assert_eq!(rendered, "exp \"Signs and Symptoms\"/");
        let recompiled = MedlineDialect.compile(&rendered).unwrap();
        assert_eq!(recompiled, query);
    }

    #[test]
    fn test_text_resembling_heading_is_quoted() {
        let query: Query = Keyword::new("exp insulin", [Field::Title]).into();
        let rendered = MedlineDialect.render(&query).unwrap();
        assert_eq!(rendered, "\"exp insulin\".ti.");
        assert_eq!(MedlineDialect.compile(&rendered).unwrap(), query);

        let heading: Query = Keyword::mesh("Exp Studies", false).into();
        let rendered = MedlineDialect.render(&heading).unwrap();
        assert_eq!(rendered, "\"Exp Studies\"/");
        assert_eq!(MedlineDialect.compile(&rendered).unwrap(), heading);
    }

    #[test]
    fn test_round_trip() {
        let texts = [
            "diabetes AND insulin",
            "exp Diabetes/ and (insulin.ti. or glucose*.tw.) not animals/",
            "\"heart attack\".ti,ab. or myocardial infarction.mp.",
            "\"exp insulin\".ti.",
            "\"EXP glucose\"*.tw. and \"exp therapy\"/",
        ];
        for text in texts {
            let query = MedlineDialect.compile(text).unwrap();
            let rendered = MedlineDialect.render(&query).unwrap();
            let recompiled = MedlineDialect.compile(&rendered).unwrap();
            assert_eq!(query.fingerprint(), recompiled.fingerprint(), "{text}");
        }
    }
}
