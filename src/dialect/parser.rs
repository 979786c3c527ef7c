//! Boolean expression parser shared by all dialects.
//!
//! The parser handles operators, parentheses and precedence; dialects only
//! decide what an atom means through [`AtomSyntax`].
//!
//! Precedence, loosest first: `OR`, `AND`, `NOT`. Operators are matched
//! case-insensitively. A run of consecutive non-operator words (plus quoted
//! phrases and `[...]` tags) forms one atom, so `heart attack[tiab]` and
//! `exp Diabetes Mellitus/` are single atoms.

use std::iter::Peekable;
use std::str::Chars;

use crate::error::{QueryLensError, Result};
use crate::query::{Operator, Query};

/// Dialect-specific interpretation of atoms.
pub trait AtomSyntax {
    /// Turn the raw atom text into a query.
    fn parse_atom(&self, atom: &str) -> Result<Query>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    LParen,
    RParen,
    Op(Operator),
    Atom(String),
}

/// Parse `text` into a query tree using `syntax` for atoms.
pub fn parse_expression(text: &str, syntax: &dyn AtomSyntax) -> Result<Query> {
    let tokens = tokenize(text)?;
    if tokens.is_empty() {
        return Err(QueryLensError::compile("empty query"));
    }

    let mut parser = ExpressionParser {
        tokens,
        position: 0,
        syntax,
    };
    let query = parser.parse_or()?;
    if let Some(token) = parser.peek() {
        return Err(QueryLensError::compile(format!(
            "unexpected {token:?} at token {}",
            parser.position
        )));
    }
    Ok(query)
}

struct ExpressionParser<'a> {
    tokens: Vec<Token>,
    position: usize,
    syntax: &'a dyn AtomSyntax,
}

impl ExpressionParser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        self.position += 1;
        token
    }

    fn parse_or(&mut self) -> Result<Query> {
        self.parse_chain(Operator::Or, Self::parse_and)
    }

    fn parse_and(&mut self) -> Result<Query> {
        self.parse_chain(Operator::And, Self::parse_not)
    }

    fn parse_not(&mut self) -> Result<Query> {
        self.parse_chain(Operator::Not, Self::parse_primary)
    }

    /// Parse `operand (op operand)*` into one flat boolean node.
    fn parse_chain(
        &mut self,
        operator: Operator,
        operand: fn(&mut Self) -> Result<Query>,
    ) -> Result<Query> {
        let mut children = vec![operand(self)?];
        while self.peek() == Some(&Token::Op(operator)) {
            self.next();
            children.push(operand(self)?);
        }
        Query::boolean(operator, children)
            .ok_or_else(|| QueryLensError::compile("empty boolean expression"))
    }

    fn parse_primary(&mut self) -> Result<Query> {
        match self.next() {
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(QueryLensError::compile("missing closing parenthesis")),
                }
            }
            Some(Token::Atom(atom)) => self.syntax.parse_atom(&atom),
            Some(token) => Err(QueryLensError::compile(format!(
                "expected a term but found {token:?}"
            ))),
            None => Err(QueryLensError::compile("unexpected end of query")),
        }
    }
}

fn operator_word(word: &str) -> Option<Operator> {
    if word.eq_ignore_ascii_case("and") {
        Some(Operator::And)
    } else if word.eq_ignore_ascii_case("or") {
        Some(Operator::Or)
    } else if word.eq_ignore_ascii_case("not") {
        Some(Operator::Not)
    } else {
        None
    }
}

fn tokenize(text: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();
    let mut atom = String::new();
    let mut pending_space = false;

    fn flush(atom: &mut String, tokens: &mut Vec<Token>) {
        if !atom.is_empty() {
            tokens.push(Token::Atom(std::mem::take(atom)));
        }
    }

    while let Some(&ch) = chars.peek() {
        match ch {
            c if c.is_whitespace() => {
                chars.next();
                pending_space = !atom.is_empty();
            }
            '(' => {
                chars.next();
                flush(&mut atom, &mut tokens);
                pending_space = false;
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                flush(&mut atom, &mut tokens);
                pending_space = false;
                tokens.push(Token::RParen);
            }
            '"' | '[' => {
                let close = if ch == '"' { '"' } else { ']' };
                if pending_space {
                    atom.push(' ');
                    pending_space = false;
                }
                atom.push_str(&read_delimited(&mut chars, close)?);
            }
            _ => {
                let word = read_word(&mut chars);
                if let Some(operator) = operator_word(&word) {
                    flush(&mut atom, &mut tokens);
                    pending_space = false;
                    tokens.push(Token::Op(operator));
                } else {
                    if pending_space {
                        atom.push(' ');
                        pending_space = false;
                    }
                    atom.push_str(&word);
                }
            }
        }
    }
    flush(&mut atom, &mut tokens);

    Ok(tokens)
}

fn read_word(chars: &mut Peekable<Chars<'_>>) -> String {
    let mut word = String::new();
    while let Some(&ch) = chars.peek() {
        if ch.is_whitespace() || matches!(ch, '(' | ')' | '"' | '[') {
            break;
        }
        word.push(ch);
        chars.next();
    }
    word
}

/// Read a delimited segment, including both delimiters.
fn read_delimited(chars: &mut Peekable<Chars<'_>>, close: char) -> Result<String> {
    let mut segment = String::new();
    if let Some(open) = chars.next() {
        segment.push(open);
    }
    for ch in chars.by_ref() {
        segment.push(ch);
        if ch == close {
            return Ok(segment);
        }
    }
    Err(QueryLensError::compile(format!("unterminated '{close}'")))
}

/// Strip one pair of surrounding double quotes.
pub fn unquote(text: &str) -> &str {
    let trimmed = text.trim();
    trimmed
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(trimmed)
}

/// Wrap `text` in double quotes when it would not survive tokenization as a
/// single atom: it contains an operator word or a delimiter.
pub fn quote_if_needed(text: &str) -> String {
    let has_operator = text.split_whitespace().any(|w| operator_word(w).is_some());
    if has_operator || text.contains(['(', ')', '[', ']']) {
        format!("\"{text}\"")
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Field, Keyword};

    struct PlainSyntax;

    impl AtomSyntax for PlainSyntax {
        fn parse_atom(&self, atom: &str) -> Result<Query> {
            Ok(Keyword::new(unquote(atom), [Field::AllFields]).into())
        }
    }

    fn texts(query: &Query) -> Vec<String> {
        query.keywords().iter().map(|k| k.text().to_string()).collect()
    }

    #[test]
    fn test_tokenize_groups_words_into_atoms() {
        let tokens = tokenize("heart attack[tiab] AND (exp Diabetes/ or insulin)").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Atom("heart attack[tiab]".to_string()),
                Token::Op(Operator::And),
                Token::LParen,
                Token::Atom("exp Diabetes/".to_string()),
                Token::Op(Operator::Or),
                Token::Atom("insulin".to_string()),
                Token::RParen,
            ]
        );
    }

    #[test]
    fn test_tokenize_keeps_quoted_operators() {
        let tokens = tokenize("\"salt and pepper\"[ti]").unwrap();
        assert_eq!(tokens, vec![Token::Atom("\"salt and pepper\"[ti]".to_string())]);
    }

    #[test]
    fn test_precedence_and_binds_tighter_than_or() {
        let query = parse_expression("a OR b AND c", &PlainSyntax).unwrap();
        let root = query.as_boolean().unwrap();
        assert_eq!(root.operator(), Operator::Or);
        assert_eq!(root.children()[1].as_boolean().unwrap().operator(), Operator::And);
        assert_eq!(texts(&query), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_chains_are_flat() {
        let query = parse_expression("a and b and c", &PlainSyntax).unwrap();
        assert_eq!(query.as_boolean().unwrap().children().len(), 3);
    }

    #[test]
    fn test_parentheses_keep_nesting() {
        let query = parse_expression("a and (b and c)", &PlainSyntax).unwrap();
        let root = query.as_boolean().unwrap();
        assert_eq!(root.children().len(), 2);
        assert!(root.children()[1].as_boolean().is_some());
    }

    #[test]
    fn test_errors() {
        assert!(parse_expression("", &PlainSyntax).is_err());
        assert!(parse_expression("(a and b", &PlainSyntax).is_err());
        assert!(parse_expression("a and b)", &PlainSyntax).is_err());
        assert!(parse_expression("a and", &PlainSyntax).is_err());
        assert!(parse_expression("\"open quote", &PlainSyntax).is_err());
    }

    #[test]
    fn test_quote_if_needed() {
        assert_eq!(quote_if_needed("heart attack"), "heart attack");
        assert_eq!(quote_if_needed("salt and pepper"), "\"salt and pepper\"");
        assert_eq!(quote_if_needed("a(b)"), "\"a(b)\"");
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("\"heart attack\""), "heart attack");
        assert_eq!(unquote("plain"), "plain");
    }
}
