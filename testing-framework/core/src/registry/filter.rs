//! LDAP-style service filters (RFC 1960, as used by service registries).
//!
//! ```text
//! (&(objectClass=fabric.FabricService)(|(zone=eu*)(!(standby=true))))
//! ```

use std::{fmt, str::FromStr};

use thiserror::Error;

use super::properties::{Properties, PropertyValue, OBJECT_CLASS};

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum FilterErrorKind {
    #[error("unexpected end of input")]
    UnexpectedEnd,
    #[error("expected `{0}`")]
    Expected(char),
    #[error("missing attribute name")]
    MissingAttribute,
    #[error("missing comparison operator")]
    MissingOperator,
    #[error("`&` and `|` need at least one operand")]
    EmptyFilterList,
    #[error("unescaped `(` in value")]
    UnescapedParenthesis,
    #[error("`\\` at end of input")]
    DanglingEscape,
    #[error("unexpected input after filter")]
    TrailingInput,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("invalid filter `{filter}` at offset {offset}: {kind}")]
pub struct FilterError {
    filter: String,
    offset: usize,
    kind: FilterErrorKind,
}

impl FilterError {
    #[must_use]
    pub fn filter(&self) -> &str {
        &self.filter
    }

    #[must_use]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    #[must_use]
    pub const fn kind(&self) -> FilterErrorKind {
        self.kind
    }
}

/// A parsed filter. Displays as the text it was parsed from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Filter {
    text: String,
    root: Node,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Node {
    And(Vec<Node>),
    Or(Vec<Node>),
    Not(Box<Node>),
    Compare {
        attribute: String,
        operator: Operator,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Operator {
    Equal(String),
    Approx(String),
    GreaterEq(String),
    LessEq(String),
    Present,
    Substring(Substring),
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Substring {
    initial: Option<String>,
    any: Vec<String>,
    last: Option<String>,
}

impl Filter {
    pub fn parse(text: &str) -> Result<Self, FilterError> {
        let mut parser = Parser { text, pos: 0 };
        parser.skip_whitespace();
        let root = parser.filter()?;
        parser.skip_whitespace();
        if parser.pos != text.len() {
            return Err(parser.error(FilterErrorKind::TrailingInput));
        }
        Ok(Self {
            text: text.to_owned(),
            root,
        })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn matches(&self, properties: &Properties) -> bool {
        self.root.matches(properties)
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl FromStr for Filter {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Builds the filter for a capability lookup.
///
/// The object class clause is always present; a caller filter is AND-ed with
/// it, wrapped in parentheses first when it does not start with one.
pub fn compose(object_class: &str, filter: Option<&str>) -> Result<Filter, FilterError> {
    let class_clause = format!("({OBJECT_CLASS}={})", escape_value(object_class));
    let text = match filter.map(str::trim) {
        None => class_clause,
        Some(raw) if raw.starts_with('(') => format!("(&{class_clause}{raw})"),
        Some(raw) => format!("(&{class_clause}({raw}))"),
    };
    Filter::parse(&text)
}

#[must_use]
pub fn escape_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '*' | '(' | ')') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

impl Node {
    fn matches(&self, properties: &Properties) -> bool {
        match self {
            Self::And(nodes) => nodes.iter().all(|node| node.matches(properties)),
            Self::Or(nodes) => nodes.iter().any(|node| node.matches(properties)),
            Self::Not(node) => !node.matches(properties),
            Self::Compare {
                attribute,
                operator,
            } => match properties.get(attribute) {
                None => false,
                Some(_) if *operator == Operator::Present => true,
                Some(value) => operator.matches(value),
            },
        }
    }
}

impl Operator {
    fn matches(&self, value: &PropertyValue) -> bool {
        match value {
            PropertyValue::List(values) => values.iter().any(|value| self.matches(value)),
            PropertyValue::Text(text) => self.matches_text(text),
            PropertyValue::Integer(number) => self.matches_integer(*number),
            PropertyValue::Boolean(flag) => self.matches_boolean(*flag),
        }
    }

    fn matches_text(&self, text: &str) -> bool {
        match self {
            Self::Present => true,
            Self::Equal(expected) => text == expected,
            Self::Approx(expected) => normalize(text) == normalize(expected),
            Self::GreaterEq(bound) => text >= bound.as_str(),
            Self::LessEq(bound) => text <= bound.as_str(),
            Self::Substring(pattern) => pattern.matches(text),
        }
    }

    fn matches_integer(&self, number: i64) -> bool {
        let parse = |raw: &str| raw.trim().parse::<i64>().ok();
        match self {
            Self::Present => true,
            Self::Equal(expected) | Self::Approx(expected) => parse(expected) == Some(number),
            Self::GreaterEq(bound) => parse(bound).is_some_and(|bound| number >= bound),
            Self::LessEq(bound) => parse(bound).is_some_and(|bound| number <= bound),
            Self::Substring(pattern) => pattern.matches(&number.to_string()),
        }
    }

    fn matches_boolean(&self, flag: bool) -> bool {
        match self {
            Self::Present => true,
            Self::Equal(expected) | Self::Approx(expected) => {
                let expected = expected.trim();
                (flag && expected.eq_ignore_ascii_case("true"))
                    || (!flag && expected.eq_ignore_ascii_case("false"))
            }
            Self::GreaterEq(_) | Self::LessEq(_) | Self::Substring(_) => false,
        }
    }
}

impl Substring {
    fn from_pieces(mut pieces: Vec<String>) -> Self {
        let last = pieces.pop().filter(|piece| !piece.is_empty());
        let initial = if pieces.is_empty() {
            None
        } else {
            Some(pieces.remove(0)).filter(|piece| !piece.is_empty())
        };
        pieces.retain(|piece| !piece.is_empty());
        Self {
            initial,
            any: pieces,
            last,
        }
    }

    fn matches(&self, text: &str) -> bool {
        let mut rest = text;
        if let Some(initial) = &self.initial {
            match rest.strip_prefix(initial.as_str()) {
                Some(tail) => rest = tail,
                None => return false,
            }
        }
        for piece in &self.any {
            match rest.find(piece.as_str()) {
                Some(index) => rest = &rest[index + piece.len()..],
                None => return false,
            }
        }
        self.last
            .as_ref()
            .is_none_or(|last| rest.ends_with(last.as_str()))
    }
}

fn normalize(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

#[derive(Clone, Copy)]
enum OperatorKind {
    Equal,
    Approx,
    GreaterEq,
    LessEq,
}

struct Parser<'a> {
    text: &'a str,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn error(&self, kind: FilterErrorKind) -> FilterError {
        self.error_at(self.pos, kind)
    }

    fn error_at(&self, offset: usize, kind: FilterErrorKind) -> FilterError {
        FilterError {
            filter: self.text.to_owned(),
            offset,
            kind,
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), FilterError> {
        match self.peek() {
            Some(c) if c == expected => {
                self.bump();
                Ok(())
            }
            Some(_) => Err(self.error(FilterErrorKind::Expected(expected))),
            None => Err(self.error(FilterErrorKind::UnexpectedEnd)),
        }
    }

    fn filter(&mut self) -> Result<Node, FilterError> {
        self.expect('(')?;
        self.skip_whitespace();
        let node = match self.peek() {
            Some('&') => {
                self.bump();
                Node::And(self.filter_list()?)
            }
            Some('|') => {
                self.bump();
                Node::Or(self.filter_list()?)
            }
            Some('!') => {
                self.bump();
                self.skip_whitespace();
                Node::Not(Box::new(self.filter()?))
            }
            Some(_) => self.item()?,
            None => return Err(self.error(FilterErrorKind::UnexpectedEnd)),
        };
        self.skip_whitespace();
        self.expect(')')?;
        Ok(node)
    }

    fn filter_list(&mut self) -> Result<Vec<Node>, FilterError> {
        let mut nodes = Vec::new();
        loop {
            self.skip_whitespace();
            if self.peek() != Some('(') {
                break;
            }
            nodes.push(self.filter()?);
        }
        if nodes.is_empty() {
            return Err(self.error(FilterErrorKind::EmptyFilterList));
        }
        Ok(nodes)
    }

    fn item(&mut self) -> Result<Node, FilterError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if matches!(c, '=' | '~' | '>' | '<' | '(' | ')') {
                break;
            }
            self.bump();
        }
        let attribute = self.text[start..self.pos].trim();
        if attribute.is_empty() {
            return Err(self.error_at(start, FilterErrorKind::MissingAttribute));
        }
        let attribute = attribute.to_owned();

        let kind = match self.peek() {
            Some('=') => OperatorKind::Equal,
            Some('~') => OperatorKind::Approx,
            Some('>') => OperatorKind::GreaterEq,
            Some('<') => OperatorKind::LessEq,
            _ => return Err(self.error(FilterErrorKind::MissingOperator)),
        };
        self.bump();
        if !matches!(kind, OperatorKind::Equal) {
            self.expect('=')?;
        }

        let pieces = self.value()?;
        let operator = match kind {
            OperatorKind::Equal if pieces.len() == 1 => {
                Operator::Equal(pieces.into_iter().collect())
            }
            OperatorKind::Equal if pieces.len() == 2 && pieces.iter().all(String::is_empty) => {
                Operator::Present
            }
            OperatorKind::Equal => Operator::Substring(Substring::from_pieces(pieces)),
            OperatorKind::Approx => Operator::Approx(pieces.join("*")),
            OperatorKind::GreaterEq => Operator::GreaterEq(pieces.join("*")),
            OperatorKind::LessEq => Operator::LessEq(pieces.join("*")),
        };
        Ok(Node::Compare {
            attribute,
            operator,
        })
    }

    /// Reads a value up to the closing parenthesis, split at unescaped `*`.
    fn value(&mut self) -> Result<Vec<String>, FilterError> {
        let mut pieces = Vec::new();
        let mut current = String::new();
        loop {
            match self.peek() {
                None => return Err(self.error(FilterErrorKind::UnexpectedEnd)),
                Some(')') => break,
                Some('(') => return Err(self.error(FilterErrorKind::UnescapedParenthesis)),
                Some('\\') => {
                    self.bump();
                    match self.bump() {
                        Some(c) => current.push(c),
                        None => return Err(self.error(FilterErrorKind::DanglingEscape)),
                    }
                }
                Some('*') => {
                    self.bump();
                    pieces.push(std::mem::take(&mut current));
                }
                Some(c) => {
                    self.bump();
                    current.push(c);
                }
            }
        }
        pieces.push(current);
        Ok(pieces)
    }
}
