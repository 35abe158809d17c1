//! Response Flattener - Path expressions over JSON documents
//!
//! Supported syntax:
//! - field access: `loadbalancer.vip_address`
//! - indexing: `volume_ids[0]`, `listeners[-1]`
//! - wildcard projection: `tags[*].key`
//! - filters: `addresses[?type=='fixed']`, `ports[?number==`80`]`, `!=`
//! - pipes: `listeners[?protocol=='HTTP']|[0].id`
//!
//! Missing data never raises; only a malformed expression does.

use std::collections::HashMap;
use std::str::FromStr;

use serde_json::Value as Json;

use crate::resource::Value;
use crate::schema::ResourceSchema;

/// Malformed path expression
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid path expression '{expression}' at offset {offset}: {reason}")]
pub struct PathError {
    pub expression: String,
    pub offset: usize,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Field(String),
    Index(i64),
    Wildcard,
    Filter {
        field: String,
        negate: bool,
        literal: Json,
    },
}

/// A parsed path expression
#[derive(Debug, Clone, PartialEq)]
pub struct PathExpr {
    source: String,
    stages: Vec<Vec<Segment>>,
}

impl PathExpr {
    pub fn parse(expression: &str) -> Result<Self, PathError> {
        let stages = Parser::new(expression).parse()?;
        Ok(Self {
            source: expression.to_string(),
            stages,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Evaluate against a document; `None` when any segment is missing
    pub fn evaluate(&self, document: &Json) -> Option<Json> {
        let mut current = document.clone();
        for stage in &self.stages {
            current = eval(&current, stage)?;
        }
        if current.is_null() { None } else { Some(current) }
    }
}

impl FromStr for PathExpr {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PathExpr::parse(s)
    }
}

fn eval(value: &Json, segments: &[Segment]) -> Option<Json> {
    let Some((first, rest)) = segments.split_first() else {
        return Some(value.clone());
    };

    match first {
        Segment::Field(name) => {
            let next = value.as_object()?.get(name)?;
            if next.is_null() {
                return None;
            }
            eval(next, rest)
        }
        Segment::Index(index) => {
            let items = value.as_array()?;
            let position = if *index < 0 {
                items.len().checked_sub(index.unsigned_abs() as usize)?
            } else {
                *index as usize
            };
            eval(items.get(position)?, rest)
        }
        Segment::Wildcard => {
            let projected = match value {
                Json::Array(items) => items.iter().filter_map(|item| eval(item, rest)).collect(),
                Json::Object(map) => map.values().filter_map(|item| eval(item, rest)).collect(),
                _ => return None,
            };
            Some(Json::Array(projected))
        }
        Segment::Filter {
            field,
            negate,
            literal,
        } => {
            let items = value.as_array()?;
            let projected = items
                .iter()
                .filter(|item| {
                    let matched = item.get(field.as_str()) == Some(literal);
                    matched != *negate
                })
                .filter_map(|item| eval(item, rest))
                .collect();
            Some(Json::Array(projected))
        }
    }
}

struct Parser<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            pos: 0,
        }
    }

    fn error(&self, reason: impl Into<String>) -> PathError {
        PathError {
            expression: self.source.to_string(),
            offset: self.pos,
            reason: reason.into(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, expected: u8) -> Result<(), PathError> {
        if self.peek() == Some(expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(format!("expected '{}'", expected as char)))
        }
    }

    fn parse(mut self) -> Result<Vec<Vec<Segment>>, PathError> {
        let mut stages = Vec::new();
        loop {
            stages.push(self.parse_stage()?);
            self.skip_whitespace();
            match self.peek() {
                None => break,
                Some(b'|') => self.pos += 1,
                Some(c) => return Err(self.error(format!("unexpected '{}'", c as char))),
            }
        }
        Ok(stages)
    }

    fn parse_stage(&mut self) -> Result<Vec<Segment>, PathError> {
        self.skip_whitespace();
        let mut segments = Vec::new();

        match self.peek() {
            Some(b'[') => segments.push(self.parse_bracket()?),
            Some(c) if is_ident_start(c) => segments.push(Segment::Field(self.parse_ident())),
            None => return Err(self.error("empty expression")),
            Some(_) => return Err(self.error("expected field name or '['")),
        }

        loop {
            match self.peek() {
                Some(b'.') => {
                    self.pos += 1;
                    match self.peek() {
                        Some(b'*') => {
                            self.pos += 1;
                            segments.push(Segment::Wildcard);
                        }
                        Some(c) if is_ident_start(c) => {
                            segments.push(Segment::Field(self.parse_ident()));
                        }
                        _ => return Err(self.error("expected field name after '.'")),
                    }
                }
                Some(b'[') => segments.push(self.parse_bracket()?),
                _ => break,
            }
        }

        Ok(segments)
    }

    fn parse_ident(&mut self) -> String {
        let start = self.pos;
        while self.peek().is_some_and(is_ident_char) {
            self.pos += 1;
        }
        self.source[start..self.pos].to_string()
    }

    fn parse_bracket(&mut self) -> Result<Segment, PathError> {
        self.expect(b'[')?;
        let segment = match self.peek() {
            Some(b'*') => {
                self.pos += 1;
                Segment::Wildcard
            }
            Some(b'?') => {
                self.pos += 1;
                self.parse_filter()?
            }
            Some(c) if c == b'-' || c.is_ascii_digit() => Segment::Index(self.parse_int()?),
            _ => return Err(self.error("expected index, '*' or '?' filter")),
        };
        self.expect(b']')?;
        Ok(segment)
    }

    fn parse_int(&mut self) -> Result<i64, PathError> {
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        self.source[start..self.pos]
            .parse()
            .map_err(|_| self.error("invalid index"))
    }

    fn parse_filter(&mut self) -> Result<Segment, PathError> {
        self.skip_whitespace();
        if !self.peek().is_some_and(is_ident_start) {
            return Err(self.error("expected field name in filter"));
        }
        let field = self.parse_ident();
        self.skip_whitespace();

        let negate = match (self.peek(), self.bytes.get(self.pos + 1).copied()) {
            (Some(b'='), Some(b'=')) => false,
            (Some(b'!'), Some(b'=')) => true,
            _ => return Err(self.error("expected '==' or '!='")),
        };
        self.pos += 2;
        self.skip_whitespace();

        let literal = self.parse_literal()?;
        self.skip_whitespace();

        Ok(Segment::Filter {
            field,
            negate,
            literal,
        })
    }

    fn parse_literal(&mut self) -> Result<Json, PathError> {
        let quote = match self.peek() {
            Some(q @ (b'\'' | b'`')) => q,
            _ => return Err(self.error("expected quoted literal")),
        };
        self.pos += 1;
        let start = self.pos;
        while self.peek().is_some_and(|c| c != quote) {
            self.pos += 1;
        }
        if self.peek().is_none() {
            return Err(self.error("unterminated literal"));
        }
        let raw = &self.source[start..self.pos];
        self.pos += 1;

        if quote == b'\'' {
            Ok(Json::String(raw.to_string()))
        } else {
            serde_json::from_str(raw).map_err(|e| self.error(format!("invalid JSON literal: {}", e)))
        }
    }
}

fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

fn is_ident_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_' || c == b'-'
}

/// Extract the value at `expression`, or `default` when it is missing
pub fn extract(document: &Json, expression: &str, default: Value) -> Result<Value, PathError> {
    let expr = PathExpr::parse(expression)?;
    Ok(expr
        .evaluate(document)
        .and_then(|v| Value::from_json(&v))
        .unwrap_or(default))
}

/// Extract a scalar as a string; numbers and booleans are rendered
pub fn extract_string(document: &Json, expression: &str) -> Result<Option<String>, PathError> {
    let expr = PathExpr::parse(expression)?;
    Ok(expr.evaluate(document).and_then(|v| match v {
        Json::String(s) => Some(s),
        Json::Number(n) => Some(n.to_string()),
        Json::Bool(b) => Some(b.to_string()),
        _ => None,
    }))
}

/// Flatten a document into attributes using each attribute's read path
///
/// Attributes whose path is missing are left out.
pub fn flatten(schema: &ResourceSchema, document: &Json) -> Result<HashMap<String, Value>, PathError> {
    let mut attributes = HashMap::new();
    for attr in schema.sorted_attributes() {
        let Some(path) = attr.read_path.as_deref() else {
            continue;
        };
        let expr = PathExpr::parse(path)?;
        if let Some(value) = expr.evaluate(document).and_then(|v| Value::from_json(&v)) {
            attributes.insert(attr.name.clone(), value);
        }
    }
    Ok(attributes)
}
