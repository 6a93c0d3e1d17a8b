//! A small path language for pulling scalar fields out of resources.
//!
//! Paths look like `url`, `$.snapshot.element[0].path` or
//! `entry.resource.url`. Evaluation follows collection semantics: applying a
//! key to an array applies it to every element, so `entry.resource.url`
//! yields the url of every bundle entry in order.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;
use thiserror::Error;

/// One step of a [`FieldPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldPathSegment {
    Key(String),
    Index(usize),
}

/// A parsed path expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    segments: Vec<FieldPathSegment>,
}

/// Syntax errors in a path expression.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FieldPathParseError {
    #[error("field path is empty")]
    Empty,
    #[error("unexpected end of input")]
    UnexpectedEnd,
    #[error("invalid index segment")]
    InvalidIndex,
    #[error("expected '.' before key segment")]
    MissingDot,
    #[error("invalid key segment")]
    InvalidKey,
}

impl FieldPath {
    /// Path consisting of a single key.
    pub fn key(key: impl Into<String>) -> Self {
        Self {
            segments: vec![FieldPathSegment::Key(key.into())],
        }
    }

    /// Extend the path with a key segment.
    pub fn child(mut self, key: impl Into<String>) -> Self {
        self.segments.push(FieldPathSegment::Key(key.into()));
        self
    }

    /// Extend the path with an index segment.
    pub fn index(mut self, index: usize) -> Self {
        self.segments.push(FieldPathSegment::Index(index));
        self
    }

    pub fn segments(&self) -> &[FieldPathSegment] {
        &self.segments
    }

    /// Evaluate against a JSON value, returning every matching node in
    /// document order.
    pub fn evaluate<'v>(&self, root: &'v Value) -> Vec<&'v Value> {
        let mut current = vec![root];

        for segment in &self.segments {
            let mut next = Vec::new();
            for value in current {
                match segment {
                    FieldPathSegment::Key(key) => collect_key(value, key, &mut next),
                    FieldPathSegment::Index(index) => {
                        if let Some(item) = value.as_array().and_then(|items| items.get(*index)) {
                            next.push(item);
                        }
                    }
                }
            }
            if next.is_empty() {
                return next;
            }
            current = next;
        }

        current
            .into_iter()
            .flat_map(|value| match value {
                Value::Array(items) => items.iter().collect(),
                other => vec![other],
            })
            .collect()
    }
}

fn collect_key<'v>(value: &'v Value, key: &str, out: &mut Vec<&'v Value>) {
    match value {
        Value::Object(map) => match map.get(key) {
            Some(Value::Null) | None => {}
            Some(found) => out.push(found),
        },
        Value::Array(items) => {
            for item in items {
                collect_key(item, key, out);
            }
        }
        _ => {}
    }
}

fn is_key_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_' || c == b'-'
}

impl FromStr for FieldPath {
    type Err = FieldPathParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let input = input.trim();
        let body = input.strip_prefix('$').unwrap_or(input);
        if body.is_empty() {
            return Err(FieldPathParseError::Empty);
        }

        let bytes = body.as_bytes();
        let mut position = 0;
        let mut segments = Vec::new();
        // A leading `$` must be followed by '.' or '['; a bare path starts
        // directly with a key.
        let mut expect_key = !input.starts_with('$');

        while position < bytes.len() {
            match bytes[position] {
                b'.' => {
                    if expect_key {
                        return Err(FieldPathParseError::InvalidKey);
                    }
                    position += 1;
                    if position >= bytes.len() {
                        return Err(FieldPathParseError::UnexpectedEnd);
                    }
                    expect_key = true;
                }
                b'[' => {
                    position += 1;
                    let start = position;
                    while position < bytes.len() && bytes[position].is_ascii_digit() {
                        position += 1;
                    }
                    if start == position || position >= bytes.len() || bytes[position] != b']' {
                        return Err(FieldPathParseError::InvalidIndex);
                    }
                    let index = body[start..position]
                        .parse::<usize>()
                        .map_err(|_| FieldPathParseError::InvalidIndex)?;
                    position += 1;
                    segments.push(FieldPathSegment::Index(index));
                    expect_key = false;
                }
                _ if expect_key => {
                    let start = position;
                    while position < bytes.len() && is_key_char(bytes[position]) {
                        position += 1;
                    }
                    if start == position {
                        return Err(FieldPathParseError::InvalidKey);
                    }
                    segments.push(FieldPathSegment::Key(body[start..position].to_string()));
                    expect_key = false;
                }
                _ => return Err(FieldPathParseError::MissingDot),
            }
        }

        if expect_key {
            return Err(FieldPathParseError::UnexpectedEnd);
        }

        Ok(Self { segments })
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                FieldPathSegment::Key(key) if i == 0 => write!(f, "{key}")?,
                FieldPathSegment::Key(key) => write!(f, ".{key}")?,
                FieldPathSegment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}
