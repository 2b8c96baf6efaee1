//! # Field Paths
//!
//! Field names address values inside the form document using dot and
//! bracket notation:
//!
//! ```text
//! email              → { "email": … }
//! address.city       → { "address": { "city": … } }
//! phones[1].number   → { "phones": [_, { "number": … }] }
//! ```
//!
//! Reads never fail: a missing segment reads as `null`. Writes are
//! copy-on-write. [`FieldPath::set`] clones the document, assigns into the
//! clone and returns it, so a reader holding the previous document never
//! observes a partial write.

use crate::errors::PathError;
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Largest bracket index a path may name. Assignment pads the array up to
/// the index, so the bound also caps how much a single write allocates.
pub const MAX_INDEX: usize = 1 << 16;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// Parsed dot/bracket path into a form document
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    raw: String,
    segments: Vec<PathSegment>,
}

impl FieldPath {
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        if raw.trim().is_empty() {
            return Err(PathError::Empty);
        }

        let syntax = |reason: &str| PathError::Syntax {
            path: raw.to_string(),
            reason: reason.to_string(),
        };

        let mut segments = Vec::new();
        let mut key = String::new();
        let mut chars = raw.chars().peekable();
        // True right after a closing bracket, where only `.` or `[` may follow
        let mut after_index = false;

        while let Some(c) = chars.next() {
            match c {
                '.' => {
                    if key.is_empty() && !after_index {
                        return Err(syntax("empty segment"));
                    }
                    if !key.is_empty() {
                        segments.push(PathSegment::Key(std::mem::take(&mut key)));
                    }
                    after_index = false;
                    if chars.peek().is_none() {
                        return Err(syntax("trailing dot"));
                    }
                }
                '[' => {
                    if !key.is_empty() {
                        segments.push(PathSegment::Key(std::mem::take(&mut key)));
                    }
                    let mut digits = String::new();
                    let mut closed = false;
                    for d in chars.by_ref() {
                        if d == ']' {
                            closed = true;
                            break;
                        }
                        digits.push(d);
                    }
                    if !closed {
                        return Err(syntax("unclosed bracket"));
                    }
                    let index = digits
                        .trim()
                        .parse::<usize>()
                        .map_err(|_| syntax("bracket index must be a non-negative integer"))?;
                    if index > MAX_INDEX {
                        return Err(syntax("bracket index out of range"));
                    }
                    segments.push(PathSegment::Index(index));
                    after_index = true;
                }
                ']' => return Err(syntax("unexpected `]`")),
                c if c.is_whitespace() => return Err(syntax("whitespace in path")),
                c => {
                    if after_index {
                        return Err(syntax("expected `.` or `[` after index"));
                    }
                    key.push(c);
                }
            }
        }

        if !key.is_empty() {
            segments.push(PathSegment::Key(key));
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Borrow the value at this path, if every segment resolves
    pub fn get<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        let mut current = root;
        for segment in &self.segments {
            current = match (segment, current) {
                (PathSegment::Key(key), Value::Object(map)) => map.get(key)?,
                (PathSegment::Index(index), Value::Array(items)) => items.get(*index)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Read the value at this path, `null` when missing
    pub fn read(&self, root: &Value) -> Value {
        self.get(root).cloned().unwrap_or(Value::Null)
    }

    /// Copy-on-write assignment: returns a new document with `value` at this path
    pub fn set(&self, root: &Value, value: Value) -> Result<Value, PathError> {
        let mut next = root.clone();
        self.assign(&mut next, value)?;
        Ok(next)
    }

    /// In-place assignment on a document the caller exclusively owns
    pub fn assign(&self, target: &mut Value, value: Value) -> Result<(), PathError> {
        assign_at(target, &self.segments, value, &self.raw)
    }
}

fn assign_at(
    target: &mut Value,
    segments: &[PathSegment],
    value: Value,
    path: &str,
) -> Result<(), PathError> {
    let Some((head, rest)) = segments.split_first() else {
        *target = value;
        return Ok(());
    };

    match head {
        PathSegment::Key(key) => {
            if target.is_null() {
                *target = Value::Object(Map::new());
            }
            match target {
                Value::Object(map) => {
                    let slot = map.entry(key.clone()).or_insert(Value::Null);
                    assign_at(slot, rest, value, path)
                }
                other => Err(PathError::Binding {
                    path: path.to_string(),
                    reason: format!("cannot assign key `{}` inside {}", key, kind_of(other)),
                }),
            }
        }
        PathSegment::Index(index) => {
            if target.is_null() {
                *target = Value::Array(Vec::new());
            }
            match target {
                Value::Array(items) => {
                    let len = index
                        .checked_add(1)
                        .filter(|len| *len <= MAX_INDEX + 1)
                        .ok_or_else(|| PathError::Binding {
                            path: path.to_string(),
                            reason: format!("index {} out of range", index),
                        })?;
                    if items.len() < len {
                        items.resize(len, Value::Null);
                    }
                    assign_at(&mut items[*index], rest, value, path)
                }
                other => Err(PathError::Binding {
                    path: path.to_string(),
                    reason: format!("cannot assign index {} inside {}", index, kind_of(other)),
                }),
            }
        }
    }
}

pub(crate) fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

impl FromStr for FieldPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
