//! Encoders and decoders for the physical representations a list-of-strings
//! column can hold.

use itertools::Itertools;
use serde_json::Value;
use thiserror::Error;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ListEncoding {
    /// Postgres-style array literal, `{"a","b"}`.
    NativeArray,
    /// JSON array text, `["a","b"]`.
    Json,
    /// Plain comma separated text, `a,b`.
    Delimited,
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("value {value:?} is not a valid {expected} list")]
pub struct ListDecodeError {
    pub expected: &'static str,
    pub value: String,
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{items:?} cannot be stored as a {encoding} list without loss")]
pub struct ListEncodeError {
    pub encoding: &'static str,
    pub items: Vec<String>,
}

impl ListEncoding {
    pub fn name(self) -> &'static str {
        match self {
            ListEncoding::NativeArray => "array literal",
            ListEncoding::Json => "json",
            ListEncoding::Delimited => "delimited",
        }
    }

    pub fn encode(self, items: &[String]) -> String {
        match self {
            ListEncoding::NativeArray => encode_array_literal(items),
            ListEncoding::Json => Value::from(items.to_vec()).to_string(),
            ListEncoding::Delimited => items.iter().join(","),
        }
    }

    /// Like [`ListEncoding::encode`], but fails if `decode_strict` would not
    /// give back `items`. Only delimited text can lose items: commas split
    /// them, surrounding blanks are trimmed and empty items are dropped.
    pub fn encode_exact(
        self,
        items: &[String],
    ) -> Result<String, ListEncodeError> {
        let lossless = match self {
            ListEncoding::NativeArray | ListEncoding::Json => true,
            ListEncoding::Delimited => {
                items.iter().all(|item| {
                    !item.is_empty() && !item.contains(',') && item.trim() == item
                }) && items
                    .first()
                    .is_none_or(|first| !first.starts_with(['[', '{']))
            }
        };
        if lossless {
            Ok(self.encode(items))
        } else {
            Err(ListEncodeError {
                encoding: self.name(),
                items: items.to_vec(),
            })
        }
    }

    /// Decodes `raw`, which must already be in this encoding.
    pub fn decode_strict(
        self,
        raw: &str,
    ) -> Result<Vec<String>, ListDecodeError> {
        let err = || ListDecodeError {
            expected: self.name(),
            value: raw.to_string(),
        };
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }
        match self {
            ListEncoding::NativeArray => {
                parse_array_literal(trimmed).ok_or_else(err)
            }
            ListEncoding::Json => parse_json_array(trimmed).ok_or_else(err),
            ListEncoding::Delimited => {
                if trimmed.starts_with('[') || trimmed.starts_with('{') {
                    Err(err())
                } else {
                    Ok(split_delimited(trimmed))
                }
            }
        }
    }
}

pub fn encode_array_literal(items: &[String]) -> String {
    let body = items
        .iter()
        .map(|item| {
            let escaped = item.replace('\\', "\\\\").replace('"', "\\\"");
            format!("\"{escaped}\"")
        })
        .join(",");
    format!("{{{body}}}")
}

/// Parses a one-dimensional array literal. Unquoted `NULL` elements are
/// dropped. Returns `None` for anything malformed, including nested arrays.
pub fn parse_array_literal(raw: &str) -> Option<Vec<String>> {
    let inner = raw.trim().strip_prefix('{')?.strip_suffix('}')?;
    if inner.trim().is_empty() {
        return Some(Vec::new());
    }

    let mut items = Vec::new();
    let mut chars = inner.chars().peekable();
    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}

        match chars.peek() {
            Some('"') => {
                chars.next();
                let mut item = String::new();
                loop {
                    match chars.next()? {
                        '\\' => item.push(chars.next()?),
                        '"' => break,
                        c => item.push(c),
                    }
                }
                while chars.next_if(|c| c.is_whitespace()).is_some() {}
                items.push(item);
            }
            _ => {
                let mut item = String::new();
                while let Some(c) = chars.next_if(|c| *c != ',') {
                    if matches!(c, '{' | '}' | '"') {
                        return None;
                    }
                    item.push(c);
                }
                let item = item.trim();
                if item.is_empty() {
                    return None;
                }
                if !item.eq_ignore_ascii_case("null") {
                    items.push(item.to_string());
                }
            }
        }

        match chars.next() {
            None => return Some(items),
            Some(',') => continue,
            Some(_) => return None,
        }
    }
}

/// Parses JSON array text into strings. Non-string scalars are rendered with
/// their JSON text, nulls are dropped.
pub fn parse_json_array(raw: &str) -> Option<Vec<String>> {
    match serde_json::from_str::<Value>(raw).ok()? {
        Value::Array(values) => Some(strings_of(values)),
        _ => None,
    }
}

pub fn strings_of(values: Vec<Value>) -> Vec<String> {
    values
        .into_iter()
        .filter_map(|value| match value {
            Value::Null => None,
            Value::String(s) => Some(s),
            other => Some(other.to_string()),
        })
        .collect()
}

pub fn split_delimited(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
