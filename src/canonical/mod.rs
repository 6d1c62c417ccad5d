//! Coercion of loosely typed payload fields into canonical values.
//!
//! Booleans and lists are forgiving: anything we cannot make sense of
//! degrades to `false` or an empty list and is only logged. Numbers and
//! natural keys are strict, since a bad value there is a client bug.

use chrono::NaiveDateTime;
use serde_json::{Map, Value};

use crate::error::ValidationError;
use crate::records::Column;

pub mod list;

use list::{parse_array_literal, parse_json_array, split_delimited, strings_of};

/// A plain key-value payload, as handed over by the request layer.
pub type Payload = Map<String, Value>;

pub fn coerce_bool(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64() == Some(1.0),
        Some(Value::String(s)) => {
            let s = s.trim();
            if s == "1" || s.eq_ignore_ascii_case("true") {
                true
            } else {
                if !(s.is_empty() || s == "0" || s.eq_ignore_ascii_case("false"))
                {
                    tracing::debug!(value = s, "treating unrecognised flag as false");
                }
                false
            }
        }
        Some(other) => {
            tracing::debug!(%other, "treating non-scalar flag as false");
            false
        }
    }
}

/// Coerces a list field. Rules are tried in order and a rule that fails to
/// parse falls through to the next one, so this never fails.
pub fn coerce_list(value: Option<&Value>) -> Vec<String> {
    let raw = match value {
        None | Some(Value::Null) => return Vec::new(),
        Some(Value::Array(values)) => return strings_of(values.clone()),
        Some(Value::String(s)) => s.trim(),
        Some(other) => return vec![other.to_string()],
    };

    if raw.is_empty() {
        return Vec::new();
    }
    if raw.starts_with('[') {
        if let Some(items) = parse_json_array(raw) {
            return items;
        }
        tracing::warn!(value = raw, "list field looked like json but did not parse");
    }
    if raw.starts_with('{') {
        if let Some(items) = parse_array_literal(raw) {
            return items;
        }
        tracing::warn!(
            value = raw,
            "list field looked like an array literal but did not parse"
        );
    }
    if raw.contains(',') {
        return split_delimited(raw);
    }
    vec![raw.to_string()]
}

pub fn coerce_number(
    field: &'static str,
    value: Option<&Value>,
) -> Result<Option<f64>, ValidationError> {
    let parsed = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => {
            let s = s.trim();
            if s.is_empty() {
                return Ok(None);
            }
            s.parse::<f64>().ok()
        }
        Some(_) => None,
    };

    match parsed {
        Some(n) if n.is_finite() => Ok(Some(n)),
        Some(_) => Err(ValidationError::NonFinite { field }),
        None => Err(ValidationError::NotANumber {
            field,
            value: display_value(value),
        }),
    }
}

/// Natural keys must be positive integers which fit in an `i32`.
pub fn coerce_key(
    field: &'static str,
    value: Option<&Value>,
) -> Result<i32, ValidationError> {
    let invalid = || ValidationError::InvalidKey {
        field,
        value: display_value(value),
    };
    let n = match value {
        None | Some(Value::Null) => {
            return Err(ValidationError::MissingKey { field });
        }
        Some(Value::String(s)) if s.trim().is_empty() => {
            return Err(ValidationError::MissingKey { field });
        }
        Some(Value::String(s)) => s.trim().parse::<i64>().map_err(|_| invalid())?,
        Some(Value::Number(n)) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => i,
            (None, Some(f)) if f.fract() == 0.0 && f.abs() < 1e12 => f as i64,
            _ => return Err(invalid()),
        },
        Some(_) => return Err(invalid()),
    };

    i32::try_from(n)
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(invalid)
}

/// Enum-like strings: trimmed, with empty meaning absent.
pub fn coerce_choice(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) => {
            Some(s.trim()).filter(|s| !s.is_empty()).map(str::to_string)
        }
        Some(Value::Number(n)) => Some(n.to_string()),
        None | Some(Value::Null) => None,
        Some(other) => {
            tracing::debug!(%other, "ignoring non-scalar choice");
            None
        }
    }
}

pub fn coerce_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn display_value(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => format!("{s:?}"),
        Some(other) => other.to_string(),
        None => "nothing".to_string(),
    }
}

/// Field accessor over a payload. Columns are looked up by their payload
/// name first and then by their column name.
pub struct Fields<'a> {
    payload: &'a Payload,
}

impl<'a> Fields<'a> {
    pub fn new(payload: &'a Payload) -> Self {
        Self { payload }
    }

    fn get(&self, column: &Column) -> Option<&'a Value> {
        self.payload
            .get(column.field)
            .or_else(|| self.payload.get(column.name))
    }

    pub fn key(&self, column: &Column) -> Result<i32, ValidationError> {
        coerce_key(column.field, self.get(column))
    }

    pub fn flag(&self, column: &Column) -> bool {
        coerce_bool(self.get(column))
    }

    pub fn list(&self, column: &Column) -> Vec<String> {
        coerce_list(self.get(column))
    }

    pub fn number(
        &self,
        column: &Column,
    ) -> Result<Option<f64>, ValidationError> {
        coerce_number(column.field, self.get(column))
    }

    pub fn choice(&self, column: &Column) -> Option<String> {
        coerce_choice(self.get(column))
    }

    pub fn text(&self, column: &Column) -> String {
        coerce_text(self.get(column))
    }
}

// Read side. Columns arrive as text (or NULL) whatever their storage class;
// these never fail and log whatever they had to discard.

pub fn materialize_list(column: &str, raw: Option<&str>) -> Vec<String> {
    let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return Vec::new();
    };
    let parsed = if raw.starts_with('[') {
        parse_json_array(raw)
    } else if raw.starts_with('{') {
        parse_array_literal(raw)
    } else {
        Some(split_delimited(raw))
    };
    parsed.unwrap_or_else(|| {
        tracing::warn!(column, value = raw, "unparseable list column, reading as empty");
        Vec::new()
    })
}

pub fn materialize_flag(raw: Option<&str>) -> bool {
    match raw.map(str::trim) {
        Some(s) => {
            s.eq_ignore_ascii_case("true")
                || s.parse::<f64>().is_ok_and(|n| n == 1.0)
        }
        None => false,
    }
}

pub fn materialize_number(column: &str, raw: Option<&str>) -> Option<f64> {
    let raw = raw.map(str::trim).filter(|raw| !raw.is_empty())?;
    match raw.parse::<f64>() {
        Ok(n) if n.is_finite() => Some(n),
        _ => {
            tracing::warn!(column, value = raw, "unparseable number column, reading as null");
            None
        }
    }
}

pub fn materialize_choice(raw: Option<String>) -> Option<String> {
    raw.filter(|s| !s.trim().is_empty())
}

pub fn materialize_key(column: &str, raw: Option<&str>) -> i32 {
    raw.map(str::trim)
        .and_then(|raw| {
            raw.parse::<i32>()
                .ok()
                .or_else(|| raw.parse::<f64>().ok().map(|f| f as i32))
        })
        .unwrap_or_else(|| {
            tracing::warn!(column, value = ?raw, "unparseable key column");
            0
        })
}

pub fn materialize_id(raw: Option<&str>) -> i64 {
    raw.and_then(|raw| raw.trim().parse::<i64>().ok())
        .unwrap_or_else(|| {
            tracing::warn!(value = ?raw, "unparseable surrogate id");
            0
        })
}

pub fn materialize_timestamp(
    column: &str,
    raw: Option<&str>,
) -> Option<NaiveDateTime> {
    let raw = raw.map(str::trim).filter(|raw| !raw.is_empty())?;
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .or_else(|| {
            tracing::warn!(column, value = raw, "unparseable timestamp");
            None
        })
}
