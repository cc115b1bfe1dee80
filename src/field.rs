//! Field extraction and type coercion
//!
//! Everything in XML is text, so a field value starts life as the XPath
//! string value of its selector. An optional parser reshapes that string, a
//! truthy static value may replace it, and the declared schema type decides
//! the final JSON shape.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Number, Value};
use tracing::warn;

use crate::config::FieldSpec;
use crate::namespace::ScopeOrder;
use crate::selector::{Item, scoped_context};

/// Suffix marking a schema type as required
pub const REQUIRED_MARKER: char = '!';

/// Whether `schema_type` carries the required marker
pub fn is_required(schema_type: &str) -> bool {
    schema_type.trim_end().ends_with(REQUIRED_MARKER)
}

/// The schema type with its required marker removed
pub fn strip_required_marker(schema_type: &str) -> &str {
    let trimmed = schema_type.trim();
    trimmed.strip_suffix(REQUIRED_MARKER).unwrap_or(trimmed)
}

/// How a raw field value is converted for its declared schema type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoercionKind {
    Boolean,
    Int,
    Float,
    /// Any other type (String, ID, lists, objects): passed through unchanged
    Raw,
}

impl CoercionKind {
    pub fn from_schema_type(schema_type: &str) -> Self {
        match strip_required_marker(schema_type) {
            "Boolean" => CoercionKind::Boolean,
            "Int" => CoercionKind::Int,
            "Float" => CoercionKind::Float,
            _ => CoercionKind::Raw,
        }
    }

    /// Convert a non-null value
    ///
    /// Unparseable numbers become NaN, which JSON cannot carry, so they
    /// surface as `Value::Null`.
    pub fn coerce(self, value: Value) -> Value {
        match self {
            CoercionKind::Boolean => Value::Bool(is_truthy(&value)),
            CoercionKind::Int => parse_int_prefix(&js_string(&value)),
            CoercionKind::Float => parse_float_prefix(&js_string(&value))
                .and_then(Number::from_f64)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            CoercionKind::Raw => value,
        }
    }
}

/// JavaScript-style truthiness
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// String form of a value, as the numeric parsers see it
fn js_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(js_string).collect::<Vec<_>>().join(","),
        Value::Object(_) => "[object Object]".to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn trim_leading_whitespace(s: &str) -> &str {
    s.trim_start_matches(|c: char| c.is_whitespace() || c == '\u{feff}')
}

/// Base-10 integer from the longest leading run of digits
fn parse_int_prefix(s: &str) -> Value {
    let s = trim_leading_whitespace(s);
    let (negative, rest) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let digits_len = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits_len == 0 {
        return Value::Null;
    }

    let digits = &rest[..digits_len];
    let signed = if negative {
        format!("-{}", digits)
    } else {
        digits.to_string()
    };

    match signed.parse::<i64>() {
        Ok(n) => Value::from(n),
        // Beyond i64: keep the magnitude as a float
        Err(_) => signed
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
    }
}

/// Floating-point number from the longest valid leading literal
fn parse_float_prefix(s: &str) -> Option<f64> {
    let s = trim_leading_whitespace(s);
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end += 1;
    }

    if s[end..].starts_with("Infinity") {
        let negative = bytes.first() == Some(&b'-');
        return Some(if negative {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        });
    }

    let int_digits = bytes[end..].iter().take_while(|b| b.is_ascii_digit()).count();
    end += int_digits;

    let mut frac_digits = 0;
    if bytes.get(end) == Some(&b'.') {
        frac_digits = bytes[end + 1..].iter().take_while(|b| b.is_ascii_digit()).count();
        if int_digits > 0 || frac_digits > 0 {
            end += 1 + frac_digits;
        }
    }

    if int_digits == 0 && frac_digits == 0 {
        return None;
    }

    if matches!(bytes.get(end), Some(b'e') | Some(b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+') | Some(b'-')) {
            exp_end += 1;
        }
        let exp_digits = bytes[exp_end..].iter().take_while(|b| b.is_ascii_digit()).count();
        if exp_digits > 0 {
            end = exp_end + exp_digits;
        }
    }

    s[..end].parse::<f64>().ok()
}

/// Transformation applied to a selector's string value before coercion
#[derive(Clone, Default)]
pub enum FieldParser {
    #[default]
    Identity,
    Trim,
    Lowercase,
    Uppercase,
    /// Parse the text as JSON, keeping the raw string when it is not JSON
    Json,
    /// Split on a separator into an array of trimmed, non-empty parts
    Split(String),
    Custom(Arc<dyn Fn(&str) -> Value + Send + Sync>),
}

impl FieldParser {
    pub fn custom(f: impl Fn(&str) -> Value + Send + Sync + 'static) -> Self {
        FieldParser::Custom(Arc::new(f))
    }

    pub fn apply(&self, input: &str) -> Value {
        match self {
            FieldParser::Identity => Value::String(input.to_string()),
            FieldParser::Trim => Value::String(input.trim().to_string()),
            FieldParser::Lowercase => Value::String(input.to_lowercase()),
            FieldParser::Uppercase => Value::String(input.to_uppercase()),
            FieldParser::Json => {
                serde_json::from_str(input).unwrap_or_else(|_| Value::String(input.to_string()))
            }
            FieldParser::Split(separator) => Value::Array(
                input
                    .split(separator.as_str())
                    .map(str::trim)
                    .filter(|part| !part.is_empty())
                    .map(|part| Value::String(part.to_string()))
                    .collect(),
            ),
            FieldParser::Custom(f) => f(input),
        }
    }

    pub fn name(&self) -> String {
        match self {
            FieldParser::Identity => "identity".to_string(),
            FieldParser::Trim => "trim".to_string(),
            FieldParser::Lowercase => "lowercase".to_string(),
            FieldParser::Uppercase => "uppercase".to_string(),
            FieldParser::Json => "json".to_string(),
            FieldParser::Split(separator) => format!("split:{}", separator),
            FieldParser::Custom(_) => "custom".to_string(),
        }
    }
}

impl FromStr for FieldParser {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(separator) = s.strip_prefix("split:") {
            if separator.is_empty() {
                return Err("split parser needs a separator, e.g. \"split:,\"".to_string());
            }
            return Ok(FieldParser::Split(separator.to_string()));
        }

        match s {
            "identity" => Ok(FieldParser::Identity),
            "trim" => Ok(FieldParser::Trim),
            "lowercase" => Ok(FieldParser::Lowercase),
            "uppercase" => Ok(FieldParser::Uppercase),
            "json" => Ok(FieldParser::Json),
            other => Err(format!("unknown field parser: {}", other)),
        }
    }
}

impl fmt::Debug for FieldParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldParser({})", self.name())
    }
}

impl PartialEq for FieldParser {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FieldParser::Custom(a), FieldParser::Custom(b)) => Arc::ptr_eq(a, b),
            (a, b) => a.name() == b.name(),
        }
    }
}

impl Serialize for FieldParser {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.name())
    }
}

impl<'de> Deserialize<'de> for FieldParser {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

/// Extract and coerce one field of one item
///
/// `None` stands for null. Required-field enforcement is left to the caller.
pub fn map_field(spec: &FieldSpec, item: Item<'_>, order: ScopeOrder) -> Option<Value> {
    let mut value = None;

    if let Some(selector) = spec.selector.as_deref().filter(|s| !s.is_empty()) {
        let expression = format!("string({})", selector);
        let selection = scoped_context(item, order)
            .and_then(|mut context| context.evaluate_string(item, &expression));

        match selection {
            Ok(text) => value = Some(spec.parser.apply(&text)),
            Err(e) => warn!(selector, error = %e, "field selector could not be evaluated"),
        }
    }

    // A truthy static value always wins; a falsy one never does
    if let Some(static_value) = spec.static_value.as_ref().filter(|v| is_truthy(v)) {
        value = Some(static_value.clone());
    }

    let value = value.filter(|v| !v.is_null())?;
    Some(CoercionKind::from_schema_type(&spec.schema_type).coerce(value))
}
