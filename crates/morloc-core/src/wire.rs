//! Universal wire encoding.
//!
//! The language-neutral text form that pools exchange on the command line
//! and on standard output:
//!
//! - `Int`, `Num`, `String`, `Bool` are their plain text (`42`, `1.5`, `hi`, `true`)
//! - `File` is its path, `Text` is the streamed content
//! - arrays and tuples are a bracketed, comma-joined sequence of element
//!   encodings; string-like elements are JSON-quoted so commas and brackets
//!   survive, which makes every composite a JSON array
//! - the empty text is the absent value, produced when a foreign call fails
//!
//! Generated pools carry their own copies of these rules; this module is the
//! reference the compiler validates IR literals against.

use crate::error::{Error, Result};
use crate::ir::{Atom, Type};

/// A decoded wire value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Num(f64),
    String(String),
    File(String),
    Bool(bool),
    Text(String),
    Array(Vec<Value>),
    Tuple(Vec<Value>),
    Void,
    /// Absent result of a failed foreign call.
    Absent,
}

/// Encode a value to its top-level wire text.
pub fn encode(value: &Value) -> String {
    match value {
        Value::Int(i) => i.to_string(),
        Value::Num(n) => encode_num(*n),
        Value::String(s) | Value::File(s) | Value::Text(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Array(items) | Value::Tuple(items) => {
            let parts: Vec<String> = items.iter().map(encode_element).collect();
            format!("[{}]", parts.join(","))
        }
        Value::Void | Value::Absent => String::new(),
    }
}

fn encode_num(n: f64) -> String {
    // Debug keeps a decimal point on integral values so they read back as Num
    format!("{n:?}")
}

fn encode_element(value: &Value) -> String {
    match value {
        Value::String(s) | Value::File(s) | Value::Text(s) => {
            serde_json::Value::String(s.clone()).to_string()
        }
        Value::Void | Value::Absent => "null".to_string(),
        other => encode(other),
    }
}

/// Decode top-level wire text under the given type.
pub fn decode(ty: &Type, text: &str) -> Result<Value> {
    let invalid = || Error::InvalidType(format!("'{text}' is not a valid {ty}"));

    match ty {
        Type::Atom(Atom::String) => Ok(Value::String(text.to_string())),
        Type::Atom(Atom::File) => Ok(Value::File(text.to_string())),
        Type::Atom(Atom::Text) => Ok(Value::Text(text.to_string())),
        Type::Atom(Atom::Void) => Ok(Value::Void),
        _ if text.is_empty() => Ok(Value::Absent),
        Type::Atom(Atom::Int) => text.parse().map(Value::Int).map_err(|_| invalid()),
        Type::Atom(Atom::Num) => parse_num(text).map(Value::Num).ok_or_else(invalid),
        Type::Atom(Atom::Bool) => match text {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(invalid()),
        },
        Type::Array(_) | Type::Tuple(_) => {
            let json: serde_json::Value = serde_json::from_str(text).map_err(|_| invalid())?;
            from_json(ty, &json).ok_or_else(invalid)
        }
    }
}

/// Finite decimal or exponent notation only. Rust also reads `inf` and
/// `NaN`, which no pool language accepts as a literal.
fn parse_num(text: &str) -> Option<f64> {
    let numeric = text
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.' | b'e' | b'E'));
    if !numeric {
        return None;
    }
    text.parse::<f64>().ok().filter(|n| n.is_finite())
}

fn from_json(ty: &Type, json: &serde_json::Value) -> Option<Value> {
    match ty {
        Type::Atom(Atom::Int) => json.as_i64().map(Value::Int),
        Type::Atom(Atom::Num) => json.as_f64().map(Value::Num),
        Type::Atom(Atom::Bool) => json.as_bool().map(Value::Bool),
        Type::Atom(Atom::String) => json.as_str().map(|s| Value::String(s.to_string())),
        Type::Atom(Atom::File) => json.as_str().map(|s| Value::File(s.to_string())),
        Type::Atom(Atom::Text) => json.as_str().map(|s| Value::Text(s.to_string())),
        Type::Atom(Atom::Void) => json.is_null().then_some(Value::Void),
        Type::Array(inner) => json
            .as_array()?
            .iter()
            .map(|item| from_json(inner, item))
            .collect::<Option<Vec<_>>>()
            .map(Value::Array),
        Type::Tuple(items) => {
            let array = json.as_array()?;
            if array.len() != items.len() {
                return None;
            }
            items
                .iter()
                .zip(array)
                .map(|(ty, item)| from_json(ty, item))
                .collect::<Option<Vec<_>>>()
                .map(Value::Tuple)
        }
    }
}
