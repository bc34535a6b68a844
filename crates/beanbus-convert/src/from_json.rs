// SPDX-License-Identifier: MIT OR Apache-2.0
//! JSON-to-value conversion, driven by the declared target type.
//!
//! Write and exec requests carry raw JSON; the declared attribute or
//! parameter type from the bean metadata selects an extractor.  Scalar
//! extractors also accept the string forms used by GET-encoded values,
//! where `[null]` stands for a JSON null.

use beanbus_core::{BeanValue, CompositeValue, FieldInfo};
use beanbus_error::BridgeError;
use serde_json::Value;
use std::collections::BTreeMap;

/// GET-encoded stand-in for a null value.
const WIRE_NULL: &str = "[null]";

type Extractor = fn(&str, &Value) -> Result<BeanValue, BridgeError>;

// Extractor table: declared type name (with aliases) to conversion
// function.  Lookup is by exact name, then by the `composite:` prefix.
const EXTRACTORS: &[(&[&str], Extractor)] = &[
    (&["bool", "boolean"], extract_bool),
    (&["int", "integer", "long", "short", "byte"], extract_int),
    (&["double", "float"], extract_float),
    (&["string", "text"], extract_text),
    (&["list"], extract_list),
    (&["set"], extract_set),
    (&["map"], extract_map),
    (&["tabular"], extract_tabular),
    (&["void"], extract_void),
];

/// Whether the declared type name is known to the extractor table.
#[must_use]
pub fn known_type(declared: &str) -> bool {
    declared == "composite"
        || declared.starts_with("composite:")
        || (declared.starts_with('[') && declared.ends_with(']'))
        || EXTRACTORS
            .iter()
            .any(|(names, _)| names.contains(&declared))
}

/// Convert a JSON value to a [`BeanValue`] of the declared type.
///
/// Composite types need their field schema; use [`from_json_typed`] when
/// the bean metadata carries one.
pub fn from_json(declared: &str, value: &Value) -> Result<BeanValue, BridgeError> {
    from_json_typed(declared, &[], value)
}

/// Convert a JSON value to a [`BeanValue`] of the declared type, with the
/// declaring metadata's composite field schema.
pub fn from_json_typed(
    declared: &str,
    fields: &[FieldInfo],
    value: &Value,
) -> Result<BeanValue, BridgeError> {
    if value.is_null() {
        return Ok(BeanValue::Null);
    }
    if declared == "composite" || declared.starts_with("composite:") {
        let composite_type = declared.strip_prefix("composite:").unwrap_or("");
        return extract_composite(composite_type, fields, value);
    }
    // Array types are written as `[<element type>]`.
    if let Some(element) = declared.strip_prefix('[').and_then(|d| d.strip_suffix(']')) {
        return extract_array(element, value);
    }
    for (names, extractor) in EXTRACTORS {
        if names.contains(&declared) {
            return extractor(declared, value);
        }
    }
    Err(BridgeError::invalid(format!(
        "no converter for declared type {declared:?}"
    )))
}

/// Convert a GET path segment to a [`BeanValue`] of the declared type.
pub fn from_wire_string(declared: &str, raw: &str) -> Result<BeanValue, BridgeError> {
    if raw == WIRE_NULL {
        return Ok(BeanValue::Null);
    }
    from_json(declared, &Value::String(raw.to_owned()))
}

fn mismatch(declared: &str, value: &Value) -> BridgeError {
    BridgeError::invalid(format!(
        "cannot convert {value} to declared type {declared:?}"
    ))
}

// -- Scalars ----------------------------------------------------------------

fn extract_bool(declared: &str, value: &Value) -> Result<BeanValue, BridgeError> {
    match value {
        Value::Bool(b) => Ok(BeanValue::Bool(*b)),
        Value::String(s) => match s.as_str() {
            "true" => Ok(BeanValue::Bool(true)),
            "false" => Ok(BeanValue::Bool(false)),
            _ => Err(mismatch(declared, value)),
        },
        _ => Err(mismatch(declared, value)),
    }
}

fn extract_int(declared: &str, value: &Value) -> Result<BeanValue, BridgeError> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .map(BeanValue::Int)
            .ok_or_else(|| mismatch(declared, value)),
        Value::String(s) => s
            .parse()
            .map(BeanValue::Int)
            .map_err(|_| mismatch(declared, value)),
        _ => Err(mismatch(declared, value)),
    }
}

fn extract_float(declared: &str, value: &Value) -> Result<BeanValue, BridgeError> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .map(BeanValue::Float)
            .ok_or_else(|| mismatch(declared, value)),
        Value::String(s) => s
            .parse()
            .map(BeanValue::Float)
            .map_err(|_| mismatch(declared, value)),
        _ => Err(mismatch(declared, value)),
    }
}

fn extract_text(declared: &str, value: &Value) -> Result<BeanValue, BridgeError> {
    match value {
        Value::String(s) => Ok(BeanValue::Text(s.clone())),
        Value::Number(n) => Ok(BeanValue::Text(n.to_string())),
        Value::Bool(b) => Ok(BeanValue::Text(b.to_string())),
        _ => Err(mismatch(declared, value)),
    }
}

fn extract_void(declared: &str, value: &Value) -> Result<BeanValue, BridgeError> {
    match value {
        Value::Null => Ok(BeanValue::Null),
        Value::String(s) if s.is_empty() => Ok(BeanValue::Null),
        _ => Err(mismatch(declared, value)),
    }
}

// -- Shapes -----------------------------------------------------------------

/// Element conversion when no element type is declared: infer from the
/// JSON shape.
fn infer(value: &Value) -> BeanValue {
    match value {
        Value::Null => BeanValue::Null,
        Value::Bool(b) => BeanValue::Bool(*b),
        Value::Number(n) => n
            .as_i64()
            .map(BeanValue::Int)
            .or_else(|| n.as_f64().map(BeanValue::Float))
            .unwrap_or_else(|| BeanValue::Text(n.to_string())),
        Value::String(s) => BeanValue::Text(s.clone()),
        Value::Array(items) => BeanValue::Seq(items.iter().map(infer).collect()),
        Value::Object(entries) => BeanValue::Map(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), infer(v)))
                .collect(),
        ),
    }
}

fn elements<'v>(declared: &str, value: &'v Value) -> Result<&'v Vec<Value>, BridgeError> {
    value.as_array().ok_or_else(|| mismatch(declared, value))
}

fn extract_list(declared: &str, value: &Value) -> Result<BeanValue, BridgeError> {
    Ok(BeanValue::Seq(
        elements(declared, value)?.iter().map(infer).collect(),
    ))
}

fn extract_set(declared: &str, value: &Value) -> Result<BeanValue, BridgeError> {
    let mut items: Vec<BeanValue> = Vec::new();
    for item in elements(declared, value)? {
        let converted = infer(item);
        if !items.contains(&converted) {
            items.push(converted);
        }
    }
    Ok(BeanValue::Set(items))
}

fn extract_map(declared: &str, value: &Value) -> Result<BeanValue, BridgeError> {
    let entries = value.as_object().ok_or_else(|| mismatch(declared, value))?;
    Ok(BeanValue::Map(
        entries
            .iter()
            .map(|(k, v)| (k.clone(), infer(v)))
            .collect(),
    ))
}

fn extract_array(element: &str, value: &Value) -> Result<BeanValue, BridgeError> {
    let items = elements(element, value)?
        .iter()
        .map(|item| from_json(element, item))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(BeanValue::Seq(items))
}

fn extract_composite(
    type_name: &str,
    fields: &[FieldInfo],
    value: &Value,
) -> Result<BeanValue, BridgeError> {
    let display = if type_name.is_empty() { "composite" } else { type_name };
    let entries = value.as_object().ok_or_else(|| {
        BridgeError::invalid(format!(
            "composite values require a JSON object literal, got {value}"
        ))
    })?;
    // Without a declared schema there is nothing to validate against.
    if fields.is_empty() {
        return Err(BridgeError::invalid(format!(
            "composite type {display} declares no field schema"
        )));
    }

    // The object literal must carry exactly the declared fields.
    let missing: Vec<&str> = fields
        .iter()
        .filter(|field| !entries.contains_key(&field.name))
        .map(|field| field.name.as_str())
        .collect();
    let unknown: Vec<&str> = entries
        .keys()
        .filter(|key| fields.iter().all(|field| &field.name != *key))
        .map(String::as_str)
        .collect();
    if !missing.is_empty() || !unknown.is_empty() {
        return Err(BridgeError::invalid(format!(
            "composite type {display} field mismatch: missing [{}], unknown [{}]",
            missing.join(", "),
            unknown.join(", ")
        )));
    }

    let converted = fields
        .iter()
        .map(|field| match entries.get(&field.name) {
            Some(field_value) => {
                Ok((field.name.clone(), from_json(&field.type_name, field_value)?))
            }
            None => Ok((field.name.clone(), BeanValue::Null)),
        })
        .collect::<Result<BTreeMap<String, BeanValue>, BridgeError>>()?;
    Ok(BeanValue::Composite(CompositeValue {
        type_name: display.to_owned(),
        fields: converted,
    }))
}

fn extract_tabular(declared: &str, value: &Value) -> Result<BeanValue, BridgeError> {
    // Tabular values cannot be reconstructed without their index schema.
    Err(BridgeError::Unsupported(format!(
        "cannot build a {declared} value from {value}"
    )))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
