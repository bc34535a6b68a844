// SPDX-License-Identifier: MIT OR Apache-2.0
//! Builders turning GET path-encoded and POST JSON-encoded requests into
//! typed [`BridgeRequest`]s.
//!
//! GET grammar, after the endpoint prefix is stripped:
//!
//! ```text
//! read/<name>/<attr?>/<inner path…>
//! write/<name>/<attr>/<value>/<inner path…>
//! exec/<name>/<op>/<arg1>/<arg2>/…
//! search/<pattern>
//! list/<inner path…>
//! version
//! notification/<command>/<client?>
//! ```
//!
//! POST bodies are a single JSON object or an array of them; unknown keys
//! are rejected.  Processing options may arrive via query parameters and
//! via the body's `config` object; the body wins field-wise.

use crate::path;
use crate::request::{
    AttributeSpec, BridgeRequest, ExecRequest, ListRequest, NotificationCommand,
    NotificationRequest, ProcessingOptions, ReadRequest, SearchRequest, TargetSpec, VersionRequest,
    Verb, WriteRequest,
};
use beanbus_core::ObjectName;
use beanbus_error::BridgeError;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Query parameters
// ---------------------------------------------------------------------------

fn parse_flag(key: &str, raw: &str) -> Result<bool, BridgeError> {
    match raw {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(BridgeError::invalid(format!(
            "parameter {key} expects a boolean, got {other:?}"
        ))),
    }
}

fn parse_limit(key: &str, raw: &str) -> Result<usize, BridgeError> {
    raw.parse().map_err(|_| {
        BridgeError::invalid(format!(
            "parameter {key} expects a non-negative integer, got {raw:?}"
        ))
    })
}

/// Extract processing options from query parameters.
///
/// Unrecognised parameters are ignored; transports are free to add their
/// own (e.g. cache busters).
pub fn options_from_params(
    params: &BTreeMap<String, String>,
) -> Result<ProcessingOptions, BridgeError> {
    let mut opts = ProcessingOptions::default();
    for (key, raw) in params {
        match key.as_str() {
            "maxDepth" => opts.max_depth = Some(parse_limit(key, raw)?),
            "maxCollectionSize" => opts.max_collection_size = Some(parse_limit(key, raw)?),
            "maxObjects" => opts.max_objects = Some(parse_limit(key, raw)?),
            "ignoreErrors" => opts.ignore_errors = Some(parse_flag(key, raw)?),
            "includeStackTrace" => opts.include_stack_trace = Some(parse_flag(key, raw)?),
            "serializeException" => opts.serialize_exception = Some(parse_flag(key, raw)?),
            "canonicalNaming" => opts.canonical_naming = Some(parse_flag(key, raw)?),
            _ => {}
        }
    }
    Ok(opts)
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

fn parse_name(raw: &str) -> Result<ObjectName, BridgeError> {
    ObjectName::parse(raw).map_err(BridgeError::from)
}

fn require_concrete(name: ObjectName, verb: Verb) -> Result<ObjectName, BridgeError> {
    if name.is_pattern() {
        return Err(BridgeError::invalid(format!(
            "{verb} requires a concrete object name, got pattern {name}"
        )));
    }
    Ok(name)
}

// ---------------------------------------------------------------------------
// GET
// ---------------------------------------------------------------------------

/// Build a request from a GET path (endpoint prefix already stripped) and
/// its query parameters.
pub fn from_get(
    path_info: &str,
    params: &BTreeMap<String, String>,
) -> Result<BridgeRequest, BridgeError> {
    let options = options_from_params(params)?;
    // Trim the leading slash only; a trailing `/` might be the escaped
    // tail of a segment, so trailing emptiness is dropped after decoding.
    let mut segments = path::split(path_info.trim_start_matches('/'));
    while segments.last().is_some_and(String::is_empty) {
        segments.pop();
    }

    let Some(verb_token) = segments.first().filter(|s| !s.is_empty()) else {
        // A bare endpoint hit answers with version information.
        return Ok(BridgeRequest::Version(VersionRequest { options }));
    };
    let verb = Verb::from_wire(verb_token)
        .ok_or_else(|| BridgeError::invalid(format!("unknown request verb {verb_token:?}")))?;
    let rest = &segments[1..];

    match verb {
        Verb::Read => {
            let name_raw = rest
                .first()
                .ok_or_else(|| BridgeError::invalid("read requires an object name"))?;
            let attributes = match rest.get(1) {
                None => AttributeSpec::All,
                Some(a) if a.is_empty() => AttributeSpec::All,
                Some(a) => AttributeSpec::One(a.clone()),
            };
            Ok(BridgeRequest::Read(ReadRequest {
                name: parse_name(name_raw)?,
                attributes,
                path: rest.get(2..).unwrap_or_default().to_vec(),
                options,
                target: None,
            }))
        }
        Verb::Write => {
            let [name_raw, attribute, value] = rest.get(..3).and_then(|s| {
                <&[String; 3]>::try_from(s).ok()
            }).ok_or_else(|| {
                BridgeError::invalid("write requires an object name, an attribute, and a value")
            })?;
            Ok(BridgeRequest::Write(WriteRequest {
                name: require_concrete(parse_name(name_raw)?, verb)?,
                attribute: attribute.clone(),
                value: Value::String(value.clone()),
                path: rest.get(3..).unwrap_or_default().to_vec(),
                options,
                target: None,
            }))
        }
        Verb::Exec => {
            let [name_raw, operation] = rest.get(..2).and_then(|s| {
                <&[String; 2]>::try_from(s).ok()
            }).ok_or_else(|| {
                BridgeError::invalid("exec requires an object name and an operation")
            })?;
            let arguments = rest
                .get(2..)
                .unwrap_or_default()
                .iter()
                .map(|arg| Value::String(arg.clone()))
                .collect();
            Ok(BridgeRequest::Exec(ExecRequest {
                name: require_concrete(parse_name(name_raw)?, verb)?,
                operation: operation.clone(),
                arguments,
                path: Vec::new(),
                options,
                target: None,
            }))
        }
        Verb::List => Ok(BridgeRequest::List(ListRequest {
            path: rest.to_vec(),
            options,
            target: None,
        })),
        Verb::Search => {
            let pattern_raw = rest
                .first()
                .ok_or_else(|| BridgeError::invalid("search requires a name pattern"))?;
            Ok(BridgeRequest::Search(SearchRequest {
                pattern: parse_name(pattern_raw)?,
                options,
                target: None,
            }))
        }
        Verb::Version => Ok(BridgeRequest::Version(VersionRequest { options })),
        Verb::Notification => {
            let command_raw = rest
                .first()
                .ok_or_else(|| BridgeError::invalid("notification requires a command"))?;
            let command = NotificationCommand::from_wire(command_raw).ok_or_else(|| {
                BridgeError::invalid(format!("unknown notification command {command_raw:?}"))
            })?;
            Ok(BridgeRequest::Notification(NotificationRequest {
                command,
                client: rest.get(1).cloned(),
                options,
            }))
        }
    }
}

// ---------------------------------------------------------------------------
// POST
// ---------------------------------------------------------------------------

/// The decoded body of a POST: one request or a bulk array.
///
/// Bulk elements are parsed independently so one malformed element never
/// aborts its siblings.
#[derive(Debug)]
pub enum PostPayload {
    /// A single request.
    Single(BridgeRequest),
    /// A bulk array, each element parsed on its own.
    Bulk(Vec<Result<BridgeRequest, BridgeError>>),
}

/// Parse a POST body (UTF-8 JSON) plus query parameters.
pub fn from_post(body: &[u8], params: &BTreeMap<String, String>) -> Result<PostPayload, BridgeError> {
    let query_options = options_from_params(params)?;
    let text = std::str::from_utf8(body)
        .map_err(|e| BridgeError::invalid(format!("request body is not valid UTF-8: {e}")))?;
    let root: Value = serde_json::from_str(text)
        .map_err(|e| BridgeError::invalid(format!("request body is not valid JSON: {e}")))?;

    match root {
        Value::Object(_) => Ok(PostPayload::Single(request_from_json(&root, &query_options)?)),
        Value::Array(elements) => Ok(PostPayload::Bulk(
            elements
                .iter()
                .map(|element| request_from_json(element, &query_options))
                .collect(),
        )),
        other => Err(BridgeError::invalid(format!(
            "request body must be a JSON object or array, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// Raw wire records, one per verb.  `deny_unknown_fields` is the contract:
// a typo in a request key is a 400, not a silent no-op.

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawRead {
    #[serde(rename = "type")]
    _verb: String,
    mbean: String,
    #[serde(default)]
    attribute: Option<RawAttribute>,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    config: Option<ProcessingOptions>,
    #[serde(default)]
    target: Option<TargetSpec>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawAttribute {
    One(String),
    Many(Vec<Option<String>>),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawWrite {
    #[serde(rename = "type")]
    _verb: String,
    mbean: String,
    attribute: String,
    value: Value,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    config: Option<ProcessingOptions>,
    #[serde(default)]
    target: Option<TargetSpec>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawExec {
    #[serde(rename = "type")]
    _verb: String,
    mbean: String,
    operation: String,
    #[serde(default)]
    arguments: Option<Vec<Value>>,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    config: Option<ProcessingOptions>,
    #[serde(default)]
    target: Option<TargetSpec>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawList {
    #[serde(rename = "type")]
    _verb: String,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    config: Option<ProcessingOptions>,
    #[serde(default)]
    target: Option<TargetSpec>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawSearch {
    #[serde(rename = "type")]
    _verb: String,
    mbean: String,
    #[serde(default)]
    config: Option<ProcessingOptions>,
    #[serde(default)]
    target: Option<TargetSpec>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawVersion {
    #[serde(rename = "type")]
    _verb: String,
    #[serde(default)]
    config: Option<ProcessingOptions>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawNotification {
    #[serde(rename = "type")]
    _verb: String,
    command: NotificationCommand,
    #[serde(default)]
    client: Option<String>,
    #[serde(default)]
    config: Option<ProcessingOptions>,
}

fn decode<T: serde::de::DeserializeOwned>(v: &Value, verb: Verb) -> Result<T, BridgeError> {
    serde_json::from_value(v.clone())
        .map_err(|e| BridgeError::invalid(format!("malformed {verb} request: {e}")))
}

fn wire_path(raw: Option<String>) -> Vec<String> {
    let Some(raw) = raw else {
        return Vec::new();
    };
    let mut segments = path::split(raw.trim_start_matches('/'));
    while segments.last().is_some_and(String::is_empty) {
        segments.pop();
    }
    segments
}

fn merged(config: Option<ProcessingOptions>, query: &ProcessingOptions) -> ProcessingOptions {
    config.unwrap_or_default().or(query)
}

/// Build one typed request from a parsed JSON object.
pub fn request_from_json(
    v: &Value,
    query_options: &ProcessingOptions,
) -> Result<BridgeRequest, BridgeError> {
    let obj = v
        .as_object()
        .ok_or_else(|| BridgeError::invalid(format!("request must be a JSON object, got {}", json_kind(v))))?;
    let verb_token = obj
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| BridgeError::invalid("request is missing the type key"))?;
    let verb = Verb::from_wire(verb_token)
        .ok_or_else(|| BridgeError::invalid(format!("unknown request verb {verb_token:?}")))?;

    match verb {
        Verb::Read => {
            let raw: RawRead = decode(v, verb)?;
            let attributes = match raw.attribute {
                None => AttributeSpec::All,
                Some(RawAttribute::One(a)) => AttributeSpec::One(a),
                Some(RawAttribute::Many(list)) => {
                    let named: Vec<String> = list.into_iter().flatten().collect();
                    match named.len() {
                        0 => AttributeSpec::All,
                        1 => AttributeSpec::One(named.into_iter().next().unwrap_or_default()),
                        _ => AttributeSpec::Many(named),
                    }
                }
            };
            Ok(BridgeRequest::Read(ReadRequest {
                name: parse_name(&raw.mbean)?,
                attributes,
                path: wire_path(raw.path),
                options: merged(raw.config, query_options),
                target: raw.target,
            }))
        }
        Verb::Write => {
            let raw: RawWrite = decode(v, verb)?;
            Ok(BridgeRequest::Write(WriteRequest {
                name: require_concrete(parse_name(&raw.mbean)?, verb)?,
                attribute: raw.attribute,
                value: raw.value,
                path: wire_path(raw.path),
                options: merged(raw.config, query_options),
                target: raw.target,
            }))
        }
        Verb::Exec => {
            let raw: RawExec = decode(v, verb)?;
            Ok(BridgeRequest::Exec(ExecRequest {
                name: require_concrete(parse_name(&raw.mbean)?, verb)?,
                operation: raw.operation,
                arguments: raw.arguments.unwrap_or_default(),
                path: wire_path(raw.path),
                options: merged(raw.config, query_options),
                target: raw.target,
            }))
        }
        Verb::List => {
            let raw: RawList = decode(v, verb)?;
            Ok(BridgeRequest::List(ListRequest {
                path: wire_path(raw.path),
                options: merged(raw.config, query_options),
                target: raw.target,
            }))
        }
        Verb::Search => {
            let raw: RawSearch = decode(v, verb)?;
            Ok(BridgeRequest::Search(SearchRequest {
                pattern: parse_name(&raw.mbean)?,
                options: merged(raw.config, query_options),
                target: raw.target,
            }))
        }
        Verb::Version => {
            let raw: RawVersion = decode(v, verb)?;
            Ok(BridgeRequest::Version(VersionRequest {
                options: merged(raw.config, query_options),
            }))
        }
        Verb::Notification => {
            let raw: RawNotification = decode(v, verb)?;
            Ok(BridgeRequest::Notification(NotificationRequest {
                command: raw.command,
                client: raw.client,
                options: merged(raw.config, query_options),
            }))
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
