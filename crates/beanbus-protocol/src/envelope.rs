// SPDX-License-Identifier: MIT OR Apache-2.0
//! Response envelope builders.
//!
//! Every reply is a JSON object: `status`, `timestamp`, the original
//! `request` echo, and either `value` (+ optional `history`) or the error
//! triple (`error`, `error_type`, optional `stacktrace`).

use crate::request::{BridgeRequest, ProcessingOptions};
use beanbus_error::{BridgeError, ErrorDto};
use serde_json::{Map, Value, json};

/// Seconds since the epoch, the timestamp granularity of the protocol.
#[must_use]
pub fn now_epoch_seconds() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Build a success envelope.
#[must_use]
pub fn success(request: &BridgeRequest, value: Value, history: Option<Value>) -> Value {
    let mut obj = Map::new();
    obj.insert("status".into(), json!(200));
    obj.insert("timestamp".into(), json!(now_epoch_seconds()));
    obj.insert("request".into(), request.echo());
    obj.insert("value".into(), value);
    if let Some(history) = history {
        obj.insert("history".into(), history);
    }
    Value::Object(obj)
}

/// Build an error envelope.
///
/// `request` is echoed when the failure happened after parsing; options
/// govern the stacktrace and the structured `error_value`.
#[must_use]
pub fn error(
    request: Option<&BridgeRequest>,
    err: &BridgeError,
    options: &ProcessingOptions,
) -> Value {
    let dto = ErrorDto::from_error(err, options.include_stack_trace());
    let mut obj = Map::new();
    obj.insert("status".into(), json!(dto.status));
    obj.insert("timestamp".into(), json!(now_epoch_seconds()));
    if let Some(request) = request {
        obj.insert("request".into(), request.echo());
    }
    obj.insert("error".into(), json!(dto.error));
    obj.insert("error_type".into(), json!(dto.error_type));
    if let Some(stacktrace) = &dto.stacktrace {
        obj.insert("stacktrace".into(), json!(stacktrace));
    }
    if options.serialize_exception() {
        obj.insert("error_value".into(), dto.error_value());
    }
    Value::Object(obj)
}
