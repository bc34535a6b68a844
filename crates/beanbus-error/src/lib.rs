// SPDX-License-Identifier: MIT OR Apache-2.0
//! Unified error taxonomy for the beanbus bridge.
//!
//! Every failure that can surface in a response envelope is a
//! [`BridgeError`].  Each variant carries a stable, machine-readable
//! `error_type` string and maps to an HTTP-like status code.  The
//! [`ErrorDto`] is the serialisable snapshot embedded in envelopes.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

// ---------------------------------------------------------------------------
// BridgeError
// ---------------------------------------------------------------------------

/// Every protocol-level failure the bridge can report.
///
/// The status mapping follows the wire contract: structural problems are
/// 400, missing things are 404, restrictor denials are 403, everything
/// else is 500.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The request could not be parsed or is structurally invalid.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// No registry knows the addressed object name.
    #[error("no bean registered with name {0}")]
    InstanceNotFound(String),

    /// The bean exists but has no such attribute.
    #[error("attribute {attribute} not found on {name}")]
    AttributeNotFound {
        /// Object name of the bean.
        name: String,
        /// Attribute that was requested.
        attribute: String,
    },

    /// The bean exists but has no such operation (name + arity).
    #[error("operation {operation} not found on {name}")]
    OperationNotFound {
        /// Object name of the bean.
        name: String,
        /// Operation that was requested.
        operation: String,
    },

    /// A path segment could not be applied to the value being converted.
    #[error("path {path} not applicable: {reason}")]
    PathNotFound {
        /// The path that failed to resolve.
        path: String,
        /// Why it failed.
        reason: String,
    },

    /// The restrictor denied the request.
    #[error("access denied: {0}")]
    Forbidden(String),

    /// The invoked bean attribute or operation itself failed.
    #[error("target operation failed: {message}")]
    TargetFailure {
        /// Message of the failure, cause unwrapped one level.
        message: String,
        /// The underlying cause, when one is available.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// I/O against a bean registry failed or was interrupted.
    #[error("registry i/o failure: {0}")]
    RegistryIo(String),

    /// The operation is structurally valid but not supported here.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// Anything unexpected.
    #[error("internal error: {0}")]
    Internal(String),
}

impl BridgeError {
    /// Shorthand constructor for [`BridgeError::InvalidRequest`].
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Shorthand constructor for [`BridgeError::Internal`].
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Wrap a failure thrown by the invoked bean itself, keeping the cause
    /// one level deep.
    pub fn target_failure(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::TargetFailure {
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }

    /// The HTTP-like status code for this error.
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            Self::InvalidRequest(_) => 400,
            Self::Forbidden(_) => 403,
            Self::InstanceNotFound(_)
            | Self::AttributeNotFound { .. }
            | Self::OperationNotFound { .. }
            | Self::PathNotFound { .. } => 404,
            Self::TargetFailure { .. }
            | Self::RegistryIo(_)
            | Self::Unsupported(_)
            | Self::Internal(_) => 500,
        }
    }

    /// Stable `error_type` string for the envelope.
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "InvalidRequest",
            Self::InstanceNotFound(_) => "InstanceNotFound",
            Self::AttributeNotFound { .. } => "AttributeNotFound",
            Self::OperationNotFound { .. } => "OperationNotFound",
            Self::PathNotFound { .. } => "PathNotFound",
            Self::Forbidden(_) => "Forbidden",
            Self::TargetFailure { .. } => "TargetFailure",
            Self::RegistryIo(_) => "RegistryIo",
            Self::Unsupported(_) => "Unsupported",
            Self::Internal(_) => "Internal",
        }
    }

    /// Whether a stacktrace may be attached for this error.
    ///
    /// Restrictor denials never carry one.
    #[must_use]
    pub fn stacktrace_permitted(&self) -> bool {
        !matches!(self, Self::Forbidden(_))
    }

    /// Render the cause chain, outermost first, one frame per line.
    #[must_use]
    pub fn render_chain(&self) -> String {
        let mut out = self.to_string();
        let mut cause = std::error::Error::source(self);
        while let Some(err) = cause {
            let _ = write!(out, "\ncaused by: {err}");
            cause = err.source();
        }
        out
    }
}

// ---------------------------------------------------------------------------
// ErrorDto
// ---------------------------------------------------------------------------

/// Serialisable snapshot of a [`BridgeError`] for the response envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorDto {
    /// HTTP-like status code.
    pub status: u16,
    /// Stable error type tag.
    pub error_type: String,
    /// Human-readable error message.
    pub error: String,
    /// Rendered cause chain, when permitted and requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stacktrace: Option<String>,
}

impl ErrorDto {
    /// Build a DTO from an error, honouring the caller's stacktrace wish.
    #[must_use]
    pub fn from_error(err: &BridgeError, include_stacktrace: bool) -> Self {
        let stacktrace = (include_stacktrace && err.stacktrace_permitted())
            .then(|| err.render_chain());
        Self {
            status: err.status(),
            error_type: err.error_type().to_owned(),
            error: err.to_string(),
            stacktrace,
        }
    }

    /// Structured error object for the `serializeException` option.
    #[must_use]
    pub fn error_value(&self) -> serde_json::Value {
        serde_json::json!({
            "error_type": self.error_type,
            "message": self.error,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::io;

    fn all_variants() -> Vec<BridgeError> {
        vec![
            BridgeError::invalid("bad"),
            BridgeError::InstanceNotFound("d:k=v".into()),
            BridgeError::AttributeNotFound {
                name: "d:k=v".into(),
                attribute: "Size".into(),
            },
            BridgeError::OperationNotFound {
                name: "d:k=v".into(),
                operation: "reset".into(),
            },
            BridgeError::PathNotFound {
                path: "a/b".into(),
                reason: "no such key".into(),
            },
            BridgeError::Forbidden("nope".into()),
            BridgeError::target_failure(io::Error::other("boom")),
            BridgeError::RegistryIo("interrupted".into()),
            BridgeError::Unsupported("no can do".into()),
            BridgeError::internal("oops"),
        ]
    }

    #[test]
    fn status_mapping() {
        assert_eq!(BridgeError::invalid("x").status(), 400);
        assert_eq!(BridgeError::Forbidden("x".into()).status(), 403);
        assert_eq!(BridgeError::InstanceNotFound("x".into()).status(), 404);
        assert_eq!(
            BridgeError::AttributeNotFound {
                name: "n".into(),
                attribute: "a".into()
            }
            .status(),
            404
        );
        assert_eq!(BridgeError::RegistryIo("x".into()).status(), 500);
        assert_eq!(BridgeError::internal("x").status(), 500);
    }

    #[test]
    fn error_types_are_unique() {
        let mut seen = HashSet::new();
        for err in all_variants() {
            assert!(seen.insert(err.error_type()), "duplicate {}", err.error_type());
        }
    }

    #[test]
    fn forbidden_never_has_stacktrace() {
        let err = BridgeError::Forbidden("denied".into());
        let dto = ErrorDto::from_error(&err, true);
        assert_eq!(dto.status, 403);
        assert!(dto.stacktrace.is_none());
    }

    #[test]
    fn target_failure_keeps_cause_one_level() {
        let err = BridgeError::target_failure(io::Error::other("disk on fire"));
        let src = std::error::Error::source(&err).expect("cause kept");
        assert_eq!(src.to_string(), "disk on fire");
        let chain = err.render_chain();
        assert!(chain.contains("disk on fire"));
        assert!(chain.contains("caused by"));
    }

    #[test]
    fn dto_serialization_skips_absent_stacktrace() {
        let err = BridgeError::InstanceNotFound("d:type=Bogus".into());
        let dto = ErrorDto::from_error(&err, false);
        let json = serde_json::to_value(&dto).unwrap();
        assert_eq!(json["error_type"], "InstanceNotFound");
        assert_eq!(json["status"], 404);
        assert!(json.get("stacktrace").is_none());
    }

    #[test]
    fn dto_includes_stacktrace_when_requested() {
        let err = BridgeError::target_failure(io::Error::other("boom"));
        let dto = ErrorDto::from_error(&err, true);
        assert!(dto.stacktrace.as_deref().unwrap().contains("boom"));
    }

    #[test]
    fn error_value_shape() {
        let err = BridgeError::invalid("missing type key");
        let dto = ErrorDto::from_error(&err, false);
        let v = dto.error_value();
        assert_eq!(v["error_type"], "InvalidRequest");
        assert!(v["message"].as_str().unwrap().contains("missing type key"));
    }
}
