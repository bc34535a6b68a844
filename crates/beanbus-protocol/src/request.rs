// SPDX-License-Identifier: MIT OR Apache-2.0
//! Typed protocol requests, one record per verb, plus the processing
//! options and proxy-target descriptors they share.

use crate::path;
use beanbus_core::ObjectName;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Verb
// ---------------------------------------------------------------------------

/// Protocol-level action tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verb {
    /// Read one, several, or all attributes.
    Read,
    /// Write one attribute.
    Write,
    /// Execute one operation.
    Exec,
    /// Traverse the bean metadata tree.
    List,
    /// Query names by pattern.
    Search,
    /// Bridge and product version information.
    Version,
    /// Notification client bookkeeping.
    Notification,
}

impl Verb {
    /// Wire form of the verb.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Exec => "exec",
            Self::List => "list",
            Self::Search => "search",
            Self::Version => "version",
            Self::Notification => "notification",
        }
    }

    /// Parse a wire verb.
    #[must_use]
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "read" => Some(Self::Read),
            "write" => Some(Self::Write),
            "exec" => Some(Self::Exec),
            "list" => Some(Self::List),
            "search" => Some(Self::Search),
            "version" => Some(Self::Version),
            "notification" => Some(Self::Notification),
            _ => None,
        }
    }
}

impl std::fmt::Display for Verb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Processing options
// ---------------------------------------------------------------------------

/// Per-request processing options.
///
/// Every field is optional so that query-parameter and body-supplied
/// option sets can be merged field-wise (body wins).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct ProcessingOptions {
    /// Maximum depth when expanding values; `0` renders the value as its
    /// string form.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,
    /// Maximum number of elements rendered per collection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_collection_size: Option<usize>,
    /// Global budget of rendered nodes per conversion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_objects: Option<usize>,
    /// Render per-attribute failures as error strings instead of failing
    /// the request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignore_errors: Option<bool>,
    /// Attach the rendered cause chain to error envelopes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_stack_trace: Option<bool>,
    /// Additionally attach a structured error object to error envelopes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serialize_exception: Option<bool>,
    /// Key pattern-read results by canonical (sorted) names.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canonical_naming: Option<bool>,
}

impl ProcessingOptions {
    /// Whether per-attribute faults should be tolerated.
    #[must_use]
    pub fn ignore_errors(&self) -> bool {
        self.ignore_errors.unwrap_or(false)
    }

    /// Whether error envelopes carry a stacktrace.  Defaults to on.
    #[must_use]
    pub fn include_stack_trace(&self) -> bool {
        self.include_stack_trace.unwrap_or(true)
    }

    /// Whether error envelopes carry a structured error value.
    #[must_use]
    pub fn serialize_exception(&self) -> bool {
        self.serialize_exception.unwrap_or(false)
    }

    /// Whether result keys use canonical names.  Defaults to on.
    #[must_use]
    pub fn canonical_naming(&self) -> bool {
        self.canonical_naming.unwrap_or(true)
    }

    /// Merge, taking `self` where set and falling back to `other`.
    #[must_use]
    pub fn or(self, other: &ProcessingOptions) -> Self {
        Self {
            max_depth: self.max_depth.or(other.max_depth),
            max_collection_size: self.max_collection_size.or(other.max_collection_size),
            max_objects: self.max_objects.or(other.max_objects),
            ignore_errors: self.ignore_errors.or(other.ignore_errors),
            include_stack_trace: self.include_stack_trace.or(other.include_stack_trace),
            serialize_exception: self.serialize_exception.or(other.serialize_exception),
            canonical_naming: self.canonical_naming.or(other.canonical_naming),
        }
    }
}

// ---------------------------------------------------------------------------
// Target
// ---------------------------------------------------------------------------

/// A remote-agent target for proxy-mode requests.
///
/// The bridge parses and echoes targets and keys history by them; actual
/// proxy dispatch is a separate dispatcher's concern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetSpec {
    /// Remote agent URL.
    pub url: String,
    /// Optional credential user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Optional credential password.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

// ---------------------------------------------------------------------------
// Attribute spec
// ---------------------------------------------------------------------------

/// Which attributes a read addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeSpec {
    /// Every readable attribute.
    All,
    /// Exactly one attribute.
    One(String),
    /// An explicit list (multi-mode).
    Many(Vec<String>),
}

impl AttributeSpec {
    /// Whether this spec puts the read into multi-value mode.
    #[must_use]
    pub fn is_multi(&self) -> bool {
        !matches!(self, Self::One(_))
    }

    /// The explicitly requested names, when any.
    #[must_use]
    pub fn requested(&self) -> Option<Vec<&str>> {
        match self {
            Self::All => None,
            Self::One(a) => Some(vec![a.as_str()]),
            Self::Many(list) => Some(list.iter().map(String::as_str).collect()),
        }
    }
}

// ---------------------------------------------------------------------------
// Per-verb records
// ---------------------------------------------------------------------------

/// Read one, several, or all attributes of one or many beans.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadRequest {
    /// Target name, possibly a pattern.
    pub name: ObjectName,
    /// Addressed attributes.
    pub attributes: AttributeSpec,
    /// Inner path into the value.
    pub path: Vec<String>,
    /// Processing options.
    pub options: ProcessingOptions,
    /// Proxy target, if any.
    pub target: Option<TargetSpec>,
}

/// Write one attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteRequest {
    /// Target name (concrete).
    pub name: ObjectName,
    /// Attribute to write.
    pub attribute: String,
    /// New value, still in JSON form; converted against the declared type.
    pub value: serde_json::Value,
    /// Inner path into the returned previous value.
    pub path: Vec<String>,
    /// Processing options.
    pub options: ProcessingOptions,
    /// Proxy target, if any.
    pub target: Option<TargetSpec>,
}

/// Execute one operation.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecRequest {
    /// Target name (concrete).
    pub name: ObjectName,
    /// Operation to invoke.
    pub operation: String,
    /// Arguments, still in JSON form; converted against declared types.
    pub arguments: Vec<serde_json::Value>,
    /// Inner path into the result.
    pub path: Vec<String>,
    /// Processing options.
    pub options: ProcessingOptions,
    /// Proxy target, if any.
    pub target: Option<TargetSpec>,
}

/// Traverse bean metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct ListRequest {
    /// Subtree selector.
    pub path: Vec<String>,
    /// Processing options.
    pub options: ProcessingOptions,
    /// Proxy target, if any.
    pub target: Option<TargetSpec>,
}

/// Query names by pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    /// The (usually pattern) name to search for.
    pub pattern: ObjectName,
    /// Processing options.
    pub options: ProcessingOptions,
    /// Proxy target, if any.
    pub target: Option<TargetSpec>,
}

/// Bridge/product version information.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VersionRequest {
    /// Processing options.
    pub options: ProcessingOptions,
}

/// Notification client bookkeeping sub-verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationCommand {
    /// Allocate a fresh client id.
    Register,
    /// Drop a client and its listeners.
    Unregister,
    /// Keep-alive for a client.
    Ping,
    /// List what the bridge knows about a client.
    List,
}

impl NotificationCommand {
    /// Parse a wire command.
    #[must_use]
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "register" => Some(Self::Register),
            "unregister" => Some(Self::Unregister),
            "ping" => Some(Self::Ping),
            "list" => Some(Self::List),
            _ => None,
        }
    }

    /// Wire form of the command.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Register => "register",
            Self::Unregister => "unregister",
            Self::Ping => "ping",
            Self::List => "list",
        }
    }
}

/// Notification client bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationRequest {
    /// The sub-verb.
    pub command: NotificationCommand,
    /// Client id; required for everything but `register`.
    pub client: Option<String>,
    /// Processing options.
    pub options: ProcessingOptions,
}

// ---------------------------------------------------------------------------
// BridgeRequest
// ---------------------------------------------------------------------------

/// A parsed protocol request, tagged by verb.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeRequest {
    /// `read`
    Read(ReadRequest),
    /// `write`
    Write(WriteRequest),
    /// `exec`
    Exec(ExecRequest),
    /// `list`
    List(ListRequest),
    /// `search`
    Search(SearchRequest),
    /// `version`
    Version(VersionRequest),
    /// `notification`
    Notification(NotificationRequest),
}

impl BridgeRequest {
    /// The verb tag.
    #[must_use]
    pub fn verb(&self) -> Verb {
        match self {
            Self::Read(_) => Verb::Read,
            Self::Write(_) => Verb::Write,
            Self::Exec(_) => Verb::Exec,
            Self::List(_) => Verb::List,
            Self::Search(_) => Verb::Search,
            Self::Version(_) => Verb::Version,
            Self::Notification(_) => Verb::Notification,
        }
    }

    /// The addressed object name, when the verb has one.
    #[must_use]
    pub fn object_name(&self) -> Option<&ObjectName> {
        match self {
            Self::Read(r) => Some(&r.name),
            Self::Write(r) => Some(&r.name),
            Self::Exec(r) => Some(&r.name),
            Self::Search(r) => Some(&r.pattern),
            Self::List(_) | Self::Version(_) | Self::Notification(_) => None,
        }
    }

    /// The inner path, when the verb has one.
    #[must_use]
    pub fn path(&self) -> &[String] {
        match self {
            Self::Read(r) => &r.path,
            Self::Write(r) => &r.path,
            Self::Exec(r) => &r.path,
            Self::List(r) => &r.path,
            Self::Search(_) | Self::Version(_) | Self::Notification(_) => &[],
        }
    }

    /// The processing options.
    #[must_use]
    pub fn options(&self) -> &ProcessingOptions {
        match self {
            Self::Read(r) => &r.options,
            Self::Write(r) => &r.options,
            Self::Exec(r) => &r.options,
            Self::List(r) => &r.options,
            Self::Search(r) => &r.options,
            Self::Version(r) => &r.options,
            Self::Notification(r) => &r.options,
        }
    }

    /// The proxy target, when one was given.
    #[must_use]
    pub fn target(&self) -> Option<&TargetSpec> {
        match self {
            Self::Read(r) => r.target.as_ref(),
            Self::Write(r) => r.target.as_ref(),
            Self::Exec(r) => r.target.as_ref(),
            Self::List(r) => r.target.as_ref(),
            Self::Search(r) => r.target.as_ref(),
            Self::Version(_) | Self::Notification(_) => None,
        }
    }

    /// The request echo embedded in every response envelope.
    #[must_use]
    pub fn echo(&self) -> serde_json::Value {
        use serde_json::{Map, Value, json};

        let mut obj = Map::new();
        obj.insert("type".into(), json!(self.verb().as_str()));
        match self {
            Self::Read(r) => {
                obj.insert("mbean".into(), json!(r.name.literal()));
                match &r.attributes {
                    AttributeSpec::All => {}
                    AttributeSpec::One(a) => {
                        obj.insert("attribute".into(), json!(a));
                    }
                    AttributeSpec::Many(list) => {
                        obj.insert("attribute".into(), json!(list));
                    }
                }
            }
            Self::Write(r) => {
                obj.insert("mbean".into(), json!(r.name.literal()));
                obj.insert("attribute".into(), json!(r.attribute));
                obj.insert("value".into(), r.value.clone());
            }
            Self::Exec(r) => {
                obj.insert("mbean".into(), json!(r.name.literal()));
                obj.insert("operation".into(), json!(r.operation));
                if !r.arguments.is_empty() {
                    obj.insert("arguments".into(), Value::Array(r.arguments.clone()));
                }
            }
            Self::Search(r) => {
                obj.insert("mbean".into(), json!(r.pattern.literal()));
            }
            Self::List(_) | Self::Version(_) => {}
            Self::Notification(r) => {
                obj.insert("command".into(), json!(r.command.as_str()));
                if let Some(client) = &r.client {
                    obj.insert("client".into(), json!(client));
                }
            }
        }
        let p = self.path();
        if !p.is_empty() {
            obj.insert("path".into(), json!(path::join(p)));
        }
        if let Some(target) = self.target() {
            obj.insert("target".into(), json!({ "url": target.url }));
        }
        Value::Object(obj)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
