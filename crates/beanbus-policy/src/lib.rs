// SPDX-License-Identifier: MIT OR Apache-2.0
//! Restrictors: the policy oracle deciding whether a (verb, object name,
//! attribute|operation, remote host) tuple is permitted.
//!
//! Three implementations ship with the bridge: [`AllowAllRestrictor`],
//! [`DenyAllRestrictor`], and the TOML-driven [`PolicyRestrictor`].  A
//! registration table maps configured restrictor names to constructors so
//! deployments can select one without code changes.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use beanbus_core::{ObjectName, wildcard_match};
use beanbus_protocol::Verb;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failures while building a restrictor.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    /// The policy file could not be read.
    #[error("cannot read policy {path}: {reason}")]
    Io {
        /// Path that was requested.
        path: String,
        /// Underlying reason.
        reason: String,
    },

    /// The policy document could not be parsed.
    #[error("cannot parse policy: {0}")]
    Parse(String),

    /// The policy document is inconsistent.
    #[error("invalid policy: {0}")]
    Invalid(String),

    /// The configured restrictor name is not registered.
    #[error("unknown restrictor {0:?}")]
    UnknownRestrictor(String),

    /// The restrictor needs a policy file but none was configured.
    #[error("restrictor {0:?} requires a policy location")]
    MissingPolicyLocation(String),
}

// ---------------------------------------------------------------------------
// Restrictor
// ---------------------------------------------------------------------------

/// HTTP method of the incoming request, as far as policy is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// Path-encoded requests.
    Get,
    /// JSON-encoded requests.
    Post,
}

impl HttpMethod {
    fn as_str(self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Post => "post",
        }
    }
}

/// Policy oracle consulted on every request.
///
/// Implementations must be cheap: the verb gate runs once per request and
/// the attribute checks run once per fanned-out attribute.
pub trait Restrictor: Send + Sync + std::fmt::Debug {
    /// Whether the transport method is allowed at all.
    fn is_http_method_allowed(&self, method: HttpMethod) -> bool;

    /// Whether the verb may run, optionally scoped by object name.
    fn is_verb_allowed(&self, verb: Verb, name: Option<&ObjectName>) -> bool;

    /// Whether this attribute may be read on this bean.
    fn is_attribute_read_allowed(&self, name: &ObjectName, attribute: &str) -> bool;

    /// Whether this attribute may be written on this bean.
    fn is_attribute_write_allowed(&self, name: &ObjectName, attribute: &str) -> bool;

    /// Whether this operation may be invoked on this bean.
    fn is_operation_allowed(&self, name: &ObjectName, operation: &str) -> bool;

    /// Whether the remote peer (host names and/or addresses) may talk to
    /// the bridge at all.
    fn is_remote_access_allowed(&self, hosts: &[&str]) -> bool;
}

/// Permits everything.  The default when no policy is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllRestrictor;

impl Restrictor for AllowAllRestrictor {
    fn is_http_method_allowed(&self, _method: HttpMethod) -> bool {
        true
    }

    fn is_verb_allowed(&self, _verb: Verb, _name: Option<&ObjectName>) -> bool {
        true
    }

    fn is_attribute_read_allowed(&self, _name: &ObjectName, _attribute: &str) -> bool {
        true
    }

    fn is_attribute_write_allowed(&self, _name: &ObjectName, _attribute: &str) -> bool {
        true
    }

    fn is_operation_allowed(&self, _name: &ObjectName, _operation: &str) -> bool {
        true
    }

    fn is_remote_access_allowed(&self, _hosts: &[&str]) -> bool {
        true
    }
}

/// Denies everything.  Useful as a panic switch.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyAllRestrictor;

impl Restrictor for DenyAllRestrictor {
    fn is_http_method_allowed(&self, _method: HttpMethod) -> bool {
        false
    }

    fn is_verb_allowed(&self, _verb: Verb, _name: Option<&ObjectName>) -> bool {
        false
    }

    fn is_attribute_read_allowed(&self, _name: &ObjectName, _attribute: &str) -> bool {
        false
    }

    fn is_attribute_write_allowed(&self, _name: &ObjectName, _attribute: &str) -> bool {
        false
    }

    fn is_operation_allowed(&self, _name: &ObjectName, _operation: &str) -> bool {
        false
    }

    fn is_remote_access_allowed(&self, _hosts: &[&str]) -> bool {
        false
    }
}

// ---------------------------------------------------------------------------
// Policy document
// ---------------------------------------------------------------------------

/// The TOML policy document.
///
/// ```toml
/// [access]
/// http_methods = ["get", "post"]
/// verbs = ["read", "list", "search", "version"]
/// remote_hosts = ["127.0.0.1", "10.0.*"]
///
/// [[deny]]
/// mbean = "process:type=Compilation"
/// read = ["*"]
///
/// [[allow]]
/// mbean = "process:*"
/// read = ["*"]
/// operations = ["reset*"]
/// ```
///
/// Deny rules always win.  When any allow rule exists for a category
/// (read/write/operations), unlisted members of matched beans are denied;
/// with no allow rules the category defaults to allowed.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyDocument {
    /// Coarse access filters.
    #[serde(default)]
    pub access: AccessSection,
    /// Rules that deny matched members.
    #[serde(default)]
    pub deny: Vec<PolicyRule>,
    /// Rules that allow matched members (turning the category into an
    /// allowlist).
    #[serde(default)]
    pub allow: Vec<PolicyRule>,
}

/// Coarse, request-level access filters.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccessSection {
    /// Permitted HTTP methods (`get`, `post`); absent means both.
    #[serde(default)]
    pub http_methods: Option<Vec<String>>,
    /// Permitted verbs; absent means all.
    #[serde(default)]
    pub verbs: Option<Vec<String>>,
    /// Permitted remote hosts/addresses, with `*`/`?` wildcards; absent
    /// means everyone.
    #[serde(default)]
    pub remote_hosts: Option<Vec<String>>,
}

/// One allow or deny rule, scoped by an object-name pattern.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyRule {
    /// Object-name pattern the rule applies to.
    pub mbean: String,
    /// Attribute patterns for reads.
    #[serde(default)]
    pub read: Vec<String>,
    /// Attribute patterns for writes.
    #[serde(default)]
    pub write: Vec<String>,
    /// Operation patterns.
    #[serde(default)]
    pub operations: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Category {
    Read,
    Write,
    Operation,
}

#[derive(Debug)]
struct CompiledRule {
    pattern: ObjectName,
    read: Vec<String>,
    write: Vec<String>,
    operations: Vec<String>,
}

impl CompiledRule {
    fn members(&self, category: Category) -> &[String] {
        match category {
            Category::Read => &self.read,
            Category::Write => &self.write,
            Category::Operation => &self.operations,
        }
    }

    fn matches(&self, name: &ObjectName, category: Category, member: &str) -> bool {
        self.pattern.matches(name)
            && self
                .members(category)
                .iter()
                .any(|p| wildcard_match(p, member))
    }
}

// ---------------------------------------------------------------------------
// PolicyRestrictor
// ---------------------------------------------------------------------------

/// Restrictor driven by a [`PolicyDocument`].
#[derive(Debug)]
pub struct PolicyRestrictor {
    http_methods: Option<Vec<String>>,
    verbs: Option<Vec<Verb>>,
    remote_hosts: Option<Vec<String>>,
    deny: Vec<CompiledRule>,
    allow: Vec<CompiledRule>,
}

impl PolicyRestrictor {
    /// Compile a parsed document.
    pub fn from_document(doc: PolicyDocument) -> Result<Self, PolicyError> {
        let verbs = doc
            .access
            .verbs
            .map(|list| {
                list.iter()
                    .map(|v| {
                        Verb::from_wire(v)
                            .ok_or_else(|| PolicyError::Invalid(format!("unknown verb {v:?}")))
                    })
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?;
        let compile = |rules: Vec<PolicyRule>| -> Result<Vec<CompiledRule>, PolicyError> {
            rules
                .into_iter()
                .map(|rule| {
                    let pattern = ObjectName::parse(&rule.mbean)
                        .map_err(|e| PolicyError::Invalid(e.to_string()))?;
                    Ok(CompiledRule {
                        pattern,
                        read: rule.read,
                        write: rule.write,
                        operations: rule.operations,
                    })
                })
                .collect()
        };
        Ok(Self {
            http_methods: doc.access.http_methods,
            verbs,
            remote_hosts: doc.access.remote_hosts,
            deny: compile(doc.deny)?,
            allow: compile(doc.allow)?,
        })
    }

    /// Parse and compile a TOML policy string.
    pub fn from_toml(content: &str) -> Result<Self, PolicyError> {
        let doc: PolicyDocument =
            toml::from_str(content).map_err(|e| PolicyError::Parse(e.to_string()))?;
        Self::from_document(doc)
    }

    /// Load, parse, and compile a TOML policy file.
    pub fn from_file(path: &Path) -> Result<Self, PolicyError> {
        let content = std::fs::read_to_string(path).map_err(|e| PolicyError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        info!(path = %path.display(), "loaded policy");
        Self::from_toml(&content)
    }

    fn check(&self, name: &ObjectName, category: Category, member: &str) -> bool {
        if self
            .deny
            .iter()
            .any(|rule| rule.matches(name, category, member))
        {
            return false;
        }
        let has_allow_rules = self
            .allow
            .iter()
            .any(|rule| !rule.members(category).is_empty());
        if !has_allow_rules {
            return true;
        }
        self.allow
            .iter()
            .any(|rule| rule.matches(name, category, member))
    }
}

impl Restrictor for PolicyRestrictor {
    fn is_http_method_allowed(&self, method: HttpMethod) -> bool {
        self.http_methods
            .as_ref()
            .is_none_or(|list| list.iter().any(|m| m == method.as_str()))
    }

    fn is_verb_allowed(&self, verb: Verb, _name: Option<&ObjectName>) -> bool {
        self.verbs.as_ref().is_none_or(|list| list.contains(&verb))
    }

    fn is_attribute_read_allowed(&self, name: &ObjectName, attribute: &str) -> bool {
        self.check(name, Category::Read, attribute)
    }

    fn is_attribute_write_allowed(&self, name: &ObjectName, attribute: &str) -> bool {
        self.check(name, Category::Write, attribute)
    }

    fn is_operation_allowed(&self, name: &ObjectName, operation: &str) -> bool {
        self.check(name, Category::Operation, operation)
    }

    fn is_remote_access_allowed(&self, hosts: &[&str]) -> bool {
        self.remote_hosts.as_ref().is_none_or(|allowed| {
            hosts
                .iter()
                .any(|host| allowed.iter().any(|p| wildcard_match(p, host)))
        })
    }
}

// ---------------------------------------------------------------------------
// Registration table
// ---------------------------------------------------------------------------

/// Build the restrictor selected by name.
///
/// Registered names: `allow-all` (default), `deny-all`, `policy` (requires
/// a policy location).
pub fn create_restrictor(
    name: Option<&str>,
    policy_location: Option<&Path>,
) -> Result<Arc<dyn Restrictor>, PolicyError> {
    // When no restrictor is named but a policy file is, the policy
    // restrictor is implied.
    let effective = match name {
        Some(n) => n,
        None if policy_location.is_some() => "policy",
        None => "allow-all",
    };
    match effective {
        "allow-all" => Ok(Arc::new(AllowAllRestrictor)),
        "deny-all" => Ok(Arc::new(DenyAllRestrictor)),
        "policy" => {
            let path = policy_location
                .ok_or_else(|| PolicyError::MissingPolicyLocation(effective.to_owned()))?;
            Ok(Arc::new(PolicyRestrictor::from_file(path)?))
        }
        other => Err(PolicyError::UnknownRestrictor(other.to_owned())),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
