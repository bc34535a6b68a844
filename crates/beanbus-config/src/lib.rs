// SPDX-License-Identifier: MIT OR Apache-2.0
//! Configuration loading, validation, and merging for the beanbus bridge.
//!
//! This crate provides [`BridgeConfig`], the recognised runtime knobs,
//! together with helpers for loading from TOML files, applying `BEANBUS_*`
//! environment overrides, and producing advisory [`ConfigWarning`]s.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during configuration loading or validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The requested configuration file was not found or unreadable.
    #[error("config file not found: {path}")]
    FileNotFound {
        /// Path that was requested.
        path: String,
    },

    /// The file could not be parsed as valid TOML.
    #[error("failed to parse config: {reason}")]
    ParseError {
        /// Human-readable parse error detail.
        reason: String,
    },

    /// Semantic validation failed (one or more problems).
    #[error("config validation failed: {reasons:?}")]
    ValidationError {
        /// Individual validation failure messages.
        reasons: Vec<String>,
    },
}

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

/// Advisory-level issues that do not prevent operation but deserve
/// attention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// History is disabled entirely.
    HistoryDisabled,
    /// An unusually large bound was configured.
    LargeBound {
        /// Name of the knob.
        field: String,
        /// Configured value.
        value: usize,
    },
    /// Debug recording is on; it costs memory per request.
    DebugEnabled,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigWarning::HistoryDisabled => {
                write!(f, "historyMaxEntries is 0; responses will carry no history")
            }
            ConfigWarning::LargeBound { field, value } => {
                write!(f, "{field} is unusually large ({value})")
            }
            ConfigWarning::DebugEnabled => write!(f, "debug recording is enabled"),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Recognised runtime settings, in their wire (camelCase) spelling.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct BridgeConfig {
    /// Default maximum depth for value expansion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,

    /// Default maximum number of elements rendered per collection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_collection_size: Option<usize>,

    /// Default global budget of rendered nodes per conversion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_objects: Option<usize>,

    /// Default per-key history entry limit; `0` disables history.
    pub history_max_entries: usize,

    /// Debug ring size.
    pub debug_max_entries: usize,

    /// Whether the debug ring records at all.
    pub debug: bool,

    /// Extra request dispatchers, consulted before the local one, in
    /// order.  Names resolve through the dispatcher registration table.
    pub dispatcher_classes: Vec<String>,

    /// Extra property appended to the bridge's own bean names.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mbean_qualifier: Option<String>,

    /// Opaque options handed to detectors' post-detect hooks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detector_options: Option<serde_json::Value>,

    /// Restrictor to install (`allow-all`, `deny-all`, `policy`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restrictor_class: Option<String>,

    /// Path of the TOML policy document for the `policy` restrictor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_location: Option<String>,

    /// URL context the HTTP transport mounts the bridge under.
    pub agent_context: String,

    /// Stable identifier of this bridge instance; generated when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,

    /// Free-form operator description of this instance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_description: Option<String>,

    /// Bind address of the bundled HTTP server.
    pub listen: String,

    /// Log level for the tracing subscriber.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            max_depth: None,
            max_collection_size: None,
            max_objects: None,
            history_max_entries: 10,
            debug_max_entries: 100,
            debug: false,
            dispatcher_classes: Vec::new(),
            mbean_qualifier: None,
            detector_options: None,
            restrictor_class: None,
            policy_location: None,
            agent_context: "/api".into(),
            agent_id: None,
            agent_description: None,
            listen: "127.0.0.1:8778".into(),
            log_level: Some("info".into()),
        }
    }
}

impl BridgeConfig {
    /// The agent id, generating a stable-for-this-process one when the
    /// configuration does not pin it.
    #[must_use]
    pub fn agent_id_or_default(&self) -> String {
        self.agent_id.clone().unwrap_or_else(default_agent_id)
    }
}

/// `host-pid-suffix` identity used when no `agentId` is configured.
#[must_use]
pub fn default_agent_id() -> String {
    let host = std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_owned());
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{host}-{}-{}", std::process::id(), &suffix[..8])
}

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Recognised log levels.
const VALID_LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

/// Threshold above which history/debug bounds generate a warning.
const LARGE_BOUND_THRESHOLD: usize = 10_000;

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load a [`BridgeConfig`] from an optional TOML file path.
///
/// * If `path` is `Some`, reads and parses the file.
/// * If `path` is `None`, returns [`BridgeConfig::default()`].
///
/// Environment variable overrides are applied on top in both cases.
pub fn load_config(path: Option<&Path>) -> Result<BridgeConfig, ConfigError> {
    let mut config = match path {
        Some(p) => {
            let content = std::fs::read_to_string(p).map_err(|_| ConfigError::FileNotFound {
                path: p.display().to_string(),
            })?;
            parse_toml(&content)?
        }
        None => BridgeConfig::default(),
    };
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Parse a TOML string into a [`BridgeConfig`].
pub fn parse_toml(content: &str) -> Result<BridgeConfig, ConfigError> {
    toml::from_str::<BridgeConfig>(content).map_err(|e| ConfigError::ParseError {
        reason: e.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Env overrides
// ---------------------------------------------------------------------------

/// Apply environment variable overrides.
///
/// Recognised variables: `BEANBUS_LISTEN`, `BEANBUS_LOG_LEVEL`,
/// `BEANBUS_DEBUG`, `BEANBUS_POLICY_LOCATION`, `BEANBUS_AGENT_ID`.
pub fn apply_env_overrides(config: &mut BridgeConfig) {
    if let Ok(val) = std::env::var("BEANBUS_LISTEN") {
        config.listen = val;
    }
    if let Ok(val) = std::env::var("BEANBUS_LOG_LEVEL") {
        config.log_level = Some(val);
    }
    if let Ok(val) = std::env::var("BEANBUS_DEBUG") {
        config.debug = val == "true" || val == "1";
    }
    if let Ok(val) = std::env::var("BEANBUS_POLICY_LOCATION") {
        config.policy_location = Some(val);
    }
    if let Ok(val) = std::env::var("BEANBUS_AGENT_ID") {
        config.agent_id = Some(val);
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a parsed configuration, returning advisory warnings.
///
/// Hard errors (unknown log level, empty context) are returned as a
/// [`ConfigError::ValidationError`]; soft issues come back as warnings.
pub fn validate_config(config: &BridgeConfig) -> Result<Vec<ConfigWarning>, ConfigError> {
    let mut errors: Vec<String> = Vec::new();
    let mut warnings: Vec<ConfigWarning> = Vec::new();

    if let Some(ref level) = config.log_level
        && !VALID_LOG_LEVELS.contains(&level.as_str())
    {
        errors.push(format!("invalid logLevel {level:?}"));
    }

    if !config.agent_context.starts_with('/') {
        errors.push(format!(
            "agentContext must start with '/', got {:?}",
            config.agent_context
        ));
    }

    if config.listen.trim().is_empty() {
        errors.push("listen address must not be empty".into());
    }

    if let Some(qualifier) = &config.mbean_qualifier
        && (qualifier.contains(':') || qualifier.contains(',') || qualifier.contains('='))
    {
        errors.push(format!(
            "mbeanQualifier must not contain name separators, got {qualifier:?}"
        ));
    }

    if config.history_max_entries == 0 {
        warnings.push(ConfigWarning::HistoryDisabled);
    }
    for (field, value) in [
        ("historyMaxEntries", config.history_max_entries),
        ("debugMaxEntries", config.debug_max_entries),
    ] {
        if value > LARGE_BOUND_THRESHOLD {
            warnings.push(ConfigWarning::LargeBound {
                field: field.to_owned(),
                value,
            });
        }
    }
    if config.debug {
        warnings.push(ConfigWarning::DebugEnabled);
    }

    if errors.is_empty() {
        Ok(warnings)
    } else {
        Err(ConfigError::ValidationError { reasons: errors })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
