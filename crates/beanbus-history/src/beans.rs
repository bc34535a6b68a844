// SPDX-License-Identifier: MIT OR Apache-2.0
//! Management beans exposing the history and debug stores over the
//! protocol itself.

use crate::{DebugEntry, DebugStore, HistoryKey, HistoryStore};
use beanbus_core::{
    AttrInfo, BeanInfo, BeanValue, CompositeValue, ManagementBean, OpInfo, ParamInfo,
};
use beanbus_error::BridgeError;
use std::sync::Arc;

fn expect_int(args: &[BeanValue], index: usize, op: &str) -> Result<i64, BridgeError> {
    match args.get(index) {
        Some(BeanValue::Int(i)) => Ok(*i),
        other => Err(BridgeError::invalid(format!(
            "{op} expects an integer at position {index}, got {}",
            other.map_or("nothing", BeanValue::shape)
        ))),
    }
}

fn expect_text(args: &[BeanValue], index: usize, op: &str) -> Result<String, BridgeError> {
    match args.get(index) {
        Some(BeanValue::Text(s)) => Ok(s.clone()),
        Some(BeanValue::Null) | None => Ok(String::new()),
        Some(other) => Err(BridgeError::invalid(format!(
            "{op} expects a string at position {index}, got {}",
            other.shape()
        ))),
    }
}

// ---------------------------------------------------------------------------
// History bean
// ---------------------------------------------------------------------------

/// `type=History`: view and resize the history store.
pub struct HistoryBean {
    store: Arc<HistoryStore>,
}

impl HistoryBean {
    const NAME: &'static str = "history bean";

    /// Wrap a store.
    #[must_use]
    pub fn new(store: Arc<HistoryStore>) -> Self {
        Self { store }
    }
}

impl ManagementBean for HistoryBean {
    fn info(&self) -> BeanInfo {
        BeanInfo {
            class_name: "HistoryBean".into(),
            description: "History store limits and contents".into(),
            attributes: vec![
                AttrInfo::read_write("HistoryMaxEntries", "int", "default per-key entry limit"),
                AttrInfo::readonly("HistorySize", "int", "total recorded entries"),
                AttrInfo::readonly("HistoryKeyCount", "int", "number of tracked keys"),
                AttrInfo::read_write(
                    "HistoryMaxAge",
                    "long",
                    "maximum entry age in seconds, 0 for unlimited",
                ),
            ],
            operations: vec![
                OpInfo {
                    name: "resetHistoryEntries".into(),
                    params: vec![],
                    return_type: "void".into(),
                    description: "drop all recorded history".into(),
                },
                OpInfo {
                    name: "setHistoryLimit".into(),
                    params: vec![
                        ParamInfo::new("mbean", "string"),
                        ParamInfo::new("attribute", "string"),
                        ParamInfo::new("path", "string"),
                        ParamInfo::new("target", "string"),
                        ParamInfo::new("entries", "int"),
                    ],
                    return_type: "void".into(),
                    description: "override the entry limit for one key".into(),
                },
            ],
        }
    }

    fn get_attribute(&self, name: &str) -> Result<BeanValue, BridgeError> {
        match name {
            "HistoryMaxEntries" => Ok(BeanValue::Int(self.store.default_entries() as i64)),
            "HistorySize" => Ok(BeanValue::Int(self.store.size() as i64)),
            "HistoryKeyCount" => Ok(BeanValue::Int(self.store.key_count() as i64)),
            "HistoryMaxAge" => Ok(BeanValue::Int(self.store.max_age_secs().unwrap_or(0))),
            other => Err(BridgeError::AttributeNotFound {
                name: Self::NAME.into(),
                attribute: other.into(),
            }),
        }
    }

    fn set_attribute(&self, name: &str, value: BeanValue) -> Result<BeanValue, BridgeError> {
        match (name, &value) {
            ("HistoryMaxEntries", BeanValue::Int(limit)) if *limit >= 0 => {
                let previous = self.store.default_entries() as i64;
                self.store.set_default_entries(*limit as usize);
                Ok(BeanValue::Int(previous))
            }
            ("HistoryMaxAge", BeanValue::Int(age)) if *age >= 0 => {
                let previous = self.store.max_age_secs().unwrap_or(0);
                self.store
                    .set_max_age_secs((*age > 0).then_some(*age));
                Ok(BeanValue::Int(previous))
            }
            ("HistoryMaxEntries" | "HistoryMaxAge", other) => Err(BridgeError::invalid(format!(
                "{name} expects a non-negative integer, got {other}"
            ))),
            (other, _) => Err(BridgeError::AttributeNotFound {
                name: Self::NAME.into(),
                attribute: other.into(),
            }),
        }
    }

    fn invoke(&self, op: &str, args: Vec<BeanValue>) -> Result<BeanValue, BridgeError> {
        match op {
            "resetHistoryEntries" => {
                self.store.reset();
                Ok(BeanValue::Null)
            }
            "setHistoryLimit" => {
                let name = expect_text(&args, 0, op)?;
                if name.is_empty() {
                    return Err(BridgeError::invalid("setHistoryLimit requires an mbean name"));
                }
                let member = expect_text(&args, 1, op)?;
                let path = expect_text(&args, 2, op)?;
                let target = expect_text(&args, 3, op)?;
                let entries = expect_int(&args, 4, op)?;
                if entries < 0 {
                    return Err(BridgeError::invalid("entry limit must be non-negative"));
                }
                let parsed = beanbus_core::ObjectName::parse(&name)
                    .map_err(BridgeError::from)?;
                self.store.set_limit(
                    HistoryKey {
                        name: parsed.canonical(),
                        member: (!member.is_empty()).then_some(member),
                        path: (!path.is_empty()).then_some(path),
                        target: (!target.is_empty()).then_some(target),
                    },
                    entries as usize,
                );
                Ok(BeanValue::Null)
            }
            other => Err(BridgeError::OperationNotFound {
                name: Self::NAME.into(),
                operation: other.into(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Debug bean
// ---------------------------------------------------------------------------

/// `type=Debug`: dump and reset the debug ring.
pub struct DebugBean {
    store: Arc<DebugStore>,
}

impl DebugBean {
    const NAME: &'static str = "debug bean";

    /// Wrap a store.
    #[must_use]
    pub fn new(store: Arc<DebugStore>) -> Self {
        Self { store }
    }

    fn entry_value(entry: &DebugEntry) -> BeanValue {
        let mut fields = vec![
            ("timestamp", BeanValue::Int(entry.timestamp)),
            ("level", BeanValue::Text(entry.level.clone())),
            ("message", BeanValue::Text(entry.message.clone())),
        ];
        if let Some(stacktrace) = &entry.stacktrace {
            fields.push(("stacktrace", BeanValue::Text(stacktrace.clone())));
        }
        BeanValue::Composite(CompositeValue::new("DebugEntry", fields))
    }
}

impl ManagementBean for DebugBean {
    fn info(&self) -> BeanInfo {
        BeanInfo {
            class_name: "DebugBean".into(),
            description: "Debug ring of recent errors and requests".into(),
            attributes: vec![
                AttrInfo::read_write("Debug", "bool", "whether debug recording is on"),
                AttrInfo::read_write("MaxDebugEntries", "int", "ring size"),
            ],
            operations: vec![
                OpInfo {
                    name: "debugInfo".into(),
                    params: vec![],
                    return_type: "list".into(),
                    description: "dump the ring, oldest first".into(),
                },
                OpInfo {
                    name: "resetDebugInfo".into(),
                    params: vec![],
                    return_type: "void".into(),
                    description: "clear the ring".into(),
                },
            ],
        }
    }

    fn get_attribute(&self, name: &str) -> Result<BeanValue, BridgeError> {
        match name {
            "Debug" => Ok(BeanValue::Bool(self.store.is_enabled())),
            "MaxDebugEntries" => Ok(BeanValue::Int(self.store.max_entries() as i64)),
            other => Err(BridgeError::AttributeNotFound {
                name: Self::NAME.into(),
                attribute: other.into(),
            }),
        }
    }

    fn set_attribute(&self, name: &str, value: BeanValue) -> Result<BeanValue, BridgeError> {
        match (name, &value) {
            ("Debug", BeanValue::Bool(enabled)) => {
                Ok(BeanValue::Bool(self.store.set_enabled(*enabled)))
            }
            ("MaxDebugEntries", BeanValue::Int(limit)) if *limit >= 0 => {
                let previous = self.store.max_entries() as i64;
                self.store.set_max_entries(*limit as usize);
                Ok(BeanValue::Int(previous))
            }
            ("Debug" | "MaxDebugEntries", other) => Err(BridgeError::invalid(format!(
                "{name} cannot be set to {other}"
            ))),
            (other, _) => Err(BridgeError::AttributeNotFound {
                name: Self::NAME.into(),
                attribute: other.into(),
            }),
        }
    }

    fn invoke(&self, op: &str, _args: Vec<BeanValue>) -> Result<BeanValue, BridgeError> {
        match op {
            "debugInfo" => Ok(BeanValue::Seq(
                self.store.dump().iter().map(Self::entry_value).collect(),
            )),
            "resetDebugInfo" => {
                self.store.reset();
                Ok(BeanValue::Null)
            }
            other => Err(BridgeError::OperationNotFound {
                name: Self::NAME.into(),
                operation: other.into(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
