// SPDX-License-Identifier: MIT OR Apache-2.0
//! The config bean: runtime knobs of the running bridge, plus the
//! registry rescan operation.

use beanbus_core::{AttrInfo, BeanInfo, BeanValue, ManagementBean, OpInfo};
use beanbus_error::BridgeError;
use beanbus_history::{DebugStore, HistoryStore};
use std::sync::Arc;

/// Re-runs detection and swaps the registry snapshot.
pub type RescanFn = Arc<dyn Fn() -> Result<(), BridgeError> + Send + Sync>;

/// `type=Config`: view and modify the bridge's runtime knobs.
pub struct ConfigBean {
    agent_id: String,
    history: Arc<HistoryStore>,
    debug: Arc<DebugStore>,
    rescan: RescanFn,
}

impl ConfigBean {
    const NAME: &'static str = "config bean";

    /// Wire up the bean.
    #[must_use]
    pub fn new(
        agent_id: String,
        history: Arc<HistoryStore>,
        debug: Arc<DebugStore>,
        rescan: RescanFn,
    ) -> Self {
        Self {
            agent_id,
            history,
            debug,
            rescan,
        }
    }
}

impl ManagementBean for ConfigBean {
    fn info(&self) -> BeanInfo {
        BeanInfo {
            class_name: "ConfigBean".into(),
            description: "Runtime knobs of the bridge".into(),
            attributes: vec![
                AttrInfo::readonly("AgentId", "string", "identity of this bridge instance"),
                AttrInfo::read_write("Debug", "bool", "whether debug recording is on"),
                AttrInfo::read_write("HistoryMaxEntries", "int", "default history limit per key"),
                AttrInfo::read_write("MaxDebugEntries", "int", "debug ring size"),
            ],
            operations: vec![
                OpInfo {
                    name: "rescan".into(),
                    params: vec![],
                    return_type: "void".into(),
                    description: "re-run detection and rebuild the registry set".into(),
                },
                OpInfo {
                    name: "resetHistoryEntries".into(),
                    params: vec![],
                    return_type: "void".into(),
                    description: "drop all recorded history".into(),
                },
                OpInfo {
                    name: "resetDebugInfo".into(),
                    params: vec![],
                    return_type: "void".into(),
                    description: "clear the debug ring".into(),
                },
            ],
        }
    }

    fn get_attribute(&self, name: &str) -> Result<BeanValue, BridgeError> {
        match name {
            "AgentId" => Ok(BeanValue::Text(self.agent_id.clone())),
            "Debug" => Ok(BeanValue::Bool(self.debug.is_enabled())),
            "HistoryMaxEntries" => Ok(BeanValue::Int(self.history.default_entries() as i64)),
            "MaxDebugEntries" => Ok(BeanValue::Int(self.debug.max_entries() as i64)),
            other => Err(BridgeError::AttributeNotFound {
                name: Self::NAME.into(),
                attribute: other.into(),
            }),
        }
    }

    fn set_attribute(&self, name: &str, value: BeanValue) -> Result<BeanValue, BridgeError> {
        match (name, &value) {
            ("Debug", BeanValue::Bool(enabled)) => {
                Ok(BeanValue::Bool(self.debug.set_enabled(*enabled)))
            }
            ("HistoryMaxEntries", BeanValue::Int(limit)) if *limit >= 0 => {
                let previous = self.history.default_entries() as i64;
                self.history.set_default_entries(*limit as usize);
                Ok(BeanValue::Int(previous))
            }
            ("MaxDebugEntries", BeanValue::Int(limit)) if *limit >= 0 => {
                let previous = self.debug.max_entries() as i64;
                self.debug.set_max_entries(*limit as usize);
                Ok(BeanValue::Int(previous))
            }
            ("Debug" | "HistoryMaxEntries" | "MaxDebugEntries", other) => Err(
                BridgeError::invalid(format!("{name} cannot be set to {other}")),
            ),
            (other, _) => Err(BridgeError::AttributeNotFound {
                name: Self::NAME.into(),
                attribute: other.into(),
            }),
        }
    }

    fn invoke(&self, op: &str, _args: Vec<BeanValue>) -> Result<BeanValue, BridgeError> {
        match op {
            "rescan" => {
                (self.rescan)()?;
                Ok(BeanValue::Null)
            }
            "resetHistoryEntries" => {
                self.history.reset();
                Ok(BeanValue::Null)
            }
            "resetDebugInfo" => {
                self.debug.reset();
                Ok(BeanValue::Null)
            }
            other => Err(BridgeError::OperationNotFound {
                name: Self::NAME.into(),
                operation: other.into(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn bean(rescans: Arc<AtomicUsize>) -> ConfigBean {
        ConfigBean::new(
            "edge-1".into(),
            Arc::new(HistoryStore::new(10)),
            Arc::new(DebugStore::new(50, false)),
            Arc::new(move || {
                rescans.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        )
    }

    #[test]
    fn knobs_round_trip() {
        let bean = bean(Arc::new(AtomicUsize::new(0)));
        assert_eq!(
            bean.get_attribute("AgentId").unwrap(),
            BeanValue::Text("edge-1".into())
        );
        let previous = bean
            .set_attribute("HistoryMaxEntries", BeanValue::Int(3))
            .unwrap();
        assert_eq!(previous, BeanValue::Int(10));
        assert_eq!(
            bean.get_attribute("HistoryMaxEntries").unwrap(),
            BeanValue::Int(3)
        );
    }

    #[test]
    fn rescan_operation_fires_the_hook() {
        let count = Arc::new(AtomicUsize::new(0));
        let bean = bean(count.clone());
        bean.invoke("rescan", vec![]).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn bad_knob_values_are_invalid() {
        let bean = bean(Arc::new(AtomicUsize::new(0)));
        let err = bean
            .set_attribute("Debug", BeanValue::Text("yes".into()))
            .unwrap_err();
        assert_eq!(err.status(), 400);
    }
}
