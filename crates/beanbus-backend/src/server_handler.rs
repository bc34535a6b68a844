// SPDX-License-Identifier: MIT OR Apache-2.0
//! The bean-server handler: the merged, ordered set of registries plus
//! the bridge's own bean registrations.

use beanbus_core::{BeanRegistry, ManagementBean, ObjectName};
use beanbus_error::BridgeError;
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, warn};

type RegistrySet = Arc<Vec<Arc<dyn BeanRegistry>>>;

/// Merged registry view used by every dispatch.
///
/// The set is built once at startup (platform registry first, then
/// detector contributions) and swapped atomically on an explicit rescan;
/// readers clone the snapshot and never lock for the duration of a
/// request.
pub struct BeanServerHandler {
    registries: RwLock<RegistrySet>,
    // The bridge's own beans and the registry each one landed on, so
    // shutdown can unregister symmetrically.
    own_beans: Mutex<Vec<(Arc<dyn BeanRegistry>, ObjectName)>>,
}

fn dedupe(ordered: Vec<Arc<dyn BeanRegistry>>) -> Vec<Arc<dyn BeanRegistry>> {
    let mut seen: Vec<String> = Vec::new();
    let mut out = Vec::new();
    for registry in ordered {
        if seen.iter().any(|id| id == registry.id()) {
            debug!(registry = registry.id(), "dropping duplicate registry");
            continue;
        }
        seen.push(registry.id().to_owned());
        out.push(registry);
    }
    out
}

impl BeanServerHandler {
    /// Build from an ordered registry list; duplicates (by id) collapse
    /// to their first occurrence.
    #[must_use]
    pub fn new(ordered: Vec<Arc<dyn BeanRegistry>>) -> Self {
        Self {
            registries: RwLock::new(Arc::new(dedupe(ordered))),
            own_beans: Mutex::new(Vec::new()),
        }
    }

    /// Snapshot of the current registry set.
    #[must_use]
    pub fn registries(&self) -> RegistrySet {
        self.registries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Swap in a rebuilt registry set (rescan).
    pub fn swap(&self, ordered: Vec<Arc<dyn BeanRegistry>>) {
        let mut guard = self.registries.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::new(dedupe(ordered));
    }

    /// Register one of the bridge's own beans on the preferred (first)
    /// registry, remembering where it went.
    pub fn register_bridge_bean(
        &self,
        name: ObjectName,
        bean: Arc<dyn ManagementBean>,
    ) -> Result<(), BridgeError> {
        let snapshot = self.registries();
        let registry = snapshot
            .first()
            .ok_or_else(|| BridgeError::internal("no registry available for bridge beans"))?;
        registry.register(name.clone(), bean)?;
        self.own_beans
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((registry.clone(), name));
        Ok(())
    }

    /// Unregister every bridge bean, in reverse registration order.
    ///
    /// One failure never stops the rest; collected failures surface as a
    /// single aggregate error at the end.
    pub fn unregister_bridge_beans(&self) -> Result<(), BridgeError> {
        let mut own = self.own_beans.lock().unwrap_or_else(|e| e.into_inner());
        let mut failures: Vec<String> = Vec::new();
        while let Some((registry, name)) = own.pop() {
            if let Err(err) = registry.unregister(&name) {
                warn!(name = %name, %err, "failed to unregister bridge bean");
                failures.push(format!("{name}: {err}"));
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(BridgeError::internal(format!(
                "failed to unregister {} bridge bean(s): {}",
                failures.len(),
                failures.join("; ")
            )))
        }
    }

    /// Run `operation` against the first registry that knows the target.
    ///
    /// `InstanceNotFound` moves on to the next registry; any other error
    /// propagates immediately.  A miss on every registry re-raises the
    /// last `InstanceNotFound`.
    pub fn dispatch_single<T>(
        &self,
        operation: impl Fn(&dyn BeanRegistry) -> Result<T, BridgeError>,
    ) -> Result<T, BridgeError> {
        let snapshot = self.registries();
        let mut last_miss: Option<BridgeError> = None;
        for registry in snapshot.iter() {
            match operation(registry.as_ref()) {
                Ok(value) => return Ok(value),
                Err(err @ BridgeError::InstanceNotFound(_)) => last_miss = Some(err),
                Err(err) => return Err(err),
            }
        }
        Err(last_miss
            .unwrap_or_else(|| BridgeError::InstanceNotFound("<no registries>".into())))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use beanbus_core::{AttrInfo, BeanInfo, BeanValue, LocalRegistry, platform};

    struct Fixed(i64);

    impl ManagementBean for Fixed {
        fn info(&self) -> BeanInfo {
            BeanInfo {
                class_name: "Fixed".into(),
                description: String::new(),
                attributes: vec![AttrInfo::readonly("Value", "long", "")],
                operations: vec![],
            }
        }

        fn get_attribute(&self, name: &str) -> Result<BeanValue, BridgeError> {
            match name {
                "Value" => Ok(BeanValue::Int(self.0)),
                other => Err(BridgeError::AttributeNotFound {
                    name: "fixed".into(),
                    attribute: other.into(),
                }),
            }
        }
    }

    fn name(s: &str) -> ObjectName {
        ObjectName::parse(s).unwrap()
    }

    #[test]
    fn dispatch_single_walks_registries_in_order() {
        let first = Arc::new(LocalRegistry::new("first"));
        let second = Arc::new(LocalRegistry::new("second"));
        second
            .register(name("test:type=OnlyInSecond"), Arc::new(Fixed(9)))
            .unwrap();
        let handler = BeanServerHandler::new(vec![first, second]);

        let target = name("test:type=OnlyInSecond");
        let value = handler
            .dispatch_single(|registry| registry.get_attribute(&target, "Value"))
            .unwrap();
        assert_eq!(value, BeanValue::Int(9));
    }

    #[test]
    fn miss_everywhere_is_instance_not_found() {
        let handler = BeanServerHandler::new(vec![
            Arc::new(LocalRegistry::new("a")) as Arc<dyn BeanRegistry>,
            Arc::new(LocalRegistry::new("b")),
        ]);
        let target = name("test:type=Nowhere");
        let err = handler
            .dispatch_single(|registry| registry.get_attribute(&target, "X"))
            .unwrap_err();
        assert_eq!(err.error_type(), "InstanceNotFound");
    }

    #[test]
    fn non_miss_errors_stop_the_walk() {
        let first = Arc::new(LocalRegistry::new("first"));
        first
            .register(name("test:type=Broken"), Arc::new(Fixed(1)))
            .unwrap();
        let handler = BeanServerHandler::new(vec![first]);
        let target = name("test:type=Broken");
        let err = handler
            .dispatch_single(|registry| registry.get_attribute(&target, "Missing"))
            .unwrap_err();
        assert_eq!(err.error_type(), "AttributeNotFound");
    }

    #[test]
    fn duplicate_registries_collapse() {
        let platform = platform::build_registry();
        let handler = BeanServerHandler::new(vec![platform.clone(), platform]);
        assert_eq!(handler.registries().len(), 1);
    }

    #[test]
    fn bridge_beans_register_on_first_registry_and_unregister() {
        let platform = platform::build_registry();
        let other = Arc::new(LocalRegistry::new("other"));
        let handler =
            BeanServerHandler::new(vec![platform.clone(), other.clone()]);

        handler
            .register_bridge_bean(name("beanbus:type=Test"), Arc::new(Fixed(1)))
            .unwrap();
        assert!(platform.is_registered(&name("beanbus:type=Test")));
        assert!(!other.is_registered(&name("beanbus:type=Test")));

        handler.unregister_bridge_beans().unwrap();
        assert!(!platform.is_registered(&name("beanbus:type=Test")));
    }

    #[test]
    fn unregister_aggregates_failures_but_continues() {
        let platform = platform::build_registry();
        let handler = BeanServerHandler::new(vec![platform.clone()]);
        handler
            .register_bridge_bean(name("beanbus:type=A"), Arc::new(Fixed(1)))
            .unwrap();
        handler
            .register_bridge_bean(name("beanbus:type=B"), Arc::new(Fixed(2)))
            .unwrap();
        // Sabotage one of them behind the handler's back.
        platform.unregister(&name("beanbus:type=A")).unwrap();

        let err = handler.unregister_bridge_beans().unwrap_err();
        assert!(err.to_string().contains("1 bridge bean"));
        // The healthy one was still removed.
        assert!(!platform.is_registered(&name("beanbus:type=B")));
    }

    #[test]
    fn swap_replaces_the_snapshot() {
        let handler = BeanServerHandler::new(vec![platform::build_registry() as _]);
        assert_eq!(handler.registries().len(), 1);
        handler.swap(vec![
            Arc::new(LocalRegistry::new("x")),
            Arc::new(LocalRegistry::new("y")),
        ]);
        assert_eq!(handler.registries().len(), 2);
    }
}
