// SPDX-License-Identifier: MIT OR Apache-2.0
//! The in-process bean registry: a catalog of management beans addressable
//! by object name.

use crate::{BeanInfo, BeanValue, ManagementBean, ObjectName};
use beanbus_error::BridgeError;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

// ---------------------------------------------------------------------------
// BeanRegistry
// ---------------------------------------------------------------------------

/// An in-process catalog of management beans.
///
/// All operations take `&self`; implementations are internally
/// synchronised.  Lookup misses surface as
/// [`BridgeError::InstanceNotFound`], which dispatch layers treat as "try
/// the next registry".
pub trait BeanRegistry: Send + Sync {
    /// Identifier used in logs and diagnostics.
    fn id(&self) -> &str;

    /// All registered names matching `pattern`, sorted canonically.
    /// `None` means "everything".
    fn query_names(&self, pattern: Option<&ObjectName>) -> Vec<ObjectName>;

    /// Whether a concrete name is registered here.
    fn is_registered(&self, name: &ObjectName) -> bool;

    /// Metadata of one bean.
    fn bean_info(&self, name: &ObjectName) -> Result<BeanInfo, BridgeError>;

    /// Read one attribute of one bean.
    fn get_attribute(&self, name: &ObjectName, attr: &str) -> Result<BeanValue, BridgeError>;

    /// Write one attribute of one bean, returning the previous value.
    fn set_attribute(
        &self,
        name: &ObjectName,
        attr: &str,
        value: BeanValue,
    ) -> Result<BeanValue, BridgeError>;

    /// Invoke one operation of one bean.
    fn invoke(
        &self,
        name: &ObjectName,
        op: &str,
        args: Vec<BeanValue>,
    ) -> Result<BeanValue, BridgeError>;

    /// Register a bean under a concrete name.
    fn register(
        &self,
        name: ObjectName,
        bean: Arc<dyn ManagementBean>,
    ) -> Result<(), BridgeError>;

    /// Remove a bean.
    fn unregister(&self, name: &ObjectName) -> Result<(), BridgeError>;
}

// ---------------------------------------------------------------------------
// LocalRegistry
// ---------------------------------------------------------------------------

/// The standard [`BeanRegistry`] implementation over a lock-guarded map.
pub struct LocalRegistry {
    id: String,
    beans: RwLock<HashMap<ObjectName, Arc<dyn ManagementBean>>>,
}

impl LocalRegistry {
    /// Create an empty registry with the given identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            beans: RwLock::new(HashMap::new()),
        }
    }

    fn bean(&self, name: &ObjectName) -> Result<Arc<dyn ManagementBean>, BridgeError> {
        let beans = self.beans.read().unwrap_or_else(|e| e.into_inner());
        beans
            .get(name)
            .cloned()
            .ok_or_else(|| BridgeError::InstanceNotFound(name.canonical()))
    }

    /// Number of registered beans.
    #[must_use]
    pub fn len(&self) -> usize {
        self.beans.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BeanRegistry for LocalRegistry {
    fn id(&self) -> &str {
        &self.id
    }

    fn query_names(&self, pattern: Option<&ObjectName>) -> Vec<ObjectName> {
        let beans = self.beans.read().unwrap_or_else(|e| e.into_inner());
        let mut names: Vec<ObjectName> = beans
            .keys()
            .filter(|name| pattern.is_none_or(|p| p.matches(name)))
            .cloned()
            .collect();
        names.sort();
        names
    }

    fn is_registered(&self, name: &ObjectName) -> bool {
        let beans = self.beans.read().unwrap_or_else(|e| e.into_inner());
        beans.contains_key(name)
    }

    fn bean_info(&self, name: &ObjectName) -> Result<BeanInfo, BridgeError> {
        Ok(self.bean(name)?.info())
    }

    fn get_attribute(&self, name: &ObjectName, attr: &str) -> Result<BeanValue, BridgeError> {
        self.bean(name)?.get_attribute(attr)
    }

    fn set_attribute(
        &self,
        name: &ObjectName,
        attr: &str,
        value: BeanValue,
    ) -> Result<BeanValue, BridgeError> {
        self.bean(name)?.set_attribute(attr, value)
    }

    fn invoke(
        &self,
        name: &ObjectName,
        op: &str,
        args: Vec<BeanValue>,
    ) -> Result<BeanValue, BridgeError> {
        self.bean(name)?.invoke(op, args)
    }

    fn register(
        &self,
        name: ObjectName,
        bean: Arc<dyn ManagementBean>,
    ) -> Result<(), BridgeError> {
        if name.is_pattern() {
            return Err(BridgeError::invalid(format!(
                "cannot register bean under pattern name {name}"
            )));
        }
        let mut beans = self.beans.write().unwrap_or_else(|e| e.into_inner());
        if beans.contains_key(&name) {
            return Err(BridgeError::invalid(format!(
                "a bean is already registered as {}",
                name.canonical()
            )));
        }
        debug!(registry = %self.id, name = %name, "registering bean");
        beans.insert(name, bean);
        Ok(())
    }

    fn unregister(&self, name: &ObjectName) -> Result<(), BridgeError> {
        let mut beans = self.beans.write().unwrap_or_else(|e| e.into_inner());
        beans
            .remove(name)
            .map(|_| debug!(registry = %self.id, name = %name, "unregistered bean"))
            .ok_or_else(|| BridgeError::InstanceNotFound(name.canonical()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
