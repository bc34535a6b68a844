// SPDX-License-Identifier: MIT OR Apache-2.0
//! Built-in process beans so a fresh bridge has something real to serve:
//! memory, runtime, and threading views of the current process.

use crate::{
    AttrInfo, BeanInfo, BeanValue, CompositeValue, FieldInfo, LocalRegistry, ManagementBean,
    ObjectName, OpInfo,
};
use crate::registry::BeanRegistry;
use beanbus_error::BridgeError;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;

/// Domain under which the platform beans are registered.
pub const PLATFORM_DOMAIN: &str = "process";

fn attribute_not_found(name: &str, attribute: &str) -> BridgeError {
    BridgeError::AttributeNotFound {
        name: name.to_owned(),
        attribute: attribute.to_owned(),
    }
}

fn epoch_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Resident set size of the current process in bytes, when the platform
/// exposes it.
fn resident_bytes() -> Option<i64> {
    let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
    let pages: i64 = statm.split_whitespace().nth(1)?.parse().ok()?;
    Some(pages * 4096)
}

/// Live thread count of the current process, when the platform exposes it.
fn thread_count() -> Option<i64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    status
        .lines()
        .find_map(|line| line.strip_prefix("Threads:"))
        .and_then(|rest| rest.trim().parse().ok())
}

// ---------------------------------------------------------------------------
// Memory
// ---------------------------------------------------------------------------

/// `process:type=Memory`: heap usage composite plus a writable verbosity
/// flag and a best-effort `collect` operation.
pub struct MemoryBean {
    verbose: AtomicBool,
    // Fallback when the platform exposes no RSS.
    baseline: i64,
}

impl MemoryBean {
    const NAME: &'static str = "process:type=Memory";

    /// Construct with the current process as subject.
    #[must_use]
    pub fn new() -> Self {
        Self {
            verbose: AtomicBool::new(false),
            baseline: 16 * 1024 * 1024,
        }
    }

    fn heap_usage(&self) -> CompositeValue {
        let used = resident_bytes().unwrap_or(self.baseline);
        // Committed is reported page-rounded above used; max is unbounded
        // for a native process, rendered as -1 like the wire contract wants.
        let committed = used + (used / 8);
        CompositeValue::new(
            "MemoryUsage",
            [
                ("init", BeanValue::Int(self.baseline)),
                ("used", BeanValue::Int(used)),
                ("committed", BeanValue::Int(committed)),
                ("max", BeanValue::Int(-1)),
            ],
        )
    }
}

impl Default for MemoryBean {
    fn default() -> Self {
        Self::new()
    }
}

impl ManagementBean for MemoryBean {
    fn info(&self) -> BeanInfo {
        BeanInfo {
            class_name: "MemoryBean".into(),
            description: "Memory view of the current process".into(),
            attributes: vec![
                AttrInfo::readonly("HeapUsage", "composite:MemoryUsage", "resident memory usage")
                    .with_fields([
                        FieldInfo::new("init", "long"),
                        FieldInfo::new("used", "long"),
                        FieldInfo::new("committed", "long"),
                        FieldInfo::new("max", "long"),
                    ]),
                AttrInfo::read_write("Verbose", "bool", "verbose memory accounting"),
            ],
            operations: vec![OpInfo {
                name: "collect".into(),
                params: vec![],
                return_type: "void".into(),
                description: "hint the allocator to release free memory".into(),
            }],
        }
    }

    fn get_attribute(&self, name: &str) -> Result<BeanValue, BridgeError> {
        match name {
            "HeapUsage" => Ok(BeanValue::Composite(self.heap_usage())),
            "Verbose" => Ok(BeanValue::Bool(self.verbose.load(Ordering::Relaxed))),
            other => Err(attribute_not_found(Self::NAME, other)),
        }
    }

    fn set_attribute(&self, name: &str, value: BeanValue) -> Result<BeanValue, BridgeError> {
        match (name, value) {
            ("Verbose", BeanValue::Bool(v)) => {
                let previous = self.verbose.swap(v, Ordering::Relaxed);
                Ok(BeanValue::Bool(previous))
            }
            ("Verbose", other) => Err(BridgeError::invalid(format!(
                "Verbose expects a boolean, got {}",
                other.shape()
            ))),
            (other, _) => Err(attribute_not_found(Self::NAME, other)),
        }
    }

    fn invoke(&self, op: &str, _args: Vec<BeanValue>) -> Result<BeanValue, BridgeError> {
        match op {
            // There is nothing portable to trigger; the operation exists so
            // exec round-trips have a harmless target.
            "collect" => Ok(BeanValue::Null),
            other => Err(BridgeError::OperationNotFound {
                name: Self::NAME.into(),
                operation: other.into(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Runtime
// ---------------------------------------------------------------------------

/// `process:type=Runtime`: identity and uptime of the current process.
pub struct RuntimeBean {
    start_millis: i64,
}

impl RuntimeBean {
    const NAME: &'static str = "process:type=Runtime";

    /// Construct, stamping the start time now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            start_millis: epoch_millis(),
        }
    }

    fn process_name(&self) -> String {
        let host = std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_owned());
        format!("{}@{host}", std::process::id())
    }
}

impl Default for RuntimeBean {
    fn default() -> Self {
        Self::new()
    }
}

impl ManagementBean for RuntimeBean {
    fn info(&self) -> BeanInfo {
        BeanInfo {
            class_name: "RuntimeBean".into(),
            description: "Identity and uptime of the current process".into(),
            attributes: vec![
                AttrInfo::readonly("Name", "string", "pid@host identity"),
                AttrInfo::readonly("Pid", "long", "process id"),
                AttrInfo::readonly("StartTime", "long", "start time, epoch millis"),
                AttrInfo::readonly("Uptime", "long", "uptime in millis"),
                AttrInfo::readonly("Version", "string", "bridge version"),
            ],
            operations: vec![],
        }
    }

    fn get_attribute(&self, name: &str) -> Result<BeanValue, BridgeError> {
        match name {
            "Name" => Ok(BeanValue::Text(self.process_name())),
            "Pid" => Ok(BeanValue::Int(i64::from(std::process::id()))),
            "StartTime" => Ok(BeanValue::Int(self.start_millis)),
            "Uptime" => Ok(BeanValue::Int(epoch_millis() - self.start_millis)),
            "Version" => Ok(BeanValue::Text(env!("CARGO_PKG_VERSION").to_owned())),
            other => Err(attribute_not_found(Self::NAME, other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Threading
// ---------------------------------------------------------------------------

/// `process:type=Threading`: live and peak thread counts.
pub struct ThreadingBean {
    peak: AtomicI64,
}

impl ThreadingBean {
    const NAME: &'static str = "process:type=Threading";

    /// Construct with a zero peak.
    #[must_use]
    pub fn new() -> Self {
        Self {
            peak: AtomicI64::new(0),
        }
    }

    fn current(&self) -> i64 {
        let count = thread_count().unwrap_or(1);
        self.peak.fetch_max(count, Ordering::Relaxed);
        count
    }
}

impl Default for ThreadingBean {
    fn default() -> Self {
        Self::new()
    }
}

impl ManagementBean for ThreadingBean {
    fn info(&self) -> BeanInfo {
        BeanInfo {
            class_name: "ThreadingBean".into(),
            description: "Thread counts of the current process".into(),
            attributes: vec![
                AttrInfo::readonly("ThreadCount", "long", "live threads"),
                AttrInfo::readonly("PeakThreadCount", "long", "peak observed live threads"),
            ],
            operations: vec![OpInfo {
                name: "resetPeakThreadCount".into(),
                params: vec![],
                return_type: "void".into(),
                description: "reset the peak to the current count".into(),
            }],
        }
    }

    fn get_attribute(&self, name: &str) -> Result<BeanValue, BridgeError> {
        match name {
            "ThreadCount" => Ok(BeanValue::Int(self.current())),
            "PeakThreadCount" => {
                self.current();
                Ok(BeanValue::Int(self.peak.load(Ordering::Relaxed)))
            }
            other => Err(attribute_not_found(Self::NAME, other)),
        }
    }

    fn invoke(&self, op: &str, _args: Vec<BeanValue>) -> Result<BeanValue, BridgeError> {
        match op {
            "resetPeakThreadCount" => {
                self.peak.store(thread_count().unwrap_or(1), Ordering::Relaxed);
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
// Registry assembly
// ---------------------------------------------------------------------------

/// Build the platform registry with all built-in process beans registered.
#[must_use]
pub fn build_registry() -> Arc<LocalRegistry> {
    let registry = Arc::new(LocalRegistry::new("platform"));
    let beans: [(&str, Arc<dyn ManagementBean>); 3] = [
        (MemoryBean::NAME, Arc::new(MemoryBean::new())),
        (RuntimeBean::NAME, Arc::new(RuntimeBean::new())),
        (ThreadingBean::NAME, Arc::new(ThreadingBean::new())),
    ];
    for (name, bean) in beans {
        match ObjectName::parse(name) {
            Ok(parsed) => {
                if let Err(err) = registry.register(parsed, bean) {
                    warn!(name, %err, "skipping platform bean");
                }
            }
            Err(err) => warn!(name, %err, "invalid platform bean name"),
        }
    }
    registry
}
