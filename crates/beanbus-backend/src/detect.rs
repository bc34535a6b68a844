// SPDX-License-Identifier: MIT OR Apache-2.0
//! Product detection: an ordered chain of detectors examines the live
//! registry set once at startup and yields a [`ServerHandle`] describing
//! the hosting product, optionally contributing extra registries and
//! per-dispatch middleware.

use beanbus_config::BridgeConfig;
use beanbus_core::{
    AttrInfo, BeanInfo, BeanRegistry, BeanValue, ManagementBean, ObjectName,
};
use beanbus_error::BridgeError;
use beanbus_protocol::BridgeRequest;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, warn};

// ---------------------------------------------------------------------------
// ServerHandle
// ---------------------------------------------------------------------------

/// Middleware run before every dispatch; product detectors install these
/// to work around product quirks.
pub type PreDispatchHook =
    Arc<dyn Fn(&[Arc<dyn BeanRegistry>], &BridgeRequest) + Send + Sync>;

/// Hook run once after detection with the runtime configuration; this is
/// where a product may boot side registries.
pub type PostDetectHook = Arc<
    dyn Fn(&[Arc<dyn BeanRegistry>], &BridgeConfig) -> Result<(), BridgeError> + Send + Sync,
>;

/// Immutable descriptor of the hosting product, built once at startup.
#[derive(Clone)]
pub struct ServerHandle {
    /// Product vendor.
    pub vendor: String,
    /// Product name; empty for the generic fallback.
    pub product: String,
    /// Product version.
    pub version: String,
    /// URL under which this agent is reachable, when known.
    pub agent_url: Option<String>,
    /// Free-form extra details.
    pub extra_info: BTreeMap<String, String>,
    pre_dispatch: Vec<PreDispatchHook>,
    post_detect: Option<PostDetectHook>,
}

impl std::fmt::Debug for ServerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerHandle")
            .field("vendor", &self.vendor)
            .field("product", &self.product)
            .field("version", &self.version)
            .field("pre_dispatch", &self.pre_dispatch.len())
            .finish()
    }
}

impl ServerHandle {
    /// A handle with the given identity and no hooks.
    pub fn new(
        vendor: impl Into<String>,
        product: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            vendor: vendor.into(),
            product: product.into(),
            version: version.into(),
            agent_url: None,
            extra_info: BTreeMap::new(),
            pre_dispatch: Vec::new(),
            post_detect: None,
        }
    }

    /// The fallback handle when no detector matched.
    #[must_use]
    pub fn generic() -> Self {
        Self::new("beanbus", "", env!("CARGO_PKG_VERSION"))
    }

    /// Attach an extra-info entry.
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_info.insert(key.into(), value.into());
        self
    }

    /// Append a pre-dispatch middleware function.
    #[must_use]
    pub fn with_pre_dispatch(mut self, hook: PreDispatchHook) -> Self {
        self.pre_dispatch.push(hook);
        self
    }

    /// Install the post-detect hook.
    #[must_use]
    pub fn with_post_detect(mut self, hook: PostDetectHook) -> Self {
        self.post_detect = Some(hook);
        self
    }

    /// Run every pre-dispatch middleware, in installation order.
    pub fn run_pre_dispatch(
        &self,
        registries: &[Arc<dyn BeanRegistry>],
        request: &BridgeRequest,
    ) {
        for hook in &self.pre_dispatch {
            hook(registries, request);
        }
    }

    /// Run the post-detect hook once; failures are logged, never raised.
    pub fn run_post_detect(
        &self,
        registries: &[Arc<dyn BeanRegistry>],
        config: &BridgeConfig,
    ) {
        if let Some(hook) = &self.post_detect
            && let Err(err) = hook(registries, config)
        {
            error!(product = %self.product, %err, "post-detect hook failed");
        }
    }
}

// ---------------------------------------------------------------------------
// ServerDetector
// ---------------------------------------------------------------------------

/// One product detector in the chain.
pub trait ServerDetector: Send + Sync {
    /// Detector name, for logs.
    fn name(&self) -> &str;

    /// Examine the registry set; return a handle when this detector
    /// recognises the hosting product.
    fn detect(&self, registries: &[Arc<dyn BeanRegistry>]) -> Option<ServerHandle>;

    /// Registries this product contributes beyond the platform one.
    ///
    /// Failures here are logged and swallowed by the chain runner;
    /// startup never aborts on a detector.
    fn extra_registries(&self) -> Result<Vec<Arc<dyn BeanRegistry>>, BridgeError> {
        Ok(Vec::new())
    }
}

/// Recognises a plain process by its platform runtime bean.
pub struct ProcessDetector;

impl ServerDetector for ProcessDetector {
    fn name(&self) -> &str {
        "process"
    }

    fn detect(&self, registries: &[Arc<dyn BeanRegistry>]) -> Option<ServerHandle> {
        let runtime = ObjectName::parse("process:type=Runtime").ok()?;
        let registry = registries.iter().find(|r| r.is_registered(&runtime))?;
        let version = match registry.get_attribute(&runtime, "Version") {
            Ok(BeanValue::Text(v)) => v,
            _ => String::new(),
        };
        Some(ServerHandle::new("beanbus", "process", version))
    }
}

/// Recognises container environments from well-known host markers.
pub struct ContainerDetector;

impl ContainerDetector {
    fn container_runtime() -> Option<&'static str> {
        if std::path::Path::new("/.dockerenv").exists() {
            return Some("docker");
        }
        let cgroup = std::fs::read_to_string("/proc/1/cgroup").unwrap_or_default();
        if cgroup.contains("kubepods") {
            Some("kubernetes")
        } else {
            None
        }
    }
}

impl ServerDetector for ContainerDetector {
    fn name(&self) -> &str {
        "container"
    }

    fn detect(&self, _registries: &[Arc<dyn BeanRegistry>]) -> Option<ServerHandle> {
        Self::container_runtime().map(|runtime| {
            ServerHandle::new("oci", "container", "")
                .with_extra("runtime", runtime)
        })
    }
}

/// The detectors bundled with the bridge, in evaluation order.
#[must_use]
pub fn bundled_detectors() -> Vec<Arc<dyn ServerDetector>> {
    vec![Arc::new(ContainerDetector), Arc::new(ProcessDetector)]
}

// ---------------------------------------------------------------------------
// Chain runner
// ---------------------------------------------------------------------------

/// Outcome of running the detector chain.
pub struct Detection {
    /// The winning (or generic fallback) handle.
    pub handle: ServerHandle,
    /// Registries contributed by detectors, in chain order.
    pub extra_registries: Vec<Arc<dyn BeanRegistry>>,
}

/// Run the chain: collect every detector's contributed registries
/// (failures swallowed), then let the first non-null detection win.
#[must_use]
pub fn run_detectors(
    detectors: &[Arc<dyn ServerDetector>],
    base: &[Arc<dyn BeanRegistry>],
) -> Detection {
    let mut extra_registries: Vec<Arc<dyn BeanRegistry>> = Vec::new();
    for detector in detectors {
        match detector.extra_registries() {
            Ok(contributed) => extra_registries.extend(contributed),
            Err(err) => {
                warn!(detector = detector.name(), %err, "detector contribution failed");
            }
        }
    }

    let mut all: Vec<Arc<dyn BeanRegistry>> = base.to_vec();
    all.extend(extra_registries.iter().cloned());

    let handle = detectors
        .iter()
        .find_map(|detector| {
            let handle = detector.detect(&all)?;
            info!(
                detector = detector.name(),
                product = %handle.product,
                version = %handle.version,
                "detected hosting product"
            );
            Some(handle)
        })
        .unwrap_or_else(ServerHandle::generic);

    Detection {
        handle,
        extra_registries,
    }
}

// ---------------------------------------------------------------------------
// ServerHandle bean
// ---------------------------------------------------------------------------

/// `type=ServerHandle`: product/version/agent-url view of the handle.
pub struct ServerHandleBean {
    handle: Arc<ServerHandle>,
}

impl ServerHandleBean {
    const NAME: &'static str = "server handle bean";

    /// Wrap a handle.
    #[must_use]
    pub fn new(handle: Arc<ServerHandle>) -> Self {
        Self { handle }
    }
}

impl ManagementBean for ServerHandleBean {
    fn info(&self) -> BeanInfo {
        BeanInfo {
            class_name: "ServerHandleBean".into(),
            description: "Detected hosting product".into(),
            attributes: vec![
                AttrInfo::readonly("Vendor", "string", "product vendor"),
                AttrInfo::readonly("Product", "string", "product name"),
                AttrInfo::readonly("Version", "string", "product version"),
                AttrInfo::readonly("AgentUrl", "string", "agent URL, when known"),
                AttrInfo::readonly("ExtraInfo", "map", "extra product details"),
            ],
            operations: vec![],
        }
    }

    fn get_attribute(&self, name: &str) -> Result<BeanValue, BridgeError> {
        match name {
            "Vendor" => Ok(BeanValue::Text(self.handle.vendor.clone())),
            "Product" => Ok(BeanValue::Text(self.handle.product.clone())),
            "Version" => Ok(BeanValue::Text(self.handle.version.clone())),
            "AgentUrl" => Ok(self
                .handle
                .agent_url
                .clone()
                .map_or(BeanValue::Null, BeanValue::Text)),
            "ExtraInfo" => Ok(BeanValue::Map(
                self.handle
                    .extra_info
                    .iter()
                    .map(|(k, v)| (k.clone(), BeanValue::Text(v.clone())))
                    .collect(),
            )),
            other => Err(BridgeError::AttributeNotFound {
                name: Self::NAME.into(),
                attribute: other.into(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
