// SPDX-License-Identifier: MIT OR Apache-2.0
//! The backend manager: the single `handle_request` entry point, the
//! dispatcher chain, and the startup wiring that builds everything from a
//! [`BridgeConfig`].

use crate::beans::ConfigBean;
use crate::detect::{
    Detection, ServerDetector, ServerHandle, ServerHandleBean, bundled_detectors, run_detectors,
};
use crate::handlers::{HandlerContext, VerbHandler, build_handlers};
use crate::server_handler::BeanServerHandler;
use beanbus_config::BridgeConfig;
use beanbus_convert::{ConvertOptions, FaultPolicy, to_json};
use beanbus_core::{BeanRegistry, BeanValue, ManagementBean, ObjectName, platform};
use beanbus_error::BridgeError;
use beanbus_history::{DebugBean, DebugStore, HistoryBean, HistoryStore};
use beanbus_policy::{Restrictor, create_restrictor};
use beanbus_protocol::{BridgeRequest, ProcessingOptions, Verb, envelope};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, warn};

// ---------------------------------------------------------------------------
// Dispatchers
// ---------------------------------------------------------------------------

/// Result of a dispatcher run: the raw value plus whether the request
/// path was already applied.
pub struct DispatchOutcome {
    /// The native value to convert.
    pub value: BeanValue,
    /// `true` when the handler consumed the inner path itself.
    pub path_consumed: bool,
}

/// A pluggable request dispatcher.  The first dispatcher whose
/// [`RequestDispatcher::can_handle`] returns `true` claims the request.
pub trait RequestDispatcher: Send + Sync {
    /// Dispatcher name, for logs.
    fn name(&self) -> &str;

    /// Whether this dispatcher claims the request.
    fn can_handle(&self, request: &BridgeRequest) -> bool;

    /// Execute the request.
    fn dispatch(&self, request: &BridgeRequest) -> Result<DispatchOutcome, BridgeError>;
}

/// The standard dispatcher working against the in-process registry set.
pub struct LocalDispatcher {
    server_handler: Arc<BeanServerHandler>,
    server_handle: Arc<ServerHandle>,
    handlers: BTreeMap<Verb, Box<dyn VerbHandler>>,
}

impl LocalDispatcher {
    /// Wire the dispatcher.
    #[must_use]
    pub fn new(
        server_handler: Arc<BeanServerHandler>,
        handlers: BTreeMap<Verb, Box<dyn VerbHandler>>,
        server_handle: Arc<ServerHandle>,
    ) -> Self {
        Self {
            server_handler,
            server_handle,
            handlers,
        }
    }
}

impl RequestDispatcher for LocalDispatcher {
    fn name(&self) -> &str {
        "local"
    }

    fn can_handle(&self, request: &BridgeRequest) -> bool {
        // Proxy-target requests belong to a remote dispatcher.
        request.target().is_none()
    }

    fn dispatch(&self, request: &BridgeRequest) -> Result<DispatchOutcome, BridgeError> {
        let registries = self.server_handler.registries();
        self.server_handle.run_pre_dispatch(&registries, request);

        let handler = self.handlers.get(&request.verb()).ok_or_else(|| {
            BridgeError::internal(format!("no handler for verb {}", request.verb()))
        })?;
        let value = if handler.all_servers_at_once(request) {
            handler.handle_all(&registries, request)?
        } else {
            self.server_handler
                .dispatch_single(|registry| handler.handle_single(registry, request))?
        };
        Ok(DispatchOutcome {
            value,
            path_consumed: handler.consumes_path(),
        })
    }
}

// ---------------------------------------------------------------------------
// BackendManager
// ---------------------------------------------------------------------------

/// Owns the dispatcher chain, the stores, and the restrictor; immutable
/// after construction.
pub struct BackendManager {
    dispatchers: Vec<Box<dyn RequestDispatcher>>,
    restrictor: Arc<dyn Restrictor>,
    history: Arc<HistoryStore>,
    debug: Arc<DebugStore>,
    server_handler: Arc<BeanServerHandler>,
    defaults: ProcessingOptions,
}

impl std::fmt::Debug for BackendManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendManager")
            .field("dispatchers", &self.dispatchers.len())
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}

impl BackendManager {
    /// Handle one request, always producing an envelope.
    ///
    /// Protocol-level failures never escape as errors; they become error
    /// envelopes with the taxonomy's status code.
    pub fn handle_request(&self, request: &BridgeRequest) -> Value {
        let options = request.options().clone().or(&self.defaults);
        match self.execute(request, &options) {
            Ok(envelope) => {
                debug!(verb = %request.verb(), "request handled");
                envelope
            }
            Err(err) => {
                error!(verb = %request.verb(), %err, "request failed");
                self.debug.record("error", err.to_string(), Some(err.render_chain()));
                envelope::error(Some(request), &err, &options)
            }
        }
    }

    fn execute(
        &self,
        request: &BridgeRequest,
        options: &ProcessingOptions,
    ) -> Result<Value, BridgeError> {
        if !self
            .restrictor
            .is_verb_allowed(request.verb(), request.object_name())
        {
            return Err(BridgeError::Forbidden(format!(
                "verb {} is not allowed",
                request.verb()
            )));
        }

        let dispatcher = self
            .dispatchers
            .iter()
            .find(|d| d.can_handle(request))
            .ok_or_else(|| BridgeError::internal("no dispatcher claims this request"))?;
        let outcome = dispatcher.dispatch(request)?;

        let convert_options = ConvertOptions {
            max_depth: options.max_depth,
            max_collection_size: options.max_collection_size,
            max_objects: options.max_objects,
            fault: if options.ignore_errors() {
                FaultPolicy::Ignore
            } else {
                FaultPolicy::Strict
            },
        };
        let path = if outcome.path_consumed {
            &[][..]
        } else {
            request.path()
        };
        let value = to_json(&outcome.value, path, &convert_options)?;

        let history = self.history.update_and_add(request, &value);
        Ok(envelope::success(request, value, history))
    }

    /// The history store (shared with the history bean).
    #[must_use]
    pub fn history(&self) -> &Arc<HistoryStore> {
        &self.history
    }

    /// The debug store (shared with the debug bean).
    #[must_use]
    pub fn debug_store(&self) -> &Arc<DebugStore> {
        &self.debug
    }

    /// The policy oracle.
    #[must_use]
    pub fn restrictor(&self) -> &Arc<dyn Restrictor> {
        &self.restrictor
    }

    /// Shut down: unregister the bridge's own beans, aggregating
    /// failures.
    pub fn shutdown(&self) -> Result<(), BridgeError> {
        self.server_handler.unregister_bridge_beans()
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Failures while wiring the backend at startup.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// The restrictor could not be constructed.
    #[error("restrictor setup failed: {0}")]
    Policy(#[from] beanbus_policy::PolicyError),

    /// A bridge bean could not be registered.
    #[error("failed to register bridge bean: {0}")]
    BeanRegistration(BridgeError),

    /// `dispatcherClasses` named an unregistered dispatcher.
    #[error("unknown dispatcher {0:?}")]
    UnknownDispatcher(String),
}

/// Everything a custom dispatcher factory gets to work with.
pub struct DispatcherSeed<'a> {
    /// The merged registry view.
    pub server_handler: &'a Arc<BeanServerHandler>,
    /// The policy oracle.
    pub restrictor: &'a Arc<dyn Restrictor>,
    /// The detected product handle.
    pub server_handle: &'a Arc<ServerHandle>,
}

/// Constructor registered under a dispatcher name.
pub type DispatcherFactory =
    Box<dyn Fn(&DispatcherSeed<'_>) -> Box<dyn RequestDispatcher> + Send + Sync>;

/// Step-wise construction of a [`BackendManager`].
pub struct BackendManagerBuilder {
    config: BridgeConfig,
    restrictor: Option<Arc<dyn Restrictor>>,
    extra_detectors: Vec<Arc<dyn ServerDetector>>,
    dispatcher_factories: BTreeMap<String, DispatcherFactory>,
}

fn qualified_name(qualifier: Option<&str>, bean_type: &str) -> Result<ObjectName, BuildError> {
    let raw = match qualifier {
        Some(q) => format!("beanbus:type={bean_type},qualifier={q}"),
        None => format!("beanbus:type={bean_type}"),
    };
    ObjectName::parse(&raw)
        .map_err(|e| BuildError::BeanRegistration(BridgeError::invalid(e.to_string())))
}

impl BackendManagerBuilder {
    /// Start from a configuration.
    #[must_use]
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            config,
            restrictor: None,
            extra_detectors: Vec::new(),
            dispatcher_factories: BTreeMap::new(),
        }
    }

    /// Use this restrictor instead of the configured one.
    #[must_use]
    pub fn with_restrictor(mut self, restrictor: Arc<dyn Restrictor>) -> Self {
        self.restrictor = Some(restrictor);
        self
    }

    /// Append a detector after the bundled ones.
    #[must_use]
    pub fn with_detector(mut self, detector: Arc<dyn ServerDetector>) -> Self {
        self.extra_detectors.push(detector);
        self
    }

    /// Register a dispatcher constructor under a name usable in
    /// `dispatcherClasses`.
    #[must_use]
    pub fn with_dispatcher_factory(
        mut self,
        name: impl Into<String>,
        factory: DispatcherFactory,
    ) -> Self {
        self.dispatcher_factories.insert(name.into(), factory);
        self
    }

    /// Wire everything: restrictor, detection, registries, bridge beans,
    /// dispatcher chain.
    pub fn build(self) -> Result<BackendManager, BuildError> {
        let config = self.config;

        let restrictor: Arc<dyn Restrictor> = match self.restrictor {
            Some(restrictor) => restrictor,
            None => create_restrictor(
                config.restrictor_class.as_deref(),
                config.policy_location.as_deref().map(Path::new),
            )?,
        };

        // Platform registry plus detector contributions, platform first.
        let platform_registry = platform::build_registry();
        let mut detectors = bundled_detectors();
        detectors.extend(self.extra_detectors);
        let base: Vec<Arc<dyn BeanRegistry>> = vec![platform_registry.clone()];
        let Detection {
            handle,
            extra_registries,
        } = run_detectors(&detectors, &base);
        let handle = Arc::new(handle);

        let mut merged: Vec<Arc<dyn BeanRegistry>> = vec![platform_registry.clone()];
        merged.extend(extra_registries);
        let server_handler = Arc::new(BeanServerHandler::new(merged));
        handle.run_post_detect(&server_handler.registries(), &config);

        let history = Arc::new(HistoryStore::new(config.history_max_entries));
        let debug = Arc::new(DebugStore::new(config.debug_max_entries, config.debug));

        // The rescan operation rebuilds the merged set from scratch and
        // swaps it atomically.
        let rescan = {
            let server_handler = server_handler.clone();
            let platform_registry = platform_registry.clone();
            let detectors = detectors.clone();
            Arc::new(move || {
                let mut rebuilt: Vec<Arc<dyn BeanRegistry>> =
                    vec![platform_registry.clone()];
                for detector in &detectors {
                    match detector.extra_registries() {
                        Ok(contributed) => rebuilt.extend(contributed),
                        Err(err) => {
                            warn!(detector = detector.name(), %err, "rescan contribution failed");
                        }
                    }
                }
                server_handler.swap(rebuilt);
                Ok(())
            })
        };

        let agent_id = config.agent_id_or_default();
        let qualifier = config.mbean_qualifier.as_deref();
        let bridge_beans: Vec<(ObjectName, Arc<dyn ManagementBean>)> = vec![
            (
                qualified_name(qualifier, "Config")?,
                Arc::new(ConfigBean::new(
                    agent_id.clone(),
                    history.clone(),
                    debug.clone(),
                    rescan,
                )),
            ),
            (
                qualified_name(qualifier, "History")?,
                Arc::new(HistoryBean::new(history.clone())),
            ),
            (
                qualified_name(qualifier, "Debug")?,
                Arc::new(DebugBean::new(debug.clone())),
            ),
            (
                qualified_name(qualifier, "ServerHandle")?,
                Arc::new(ServerHandleBean::new(handle.clone())),
            ),
        ];
        for (name, bean) in bridge_beans {
            server_handler
                .register_bridge_bean(name, bean)
                .map_err(BuildError::BeanRegistration)?;
        }

        let ctx = HandlerContext {
            restrictor: restrictor.clone(),
            server_handle: handle.clone(),
            agent_id,
            agent_description: config.agent_description.clone(),
        };
        let seed = DispatcherSeed {
            server_handler: &server_handler,
            restrictor: &restrictor,
            server_handle: &handle,
        };
        let mut dispatchers: Vec<Box<dyn RequestDispatcher>> = Vec::new();
        for name in &config.dispatcher_classes {
            let factory = self
                .dispatcher_factories
                .get(name)
                .ok_or_else(|| BuildError::UnknownDispatcher(name.clone()))?;
            dispatchers.push(factory(&seed));
        }
        dispatchers.push(Box::new(LocalDispatcher::new(
            server_handler.clone(),
            build_handlers(&ctx),
            handle,
        )));

        Ok(BackendManager {
            dispatchers,
            restrictor,
            history,
            debug,
            server_handler,
            defaults: ProcessingOptions {
                max_depth: config.max_depth,
                max_collection_size: config.max_collection_size,
                max_objects: config.max_objects,
                ..Default::default()
            },
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use beanbus_policy::DenyAllRestrictor;
    use beanbus_protocol::from_get;
    use std::collections::BTreeMap as Params;

    fn manager() -> BackendManager {
        BackendManagerBuilder::new(BridgeConfig::default())
            .build()
            .expect("manager builds")
    }

    fn get(manager: &BackendManager, path: &str) -> Value {
        let request = from_get(path, &Params::new()).expect("request parses");
        manager.handle_request(&request)
    }

    #[test]
    fn read_single_attribute_envelope() {
        let env = get(&manager(), "read/process:type=Memory/HeapUsage");
        assert_eq!(env["status"], 200);
        assert!(env["value"]["used"].as_i64().unwrap() > 0);
        assert_eq!(env["request"]["type"], "read");
    }

    #[test]
    fn read_with_inner_path() {
        let env = get(&manager(), "read/process:type=Memory/HeapUsage/used");
        assert_eq!(env["status"], 200);
        assert!(env["value"].is_i64());
        assert_eq!(env["request"]["path"], "used");
    }

    #[test]
    fn unknown_bean_is_404_envelope() {
        let env = get(&manager(), "read/process:type=Bogus/X");
        assert_eq!(env["status"], 404);
        assert_eq!(env["error_type"], "InstanceNotFound");
        assert!(env["error"].as_str().unwrap().contains("Bogus"));
    }

    #[test]
    fn bridge_beans_are_reachable_through_the_protocol() {
        let m = manager();
        let env = get(&m, "read/beanbus:type=Config/AgentId");
        assert_eq!(env["status"], 200);
        assert!(env["value"].is_string());

        let env = get(&m, "exec/beanbus:type=Config/rescan");
        assert_eq!(env["status"], 200);
    }

    #[test]
    fn qualifier_lands_in_bean_names() {
        let config = BridgeConfig {
            mbean_qualifier: Some("qa".into()),
            ..Default::default()
        };
        let m = BackendManagerBuilder::new(config).build().unwrap();
        let env = get(&m, "read/beanbus:type=Config,qualifier=qa/AgentId");
        assert_eq!(env["status"], 200);
    }

    #[test]
    fn version_envelope() {
        let env = get(&manager(), "version");
        assert_eq!(env["status"], 200);
        assert_eq!(env["value"]["protocol"], "1.0");
        assert!(env["value"]["agent"].is_string());
    }

    #[test]
    fn denied_verb_is_403_without_stacktrace() {
        let m = BackendManagerBuilder::new(BridgeConfig::default())
            .with_restrictor(Arc::new(DenyAllRestrictor))
            .build()
            .unwrap();
        let env = get(&m, "read/process:type=Memory/HeapUsage");
        assert_eq!(env["status"], 403);
        assert!(env.get("stacktrace").is_none());
    }

    #[test]
    fn history_attaches_on_second_read() {
        let m = manager();
        let first = get(&m, "read/process:type=Runtime/Pid");
        assert!(first.get("history").is_none());
        let second = get(&m, "read/process:type=Runtime/Pid");
        let history = second["history"].as_array().expect("history attached");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0]["value"], first["value"]);
    }

    #[test]
    fn write_and_exec_round_trip() {
        let m = manager();
        let env = get(&m, "write/process:type=Memory/Verbose/true");
        assert_eq!(env["status"], 200);
        assert_eq!(env["value"], false);

        let env = get(&m, "exec/process:type=Memory/collect");
        assert_eq!(env["status"], 200);
        assert_eq!(env["value"], Value::Null);
    }

    #[test]
    fn target_request_without_proxy_dispatcher_is_internal() {
        let m = manager();
        let body = serde_json::json!({
            "type": "read",
            "mbean": "process:type=Memory",
            "attribute": "HeapUsage",
            "target": {"url": "service:remote://other"},
        });
        let request =
            beanbus_protocol::request_from_json(&body, &ProcessingOptions::default()).unwrap();
        let env = m.handle_request(&request);
        assert_eq!(env["status"], 500);
        assert_eq!(env["error_type"], "Internal");
    }

    #[test]
    fn custom_dispatcher_claims_before_local() {
        struct Claiming;

        impl RequestDispatcher for Claiming {
            fn name(&self) -> &str {
                "claiming"
            }

            fn can_handle(&self, request: &BridgeRequest) -> bool {
                request.target().is_some()
            }

            fn dispatch(&self, _request: &BridgeRequest) -> Result<DispatchOutcome, BridgeError> {
                Ok(DispatchOutcome {
                    value: BeanValue::Text("proxied".into()),
                    path_consumed: true,
                })
            }
        }

        let config = BridgeConfig {
            dispatcher_classes: vec!["proxy".into()],
            ..Default::default()
        };
        let m = BackendManagerBuilder::new(config)
            .with_dispatcher_factory("proxy", Box::new(|_| Box::new(Claiming)))
            .build()
            .unwrap();

        let body = serde_json::json!({
            "type": "read",
            "mbean": "process:type=Memory",
            "target": {"url": "service:remote://other"},
        });
        let request =
            beanbus_protocol::request_from_json(&body, &ProcessingOptions::default()).unwrap();
        let env = m.handle_request(&request);
        assert_eq!(env["status"], 200);
        assert_eq!(env["value"], "proxied");
    }

    #[test]
    fn unknown_dispatcher_class_fails_the_build() {
        let config = BridgeConfig {
            dispatcher_classes: vec!["missing".into()],
            ..Default::default()
        };
        let err = BackendManagerBuilder::new(config).build().unwrap_err();
        assert!(matches!(err, BuildError::UnknownDispatcher(_)));
    }

    #[test]
    fn errors_land_in_the_debug_store_when_enabled() {
        let config = BridgeConfig {
            debug: true,
            ..Default::default()
        };
        let m = BackendManagerBuilder::new(config).build().unwrap();
        get(&m, "read/process:type=Bogus/X");
        let dump = m.debug_store().dump();
        assert_eq!(dump.len(), 1);
        assert!(dump[0].message.contains("Bogus"));
    }

    #[test]
    fn shutdown_unregisters_bridge_beans() {
        let m = manager();
        assert_eq!(get(&m, "read/beanbus:type=Config/AgentId")["status"], 200);
        m.shutdown().unwrap();
        assert_eq!(get(&m, "read/beanbus:type=Config/AgentId")["status"], 404);
    }

    #[test]
    fn config_defaults_cap_conversion() {
        let config = BridgeConfig {
            max_depth: Some(0),
            ..Default::default()
        };
        let m = BackendManagerBuilder::new(config).build().unwrap();
        let env = get(&m, "read/process:type=Memory/HeapUsage");
        assert_eq!(env["status"], 200);
        // Depth 0 renders the composite as its string form.
        assert!(env["value"].is_string());
    }
}
