// SPDX-License-Identifier: MIT OR Apache-2.0
//! The transport-neutral HTTP façade plus the bundled axum application.
//!
//! [`HttpBridge`] accepts GET (path + query parameters) and POST (body +
//! query parameters) requests and always answers with a JSON envelope;
//! protocol failures are rendered into the envelope, never thrown at the
//! transport.  [`build_app`] mounts the façade on an axum router the way
//! the bundled server binary serves it.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod serve;

pub use serve::build_app;

use beanbus_backend::BackendManager;
use beanbus_error::BridgeError;
use beanbus_policy::HttpMethod;
use beanbus_protocol::{
    PostPayload, ProcessingOptions, envelope, from_get, from_post, options_from_params,
};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Transport-neutral entry point into the core.
pub struct HttpBridge {
    manager: Arc<BackendManager>,
}

impl HttpBridge {
    /// Wrap a backend manager.
    #[must_use]
    pub fn new(manager: Arc<BackendManager>) -> Self {
        Self { manager }
    }

    /// The wrapped manager (for shutdown wiring).
    #[must_use]
    pub fn manager(&self) -> &Arc<BackendManager> {
        &self.manager
    }

    /// Options for rendering failures that happen before a request
    /// exists.
    fn early_options(params: &BTreeMap<String, String>) -> ProcessingOptions {
        options_from_params(params).unwrap_or_default()
    }

    /// Gate shared by both entry points; `None` means pass.
    fn gate(
        &self,
        method: HttpMethod,
        peer: Option<&str>,
    ) -> Option<BridgeError> {
        let restrictor = self.manager.restrictor();
        if let Some(peer) = peer
            && !restrictor.is_remote_access_allowed(&[peer])
        {
            return Some(BridgeError::Forbidden(format!(
                "remote host {peer} is not allowed"
            )));
        }
        if !restrictor.is_http_method_allowed(method) {
            return Some(BridgeError::Forbidden(format!(
                "HTTP {} requests are not allowed",
                match method {
                    HttpMethod::Get => "GET",
                    HttpMethod::Post => "POST",
                }
            )));
        }
        None
    }

    /// Handle a GET request: `path_info` is the part after the endpoint
    /// prefix, already percent-decoded.
    pub fn handle_get(
        &self,
        path_info: &str,
        params: &BTreeMap<String, String>,
        peer: Option<&str>,
    ) -> Value {
        let options = Self::early_options(params);
        if let Some(denied) = self.gate(HttpMethod::Get, peer) {
            return envelope::error(None, &denied, &options);
        }
        match from_get(path_info, params) {
            Ok(request) => self.manager.handle_request(&request),
            Err(err) => envelope::error(None, &err, &options),
        }
    }

    /// Handle a POST request body; bulk arrays come back as envelope
    /// arrays of the same length and order.
    ///
    /// `encoding` is the transport's declared character set; only UTF-8
    /// bodies are accepted (JSON's interchange encoding).
    pub fn handle_post(
        &self,
        body: &[u8],
        encoding: Option<&str>,
        params: &BTreeMap<String, String>,
        peer: Option<&str>,
    ) -> Value {
        let options = Self::early_options(params);
        if let Some(denied) = self.gate(HttpMethod::Post, peer) {
            return envelope::error(None, &denied, &options);
        }
        if let Some(encoding) = encoding
            && !encoding.eq_ignore_ascii_case("utf-8")
            && !encoding.eq_ignore_ascii_case("utf8")
        {
            return envelope::error(
                None,
                &BridgeError::invalid(format!("unsupported request encoding {encoding:?}")),
                &options,
            );
        }
        match from_post(body, params) {
            Ok(PostPayload::Single(request)) => self.manager.handle_request(&request),
            Ok(PostPayload::Bulk(items)) => Value::Array(
                items
                    .into_iter()
                    .map(|item| match item {
                        Ok(request) => self.manager.handle_request(&request),
                        Err(err) => envelope::error(None, &err, &options),
                    })
                    .collect(),
            ),
            Err(err) => envelope::error(None, &err, &options),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use beanbus_backend::BackendManagerBuilder;
    use beanbus_config::BridgeConfig;
    use beanbus_policy::PolicyRestrictor;
    use serde_json::json;

    fn bridge() -> HttpBridge {
        let manager = BackendManagerBuilder::new(BridgeConfig::default())
            .build()
            .expect("manager builds");
        HttpBridge::new(Arc::new(manager))
    }

    fn no_params() -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    #[test]
    fn get_read_heap_usage() {
        let env = bridge().handle_get("read/process:type=Memory/HeapUsage", &no_params(), None);
        assert_eq!(env["status"], 200);
        for field in ["init", "used", "committed", "max"] {
            assert!(env["value"].get(field).is_some(), "missing {field}");
        }
    }

    #[test]
    fn get_parse_failure_is_an_error_envelope() {
        let env = bridge().handle_get("read", &no_params(), None);
        assert_eq!(env["status"], 400);
        assert_eq!(env["error_type"], "InvalidRequest");
    }

    #[test]
    fn post_bulk_preserves_length_and_order() {
        let body = json!([
            {"type": "version"},
            {"type": "zap"},
            {"type": "read", "mbean": "process:type=Threading", "attribute": "ThreadCount"},
        ]);
        let env = bridge().handle_post(body.to_string().as_bytes(), None, &no_params(), None);
        let items = env.as_array().expect("bulk array");
        assert_eq!(items.len(), 3);
        assert_eq!(items[0]["status"], 200);
        assert_eq!(items[1]["status"], 400);
        assert_eq!(items[2]["status"], 200);
        assert!(items[2]["value"].is_i64());
    }

    #[test]
    fn post_garbage_is_a_single_error_envelope() {
        let env = bridge().handle_post(b"{{nope", None, &no_params(), None);
        assert_eq!(env["status"], 400);
    }

    #[test]
    fn remote_host_gate() {
        let restrictor = PolicyRestrictor::from_toml(
            r#"
            [access]
            remote_hosts = ["10.0.*"]
            "#,
        )
        .unwrap();
        let manager = BackendManagerBuilder::new(BridgeConfig::default())
            .with_restrictor(Arc::new(restrictor))
            .build()
            .unwrap();
        let bridge = HttpBridge::new(Arc::new(manager));

        let env = bridge.handle_get("version", &no_params(), Some("192.168.0.9"));
        assert_eq!(env["status"], 403);
        assert!(env.get("stacktrace").is_none());

        let env = bridge.handle_get("version", &no_params(), Some("10.0.0.4"));
        assert_eq!(env["status"], 200);
    }

    #[test]
    fn http_method_gate() {
        let restrictor = PolicyRestrictor::from_toml(
            r#"
            [access]
            http_methods = ["post"]
            "#,
        )
        .unwrap();
        let manager = BackendManagerBuilder::new(BridgeConfig::default())
            .with_restrictor(Arc::new(restrictor))
            .build()
            .unwrap();
        let bridge = HttpBridge::new(Arc::new(manager));

        let env = bridge.handle_get("version", &no_params(), None);
        assert_eq!(env["status"], 403);

        let env = bridge.handle_post(
            json!({"type": "version"}).to_string().as_bytes(),
            None,
            &no_params(),
            None,
        );
        assert_eq!(env["status"], 200);
    }
}
