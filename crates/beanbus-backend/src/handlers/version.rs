// SPDX-License-Identifier: MIT OR Apache-2.0
//! The version handler: protocol and agent versions plus the detected
//! product identity.

use super::{VerbHandler, wrong_variant};
use crate::detect::ServerHandle;
use beanbus_core::{BeanRegistry, BeanValue};
use beanbus_error::BridgeError;
use beanbus_protocol::{BridgeRequest, PROTOCOL_VERSION, Verb};
use std::sync::Arc;

/// Handles the `version` verb.
pub struct VersionHandler {
    handle: Arc<ServerHandle>,
    agent_id: String,
    agent_description: Option<String>,
}

impl VersionHandler {
    /// Construct from the detected handle and agent identity.
    #[must_use]
    pub fn new(
        handle: Arc<ServerHandle>,
        agent_id: String,
        agent_description: Option<String>,
    ) -> Self {
        Self {
            handle,
            agent_id,
            agent_description,
        }
    }
}

impl VerbHandler for VersionHandler {
    fn verb(&self) -> Verb {
        Verb::Version
    }

    fn all_servers_at_once(&self, _request: &BridgeRequest) -> bool {
        true
    }

    fn handle_all(
        &self,
        _registries: &[Arc<dyn BeanRegistry>],
        request: &BridgeRequest,
    ) -> Result<BeanValue, BridgeError> {
        let BridgeRequest::Version(_) = request else {
            return Err(wrong_variant(Verb::Version, request));
        };

        let mut info = vec![
            ("vendor".to_owned(), BeanValue::Text(self.handle.vendor.clone())),
            ("product".to_owned(), BeanValue::Text(self.handle.product.clone())),
            ("version".to_owned(), BeanValue::Text(self.handle.version.clone())),
        ];
        if !self.handle.extra_info.is_empty() {
            info.push((
                "extraInfo".to_owned(),
                BeanValue::Map(
                    self.handle
                        .extra_info
                        .iter()
                        .map(|(k, v)| (k.clone(), BeanValue::Text(v.clone())))
                        .collect(),
                ),
            ));
        }

        let mut out = vec![
            ("protocol".to_owned(), BeanValue::Text(PROTOCOL_VERSION.into())),
            (
                "agent".to_owned(),
                BeanValue::Text(env!("CARGO_PKG_VERSION").into()),
            ),
            ("id".to_owned(), BeanValue::Text(self.agent_id.clone())),
            ("info".to_owned(), BeanValue::map(info)),
        ];
        if let Some(description) = &self.agent_description {
            out.push(("description".to_owned(), BeanValue::Text(description.clone())));
        }
        Ok(BeanValue::map(out))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use beanbus_protocol::VersionRequest;

    #[test]
    fn version_value_shape() {
        let handle = Arc::new(ServerHandle::new("beanbus", "process", "2.3"));
        let handler = VersionHandler::new(handle, "edge-1".into(), Some("lab".into()));
        let value = handler
            .handle_all(&[], &BridgeRequest::Version(VersionRequest::default()))
            .unwrap();
        let BeanValue::Map(map) = value else { panic!("expected map") };
        assert_eq!(map["protocol"], BeanValue::Text(PROTOCOL_VERSION.into()));
        assert_eq!(map["id"], BeanValue::Text("edge-1".into()));
        let BeanValue::Map(info) = &map["info"] else { panic!("expected info") };
        assert_eq!(info["product"], BeanValue::Text("process".into()));
        assert_eq!(map["description"], BeanValue::Text("lab".into()));
    }
}
