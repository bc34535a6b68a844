// SPDX-License-Identifier: MIT OR Apache-2.0
//! Verb handlers: one per protocol verb, resolved from a static table.

mod exec;
mod list;
mod notification;
mod read;
mod search;
mod version;
mod write;

pub use exec::ExecHandler;
pub use list::ListHandler;
pub use notification::NotificationHandler;
pub use read::ReadHandler;
pub use search::SearchHandler;
pub use version::VersionHandler;
pub use write::WriteHandler;

use crate::detect::ServerHandle;
use beanbus_core::{BeanRegistry, BeanValue};
use beanbus_error::BridgeError;
use beanbus_policy::Restrictor;
use beanbus_protocol::{BridgeRequest, Verb};
use std::collections::BTreeMap;
use std::sync::Arc;

/// One verb's execution strategy.
///
/// The backend manager asks [`VerbHandler::all_servers_at_once`] whether
/// the handler wants the whole registry set (pattern fan-out, metadata
/// traversal) or prefers the manager's first-registry-wins iteration.
pub trait VerbHandler: Send + Sync {
    /// The verb this handler serves.
    fn verb(&self) -> Verb;

    /// Whether this request needs the merged registry set at once.
    fn all_servers_at_once(&self, request: &BridgeRequest) -> bool;

    /// Whether the handler consumes the request path itself, in which
    /// case conversion must not apply it again.
    fn consumes_path(&self) -> bool {
        false
    }

    /// Handle with the full registry set.
    fn handle_all(
        &self,
        _registries: &[Arc<dyn BeanRegistry>],
        _request: &BridgeRequest,
    ) -> Result<BeanValue, BridgeError> {
        Err(BridgeError::internal(format!(
            "{} handler does not operate on the full registry set",
            self.verb()
        )))
    }

    /// Handle against a single registry.
    fn handle_single(
        &self,
        _registry: &dyn BeanRegistry,
        _request: &BridgeRequest,
    ) -> Result<BeanValue, BridgeError> {
        Err(BridgeError::internal(format!(
            "{} handler does not operate on single registries",
            self.verb()
        )))
    }
}

/// Everything handlers need at construction time.
pub struct HandlerContext {
    /// The policy oracle.
    pub restrictor: Arc<dyn Restrictor>,
    /// The detected product handle.
    pub server_handle: Arc<ServerHandle>,
    /// This bridge instance's identity.
    pub agent_id: String,
    /// Operator description, when configured.
    pub agent_description: Option<String>,
}

/// Build the static verb table.
#[must_use]
pub fn build_handlers(ctx: &HandlerContext) -> BTreeMap<Verb, Box<dyn VerbHandler>> {
    let mut table: BTreeMap<Verb, Box<dyn VerbHandler>> = BTreeMap::new();
    let handlers: Vec<Box<dyn VerbHandler>> = vec![
        Box::new(ReadHandler::new(ctx.restrictor.clone())),
        Box::new(WriteHandler::new(ctx.restrictor.clone())),
        Box::new(ExecHandler::new(ctx.restrictor.clone())),
        Box::new(ListHandler::new()),
        Box::new(SearchHandler::new()),
        Box::new(VersionHandler::new(
            ctx.server_handle.clone(),
            ctx.agent_id.clone(),
            ctx.agent_description.clone(),
        )),
        Box::new(NotificationHandler::new()),
    ];
    for handler in handlers {
        table.insert(handler.verb(), handler);
    }
    table
}

/// The wrong request variant reached a handler; only a wiring bug can
/// cause this.
pub(crate) fn wrong_variant(expected: Verb, got: &BridgeRequest) -> BridgeError {
    BridgeError::internal(format!(
        "{expected} handler received a {} request",
        got.verb()
    ))
}
