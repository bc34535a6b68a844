// SPDX-License-Identifier: MIT OR Apache-2.0
//! The notification handler: client bookkeeping for the notification
//! sub-verbs.  Delivery backends are a transport concern; the bridge
//! tracks registered clients with keep-alive timestamps and purges the
//! stale ones lazily.

use super::{VerbHandler, wrong_variant};
use beanbus_core::{BeanRegistry, BeanValue};
use beanbus_error::BridgeError;
use beanbus_protocol::{BridgeRequest, NotificationCommand, NotificationRequest, Verb};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Clients that miss their keep-alive for this long are dropped.
const STALE_AFTER_SECS: i64 = 600;

#[derive(Debug, Clone)]
struct ClientInfo {
    registered_at: i64,
    last_ping: i64,
}

/// Handles the `notification` verb.
pub struct NotificationHandler {
    clients: Mutex<HashMap<String, ClientInfo>>,
}

impl NotificationHandler {
    /// Construct with an empty client table.
    #[must_use]
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
        }
    }

    fn require_client(request: &NotificationRequest) -> Result<&str, BridgeError> {
        request.client.as_deref().ok_or_else(|| {
            BridgeError::invalid(format!(
                "notification {} requires a client id",
                request.command.as_str()
            ))
        })
    }

    fn purge_stale(clients: &mut HashMap<String, ClientInfo>, now: i64) {
        clients.retain(|id, info| {
            let keep = now - info.last_ping <= STALE_AFTER_SECS;
            if !keep {
                debug!(client = %id, "dropping stale notification client");
            }
            keep
        });
    }
}

impl VerbHandler for NotificationHandler {
    fn verb(&self) -> Verb {
        Verb::Notification
    }

    fn all_servers_at_once(&self, _request: &BridgeRequest) -> bool {
        true
    }

    fn handle_all(
        &self,
        _registries: &[Arc<dyn BeanRegistry>],
        request: &BridgeRequest,
    ) -> Result<BeanValue, BridgeError> {
        let BridgeRequest::Notification(notification) = request else {
            return Err(wrong_variant(Verb::Notification, request));
        };
        let now = beanbus_protocol::envelope::now_epoch_seconds();
        let mut clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());
        Self::purge_stale(&mut clients, now);

        match notification.command {
            NotificationCommand::Register => {
                let id = uuid::Uuid::new_v4().to_string();
                clients.insert(
                    id.clone(),
                    ClientInfo {
                        registered_at: now,
                        last_ping: now,
                    },
                );
                Ok(BeanValue::map([("id".to_owned(), BeanValue::Text(id))]))
            }
            NotificationCommand::Unregister => {
                let id = Self::require_client(notification)?;
                clients
                    .remove(id)
                    .ok_or_else(|| {
                        BridgeError::invalid(format!("unknown notification client {id:?}"))
                    })?;
                Ok(BeanValue::Null)
            }
            NotificationCommand::Ping => {
                let id = Self::require_client(notification)?;
                let info = clients.get_mut(id).ok_or_else(|| {
                    BridgeError::invalid(format!("unknown notification client {id:?}"))
                })?;
                info.last_ping = now;
                Ok(BeanValue::Null)
            }
            NotificationCommand::List => match &notification.client {
                Some(id) => {
                    let info = clients.get(id.as_str()).ok_or_else(|| {
                        BridgeError::invalid(format!("unknown notification client {id:?}"))
                    })?;
                    Ok(BeanValue::map([
                        ("registered_at".to_owned(), BeanValue::Int(info.registered_at)),
                        ("last_ping".to_owned(), BeanValue::Int(info.last_ping)),
                    ]))
                }
                None => {
                    let mut ids: Vec<&String> = clients.keys().collect();
                    ids.sort();
                    Ok(BeanValue::Seq(
                        ids.into_iter()
                            .map(|id| BeanValue::Text(id.clone()))
                            .collect(),
                    ))
                }
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
