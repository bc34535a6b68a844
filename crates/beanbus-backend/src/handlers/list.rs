// SPDX-License-Identifier: MIT OR Apache-2.0
//! The list handler: renders the merged bean metadata as the canonical
//! `domain → properties → {attr, op, desc}` tree and applies the inner
//! path itself.

use super::{VerbHandler, wrong_variant};
use beanbus_core::{BeanRegistry, BeanValue, OpInfo};
use beanbus_error::BridgeError;
use beanbus_protocol::{BridgeRequest, Verb};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Handles the `list` verb.
pub struct ListHandler;

impl ListHandler {
    /// Construct.
    #[must_use]
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self
    }

    fn op_entry(op: &OpInfo) -> BeanValue {
        let args = BeanValue::Seq(
            op.params
                .iter()
                .map(|param| {
                    BeanValue::map([
                        ("name".to_owned(), BeanValue::Text(param.name.clone())),
                        ("type".to_owned(), BeanValue::Text(param.type_name.clone())),
                    ])
                })
                .collect(),
        );
        BeanValue::map([
            ("args".to_owned(), args),
            ("ret".to_owned(), BeanValue::Text(op.return_type.clone())),
            ("desc".to_owned(), BeanValue::Text(op.description.clone())),
        ])
    }

    /// The full metadata tree; first registry claiming a name wins.
    fn build_tree(registries: &[Arc<dyn BeanRegistry>]) -> BeanValue {
        let mut domains: BTreeMap<String, BeanValue> = BTreeMap::new();
        let mut seen: Vec<beanbus_core::ObjectName> = Vec::new();

        for registry in registries {
            for name in registry.query_names(None) {
                if seen.contains(&name) {
                    continue;
                }
                let info = match registry.bean_info(&name) {
                    Ok(info) => info,
                    Err(err) => {
                        debug!(name = %name, %err, "skipping bean without metadata");
                        continue;
                    }
                };
                seen.push(name.clone());

                let mut attrs: BTreeMap<String, BeanValue> = BTreeMap::new();
                for attr in &info.attributes {
                    attrs.insert(
                        attr.name.clone(),
                        BeanValue::map([
                            ("type".to_owned(), BeanValue::Text(attr.type_name.clone())),
                            ("rw".to_owned(), BeanValue::Bool(attr.writable)),
                            ("desc".to_owned(), BeanValue::Text(attr.description.clone())),
                        ]),
                    );
                }

                // Overloads group under one name; a single overload stays
                // a plain entry.
                let mut ops: BTreeMap<String, Vec<BeanValue>> = BTreeMap::new();
                for op in &info.operations {
                    ops.entry(op.name.clone()).or_default().push(Self::op_entry(op));
                }
                let ops: BTreeMap<String, BeanValue> = ops
                    .into_iter()
                    .map(|(op_name, mut entries)| {
                        let value = if entries.len() == 1 {
                            entries.remove(0)
                        } else {
                            BeanValue::Seq(entries)
                        };
                        (op_name, value)
                    })
                    .collect();

                let bean_entry = BeanValue::map([
                    ("attr".to_owned(), BeanValue::Map(attrs)),
                    ("op".to_owned(), BeanValue::Map(ops)),
                    ("desc".to_owned(), BeanValue::Text(info.description.clone())),
                ]);

                let props = name
                    .canonical()
                    .split_once(':')
                    .map(|(_, props)| props.to_owned())
                    .unwrap_or_default();
                let domain_entry = domains
                    .entry(name.domain().to_owned())
                    .or_insert_with(|| BeanValue::Map(BTreeMap::new()));
                if let BeanValue::Map(beans) = domain_entry {
                    beans.insert(props, bean_entry);
                }
            }
        }
        BeanValue::Map(domains)
    }

    fn descend(tree: BeanValue, path: &[String]) -> Result<BeanValue, BridgeError> {
        let mut current = tree;
        for segment in path {
            let BeanValue::Map(mut entries) = current else {
                return Err(BridgeError::PathNotFound {
                    path: path.join("/"),
                    reason: format!("cannot descend into a {}", current.shape()),
                });
            };
            current = entries
                .remove(segment)
                .ok_or_else(|| BridgeError::PathNotFound {
                    path: path.join("/"),
                    reason: format!("no metadata under {segment:?}"),
                })?;
        }
        Ok(current)
    }
}

impl VerbHandler for ListHandler {
    fn verb(&self) -> Verb {
        Verb::List
    }

    fn all_servers_at_once(&self, _request: &BridgeRequest) -> bool {
        true
    }

    fn consumes_path(&self) -> bool {
        true
    }

    fn handle_all(
        &self,
        registries: &[Arc<dyn BeanRegistry>],
        request: &BridgeRequest,
    ) -> Result<BeanValue, BridgeError> {
        let BridgeRequest::List(list) = request else {
            return Err(wrong_variant(Verb::List, request));
        };
        Self::descend(Self::build_tree(registries), &list.path)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
