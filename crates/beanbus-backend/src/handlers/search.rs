// SPDX-License-Identifier: MIT OR Apache-2.0
//! The search handler: name-pattern queries across every registry.

use super::{VerbHandler, wrong_variant};
use beanbus_core::{BeanRegistry, BeanValue, ObjectName};
use beanbus_error::BridgeError;
use beanbus_protocol::{BridgeRequest, Verb};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Handles the `search` verb.
pub struct SearchHandler;

impl SearchHandler {
    /// Construct.
    #[must_use]
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self
    }
}

impl VerbHandler for SearchHandler {
    fn verb(&self) -> Verb {
        Verb::Search
    }

    fn all_servers_at_once(&self, _request: &BridgeRequest) -> bool {
        true
    }

    fn handle_all(
        &self,
        registries: &[Arc<dyn BeanRegistry>],
        request: &BridgeRequest,
    ) -> Result<BeanValue, BridgeError> {
        let BridgeRequest::Search(search) = request else {
            return Err(wrong_variant(Verb::Search, request));
        };
        let canonical = search.options.canonical_naming();
        let union: BTreeSet<ObjectName> = registries
            .iter()
            .flat_map(|registry| registry.query_names(Some(&search.pattern)))
            .collect();
        Ok(BeanValue::Seq(
            union
                .into_iter()
                .map(|name| {
                    BeanValue::Text(if canonical { name.canonical() } else { name.literal() })
                })
                .collect(),
        ))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use beanbus_core::platform;
    use beanbus_protocol::{ProcessingOptions, SearchRequest};

    fn registries() -> Vec<Arc<dyn BeanRegistry>> {
        vec![platform::build_registry() as Arc<dyn BeanRegistry>]
    }

    fn search(pattern: &str) -> BridgeRequest {
        BridgeRequest::Search(SearchRequest {
            pattern: ObjectName::parse(pattern).unwrap(),
            options: ProcessingOptions::default(),
            target: None,
        })
    }

    #[test]
    fn pattern_search_lists_matches() {
        let handler = SearchHandler::new();
        let value = handler.handle_all(&registries(), &search("process:type=*")).unwrap();
        let BeanValue::Seq(names) = value else { panic!("expected list") };
        assert_eq!(names.len(), 3);
        assert!(names.contains(&BeanValue::Text("process:type=Memory".into())));
    }

    #[test]
    fn empty_match_is_an_empty_list() {
        let handler = SearchHandler::new();
        let value = handler.handle_all(&registries(), &search("nowhere:*")).unwrap();
        assert_eq!(value, BeanValue::Seq(vec![]));
    }

    #[test]
    fn concrete_search_matches_exactly() {
        let handler = SearchHandler::new();
        let value = handler
            .handle_all(&registries(), &search("process:type=Memory"))
            .unwrap();
        let BeanValue::Seq(names) = value else { panic!("expected list") };
        assert_eq!(names.len(), 1);
    }
}
