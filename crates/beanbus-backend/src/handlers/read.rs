// SPDX-License-Identifier: MIT OR Apache-2.0
//! The read handler: single-attribute reads, multi-attribute fan-out,
//! pattern matching across registries, and per-attribute fault handling.

use super::{VerbHandler, wrong_variant};
use beanbus_core::{BeanRegistry, BeanValue, ObjectName};
use beanbus_error::BridgeError;
use beanbus_policy::Restrictor;
use beanbus_protocol::{AttributeSpec, BridgeRequest, ReadRequest, Verb};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Handles the `read` verb.
pub struct ReadHandler {
    restrictor: Arc<dyn Restrictor>,
}

impl ReadHandler {
    /// Construct with the policy oracle used for per-attribute gating.
    #[must_use]
    pub fn new(restrictor: Arc<dyn Restrictor>) -> Self {
        Self { restrictor }
    }

    /// Fetch one attribute under the value-fault policy: with
    /// `ignoreErrors` the failure becomes an `ERROR: …` string, otherwise
    /// it propagates.
    fn fetch_tolerant(
        &self,
        registry: &dyn BeanRegistry,
        name: &ObjectName,
        attribute: &str,
        ignore_errors: bool,
    ) -> Result<BeanValue, BridgeError> {
        let result = if self.restrictor.is_attribute_read_allowed(name, attribute) {
            registry.get_attribute(name, attribute)
        } else {
            Err(BridgeError::Forbidden(format!(
                "reading {attribute} on {name} is not allowed"
            )))
        };
        match result {
            Ok(value) => Ok(value),
            Err(err) if ignore_errors => Ok(BeanValue::Text(format!("ERROR: {err}"))),
            Err(err) => Err(err),
        }
    }

    /// Concrete name, several (or all) attributes: a map keyed by
    /// attribute name.
    fn read_multi(
        &self,
        registries: &[Arc<dyn BeanRegistry>],
        read: &ReadRequest,
    ) -> Result<BeanValue, BridgeError> {
        let registry = registries
            .iter()
            .find(|r| r.is_registered(&read.name))
            .ok_or_else(|| BridgeError::InstanceNotFound(read.name.canonical()))?;
        let info = registry.bean_info(&read.name)?;
        let ignore_errors = read.options.ignore_errors();

        let mut out: BTreeMap<String, BeanValue> = BTreeMap::new();
        match &read.attributes {
            AttributeSpec::All => {
                for attr in info.readable_attributes() {
                    if !self
                        .restrictor
                        .is_attribute_read_allowed(&read.name, &attr.name)
                    {
                        continue;
                    }
                    let value = self.fetch_tolerant(
                        registry.as_ref(),
                        &read.name,
                        &attr.name,
                        ignore_errors,
                    )?;
                    out.insert(attr.name.clone(), value);
                }
            }
            AttributeSpec::Many(requested) => {
                for attribute in requested {
                    if info.attribute(attribute).is_none() {
                        let missing = BridgeError::AttributeNotFound {
                            name: read.name.canonical(),
                            attribute: attribute.clone(),
                        };
                        if !ignore_errors {
                            return Err(missing);
                        }
                        out.insert(
                            attribute.clone(),
                            BeanValue::Text(format!("ERROR: {missing}")),
                        );
                        continue;
                    }
                    let value = self.fetch_tolerant(
                        registry.as_ref(),
                        &read.name,
                        attribute,
                        ignore_errors,
                    )?;
                    out.insert(attribute.clone(), value);
                }
            }
            AttributeSpec::One(_) => {
                return Err(BridgeError::internal(
                    "single-attribute read routed to multi-attribute fan-out",
                ));
            }
        }
        Ok(BeanValue::Map(out))
    }

    /// Pattern name: union of matches across every registry, one inner
    /// attribute map per concrete match.  Missing and denied attributes
    /// are elided, never errored.
    fn read_pattern(
        &self,
        registries: &[Arc<dyn BeanRegistry>],
        read: &ReadRequest,
    ) -> Result<BeanValue, BridgeError> {
        let requested = read.attributes.requested();
        let canonical = read.options.canonical_naming();

        // First registry claiming a name wins, mirroring single dispatch.
        let mut matches: Vec<(ObjectName, &Arc<dyn BeanRegistry>)> = Vec::new();
        for registry in registries {
            for name in registry.query_names(Some(&read.name)) {
                if !matches.iter().any(|(seen, _)| *seen == name) {
                    matches.push((name, registry));
                }
            }
        }

        let mut out: BTreeMap<String, BeanValue> = BTreeMap::new();
        for (name, registry) in matches {
            let info = match registry.bean_info(&name) {
                Ok(info) => info,
                Err(err) => {
                    debug!(name = %name, %err, "skipping unreadable bean in pattern read");
                    continue;
                }
            };
            let attributes: Vec<String> = match &requested {
                None => info.readable_attributes().map(|a| a.name.clone()).collect(),
                Some(list) => list
                    .iter()
                    .filter(|attr| info.attribute(attr).is_some())
                    .map(|attr| (*attr).to_owned())
                    .collect(),
            };

            let mut inner: BTreeMap<String, BeanValue> = BTreeMap::new();
            for attribute in attributes {
                if !self.restrictor.is_attribute_read_allowed(&name, &attribute) {
                    continue;
                }
                match registry.get_attribute(&name, &attribute) {
                    Ok(value) => {
                        inner.insert(attribute, value);
                    }
                    Err(err) => {
                        debug!(name = %name, attribute, %err, "eliding failed attribute");
                    }
                }
            }
            if inner.is_empty() {
                continue;
            }
            let key = if canonical { name.canonical() } else { name.literal() };
            out.insert(key, BeanValue::Map(inner));
        }

        // Callers naming specific attributes opted into a set that has to
        // apply somewhere.
        if out.is_empty() && requested.is_some() {
            return Err(BridgeError::invalid(format!(
                "no attributes matched pattern {} with the requested attribute set",
                read.name
            )));
        }
        Ok(BeanValue::Map(out))
    }
}

impl VerbHandler for ReadHandler {
    fn verb(&self) -> Verb {
        Verb::Read
    }

    fn all_servers_at_once(&self, request: &BridgeRequest) -> bool {
        match request {
            BridgeRequest::Read(read) => read.name.is_pattern() || read.attributes.is_multi(),
            _ => false,
        }
    }

    fn handle_all(
        &self,
        registries: &[Arc<dyn BeanRegistry>],
        request: &BridgeRequest,
    ) -> Result<BeanValue, BridgeError> {
        let BridgeRequest::Read(read) = request else {
            return Err(wrong_variant(Verb::Read, request));
        };
        if read.name.is_pattern() {
            self.read_pattern(registries, read)
        } else {
            self.read_multi(registries, read)
        }
    }

    fn handle_single(
        &self,
        registry: &dyn BeanRegistry,
        request: &BridgeRequest,
    ) -> Result<BeanValue, BridgeError> {
        let BridgeRequest::Read(read) = request else {
            return Err(wrong_variant(Verb::Read, request));
        };
        let AttributeSpec::One(attribute) = &read.attributes else {
            return Err(BridgeError::internal(
                "multi-attribute read routed to single dispatch",
            ));
        };
        if !self
            .restrictor
            .is_attribute_read_allowed(&read.name, attribute)
        {
            return Err(BridgeError::Forbidden(format!(
                "reading {attribute} on {} is not allowed",
                read.name
            )));
        }
        registry.get_attribute(&read.name, attribute)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use beanbus_core::platform;
    use beanbus_policy::{AllowAllRestrictor, PolicyRestrictor};
    use beanbus_protocol::ProcessingOptions;

    fn handler() -> ReadHandler {
        ReadHandler::new(Arc::new(AllowAllRestrictor))
    }

    fn registries() -> Vec<Arc<dyn BeanRegistry>> {
        vec![platform::build_registry() as Arc<dyn BeanRegistry>]
    }

    fn read(name: &str, attributes: AttributeSpec) -> ReadRequest {
        ReadRequest {
            name: ObjectName::parse(name).unwrap(),
            attributes,
            path: vec![],
            options: ProcessingOptions::default(),
            target: None,
        }
    }

    #[test]
    fn mode_selection() {
        let h = handler();
        let single = BridgeRequest::Read(read(
            "process:type=Memory",
            AttributeSpec::One("HeapUsage".into()),
        ));
        assert!(!h.all_servers_at_once(&single));

        let all = BridgeRequest::Read(read("process:type=Memory", AttributeSpec::All));
        assert!(h.all_servers_at_once(&all));

        let pattern = BridgeRequest::Read(read(
            "process:type=*",
            AttributeSpec::One("HeapUsage".into()),
        ));
        assert!(h.all_servers_at_once(&pattern));
    }

    #[test]
    fn single_attribute_read() {
        let h = handler();
        let registry = platform::build_registry();
        let request = BridgeRequest::Read(read(
            "process:type=Memory",
            AttributeSpec::One("HeapUsage".into()),
        ));
        let value = h.handle_single(registry.as_ref(), &request).unwrap();
        assert!(matches!(value, BeanValue::Composite(_)));
    }

    #[test]
    fn all_attributes_read_is_a_map() {
        let h = handler();
        let request = BridgeRequest::Read(read("process:type=Memory", AttributeSpec::All));
        let value = h.handle_all(&registries(), &request).unwrap();
        let BeanValue::Map(map) = value else { panic!("expected map") };
        assert!(map.contains_key("HeapUsage"));
        assert!(map.contains_key("Verbose"));
    }

    #[test]
    fn multi_attribute_missing_is_strict_by_default() {
        let h = handler();
        let request = BridgeRequest::Read(read(
            "process:type=Memory",
            AttributeSpec::Many(vec!["HeapUsage".into(), "Bogus".into()]),
        ));
        let err = h.handle_all(&registries(), &request).unwrap_err();
        assert_eq!(err.error_type(), "AttributeNotFound");
    }

    #[test]
    fn multi_attribute_missing_becomes_error_string_when_ignored() {
        let h = handler();
        let mut req = read(
            "process:type=Memory",
            AttributeSpec::Many(vec!["HeapUsage".into(), "Bogus".into()]),
        );
        req.options.ignore_errors = Some(true);
        let value = h
            .handle_all(&registries(), &BridgeRequest::Read(req))
            .unwrap();
        let BeanValue::Map(map) = value else { panic!("expected map") };
        let BeanValue::Text(error_text) = &map["Bogus"] else {
            panic!("expected error string");
        };
        assert!(error_text.starts_with("ERROR:"));
    }

    #[test]
    fn pattern_read_keys_by_canonical_name() {
        let h = handler();
        let request = BridgeRequest::Read(read("process:type=*", AttributeSpec::All));
        let value = h.handle_all(&registries(), &request).unwrap();
        let BeanValue::Map(map) = value else { panic!("expected map") };
        assert!(map.contains_key("process:type=Memory"));
        assert!(map.contains_key("process:type=Threading"));
        let BeanValue::Map(memory) = &map["process:type=Memory"] else {
            panic!("expected inner map");
        };
        assert!(memory.contains_key("HeapUsage"));
    }

    #[test]
    fn pattern_read_with_specific_attribute_elides_non_carriers() {
        let h = handler();
        let request = BridgeRequest::Read(read(
            "process:type=*",
            AttributeSpec::One("HeapUsage".into()),
        ));
        let value = h.handle_all(&registries(), &request).unwrap();
        let BeanValue::Map(map) = value else { panic!("expected map") };
        assert!(map.contains_key("process:type=Memory"));
        assert!(!map.contains_key("process:type=Threading"));
    }

    #[test]
    fn pattern_read_matching_nothing_with_attributes_is_invalid() {
        let h = handler();
        let request = BridgeRequest::Read(read(
            "process:type=*",
            AttributeSpec::One("NoSuchAttribute".into()),
        ));
        let err = h.handle_all(&registries(), &request).unwrap_err();
        assert_eq!(err.status(), 400);
    }

    #[test]
    fn pattern_read_matching_nothing_without_attributes_is_empty_map() {
        let h = handler();
        let request = BridgeRequest::Read(read("nothing:type=*", AttributeSpec::All));
        let value = h.handle_all(&registries(), &request).unwrap();
        assert_eq!(value, BeanValue::Map(BTreeMap::new()));
    }

    #[test]
    fn restrictor_elides_denied_beans_from_pattern_reads() {
        let restrictor = PolicyRestrictor::from_toml(
            r#"
            [[deny]]
            mbean = "process:type=Threading"
            read = ["*"]
            "#,
        )
        .unwrap();
        let h = ReadHandler::new(Arc::new(restrictor));
        let request = BridgeRequest::Read(read("process:type=*", AttributeSpec::All));
        let value = h.handle_all(&registries(), &request).unwrap();
        let BeanValue::Map(map) = value else { panic!("expected map") };
        assert!(map.contains_key("process:type=Memory"));
        assert!(!map.contains_key("process:type=Threading"));
    }

    #[test]
    fn restrictor_denial_on_single_read_is_forbidden() {
        let restrictor = PolicyRestrictor::from_toml(
            r#"
            [[deny]]
            mbean = "process:type=Memory"
            read = ["HeapUsage"]
            "#,
        )
        .unwrap();
        let h = ReadHandler::new(Arc::new(restrictor));
        let registry = platform::build_registry();
        let request = BridgeRequest::Read(read(
            "process:type=Memory",
            AttributeSpec::One("HeapUsage".into()),
        ));
        let err = h.handle_single(registry.as_ref(), &request).unwrap_err();
        assert_eq!(err.status(), 403);
    }

    #[test]
    fn concrete_read_of_unknown_bean_is_instance_not_found() {
        let h = handler();
        let request = BridgeRequest::Read(read("process:type=Bogus", AttributeSpec::All));
        let err = h.handle_all(&registries(), &request).unwrap_err();
        assert_eq!(err.error_type(), "InstanceNotFound");
    }
}
