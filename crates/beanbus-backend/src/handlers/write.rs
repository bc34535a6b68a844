// SPDX-License-Identifier: MIT OR Apache-2.0
//! The write handler: type-directed conversion of the new value, then a
//! set-and-return-previous against the owning registry.

use super::{VerbHandler, wrong_variant};
use beanbus_core::{BeanRegistry, BeanValue};
use beanbus_error::BridgeError;
use beanbus_policy::Restrictor;
use beanbus_protocol::{BridgeRequest, Verb};
use std::sync::Arc;

/// Handles the `write` verb.
pub struct WriteHandler {
    restrictor: Arc<dyn Restrictor>,
}

impl WriteHandler {
    /// Construct with the policy oracle.
    #[must_use]
    pub fn new(restrictor: Arc<dyn Restrictor>) -> Self {
        Self { restrictor }
    }
}

impl VerbHandler for WriteHandler {
    fn verb(&self) -> Verb {
        Verb::Write
    }

    fn all_servers_at_once(&self, _request: &BridgeRequest) -> bool {
        false
    }

    fn handle_single(
        &self,
        registry: &dyn BeanRegistry,
        request: &BridgeRequest,
    ) -> Result<BeanValue, BridgeError> {
        let BridgeRequest::Write(write) = request else {
            return Err(wrong_variant(Verb::Write, request));
        };
        if !self
            .restrictor
            .is_attribute_write_allowed(&write.name, &write.attribute)
        {
            return Err(BridgeError::Forbidden(format!(
                "writing {} on {} is not allowed",
                write.attribute, write.name
            )));
        }

        let info = registry.bean_info(&write.name)?;
        let attr = info
            .attribute(&write.attribute)
            .ok_or_else(|| BridgeError::AttributeNotFound {
                name: write.name.canonical(),
                attribute: write.attribute.clone(),
            })?;
        if !attr.writable {
            return Err(BridgeError::invalid(format!(
                "attribute {} on {} is not writable",
                write.attribute, write.name
            )));
        }

        let native = beanbus_convert::from_json_typed(&attr.type_name, &attr.fields, &write.value)?;
        registry.set_attribute(&write.name, &write.attribute, native)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use beanbus_core::{
        AttrInfo, BeanInfo, CompositeValue, FieldInfo, LocalRegistry, ManagementBean, ObjectName,
        platform,
    };
    use beanbus_policy::{AllowAllRestrictor, PolicyRestrictor};
    use beanbus_protocol::{ProcessingOptions, WriteRequest};
    use serde_json::json;
    use std::sync::Mutex;

    fn write_request(attribute: &str, value: serde_json::Value) -> BridgeRequest {
        BridgeRequest::Write(WriteRequest {
            name: ObjectName::parse("process:type=Memory").unwrap(),
            attribute: attribute.into(),
            value,
            path: vec![],
            options: ProcessingOptions::default(),
            target: None,
        })
    }

    // A bean with a writable composite attribute, for schema enforcement.
    struct Thresholds {
        current: Mutex<BeanValue>,
    }

    impl Thresholds {
        fn new() -> Self {
            Self {
                current: Mutex::new(BeanValue::Composite(CompositeValue::new(
                    "Threshold",
                    [("warn", BeanValue::Int(70)), ("critical", BeanValue::Int(90))],
                ))),
            }
        }
    }

    impl ManagementBean for Thresholds {
        fn info(&self) -> BeanInfo {
            BeanInfo {
                class_name: "Thresholds".into(),
                description: String::new(),
                attributes: vec![
                    AttrInfo::read_write("Levels", "composite:Threshold", "alert levels")
                        .with_fields([
                            FieldInfo::new("warn", "long"),
                            FieldInfo::new("critical", "long"),
                        ]),
                ],
                operations: vec![],
            }
        }

        fn get_attribute(&self, name: &str) -> Result<BeanValue, BridgeError> {
            match name {
                "Levels" => Ok(self.current.lock().unwrap().clone()),
                other => Err(BridgeError::AttributeNotFound {
                    name: "test:type=Thresholds".into(),
                    attribute: other.into(),
                }),
            }
        }

        fn set_attribute(&self, name: &str, value: BeanValue) -> Result<BeanValue, BridgeError> {
            match name {
                "Levels" => {
                    let mut current = self.current.lock().unwrap();
                    Ok(std::mem::replace(&mut *current, value))
                }
                other => Err(BridgeError::AttributeNotFound {
                    name: "test:type=Thresholds".into(),
                    attribute: other.into(),
                }),
            }
        }
    }

    fn thresholds_registry() -> std::sync::Arc<LocalRegistry> {
        let registry = std::sync::Arc::new(LocalRegistry::new("test"));
        registry
            .register(
                ObjectName::parse("test:type=Thresholds").unwrap(),
                std::sync::Arc::new(Thresholds::new()),
            )
            .unwrap();
        registry
    }

    fn thresholds_write(value: serde_json::Value) -> BridgeRequest {
        BridgeRequest::Write(WriteRequest {
            name: ObjectName::parse("test:type=Thresholds").unwrap(),
            attribute: "Levels".into(),
            value,
            path: vec![],
            options: ProcessingOptions::default(),
            target: None,
        })
    }

    #[test]
    fn write_returns_previous_value() {
        let handler = WriteHandler::new(Arc::new(AllowAllRestrictor));
        let registry = platform::build_registry();

        let previous = handler
            .handle_single(registry.as_ref(), &write_request("Verbose", json!(true)))
            .unwrap();
        assert_eq!(previous, BeanValue::Bool(false));

        let previous = handler
            .handle_single(registry.as_ref(), &write_request("Verbose", json!(false)))
            .unwrap();
        assert_eq!(previous, BeanValue::Bool(true));
    }

    #[test]
    fn write_converts_wire_strings_against_declared_type() {
        let handler = WriteHandler::new(Arc::new(AllowAllRestrictor));
        let registry = platform::build_registry();
        // A GET-encoded write arrives as the string "true".
        let previous = handler
            .handle_single(registry.as_ref(), &write_request("Verbose", json!("true")))
            .unwrap();
        assert_eq!(previous, BeanValue::Bool(false));
    }

    #[test]
    fn write_to_unknown_attribute_is_404() {
        let handler = WriteHandler::new(Arc::new(AllowAllRestrictor));
        let registry = platform::build_registry();
        let err = handler
            .handle_single(registry.as_ref(), &write_request("Bogus", json!(1)))
            .unwrap_err();
        assert_eq!(err.error_type(), "AttributeNotFound");
    }

    #[test]
    fn write_to_readonly_attribute_is_invalid() {
        let handler = WriteHandler::new(Arc::new(AllowAllRestrictor));
        let registry = platform::build_registry();
        let err = handler
            .handle_single(registry.as_ref(), &write_request("HeapUsage", json!({})))
            .unwrap_err();
        assert_eq!(err.status(), 400);
    }

    #[test]
    fn write_denied_by_restrictor_is_403() {
        let restrictor = PolicyRestrictor::from_toml(
            r#"
            [[deny]]
            mbean = "process:*"
            write = ["*"]
            "#,
        )
        .unwrap();
        let handler = WriteHandler::new(Arc::new(restrictor));
        let registry = platform::build_registry();
        let err = handler
            .handle_single(registry.as_ref(), &write_request("Verbose", json!(true)))
            .unwrap_err();
        assert_eq!(err.status(), 403);
    }

    #[test]
    fn composite_write_builds_from_the_declared_schema() {
        let handler = WriteHandler::new(Arc::new(AllowAllRestrictor));
        let registry = thresholds_registry();
        let previous = handler
            .handle_single(
                registry.as_ref(),
                &thresholds_write(json!({"warn": 75, "critical": 95})),
            )
            .unwrap();
        let BeanValue::Composite(previous) = previous else {
            panic!("expected composite previous value");
        };
        assert_eq!(previous.field("warn"), Some(&BeanValue::Int(70)));

        let BeanValue::Composite(stored) = registry
            .get_attribute(
                &ObjectName::parse("test:type=Thresholds").unwrap(),
                "Levels",
            )
            .unwrap()
        else {
            panic!("expected composite");
        };
        assert_eq!(stored.field("critical"), Some(&BeanValue::Int(95)));
    }

    #[test]
    fn composite_write_with_wrong_field_set_is_400() {
        let handler = WriteHandler::new(Arc::new(AllowAllRestrictor));
        let registry = thresholds_registry();

        let err = handler
            .handle_single(registry.as_ref(), &thresholds_write(json!({"wrongField": 1})))
            .unwrap_err();
        assert_eq!(err.status(), 400);
        assert_eq!(err.error_type(), "InvalidRequest");

        let err = handler
            .handle_single(registry.as_ref(), &thresholds_write(json!({"warn": 75})))
            .unwrap_err();
        assert_eq!(err.status(), 400);

        // The failed writes never reached the bean.
        let BeanValue::Composite(stored) = registry
            .get_attribute(
                &ObjectName::parse("test:type=Thresholds").unwrap(),
                "Levels",
            )
            .unwrap()
        else {
            panic!("expected composite");
        };
        assert_eq!(stored.field("warn"), Some(&BeanValue::Int(70)));
    }

    #[test]
    fn write_with_unconvertible_value_is_invalid() {
        let handler = WriteHandler::new(Arc::new(AllowAllRestrictor));
        let registry = platform::build_registry();
        let err = handler
            .handle_single(registry.as_ref(), &write_request("Verbose", json!("maybe")))
            .unwrap_err();
        assert_eq!(err.status(), 400);
    }
}
