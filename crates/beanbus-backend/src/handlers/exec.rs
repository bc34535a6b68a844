// SPDX-License-Identifier: MIT OR Apache-2.0
//! The exec handler: operation resolution by name and arity, argument
//! conversion against declared parameter types, invocation.

use super::{VerbHandler, wrong_variant};
use beanbus_core::{BeanRegistry, BeanValue};
use beanbus_error::BridgeError;
use beanbus_policy::Restrictor;
use beanbus_protocol::{BridgeRequest, Verb};
use std::sync::Arc;

/// Handles the `exec` verb.
pub struct ExecHandler {
    restrictor: Arc<dyn Restrictor>,
}

impl ExecHandler {
    /// Construct with the policy oracle.
    #[must_use]
    pub fn new(restrictor: Arc<dyn Restrictor>) -> Self {
        Self { restrictor }
    }
}

impl VerbHandler for ExecHandler {
    fn verb(&self) -> Verb {
        Verb::Exec
    }

    fn all_servers_at_once(&self, _request: &BridgeRequest) -> bool {
        false
    }

    fn handle_single(
        &self,
        registry: &dyn BeanRegistry,
        request: &BridgeRequest,
    ) -> Result<BeanValue, BridgeError> {
        let BridgeRequest::Exec(exec) = request else {
            return Err(wrong_variant(Verb::Exec, request));
        };
        if !self
            .restrictor
            .is_operation_allowed(&exec.name, &exec.operation)
        {
            return Err(BridgeError::Forbidden(format!(
                "invoking {} on {} is not allowed",
                exec.operation, exec.name
            )));
        }

        let info = registry.bean_info(&exec.name)?;
        let operation = info
            .operation(&exec.operation, exec.arguments.len())
            .ok_or_else(|| {
                let detail = if info.has_operation(&exec.operation) {
                    format!("{} (no overload with {} arguments)", exec.operation, exec.arguments.len())
                } else {
                    exec.operation.clone()
                };
                BridgeError::OperationNotFound {
                    name: exec.name.canonical(),
                    operation: detail,
                }
            })?;

        let args = operation
            .params
            .iter()
            .zip(&exec.arguments)
            .map(|(param, arg)| {
                beanbus_convert::from_json_typed(&param.type_name, &param.fields, arg)
            })
            .collect::<Result<Vec<_>, _>>()?;

        registry.invoke(&exec.name, &exec.operation, args)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use beanbus_core::{ObjectName, platform};
    use beanbus_policy::{AllowAllRestrictor, PolicyRestrictor};
    use beanbus_protocol::{ExecRequest, ProcessingOptions};

    fn exec_request(name: &str, operation: &str, arguments: Vec<serde_json::Value>) -> BridgeRequest {
        BridgeRequest::Exec(ExecRequest {
            name: ObjectName::parse(name).unwrap(),
            operation: operation.into(),
            arguments,
            path: vec![],
            options: ProcessingOptions::default(),
            target: None,
        })
    }

    #[test]
    fn exec_invokes_and_returns() {
        let handler = ExecHandler::new(Arc::new(AllowAllRestrictor));
        let registry = platform::build_registry();
        let value = handler
            .handle_single(
                registry.as_ref(),
                &exec_request("process:type=Memory", "collect", vec![]),
            )
            .unwrap();
        assert_eq!(value, BeanValue::Null);
    }

    #[test]
    fn unknown_operation_is_404() {
        let handler = ExecHandler::new(Arc::new(AllowAllRestrictor));
        let registry = platform::build_registry();
        let err = handler
            .handle_single(
                registry.as_ref(),
                &exec_request("process:type=Memory", "explode", vec![]),
            )
            .unwrap_err();
        assert_eq!(err.error_type(), "OperationNotFound");
    }

    #[test]
    fn wrong_arity_is_404_with_detail() {
        let handler = ExecHandler::new(Arc::new(AllowAllRestrictor));
        let registry = platform::build_registry();
        let err = handler
            .handle_single(
                registry.as_ref(),
                &exec_request(
                    "process:type=Memory",
                    "collect",
                    vec![serde_json::json!(1)],
                ),
            )
            .unwrap_err();
        assert_eq!(err.error_type(), "OperationNotFound");
        assert!(err.to_string().contains("overload"));
    }

    #[test]
    fn denied_operation_is_403() {
        let restrictor = PolicyRestrictor::from_toml(
            r#"
            [[deny]]
            mbean = "process:*"
            operations = ["collect"]
            "#,
        )
        .unwrap();
        let handler = ExecHandler::new(Arc::new(restrictor));
        let registry = platform::build_registry();
        let err = handler
            .handle_single(
                registry.as_ref(),
                &exec_request("process:type=Memory", "collect", vec![]),
            )
            .unwrap_err();
        assert_eq!(err.status(), 403);
    }
}
