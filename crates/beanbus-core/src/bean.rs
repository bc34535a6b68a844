// SPDX-License-Identifier: MIT OR Apache-2.0
//! The management-bean trait and its reflective metadata types.

use crate::BeanValue;
use beanbus_error::BridgeError;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

/// Reflective description of a registered bean.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BeanInfo {
    /// Implementation type name.
    pub class_name: String,
    /// Human-readable description.
    pub description: String,
    /// The attributes this bean exposes.
    pub attributes: Vec<AttrInfo>,
    /// The operations this bean exposes.
    pub operations: Vec<OpInfo>,
}

/// One field of a composite-typed attribute or parameter schema.
///
/// Composite values can only be rebuilt from JSON when the declaring
/// bean names its fields; converters reject object literals whose key
/// set does not match the declared one exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldInfo {
    /// Field name.
    pub name: String,
    /// Declared type name of the field.
    pub type_name: String,
}

impl FieldInfo {
    /// Shorthand constructor.
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// A single attribute descriptor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttrInfo {
    /// Attribute name.
    pub name: String,
    /// Declared type name (see the converter's extractor table).
    pub type_name: String,
    /// Field schema for composite-typed attributes; empty otherwise.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldInfo>,
    /// Whether reads are supported.
    pub readable: bool,
    /// Whether writes are supported.
    pub writable: bool,
    /// Human-readable description.
    pub description: String,
}

impl AttrInfo {
    /// A readable-only attribute descriptor.
    pub fn readonly(
        name: impl Into<String>,
        type_name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            fields: Vec::new(),
            readable: true,
            writable: false,
            description: description.into(),
        }
    }

    /// A read-write attribute descriptor.
    pub fn read_write(
        name: impl Into<String>,
        type_name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            writable: true,
            ..Self::readonly(name, type_name, description)
        }
    }

    /// Attach the composite field schema.
    #[must_use]
    pub fn with_fields(mut self, fields: impl IntoIterator<Item = FieldInfo>) -> Self {
        self.fields = fields.into_iter().collect();
        self
    }
}

/// A single operation descriptor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OpInfo {
    /// Operation name.
    pub name: String,
    /// Parameters in call order.
    pub params: Vec<ParamInfo>,
    /// Declared return type name.
    pub return_type: String,
    /// Human-readable description.
    pub description: String,
}

/// A single operation-parameter descriptor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParamInfo {
    /// Parameter name.
    pub name: String,
    /// Declared type name.
    pub type_name: String,
    /// Field schema for composite-typed parameters; empty otherwise.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldInfo>,
    /// Human-readable description.
    pub description: String,
}

impl ParamInfo {
    /// Shorthand constructor.
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            fields: Vec::new(),
            description: String::new(),
        }
    }

    /// Attach the composite field schema.
    #[must_use]
    pub fn with_fields(mut self, fields: impl IntoIterator<Item = FieldInfo>) -> Self {
        self.fields = fields.into_iter().collect();
        self
    }
}

impl BeanInfo {
    /// Look up an attribute descriptor by name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&AttrInfo> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// All readable attribute descriptors.
    pub fn readable_attributes(&self) -> impl Iterator<Item = &AttrInfo> {
        self.attributes.iter().filter(|a| a.readable)
    }

    /// Resolve an operation by name and arity.
    ///
    /// Overloads are permitted as long as the arity disambiguates.
    #[must_use]
    pub fn operation(&self, name: &str, arity: usize) -> Option<&OpInfo> {
        self.operations
            .iter()
            .find(|o| o.name == name && o.params.len() == arity)
    }

    /// Whether any overload with this name exists.
    #[must_use]
    pub fn has_operation(&self, name: &str) -> bool {
        self.operations.iter().any(|o| o.name == name)
    }
}

// ---------------------------------------------------------------------------
// ManagementBean
// ---------------------------------------------------------------------------

/// A named, reflectively-described object registered in a bean registry.
///
/// Read-only beans only need [`ManagementBean::info`] and
/// [`ManagementBean::get_attribute`]; the mutating entry points default to
/// descriptive errors.
pub trait ManagementBean: Send + Sync {
    /// The bean's reflective metadata.
    fn info(&self) -> BeanInfo;

    /// Read one attribute.
    fn get_attribute(&self, name: &str) -> Result<BeanValue, BridgeError>;

    /// Write one attribute, returning the previous value.
    fn set_attribute(&self, name: &str, _value: BeanValue) -> Result<BeanValue, BridgeError> {
        Err(BridgeError::Unsupported(format!(
            "attribute {name} is not writable"
        )))
    }

    /// Invoke one operation.
    fn invoke(&self, op: &str, _args: Vec<BeanValue>) -> Result<BeanValue, BridgeError> {
        Err(BridgeError::Unsupported(format!(
            "operation {op} is not supported"
        )))
    }
}
