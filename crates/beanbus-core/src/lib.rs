// SPDX-License-Identifier: MIT OR Apache-2.0
//! Core vocabulary of the beanbus bridge: object names, the dynamic value
//! model, the management-bean trait, and the in-process bean registry.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod bean;
mod name;
pub mod platform;
mod registry;
mod value;

pub use bean::{AttrInfo, BeanInfo, FieldInfo, ManagementBean, OpInfo, ParamInfo};
pub use name::{NameError, ObjectName, wildcard_match};
pub use registry::{BeanRegistry, LocalRegistry};
pub use value::{BeanValue, CompositeValue, OpenBean, TabularValue};
