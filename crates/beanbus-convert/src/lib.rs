// SPDX-License-Identifier: MIT OR Apache-2.0
//! Bidirectional conversion between [`BeanValue`] graphs and JSON.
//!
//! [`to_json`] dispatches on the runtime shape of the value, descends
//! along an optional path, and expands the remainder under depth,
//! collection-size, and whole-conversion object budgets.  [`from_json`]
//! is the symmetric direction, driven by the declared target type of an
//! attribute or operation parameter.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod from_json;
mod to_json;

pub use from_json::{from_json, from_json_typed, from_wire_string, known_type};
pub use to_json::{ConvertOptions, FaultPolicy, to_json};
