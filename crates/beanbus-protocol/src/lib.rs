// SPDX-License-Identifier: MIT OR Apache-2.0
//! The beanbus wire protocol: the escape-aware path codec, typed requests
//! with their GET/POST factories, and the response envelope.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod envelope;
pub mod factory;
pub mod path;
mod request;

pub use factory::{PostPayload, from_get, from_post, options_from_params, request_from_json};
pub use request::{
    AttributeSpec, BridgeRequest, ExecRequest, ListRequest, NotificationCommand,
    NotificationRequest, ProcessingOptions, ReadRequest, SearchRequest, TargetSpec, VersionRequest,
    Verb, WriteRequest,
};

/// Version of the JSON protocol spoken over HTTP.
pub const PROTOCOL_VERSION: &str = "1.0";
