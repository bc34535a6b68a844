// SPDX-License-Identifier: MIT OR Apache-2.0
//! The beanbus dispatch backend: product detection, the merged bean-server
//! view, one handler per protocol verb, and the backend manager that turns
//! requests into response envelopes.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod beans;
pub mod detect;
pub mod handlers;
mod manager;
mod server_handler;

pub use beans::{ConfigBean, RescanFn};
pub use detect::{
    ContainerDetector, Detection, PostDetectHook, PreDispatchHook, ProcessDetector,
    ServerDetector, ServerHandle, ServerHandleBean, bundled_detectors, run_detectors,
};
pub use manager::{
    BackendManager, BackendManagerBuilder, BuildError, DispatchOutcome, DispatcherFactory,
    DispatcherSeed, LocalDispatcher, RequestDispatcher,
};
pub use server_handler::BeanServerHandler;
