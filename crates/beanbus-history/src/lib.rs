// SPDX-License-Identifier: MIT OR Apache-2.0
//! The history store (recent prior values per object/attribute/target
//! tuple) and the debug ring, plus the management beans exposing both.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod beans;
mod debug;
mod store;

pub use beans::{DebugBean, HistoryBean};
pub use debug::{DebugEntry, DebugStore};
pub use store::{DEFAULT_MAX_KEYS, HistoryEntry, HistoryKey, HistoryStore};
