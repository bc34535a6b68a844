// SPDX-License-Identifier: MIT OR Apache-2.0
//! Bounded ring of recent log records, populated only when the debug flag
//! is on.

use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// One recorded debug line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DebugEntry {
    /// Epoch seconds.
    pub timestamp: i64,
    /// Log level the line was recorded at.
    pub level: String,
    /// The message.
    pub message: String,
    /// Rendered error chain, when the line came from a failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stacktrace: Option<String>,
}

struct Inner {
    max_entries: usize,
    entries: VecDeque<DebugEntry>,
}

/// Bounded debug ring.
pub struct DebugStore {
    enabled: AtomicBool,
    inner: Mutex<Inner>,
}

impl DebugStore {
    /// Create a ring bounded to `max_entries`, initially enabled or not.
    #[must_use]
    pub fn new(max_entries: usize, enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            inner: Mutex::new(Inner {
                max_entries,
                entries: VecDeque::new(),
            }),
        }
    }

    /// Whether recording is on.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Flip recording on or off, returning the previous state.
    pub fn set_enabled(&self, enabled: bool) -> bool {
        self.enabled.swap(enabled, Ordering::Relaxed)
    }

    /// Record a line; a no-op while disabled.
    pub fn record(&self, level: &str, message: impl Into<String>, stacktrace: Option<String>) {
        if !self.is_enabled() {
            return;
        }
        let entry = DebugEntry {
            timestamp: beanbus_protocol::envelope::now_epoch_seconds(),
            level: level.to_owned(),
            message: message.into(),
            stacktrace,
        };
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.entries.push_back(entry);
        while inner.entries.len() > inner.max_entries {
            inner.entries.pop_front();
        }
    }

    /// Snapshot of the ring, oldest first.
    #[must_use]
    pub fn dump(&self) -> Vec<DebugEntry> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.entries.iter().cloned().collect()
    }

    /// Drop every recorded line.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.entries.clear();
    }

    /// Current ring bound.
    #[must_use]
    pub fn max_entries(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .max_entries
    }

    /// Change the ring bound, trimming from the front.
    pub fn set_max_entries(&self, max_entries: usize) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.max_entries = max_entries;
        while inner.entries.len() > max_entries {
            inner.entries.pop_front();
        }
    }
}
