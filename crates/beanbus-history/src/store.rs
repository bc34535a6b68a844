// SPDX-License-Identifier: MIT OR Apache-2.0
//! The history store: recent prior values per (object name,
//! attribute|operation, path, target) tuple.
//!
//! Bounded three ways: per-key queue length, global key count (LRU), and
//! per-entry age (purged lazily on access).  All mutation happens under
//! one mutex; the snapshot-then-append ordering inside
//! [`HistoryStore::update_and_add`] is what guarantees concurrent
//! duplicate requests each see previously-committed values only.

use beanbus_protocol::{AttributeSpec, BridgeRequest, path};
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tracing::debug;

// ---------------------------------------------------------------------------
// Key and entry
// ---------------------------------------------------------------------------

/// Identity of one tracked value series.
///
/// Only concrete names are keys; pattern reads record their concrete
/// matches individually.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HistoryKey {
    /// Canonical object name.
    pub name: String,
    /// Attribute or operation name, when the verb addresses one.
    pub member: Option<String>,
    /// Joined inner path, when one was given.
    pub path: Option<String>,
    /// Proxy target URL, when one was given.
    pub target: Option<String>,
}

impl HistoryKey {
    fn new(
        name: String,
        member: Option<String>,
        req_path: &[String],
        target: Option<String>,
    ) -> Self {
        Self {
            name,
            member,
            path: (!req_path.is_empty()).then(|| path::join(req_path)),
            target,
        }
    }
}

/// One recorded value.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    /// Epoch seconds when the value was recorded.
    pub timestamp: i64,
    /// The recorded JSON value.
    pub value: Value,
}

impl HistoryEntry {
    fn to_json(&self) -> Value {
        json!({ "value": self.value, "timestamp": self.timestamp })
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

struct Inner {
    default_entries: usize,
    max_keys: usize,
    max_age_secs: Option<i64>,
    limits: HashMap<HistoryKey, usize>,
    entries: HashMap<HistoryKey, VecDeque<HistoryEntry>>,
    lru: VecDeque<HistoryKey>,
}

/// Bounded, LRU-evicting history store.
pub struct HistoryStore {
    inner: Mutex<Inner>,
}

/// Default bound on the number of distinct tracked keys.
pub const DEFAULT_MAX_KEYS: usize = 100;

impl HistoryStore {
    /// Create a store with the given default per-key entry limit.
    ///
    /// A limit of `0` disables tracking entirely.
    #[must_use]
    pub fn new(default_entries: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                default_entries,
                max_keys: DEFAULT_MAX_KEYS,
                max_age_secs: None,
                limits: HashMap::new(),
                entries: HashMap::new(),
                lru: VecDeque::new(),
            }),
        }
    }

    /// Record the envelope value for this request and return the prior
    /// entries (newest first) for single-key requests.
    ///
    /// Multi-attribute and pattern reads are recorded per concrete
    /// (name, attribute) pair but attach no history to the envelope.
    pub fn update_and_add(&self, request: &BridgeRequest, value: &Value) -> Option<Value> {
        let now = beanbus_protocol::envelope::now_epoch_seconds();
        match request {
            BridgeRequest::Read(read) => {
                let target = read.target.as_ref().map(|t| t.url.clone());
                if read.name.is_pattern() {
                    // value: { concrete name -> { attribute -> value } }
                    if let Value::Object(by_name) = value {
                        for (name, attrs) in by_name {
                            if let Value::Object(by_attr) = attrs {
                                for (attr, v) in by_attr {
                                    let key = HistoryKey::new(
                                        name.clone(),
                                        Some(attr.clone()),
                                        &read.path,
                                        target.clone(),
                                    );
                                    self.record(key, v.clone(), now);
                                }
                            }
                        }
                    }
                    return None;
                }
                match &read.attributes {
                    AttributeSpec::One(attr) => {
                        let key = HistoryKey::new(
                            read.name.canonical(),
                            Some(attr.clone()),
                            &read.path,
                            target,
                        );
                        let prior = self.snapshot(&key, now);
                        self.record(key, value.clone(), now);
                        prior
                    }
                    AttributeSpec::All | AttributeSpec::Many(_) => {
                        // value: { attribute -> value }
                        if let Value::Object(by_attr) = value {
                            for (attr, v) in by_attr {
                                let key = HistoryKey::new(
                                    read.name.canonical(),
                                    Some(attr.clone()),
                                    &read.path,
                                    target.clone(),
                                );
                                self.record(key, v.clone(), now);
                            }
                        }
                        None
                    }
                }
            }
            BridgeRequest::Write(write) => {
                let key = HistoryKey::new(
                    write.name.canonical(),
                    Some(write.attribute.clone()),
                    &write.path,
                    write.target.as_ref().map(|t| t.url.clone()),
                );
                let prior = self.snapshot(&key, now);
                self.record(key, value.clone(), now);
                prior
            }
            BridgeRequest::Exec(exec) => {
                let key = HistoryKey::new(
                    exec.name.canonical(),
                    Some(exec.operation.clone()),
                    &exec.path,
                    exec.target.as_ref().map(|t| t.url.clone()),
                );
                let prior = self.snapshot(&key, now);
                self.record(key, value.clone(), now);
                prior
            }
            _ => None,
        }
    }

    /// Prior entries for a key as a JSON array (newest first), or `None`
    /// when nothing is recorded.
    fn snapshot(&self, key: &HistoryKey, now: i64) -> Option<Value> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        Self::purge_aged(&mut inner, key, now);
        let queue = inner.entries.get(key)?;
        if queue.is_empty() {
            return None;
        }
        Some(Value::Array(
            queue.iter().rev().map(HistoryEntry::to_json).collect(),
        ))
    }

    fn record(&self, key: HistoryKey, value: Value, now: i64) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let limit = inner
            .limits
            .get(&key)
            .copied()
            .unwrap_or(inner.default_entries);
        if limit == 0 {
            return;
        }
        Self::purge_aged(&mut inner, &key, now);

        let queue = inner.entries.entry(key.clone()).or_default();
        queue.push_back(HistoryEntry {
            timestamp: now,
            value,
        });
        while queue.len() > limit {
            queue.pop_front();
        }

        // LRU bookkeeping: most recently touched key at the back.
        inner.lru.retain(|k| k != &key);
        inner.lru.push_back(key);
        while inner.lru.len() > inner.max_keys {
            if let Some(evicted) = inner.lru.pop_front() {
                debug!(name = %evicted.name, "evicting history key");
                inner.entries.remove(&evicted);
            }
        }
    }

    fn purge_aged(inner: &mut Inner, key: &HistoryKey, now: i64) {
        let Some(max_age) = inner.max_age_secs else {
            return;
        };
        if let Some(queue) = inner.entries.get_mut(key) {
            while queue
                .front()
                .is_some_and(|entry| now - entry.timestamp > max_age)
            {
                queue.pop_front();
            }
        }
    }

    // -- Knobs (driven by the history management bean) -------------------

    /// The default per-key entry limit.
    #[must_use]
    pub fn default_entries(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .default_entries
    }

    /// Change the default per-key entry limit, trimming existing queues.
    pub fn set_default_entries(&self, limit: usize) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.default_entries = limit;
        for queue in inner.entries.values_mut() {
            while queue.len() > limit {
                queue.pop_front();
            }
        }
    }

    /// Per-key override; `0` turns tracking off for that key.
    pub fn set_limit(&self, key: HistoryKey, limit: usize) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if limit == 0 {
            inner.entries.remove(&key);
            inner.lru.retain(|k| k != &key);
        }
        inner.limits.insert(key, limit);
    }

    /// Maximum age in seconds, if set.
    #[must_use]
    pub fn max_age_secs(&self) -> Option<i64> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .max_age_secs
    }

    /// Set (or clear) the maximum entry age.
    pub fn set_max_age_secs(&self, max_age: Option<i64>) {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .max_age_secs = max_age;
    }

    /// Total recorded entries across all keys.
    #[must_use]
    pub fn size(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entries
            .values()
            .map(VecDeque::len)
            .sum()
    }

    /// Number of tracked keys.
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entries
            .len()
    }

    /// Drop every recorded entry and per-key override.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.entries.clear();
        inner.limits.clear();
        inner.lru.clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
