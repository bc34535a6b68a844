// SPDX-License-Identifier: MIT OR Apache-2.0
//! Value-to-JSON conversion: path descent, then bounded expansion.

use beanbus_core::{BeanValue, CompositeValue, OpenBean, TabularValue};
use beanbus_error::BridgeError;
use serde_json::{Map, Number, Value, json};
use std::sync::Arc;

/// Marker appended when a collection is cut at `max_collection_size`.
const TRUNCATION_MARKER: &str = "...";

/// How descent and per-attribute faults are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FaultPolicy {
    /// Propagate the failure (404 for a dead path).
    #[default]
    Strict,
    /// Render the failure as `null` and carry on.
    Ignore,
}

/// Limits applied during expansion.
#[derive(Debug, Clone, Default)]
pub struct ConvertOptions {
    /// Maximum expansion depth; `Some(0)` renders the root as its string
    /// form.  `None` means unlimited.
    pub max_depth: Option<usize>,
    /// Maximum elements per collection; excess is dropped and a
    /// truncation marker appended.
    pub max_collection_size: Option<usize>,
    /// Budget of JSON nodes for the whole conversion.
    pub max_objects: Option<usize>,
    /// Fault rendering.
    pub fault: FaultPolicy,
}

/// Convert a value to JSON, first descending along `path`, then expanding
/// under the configured limits.
pub fn to_json(
    value: &BeanValue,
    path: &[String],
    options: &ConvertOptions,
) -> Result<Value, BridgeError> {
    let mut converter = Converter {
        options,
        objects_used: 0,
        in_progress: Vec::new(),
    };
    let target = match converter.descend(value.clone(), path) {
        Ok(target) => target,
        Err(_) if options.fault == FaultPolicy::Ignore => return Ok(Value::Null),
        Err(err) => return Err(err),
    };
    Ok(converter.expand(&target, 0))
}

struct Converter<'a> {
    options: &'a ConvertOptions,
    objects_used: usize,
    // Identity set of open beans along the current expansion spine.
    in_progress: Vec<*const ()>,
}

impl Converter<'_> {
    // -- Descent ---------------------------------------------------------

    fn descend(&self, value: BeanValue, path: &[String]) -> Result<BeanValue, BridgeError> {
        let mut current = value;
        for (i, segment) in path.iter().enumerate() {
            current = self
                .step(&current, segment)
                .ok_or_else(|| BridgeError::PathNotFound {
                    path: path.join("/"),
                    reason: format!(
                        "segment {:?} (position {}) not applicable to a {} value",
                        segment,
                        i + 1,
                        current.shape()
                    ),
                })?;
        }
        Ok(current)
    }

    fn step(&self, value: &BeanValue, segment: &str) -> Option<BeanValue> {
        match value {
            BeanValue::Seq(items) => {
                let index: usize = segment.parse().ok()?;
                items.get(index).cloned()
            }
            BeanValue::Map(entries) => entries.get(segment).cloned(),
            BeanValue::Composite(composite) => composite.field(segment).cloned(),
            BeanValue::Tabular(table) => table.row(segment).cloned().map(BeanValue::Composite),
            BeanValue::Bean(bean) => bean.get(segment),
            // Sets and scalars cannot be descended into.
            _ => None,
        }
    }

    // -- Expansion -------------------------------------------------------

    fn budget_left(&mut self) -> bool {
        self.objects_used += 1;
        match self.options.max_objects {
            Some(budget) => self.objects_used <= budget,
            None => true,
        }
    }

    fn depth_exhausted(&self, depth: usize) -> bool {
        self.options.max_depth.is_some_and(|max| depth >= max)
    }

    fn collection_cut(&self, len: usize) -> Option<usize> {
        match self.options.max_collection_size {
            Some(max) if len > max => Some(max),
            _ => None,
        }
    }

    fn expand(&mut self, value: &BeanValue, depth: usize) -> Value {
        if !self.budget_left() {
            return Value::String(value.to_string());
        }
        match value {
            BeanValue::Null => Value::Null,
            BeanValue::Bool(b) => Value::Bool(*b),
            BeanValue::Int(i) => Value::Number((*i).into()),
            BeanValue::Float(x) => Number::from_f64(*x)
                .map(Value::Number)
                .unwrap_or_else(|| Value::String(x.to_string())),
            BeanValue::Text(s) => Value::String(s.clone()),
            compound if self.depth_exhausted(depth) => Value::String(compound.to_string()),
            BeanValue::Seq(items) | BeanValue::Set(items) => self.expand_items(items, depth),
            BeanValue::Map(entries) => {
                let mut obj = Map::new();
                for (key, entry) in entries {
                    obj.insert(key.clone(), self.expand(entry, depth + 1));
                }
                Value::Object(obj)
            }
            BeanValue::Composite(composite) => self.expand_composite(composite, depth),
            BeanValue::Tabular(table) => self.expand_tabular(table, depth),
            BeanValue::Bean(bean) => self.expand_bean(bean, depth),
            BeanValue::Opaque { display, .. } => Value::String(display.clone()),
        }
    }

    fn expand_items(&mut self, items: &[BeanValue], depth: usize) -> Value {
        let cut = self.collection_cut(items.len());
        let visible = cut.unwrap_or(items.len());
        let mut out: Vec<Value> = items[..visible]
            .iter()
            .map(|item| self.expand(item, depth + 1))
            .collect();
        if cut.is_some() {
            out.push(json!(TRUNCATION_MARKER));
        }
        Value::Array(out)
    }

    fn expand_composite(&mut self, composite: &CompositeValue, depth: usize) -> Value {
        let mut obj = Map::new();
        for (field, entry) in &composite.fields {
            obj.insert(field.clone(), self.expand(entry, depth + 1));
        }
        Value::Object(obj)
    }

    fn expand_tabular(&mut self, table: &TabularValue, depth: usize) -> Value {
        let cut = self.collection_cut(table.rows.len());
        let visible = cut.unwrap_or(table.rows.len());
        let mut obj = Map::new();
        for row in &table.rows[..visible] {
            obj.insert(table.row_key(row), self.expand_composite(row, depth + 1));
        }
        if cut.is_some() {
            obj.insert(TRUNCATION_MARKER.into(), Value::Null);
        }
        Value::Object(obj)
    }

    fn expand_bean(&mut self, bean: &Arc<dyn OpenBean>, depth: usize) -> Value {
        let identity = Arc::as_ptr(bean).cast::<()>();
        if self.in_progress.contains(&identity) {
            // Cycle: render the revisited node as its string form.
            return Value::String(bean.display());
        }
        self.in_progress.push(identity);
        let mut obj = Map::new();
        for key in bean.keys() {
            let entry = bean.get(&key).unwrap_or(BeanValue::Null);
            obj.insert(key, self.expand(&entry, depth + 1));
        }
        self.in_progress.pop();
        Value::Object(obj)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::{Mutex, Weak};

    fn opts() -> ConvertOptions {
        ConvertOptions::default()
    }

    fn seg(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| (*s).to_owned()).collect()
    }

    fn heap_usage() -> BeanValue {
        BeanValue::Composite(CompositeValue::new(
            "MemoryUsage",
            [
                ("init", BeanValue::Int(16)),
                ("used", BeanValue::Int(42)),
                ("committed", BeanValue::Int(48)),
                ("max", BeanValue::Int(-1)),
            ],
        ))
    }

    // -- Scalars and containers ------------------------------------------

    #[test]
    fn scalars() {
        assert_eq!(to_json(&BeanValue::Null, &[], &opts()).unwrap(), json!(null));
        assert_eq!(to_json(&BeanValue::Int(7), &[], &opts()).unwrap(), json!(7));
        assert_eq!(
            to_json(&BeanValue::Text("x".into()), &[], &opts()).unwrap(),
            json!("x")
        );
        assert_eq!(
            to_json(&BeanValue::Float(1.5), &[], &opts()).unwrap(),
            json!(1.5)
        );
    }

    #[test]
    fn nan_floats_fall_back_to_text() {
        let v = to_json(&BeanValue::Float(f64::NAN), &[], &opts()).unwrap();
        assert!(v.is_string());
    }

    #[test]
    fn composite_expands_to_object() {
        let v = to_json(&heap_usage(), &[], &opts()).unwrap();
        assert_eq!(v["used"], 42);
        assert_eq!(v["max"], -1);
    }

    #[test]
    fn tabular_expands_keyed_by_index() {
        let table = BeanValue::Tabular(TabularValue {
            index: vec!["name".into()],
            rows: vec![
                CompositeValue::new("Row", [("name", "a".into()), ("n", BeanValue::Int(1))]),
                CompositeValue::new("Row", [("name", "b".into()), ("n", BeanValue::Int(2))]),
            ],
        });
        let v = to_json(&table, &[], &opts()).unwrap();
        assert_eq!(v["a"]["n"], 1);
        assert_eq!(v["b"]["n"], 2);
    }

    // -- Path descent ----------------------------------------------------

    #[test]
    fn path_descends_composites_and_maps() {
        let v = to_json(&heap_usage(), &seg(&["used"]), &opts()).unwrap();
        assert_eq!(v, json!(42));

        let mut entries = BTreeMap::new();
        entries.insert("heap".into(), heap_usage());
        let v = to_json(&BeanValue::Map(entries), &seg(&["heap", "max"]), &opts()).unwrap();
        assert_eq!(v, json!(-1));
    }

    #[test]
    fn path_descends_sequences_by_index() {
        let list = BeanValue::Seq(vec![
            BeanValue::Text("zero".into()),
            BeanValue::Text("one".into()),
        ]);
        assert_eq!(to_json(&list, &seg(&["1"]), &opts()).unwrap(), json!("one"));
    }

    #[test]
    fn dead_path_is_404_when_strict() {
        let err = to_json(&heap_usage(), &seg(&["nope"]), &opts()).unwrap_err();
        assert_eq!(err.status(), 404);
        assert_eq!(err.error_type(), "PathNotFound");
    }

    #[test]
    fn dead_path_is_null_when_ignored() {
        let options = ConvertOptions {
            fault: FaultPolicy::Ignore,
            ..Default::default()
        };
        let v = to_json(&heap_usage(), &seg(&["nope"]), &options).unwrap();
        assert_eq!(v, json!(null));
    }

    #[test]
    fn sets_cannot_be_descended() {
        let set = BeanValue::Set(vec![BeanValue::Int(1)]);
        let err = to_json(&set, &seg(&["0"]), &opts()).unwrap_err();
        assert_eq!(err.error_type(), "PathNotFound");
    }

    // -- Limits ----------------------------------------------------------

    #[test]
    fn depth_zero_renders_string_form() {
        let options = ConvertOptions {
            max_depth: Some(0),
            ..Default::default()
        };
        let v = to_json(&heap_usage(), &[], &options).unwrap();
        assert_eq!(v, json!("MemoryUsage[4 fields]"));
    }

    #[test]
    fn depth_one_stringifies_nested_compounds() {
        let nested = BeanValue::map([(
            "inner".to_owned(),
            BeanValue::Seq(vec![BeanValue::Int(1)]),
        )]);
        let options = ConvertOptions {
            max_depth: Some(1),
            ..Default::default()
        };
        let v = to_json(&nested, &[], &options).unwrap();
        assert_eq!(v["inner"], json!("[1 items]"));
    }

    #[test]
    fn collections_are_cut_with_marker() {
        let list = BeanValue::Seq((0..10).map(BeanValue::Int).collect());
        let options = ConvertOptions {
            max_collection_size: Some(3),
            ..Default::default()
        };
        let v = to_json(&list, &[], &options).unwrap();
        let arr = v.as_array().unwrap();
        assert_eq!(arr.len(), 4);
        assert_eq!(arr[3], json!(TRUNCATION_MARKER));
    }

    #[test]
    fn object_budget_truncates() {
        let list = BeanValue::Seq((0..100).map(BeanValue::Int).collect());
        let options = ConvertOptions {
            max_objects: Some(10),
            ..Default::default()
        };
        let v = to_json(&list, &[], &options).unwrap();
        let arr = v.as_array().unwrap();
        // The tail beyond the budget collapses into string forms.
        assert!(arr.iter().any(Value::is_string));
    }

    // -- Cycles ----------------------------------------------------------

    struct Node {
        label: String,
        next: Mutex<Option<Weak<Node>>>,
    }

    impl OpenBean for Node {
        fn type_name(&self) -> &str {
            "Node"
        }

        fn keys(&self) -> Vec<String> {
            vec!["label".into(), "next".into()]
        }

        fn get(&self, key: &str) -> Option<BeanValue> {
            match key {
                "label" => Some(BeanValue::Text(self.label.clone())),
                "next" => {
                    let next = self.next.lock().unwrap_or_else(|e| e.into_inner());
                    Some(match next.as_ref().and_then(Weak::upgrade) {
                        Some(node) => BeanValue::Bean(node),
                        None => BeanValue::Null,
                    })
                }
                _ => None,
            }
        }

        fn display(&self) -> String {
            format!("Node({})", self.label)
        }
    }

    #[test]
    fn self_cycle_renders_string_form() {
        let node = Arc::new(Node {
            label: "a".into(),
            next: Mutex::new(None),
        });
        *node.next.lock().unwrap() = Some(Arc::downgrade(&node));
        let bean: Arc<dyn OpenBean> = node;
        let v = to_json(&BeanValue::Bean(bean), &[], &opts()).unwrap();
        assert_eq!(v["label"], "a");
        assert_eq!(v["next"], json!("Node(a)"));
    }

    #[test]
    fn two_node_cycle_terminates() {
        let a = Arc::new(Node {
            label: "a".into(),
            next: Mutex::new(None),
        });
        let b = Arc::new(Node {
            label: "b".into(),
            next: Mutex::new(Some(Arc::downgrade(&a))),
        });
        *a.next.lock().unwrap() = Some(Arc::downgrade(&b));
        let bean: Arc<dyn OpenBean> = a;
        let v = to_json(&BeanValue::Bean(bean), &[], &opts()).unwrap();
        assert_eq!(v["next"]["label"], "b");
        assert_eq!(v["next"]["next"], json!("Node(a)"));
    }

    #[test]
    fn shared_non_cyclic_nodes_are_expanded_twice() {
        let shared = Arc::new(Node {
            label: "leaf".into(),
            next: Mutex::new(None),
        });
        let value = BeanValue::Seq(vec![
            BeanValue::Bean(shared.clone()),
            BeanValue::Bean(shared),
        ]);
        let v = to_json(&value, &[], &opts()).unwrap();
        // Sharing is not preserved, only cycles are broken.
        assert_eq!(v[0]["label"], "leaf");
        assert_eq!(v[1]["label"], "leaf");
    }

    #[test]
    fn bean_path_descent() {
        let node = Arc::new(Node {
            label: "root".into(),
            next: Mutex::new(None),
        });
        let bean: Arc<dyn OpenBean> = node;
        let v = to_json(&BeanValue::Bean(bean), &seg(&["label"]), &opts()).unwrap();
        assert_eq!(v, json!("root"));
    }
}
