// SPDX-License-Identifier: MIT OR Apache-2.0
//! The dynamic value vocabulary of the management bus.
//!
//! Attribute reads, writes, and operation results all travel as
//! [`BeanValue`]s.  The converter crate dispatches on the variant to render
//! JSON; [`OpenBean`] is the reflective escape hatch for arbitrary object
//! graphs (and the only shape that can form cycles).

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// OpenBean
// ---------------------------------------------------------------------------

/// An object exposing its state through named properties.
///
/// Properties may return further [`BeanValue::Bean`] nodes, so graphs built
/// from open beans can contain cycles; converters must guard with an
/// identity set.
pub trait OpenBean: Send + Sync {
    /// Type name used for diagnostics and the string fallback form.
    fn type_name(&self) -> &str;

    /// Property names, in a stable order.
    fn keys(&self) -> Vec<String>;

    /// Look up a single property.
    fn get(&self, key: &str) -> Option<BeanValue>;

    /// String form used when depth is exhausted or a cycle is broken.
    fn display(&self) -> String {
        format!("{}[{} properties]", self.type_name(), self.keys().len())
    }
}

// ---------------------------------------------------------------------------
// Composite / tabular
// ---------------------------------------------------------------------------

/// A record with a fixed, named field schema.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeValue {
    /// Schema name of this composite.
    pub type_name: String,
    /// Field values by field name.
    pub fields: BTreeMap<String, BeanValue>,
}

impl CompositeValue {
    /// Build a composite from a field list.
    pub fn new(
        type_name: impl Into<String>,
        fields: impl IntoIterator<Item = (&'static str, BeanValue)>,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            fields: fields
                .into_iter()
                .map(|(k, v)| (k.to_owned(), v))
                .collect(),
        }
    }

    /// Field lookup.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&BeanValue> {
        self.fields.get(name)
    }
}

/// Rows of composites indexed by a typed key set.
#[derive(Debug, Clone, PartialEq)]
pub struct TabularValue {
    /// Names of the index columns, in order.
    pub index: Vec<String>,
    /// The rows; each row must carry every index column as a field.
    pub rows: Vec<CompositeValue>,
}

impl TabularValue {
    /// The key string of a row: the index column values joined with `,`.
    #[must_use]
    pub fn row_key(&self, row: &CompositeValue) -> String {
        self.index
            .iter()
            .map(|col| {
                row.field(col)
                    .map(BeanValue::to_string)
                    .unwrap_or_default()
            })
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Find a row by its key string.
    #[must_use]
    pub fn row(&self, key: &str) -> Option<&CompositeValue> {
        self.rows.iter().find(|r| self.row_key(r) == key)
    }
}

// ---------------------------------------------------------------------------
// BeanValue
// ---------------------------------------------------------------------------

/// A value travelling over the management bus.
#[derive(Clone)]
pub enum BeanValue {
    /// Absent value.
    Null,
    /// Boolean scalar.
    Bool(bool),
    /// Integer scalar.
    Int(i64),
    /// Floating-point scalar.
    Float(f64),
    /// String scalar.
    Text(String),
    /// Ordered, index-addressable sequence.
    Seq(Vec<BeanValue>),
    /// Unordered collection; renders like a sequence but cannot be
    /// descended into by path.
    Set(Vec<BeanValue>),
    /// Keyed mapping with string keys.
    Map(BTreeMap<String, BeanValue>),
    /// Fixed-schema record.
    Composite(CompositeValue),
    /// Keyed rows of composites.
    Tabular(TabularValue),
    /// Reflective object graph node.
    Bean(Arc<dyn OpenBean>),
    /// Terminal fallback: something only representable as text.
    Opaque {
        /// Type name for diagnostics.
        type_name: String,
        /// The rendered form.
        display: String,
    },
}

impl BeanValue {
    /// Short name of the runtime shape, used in fault messages.
    #[must_use]
    pub fn shape(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::Text(_) => "string",
            Self::Seq(_) => "list",
            Self::Set(_) => "set",
            Self::Map(_) => "map",
            Self::Composite(_) => "composite",
            Self::Tabular(_) => "tabular",
            Self::Bean(_) => "bean",
            Self::Opaque { .. } => "opaque",
        }
    }

    /// Convenience constructor for a map value.
    pub fn map(entries: impl IntoIterator<Item = (String, BeanValue)>) -> Self {
        Self::Map(entries.into_iter().collect())
    }
}

impl fmt::Display for BeanValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
            Self::Seq(v) => write!(f, "[{} items]", v.len()),
            Self::Set(v) => write!(f, "[{} items]", v.len()),
            Self::Map(m) => write!(f, "[{} entries]", m.len()),
            Self::Composite(c) => write!(f, "{}[{} fields]", c.type_name, c.fields.len()),
            Self::Tabular(t) => write!(f, "[{} rows]", t.rows.len()),
            Self::Bean(b) => f.write_str(&b.display()),
            Self::Opaque { display, .. } => f.write_str(display),
        }
    }
}

impl fmt::Debug for BeanValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Bool(b) => write!(f, "Bool({b})"),
            Self::Int(i) => write!(f, "Int({i})"),
            Self::Float(x) => write!(f, "Float({x})"),
            Self::Text(s) => write!(f, "Text({s:?})"),
            Self::Seq(v) => f.debug_tuple("Seq").field(v).finish(),
            Self::Set(v) => f.debug_tuple("Set").field(v).finish(),
            Self::Map(m) => f.debug_tuple("Map").field(m).finish(),
            Self::Composite(c) => f.debug_tuple("Composite").field(c).finish(),
            Self::Tabular(t) => f.debug_tuple("Tabular").field(t).finish(),
            Self::Bean(b) => write!(f, "Bean({})", b.type_name()),
            Self::Opaque { type_name, display } => {
                write!(f, "Opaque({type_name}: {display:?})")
            }
        }
    }
}

impl PartialEq for BeanValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Seq(a), Self::Seq(b)) | (Self::Set(a), Self::Set(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a == b,
            (Self::Composite(a), Self::Composite(b)) => a == b,
            (Self::Tabular(a), Self::Tabular(b)) => a == b,
            // Bean nodes compare by identity; two handles to the same
            // object are the same value.
            (Self::Bean(a), Self::Bean(b)) => Arc::ptr_eq(a, b),
            (
                Self::Opaque { type_name: ta, display: da },
                Self::Opaque { type_name: tb, display: db },
            ) => ta == tb && da == db,
            _ => false,
        }
    }
}

impl From<bool> for BeanValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for BeanValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for BeanValue {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<u32> for BeanValue {
    fn from(v: u32) -> Self {
        Self::Int(v.into())
    }
}

impl From<f64> for BeanValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for BeanValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<String> for BeanValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture;

    impl OpenBean for Fixture {
        fn type_name(&self) -> &str {
            "Fixture"
        }

        fn keys(&self) -> Vec<String> {
            vec!["a".into()]
        }

        fn get(&self, key: &str) -> Option<BeanValue> {
            (key == "a").then(|| BeanValue::Int(1))
        }
    }

    #[test]
    fn display_forms() {
        assert_eq!(BeanValue::Null.to_string(), "null");
        assert_eq!(BeanValue::Int(42).to_string(), "42");
        assert_eq!(BeanValue::Text("hi".into()).to_string(), "hi");
        assert_eq!(
            BeanValue::Seq(vec![BeanValue::Int(1), BeanValue::Int(2)]).to_string(),
            "[2 items]"
        );
        let composite = CompositeValue::new("MemoryUsage", [("used", BeanValue::Int(5))]);
        assert_eq!(
            BeanValue::Composite(composite).to_string(),
            "MemoryUsage[1 fields]"
        );
    }

    #[test]
    fn bean_equality_is_identity() {
        let shared: Arc<dyn OpenBean> = Arc::new(Fixture);
        let a = BeanValue::Bean(Arc::clone(&shared));
        let b = BeanValue::Bean(shared);
        let c = BeanValue::Bean(Arc::new(Fixture));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn tabular_row_keys() {
        let table = TabularValue {
            index: vec!["name".into()],
            rows: vec![
                CompositeValue::new("Row", [("name", "alpha".into()), ("n", BeanValue::Int(1))]),
                CompositeValue::new("Row", [("name", "beta".into()), ("n", BeanValue::Int(2))]),
            ],
        };
        assert_eq!(table.row_key(&table.rows[0]), "alpha");
        assert!(table.row("beta").is_some());
        assert!(table.row("gamma").is_none());
    }
}
