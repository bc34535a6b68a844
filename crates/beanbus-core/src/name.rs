// SPDX-License-Identifier: MIT OR Apache-2.0
//! Object names: `domain:key=value,key=value` with optional `*`/`?`
//! wildcards in the domain or any property value, plus property-list
//! patterns ending in `,*`.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failures while parsing an object name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NameError {
    /// The name string is empty.
    #[error("object name is empty")]
    Empty,

    /// The name has no `:` separating domain from properties.
    #[error("object name {0:?} has no property list")]
    MissingProperties(String),

    /// A non-pattern name must have a non-empty domain.
    #[error("object name {0:?} has an empty domain")]
    EmptyDomain(String),

    /// A property is not of the form `key=value`.
    #[error("malformed property {property:?} in {name:?}")]
    MalformedProperty {
        /// The offending property token.
        property: String,
        /// The full name being parsed.
        name: String,
    },

    /// The same property key appears twice.
    #[error("duplicate property key {key:?} in {name:?}")]
    DuplicateKey {
        /// The duplicated key.
        key: String,
        /// The full name being parsed.
        name: String,
    },
}

impl From<NameError> for beanbus_error::BridgeError {
    fn from(err: NameError) -> Self {
        beanbus_error::BridgeError::InvalidRequest(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Wildcard matching
// ---------------------------------------------------------------------------

/// Glob match with `*` (any run) and `?` (any single character).
///
/// Iterative two-pointer matcher with `*` backtracking; no allocation.
#[must_use]
pub fn wildcard_match(pattern: &str, text: &str) -> bool {
    let pat: Vec<char> = pattern.chars().collect();
    let txt: Vec<char> = text.chars().collect();
    let (mut p, mut t) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;

    while t < txt.len() {
        if p < pat.len() && (pat[p] == '?' || pat[p] == txt[t]) {
            p += 1;
            t += 1;
        } else if p < pat.len() && pat[p] == '*' {
            star = Some((p, t));
            p += 1;
        } else if let Some((sp, st)) = star {
            p = sp + 1;
            t = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    while p < pat.len() && pat[p] == '*' {
        p += 1;
    }
    p == pat.len()
}

fn has_wildcard(s: &str) -> bool {
    s.contains('*') || s.contains('?')
}

// ---------------------------------------------------------------------------
// ObjectName
// ---------------------------------------------------------------------------

/// A management-bean name: domain plus ordered `key=value` properties.
///
/// The literal form preserves the property order given at parse time; the
/// canonical form sorts properties lexicographically by key.  Equality,
/// hashing, and ordering all use the canonical form.
#[derive(Debug, Clone)]
pub struct ObjectName {
    domain: String,
    properties: Vec<(String, String)>,
    property_pattern: bool,
}

impl ObjectName {
    /// Parse a name from its string form.
    ///
    /// Non-pattern names must have a non-empty domain and at least one
    /// property; pattern names may use `*`/`?` in the domain or any value
    /// and may end in `,*` (or have `*` as the whole property list).
    pub fn parse(name: &str) -> Result<Self, NameError> {
        if name.is_empty() {
            return Err(NameError::Empty);
        }
        let (domain, props_part) = name
            .split_once(':')
            .ok_or_else(|| NameError::MissingProperties(name.to_owned()))?;

        let mut properties = Vec::new();
        let mut property_pattern = false;
        if props_part == "*" {
            property_pattern = true;
        } else {
            let tokens: Vec<&str> = props_part.split(',').collect();
            for (i, token) in tokens.iter().enumerate() {
                if *token == "*" && i == tokens.len() - 1 {
                    property_pattern = true;
                    continue;
                }
                let (key, value) =
                    token
                        .split_once('=')
                        .ok_or_else(|| NameError::MalformedProperty {
                            property: (*token).to_owned(),
                            name: name.to_owned(),
                        })?;
                if key.is_empty() || value.is_empty() {
                    return Err(NameError::MalformedProperty {
                        property: (*token).to_owned(),
                        name: name.to_owned(),
                    });
                }
                if properties.iter().any(|(k, _)| k == key) {
                    return Err(NameError::DuplicateKey {
                        key: key.to_owned(),
                        name: name.to_owned(),
                    });
                }
                properties.push((key.to_owned(), value.to_owned()));
            }
        }

        let candidate = Self {
            domain: domain.to_owned(),
            properties,
            property_pattern,
        };
        if !candidate.is_pattern() {
            if candidate.domain.is_empty() {
                return Err(NameError::EmptyDomain(name.to_owned()));
            }
            if candidate.properties.is_empty() {
                return Err(NameError::MissingProperties(name.to_owned()));
            }
        }
        Ok(candidate)
    }

    /// The domain part before the `:`.
    #[must_use]
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Properties in literal (input) order.
    #[must_use]
    pub fn properties(&self) -> &[(String, String)] {
        &self.properties
    }

    /// Value of a single property, if present.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Whether this name contains any wildcard.
    #[must_use]
    pub fn is_pattern(&self) -> bool {
        self.property_pattern
            || has_wildcard(&self.domain)
            || self.properties.iter().any(|(_, v)| has_wildcard(v))
    }

    /// The property list in canonical (key-sorted) order.
    fn sorted_properties(&self) -> Vec<(&str, &str)> {
        let mut props: Vec<(&str, &str)> = self
            .properties
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        props.sort_by(|a, b| a.0.cmp(b.0));
        props
    }

    /// Canonical string form: properties sorted lexicographically by key.
    #[must_use]
    pub fn canonical(&self) -> String {
        let mut props: Vec<String> = self
            .sorted_properties()
            .into_iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        if self.property_pattern {
            props.push("*".to_owned());
        }
        format!("{}:{}", self.domain, props.join(","))
    }

    /// Literal string form: properties in input order.
    #[must_use]
    pub fn literal(&self) -> String {
        let mut props: Vec<String> = self
            .properties
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        if self.property_pattern {
            props.push("*".to_owned());
        }
        format!("{}:{}", self.domain, props.join(","))
    }

    /// Whether this (possibly pattern) name matches a concrete name.
    ///
    /// Concrete names match by canonical equality.  A pattern matches when
    /// the domain globs and every pattern property exists in `other` with a
    /// globbing value; without a trailing `,*`, the property key sets must
    /// coincide exactly.
    #[must_use]
    pub fn matches(&self, other: &ObjectName) -> bool {
        if !self.is_pattern() {
            return self == other;
        }
        // An empty pattern domain means "any domain".
        if !self.domain.is_empty() && !wildcard_match(&self.domain, &other.domain) {
            return false;
        }
        for (key, value) in &self.properties {
            match other.property(key) {
                Some(actual) if wildcard_match(value, actual) => {}
                _ => return false,
            }
        }
        if !self.property_pattern && self.properties.len() != other.properties.len() {
            return false;
        }
        true
    }
}

impl fmt::Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.literal())
    }
}

impl PartialEq for ObjectName {
    fn eq(&self, other: &Self) -> bool {
        self.domain == other.domain
            && self.property_pattern == other.property_pattern
            && self.sorted_properties() == other.sorted_properties()
    }
}

impl Eq for ObjectName {}

impl Hash for ObjectName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.domain.hash(state);
        self.property_pattern.hash(state);
        for (k, v) in self.sorted_properties() {
            k.hash(state);
            v.hash(state);
        }
    }
}

impl Ord for ObjectName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.canonical().cmp(&other.canonical())
    }
}

impl PartialOrd for ObjectName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::str::FromStr for ObjectName {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for ObjectName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.literal())
    }
}

impl<'de> Deserialize<'de> for ObjectName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(D::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
