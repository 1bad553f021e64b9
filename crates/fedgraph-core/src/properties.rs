//! # Store Properties
//!
//! Flat, ordered key/value configuration for a single store.
//!
//! Properties files are TOML. Nested tables are flattened into dotted keys, so
//!
//! ```toml
//! [fedgraph.store]
//! kind = "map"
//! ```
//!
//! is read as `fedgraph.store.kind = "map"`.

use crate::primitives::STORE_KIND_KEY;
use crate::FederationError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Ordered string map of store configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoreProperties {
    entries: BTreeMap<String, String>,
}

impl StoreProperties {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Properties for a store of the given kind.
    #[must_use]
    pub fn for_kind(kind: &str) -> Self {
        let mut props = Self::new();
        props.set(STORE_KIND_KEY, kind);
        props
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// The backend kind tag, if one is configured.
    #[must_use]
    pub fn kind(&self) -> Option<&str> {
        self.get(STORE_KIND_KEY)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Overlay `other` on top of `self`; keys in `other` win.
    #[must_use]
    pub fn overlaid_with(mut self, other: &StoreProperties) -> Self {
        for (k, v) in &other.entries {
            self.entries.insert(k.clone(), v.clone());
        }
        self
    }

    /// Parse TOML text, flattening nested tables into dotted keys.
    pub fn from_toml_str(text: &str) -> Result<Self, FederationError> {
        let table: toml::Table =
            toml::from_str(text).map_err(|e| FederationError::Serialization(e.to_string()))?;
        let mut props = Self::new();
        flatten_into(&mut props.entries, None, &table);
        Ok(props)
    }

    /// Load a TOML properties file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, FederationError> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            FederationError::Io(format!("{}: {}", path.as_ref().display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    /// Render as a flat TOML document (quoted dotted keys).
    pub fn to_toml_string(&self) -> Result<String, FederationError> {
        let table: toml::Table = self
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), toml::Value::String(v.clone())))
            .collect();
        toml::to_string(&table).map_err(|e| FederationError::Serialization(e.to_string()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for StoreProperties {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

fn flatten_into(out: &mut BTreeMap<String, String>, prefix: Option<&str>, table: &toml::Table) {
    for (key, value) in table {
        let full = match prefix {
            Some(p) => format!("{}.{}", p, key),
            None => key.clone(),
        };
        match value {
            toml::Value::Table(inner) => flatten_into(out, Some(&full), inner),
            toml::Value::String(s) => {
                out.insert(full, s.clone());
            }
            toml::Value::Array(items) => {
                let joined: Vec<String> = items.iter().map(scalar_to_string).collect();
                out.insert(full, joined.join(","));
            }
            other => {
                out.insert(full, scalar_to_string(other));
            }
        }
    }
}

fn scalar_to_string(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_tables_are_flattened() {
        let props = StoreProperties::from_toml_str(
            r#"
            [fedgraph.store]
            kind = "map"

            [fedgraph.federation]
            graphIds = ["a", "b"]
            maxParallelism = 4
            "#,
        )
        .expect("parse");

        assert_eq!(props.kind(), Some("map"));
        assert_eq!(props.get("fedgraph.federation.graphIds"), Some("a,b"));
        assert_eq!(props.get("fedgraph.federation.maxParallelism"), Some("4"));
    }

    #[test]
    fn quoted_dotted_keys_are_kept() {
        let props = StoreProperties::from_toml_str(r#""fedgraph.store.kind" = "redb""#)
            .expect("parse");
        assert_eq!(props.kind(), Some("redb"));
    }

    #[test]
    fn overlay_prefers_the_overlay() {
        let base = StoreProperties::for_kind("map").with("unusualKey", "value");
        let overlay = StoreProperties::for_kind("redb");
        let merged = base.overlaid_with(&overlay);
        assert_eq!(merged.kind(), Some("redb"));
        assert_eq!(merged.get("unusualKey"), Some("value"));
    }

    #[test]
    fn toml_round_trip_preserves_entries() {
        let props = StoreProperties::for_kind("map").with("a.b", "c");
        let text = props.to_toml_string().expect("render");
        let back = StoreProperties::from_toml_str(&text).expect("parse");
        assert_eq!(props, back);
    }

    #[test]
    fn invalid_toml_is_rejected() {
        assert!(StoreProperties::from_toml_str("= broken").is_err());
    }
}
