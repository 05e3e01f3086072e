//! The base catalog: a trusted mapping from names to components.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use strata_common::error::{Result, StrataError};

use crate::component::Component;

/// A mapping from component name to component.
///
/// Only the name-reference graph of a base catalog is checked; its build
/// semantics are trusted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    components: BTreeMap<String, Arc<Component>>,
}

impl Catalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a component under its own name, returning any previous value.
    pub fn insert(&mut self, component: Component) -> Option<Arc<Component>> {
        self.components
            .insert(component.name.clone(), Arc::new(component))
    }

    /// Builder-style [`Catalog::insert`].
    #[must_use]
    pub fn with(mut self, component: Component) -> Self {
        let _ = self.insert(component);
        self
    }

    /// Looks up a component.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<Component>> {
        self.components.get(name)
    }

    /// Returns `true` if the catalog defines `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.components.contains_key(name)
    }

    /// Iterates over names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.components.keys().map(String::as_str)
    }

    /// Iterates over `(name, component)` pairs in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<Component>)> {
        self.components.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Returns `true` if the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Parses a catalog from a JSON object keyed by component name.
    ///
    /// The key is authoritative: a component's `name` field is overwritten
    /// with it.
    ///
    /// # Errors
    ///
    /// Returns an error on malformed JSON or an invalid component name.
    pub fn from_json_str(input: &str) -> Result<Self> {
        let raw: BTreeMap<String, Component> = serde_json::from_str(input)?;
        let mut catalog = Self::new();
        for (name, mut component) in raw {
            if !crate::reference::is_valid_name(&name) {
                return Err(StrataError::parse(
                    "catalog",
                    format!("invalid component name \"{name}\""),
                ));
            }
            component.name = name;
            let _ = catalog.insert(component);
        }
        Ok(catalog)
    }

    /// Reads a catalog from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        tracing::info!(path = %path.display(), "loading base catalog");
        let content = std::fs::read_to_string(path).map_err(|source| StrataError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog = Self::from_json_str(&content)?;
        tracing::debug!(components = catalog.len(), "base catalog loaded");
        Ok(catalog)
    }
}

impl FromIterator<Component> for Catalog {
    fn from_iter<T: IntoIterator<Item = Component>>(iter: T) -> Self {
        let mut catalog = Self::new();
        for component in iter {
            let _ = catalog.insert(component);
        }
        catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_keys_override_inner_names() {
        let catalog = Catalog::from_json_str(
            r#"{
                "zlib": { "name": "wrong", "version": "1.3", "builder": "autotools" },
                "curl": { "version": "8.5", "builder": "autotools", "inputs": { "zlib": "zlib" } }
            }"#,
        )
        .expect("parse");
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get("zlib").expect("zlib").name, "zlib");
        assert_eq!(catalog.get("curl").expect("curl").inputs.len(), 1);
    }

    #[test]
    fn invalid_names_are_rejected() {
        let err = Catalog::from_json_str(r#"{ "bad name": { "version": "1" } }"#).unwrap_err();
        assert!(err.to_string().contains("bad name"), "got: {err}");
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(Catalog::from_json_str(r#"{ "x": { "versoin": "1" } }"#).is_err());
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("base.json");
        std::fs::write(&path, r#"{ "x": { "version": "1", "builder": "b" } }"#).expect("write");
        let catalog = Catalog::load(&path).expect("load");
        assert!(catalog.contains("x"));
        assert!(Catalog::load(&dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn collect_from_components() {
        let catalog: Catalog = [Component::new("a", "1", "b"), Component::new("b", "2", "b")]
            .into_iter()
            .collect();
        let names: Vec<_> = catalog.names().collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
