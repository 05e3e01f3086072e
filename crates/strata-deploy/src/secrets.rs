//! Secret references.
//!
//! The compiler never sees secret values. Operators map secret names to
//! opaque handles (a vault path, a systemd credential, a file on the host);
//! compiled services receive the handle plus the path where the supervisor
//! materializes the credential.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use strata_common::error::{Result, StrataError};

/// Opaque handle to a secret held elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretRef(String);

impl SecretRef {
    /// Wraps a handle.
    #[must_use]
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    /// The handle string.
    #[must_use]
    pub fn handle(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SecretRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Secret names available to a compilation, mapped to their handles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretSet {
    refs: BTreeMap<String, SecretRef>,
}

impl SecretSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a secret, replacing any previous handle under the same name.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, handle: impl Into<String>) -> Self {
        self.insert(name, handle);
        self
    }

    /// Adds a secret in place.
    pub fn insert(&mut self, name: impl Into<String>, handle: impl Into<String>) {
        let _ = self.refs.insert(name.into(), SecretRef::new(handle));
    }

    /// Looks up a secret by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&SecretRef> {
        self.refs.get(name)
    }

    /// Number of secrets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.refs.len()
    }

    /// Returns `true` if no secrets are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    /// Parses a YAML mapping of secret name to handle.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::Parse`] if the document is not a string mapping.
    pub fn from_yaml_str(input: &str) -> Result<Self> {
        serde_yaml::from_str(input).map_err(|e| StrataError::parse("secret references", e))
    }

    /// Reads a secret reference file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "loading secret references");
        let content = std::fs::read_to_string(path).map_err(|source| StrataError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_name_to_handle_map() {
        let set = SecretSet::from_yaml_str("OPENAI_API_KEY: vault://kv/openai\n").expect("parse");
        assert_eq!(set.len(), 1);
        assert_eq!(
            set.get("OPENAI_API_KEY").map(SecretRef::handle),
            Some("vault://kv/openai")
        );
        assert!(set.get("KAGI_API_KEY").is_none());
    }

    #[test]
    fn later_insert_replaces_handle() {
        let set = SecretSet::new().with("k", "a").with("k", "b");
        assert_eq!(set.get("k").map(ToString::to_string).as_deref(), Some("b"));
    }

    #[test]
    fn non_mapping_is_rejected() {
        assert!(SecretSet::from_yaml_str("- a\n- b\n").is_err());
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("secrets.yaml");
        std::fs::write(&path, "KAGI_API_KEY: file:/etc/kagi\n").expect("write");
        let set = SecretSet::load(&path).expect("load");
        assert!(!set.is_empty());
    }
}
