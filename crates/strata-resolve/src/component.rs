//! Component definitions: the buildable units of a catalog.
//!
//! A component never carries its build recipe. `builder` is an opaque
//! identifier that an external executor maps to a build function taking the
//! named inputs and constant parameters.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use strata_common::constants::EXTERNAL_PREFIX;
use strata_common::error::StrataError;

/// A reference from one component to one of its inputs.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum InputRef {
    /// Another component of the same catalog, looked up in the final view.
    Catalog(String),
    /// A pre-built dependency outside the catalog.
    External(String),
}

impl InputRef {
    /// Returns the catalog name this reference points at, if any.
    #[must_use]
    pub fn catalog_name(&self) -> Option<&str> {
        match self {
            Self::Catalog(name) => Some(name),
            Self::External(_) => None,
        }
    }
}

impl fmt::Display for InputRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Catalog(name) => f.write_str(name),
            Self::External(id) => write!(f, "{EXTERNAL_PREFIX}{id}"),
        }
    }
}

impl TryFrom<String> for InputRef {
    type Error = StrataError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        crate::reference::parse_input_ref(&value)
    }
}

impl From<InputRef> for String {
    fn from(reference: InputRef) -> Self {
        reference.to_string()
    }
}

/// A named, versioned buildable unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Component {
    /// Catalog name. Always equal to the key the component is stored under.
    pub name: String,
    /// Version string; scalar, replaced on override.
    pub version: String,
    /// Opaque build function identifier.
    pub builder: String,
    /// Named input references.
    pub inputs: BTreeMap<String, InputRef>,
    /// Constant build parameters.
    pub params: BTreeMap<String, String>,
    /// Patches applied before building, in order.
    pub patches: Vec<String>,
    /// Test cases or paths excluded from the check phase.
    pub excluded_tests: Vec<String>,
    /// Post-build transforms, in order.
    pub post_build: Vec<String>,
}

impl Component {
    /// Creates a component with no inputs or modifiers.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        builder: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            builder: builder.into(),
            ..Self::default()
        }
    }

    /// Adds an input referring to another catalog component.
    #[must_use]
    pub fn input(mut self, slot: impl Into<String>, target: impl Into<String>) -> Self {
        let _ = self
            .inputs
            .insert(slot.into(), InputRef::Catalog(target.into()));
        self
    }

    /// Adds an input referring to a pre-built external dependency.
    #[must_use]
    pub fn external_input(mut self, slot: impl Into<String>, id: impl Into<String>) -> Self {
        let _ = self.inputs.insert(slot.into(), InputRef::External(id.into()));
        self
    }

    /// Sets a constant build parameter.
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let _ = self.params.insert(key.into(), value.into());
        self
    }

    /// Appends a patch.
    #[must_use]
    pub fn patch(mut self, patch: impl Into<String>) -> Self {
        push_unique(&mut self.patches, patch.into());
        self
    }

    /// Excludes a test case or path.
    #[must_use]
    pub fn exclude_test(mut self, test: impl Into<String>) -> Self {
        push_unique(&mut self.excluded_tests, test.into());
        self
    }

    /// Appends a post-build transform.
    #[must_use]
    pub fn post_build(mut self, step: impl Into<String>) -> Self {
        push_unique(&mut self.post_build, step.into());
        self
    }

    /// Iterates over the catalog names this component depends on.
    pub fn catalog_inputs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inputs
            .iter()
            .filter_map(|(slot, r)| r.catalog_name().map(|name| (slot.as_str(), name)))
    }
}

/// Appends `item` unless already present, preserving first-seen order.
pub(crate) fn push_unique(list: &mut Vec<String>, item: String) {
    if !list.contains(&item) {
        list.push(item);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_setters_populate_fields() {
        let c = Component::new("numpy", "1.26.4", "python-package")
            .input("blas", "openblas")
            .external_input("fortran", "/opt/gfortran")
            .param("doCheck", "true")
            .patch("fix-build.patch")
            .exclude_test("test_mem_policy");

        assert_eq!(c.inputs["blas"], InputRef::Catalog("openblas".into()));
        assert_eq!(c.inputs["fortran"], InputRef::External("/opt/gfortran".into()));
        assert_eq!(c.params["doCheck"], "true");
        assert_eq!(c.patches, vec!["fix-build.patch"]);
        assert_eq!(c.excluded_tests, vec!["test_mem_policy"]);
    }

    #[test]
    fn repeated_modifiers_are_deduplicated() {
        let c = Component::new("x", "1", "b")
            .exclude_test("a")
            .exclude_test("a")
            .post_build("strip");
        assert_eq!(c.excluded_tests, vec!["a"]);
        assert_eq!(c.post_build, vec!["strip"]);
    }

    #[test]
    fn catalog_inputs_skip_externals() {
        let c = Component::new("x", "1", "b")
            .input("dep", "y")
            .external_input("sdk", "/opt/sdk");
        let deps: Vec<_> = c.catalog_inputs().collect();
        assert_eq!(deps, vec![("dep", "y")]);
    }

    #[test]
    fn input_refs_serialize_as_strings() {
        let c = Component::new("x", "1", "b")
            .input("dep", "y")
            .external_input("sdk", "/opt/sdk");
        let json = serde_json::to_value(&c).expect("serialize");
        assert_eq!(json["inputs"]["dep"], "y");
        assert_eq!(json["inputs"]["sdk"], "external:/opt/sdk");
        let back: Component = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, c);
    }
}
