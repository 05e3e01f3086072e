//! Transforms turning an existing component into a new one.
//!
//! Every transform is one of two explicit kinds:
//! - [`Transform::Replace`]: a function whose result replaces the old value;
//! - [`Transform::Merge`]: a [`ComponentPatch`] in which scalar fields replace
//!   and every list field carries its own [`ListEdit`] annotation.
//!
//! A list edit that is neither a union nor a replacement is a merge ambiguity
//! and fails the resolution.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Deserialize;

use crate::component::{Component, InputRef, push_unique};
use crate::layer::{LayerError, LayerResult};

/// Function form of a replacement transform.
pub type ReplaceFn = Arc<dyn Fn(&Component) -> LayerResult<Component> + Send + Sync>;

/// Per-field annotation of a list edit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "ListEditRepr")]
pub enum ListEdit {
    /// Leave the field untouched.
    #[default]
    Keep,
    /// Set union with the previous value, preserving order of first appearance.
    Union(Vec<String>),
    /// Replace the previous value entirely.
    Replace(Vec<String>),
    /// A list with no declared discipline. Applying it is an error.
    Unannotated(Vec<String>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ListEditRepr {
    Tagged(TaggedEdit),
    Bare(Vec<String>),
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
enum TaggedEdit {
    Union(Vec<String>),
    Replace(Vec<String>),
}

impl From<ListEditRepr> for ListEdit {
    fn from(repr: ListEditRepr) -> Self {
        match repr {
            ListEditRepr::Tagged(TaggedEdit::Union(items)) => Self::Union(items),
            ListEditRepr::Tagged(TaggedEdit::Replace(items)) => Self::Replace(items),
            ListEditRepr::Bare(items) => Self::Unannotated(items),
        }
    }
}

impl ListEdit {
    /// Applies the edit to `old`, naming `field` on ambiguity.
    fn apply(&self, field: &'static str, old: &[String]) -> LayerResult<Vec<String>> {
        match self {
            Self::Keep => Ok(old.to_vec()),
            Self::Union(items) => {
                let mut merged = old.to_vec();
                for item in items {
                    push_unique(&mut merged, item.clone());
                }
                Ok(merged)
            }
            Self::Replace(items) => {
                let mut replaced = Vec::with_capacity(items.len());
                for item in items {
                    push_unique(&mut replaced, item.clone());
                }
                Ok(replaced)
            }
            Self::Unannotated(_) => Err(LayerError::ambiguous(field)),
        }
    }
}

/// Declarative additive modification of a component.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ComponentPatch {
    /// New version, if any.
    pub version: Option<String>,
    /// New builder, if any.
    pub builder: Option<String>,
    /// Inputs to add or substitute, keyed by slot.
    pub inputs: BTreeMap<String, InputRef>,
    /// Parameters to add or override.
    pub params: BTreeMap<String, String>,
    /// Edit of the patch list.
    pub patches: ListEdit,
    /// Edit of the excluded-test list.
    pub excluded_tests: ListEdit,
    /// Edit of the post-build list.
    pub post_build: ListEdit,
}

impl ComponentPatch {
    /// Creates an empty patch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the version.
    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Replaces the builder.
    #[must_use]
    pub fn builder(mut self, builder: impl Into<String>) -> Self {
        self.builder = Some(builder.into());
        self
    }

    /// Substitutes a catalog input.
    #[must_use]
    pub fn input(mut self, slot: impl Into<String>, target: impl Into<String>) -> Self {
        let _ = self
            .inputs
            .insert(slot.into(), InputRef::Catalog(target.into()));
        self
    }

    /// Substitutes an external input.
    #[must_use]
    pub fn external_input(mut self, slot: impl Into<String>, id: impl Into<String>) -> Self {
        let _ = self.inputs.insert(slot.into(), InputRef::External(id.into()));
        self
    }

    /// Overrides a parameter.
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let _ = self.params.insert(key.into(), value.into());
        self
    }

    /// Adds patches by union.
    #[must_use]
    pub fn add_patches<I, S>(mut self, patches: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.patches = extend_union(self.patches, patches);
        self
    }

    /// Adds excluded tests by union.
    #[must_use]
    pub fn exclude_tests<I, S>(mut self, tests: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_tests = extend_union(self.excluded_tests, tests);
        self
    }

    /// Replaces the excluded-test list outright.
    #[must_use]
    pub fn replace_excluded_tests<I, S>(mut self, tests: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_tests = ListEdit::Replace(tests.into_iter().map(Into::into).collect());
        self
    }

    /// Adds post-build transforms by union.
    #[must_use]
    pub fn add_post_build<I, S>(mut self, steps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.post_build = extend_union(self.post_build, steps);
        self
    }

    /// Applies the patch to `old`, producing a new component.
    ///
    /// # Errors
    ///
    /// Fails with a merge ambiguity if a list edit is unannotated.
    pub fn apply(&self, old: &Component) -> LayerResult<Component> {
        let mut next = old.clone();
        if let Some(version) = &self.version {
            next.version.clone_from(version);
        }
        if let Some(builder) = &self.builder {
            next.builder.clone_from(builder);
        }
        for (slot, reference) in &self.inputs {
            let _ = next.inputs.insert(slot.clone(), reference.clone());
        }
        for (key, value) in &self.params {
            let _ = next.params.insert(key.clone(), value.clone());
        }
        next.patches = self.patches.apply("patches", &old.patches)?;
        next.excluded_tests = self
            .excluded_tests
            .apply("excluded_tests", &old.excluded_tests)?;
        next.post_build = self.post_build.apply("post_build", &old.post_build)?;
        Ok(next)
    }
}

fn extend_union<I, S>(edit: ListEdit, items: I) -> ListEdit
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let items = items.into_iter().map(Into::into);
    match edit {
        ListEdit::Union(mut existing) => {
            for item in items {
                push_unique(&mut existing, item);
            }
            ListEdit::Union(existing)
        }
        ListEdit::Replace(mut existing) => {
            for item in items {
                push_unique(&mut existing, item);
            }
            ListEdit::Replace(existing)
        }
        ListEdit::Keep | ListEdit::Unannotated(_) => ListEdit::Union(items.collect()),
    }
}

/// A transform from an old component to a new one.
#[derive(Clone)]
pub enum Transform {
    /// Full replacement: the function's result is taken as is.
    Replace(ReplaceFn),
    /// Additive merge following the patch's per-field annotations.
    Merge(ComponentPatch),
}

impl Transform {
    /// Wraps a function as a full-replacement transform.
    pub fn replace<F>(f: F) -> Self
    where
        F: Fn(&Component) -> LayerResult<Component> + Send + Sync + 'static,
    {
        Self::Replace(Arc::new(f))
    }

    /// Applies the transform to `old`.
    ///
    /// # Errors
    ///
    /// Propagates the replacement function's error or a merge ambiguity.
    pub fn apply(&self, old: &Component) -> LayerResult<Component> {
        match self {
            Self::Replace(f) => f(old),
            Self::Merge(patch) => patch.apply(old),
        }
    }
}

impl From<ComponentPatch> for Transform {
    fn from(patch: ComponentPatch) -> Self {
        Self::Merge(patch)
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Replace(_) => f.write_str("Transform::Replace(<fn>)"),
            Self::Merge(patch) => f.debug_tuple("Transform::Merge").field(patch).finish(),
        }
    }
}
