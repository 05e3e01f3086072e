//! Override layers and the contributions they make.
//!
//! A layer is a pure function of two catalog views: `previous`, the catalog as
//! composed by all strictly earlier layers, and `final`, the fixed point being
//! computed. Its key set is known up front through its [`Overlay`]; the
//! values are evaluated lazily, on first access, by the
//! [`Fixpoint`](crate::fixpoint::Fixpoint).

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use strata_common::error::{BoxError, CompositionError, StrataError};

use crate::component::Component;
use crate::fixpoint::Fixpoint;
use crate::transform::{ComponentPatch, Transform};

/// Result type returned by layer functions and transforms.
pub type LayerResult<T> = std::result::Result<T, LayerError>;

/// Function form of a lazily evaluated definition.
pub type DefineFn = Arc<dyn Fn(&Scope<'_>) -> LayerResult<Component> + Send + Sync>;

/// Error raised from inside a layer function.
///
/// Converts from any standard error with `?`. Failures of catalog lookups made
/// through a [`Scope`] are carried through unchanged, so a cycle detected
/// inside a layer is still reported as a cycle.
pub struct LayerError(LayerErrorKind);

enum LayerErrorKind {
    Resolution(Box<StrataError>),
    Missing { name: String, view: View },
    Ambiguous(&'static str),
    Failed(BoxError),
}

impl LayerError {
    /// Creates a layer failure from a message.
    pub fn msg(message: impl Into<String>) -> Self {
        let message: String = message.into();
        Self(LayerErrorKind::Failed(message.into()))
    }

    pub(crate) const fn ambiguous(field: &'static str) -> Self {
        Self(LayerErrorKind::Ambiguous(field))
    }

    pub(crate) fn missing(name: &str, view: View) -> Self {
        Self(LayerErrorKind::Missing {
            name: name.to_owned(),
            view,
        })
    }

    pub(crate) fn resolution(err: StrataError) -> Self {
        Self(LayerErrorKind::Resolution(Box::new(err)))
    }

    /// Returns the list-typed field a merge ambiguity was raised for.
    #[must_use]
    pub const fn ambiguous_field(&self) -> Option<&'static str> {
        match self.0 {
            LayerErrorKind::Ambiguous(field) => Some(field),
            _ => None,
        }
    }

    /// Converts into the workspace error, attributing failures to `name` in `layer`.
    pub(crate) fn into_strata(self, name: &str, layer: usize, layer_name: &str) -> StrataError {
        match self.0 {
            LayerErrorKind::Resolution(err) => *err,
            LayerErrorKind::Missing { name: missing, view } => CompositionError::DanglingOrigin {
                name: missing,
                view: view.as_str(),
                referenced_by: name.to_owned(),
                layer,
                layer_name: layer_name.to_owned(),
            }
            .into(),
            LayerErrorKind::Ambiguous(field) => StrataError::MergeAmbiguity {
                component: name.to_owned(),
                field,
                layer,
            },
            LayerErrorKind::Failed(source) => CompositionError::LayerFailed {
                name: name.to_owned(),
                layer,
                layer_name: layer_name.to_owned(),
                source,
            }
            .into(),
        }
    }
}

impl<E> From<E> for LayerError
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(err: E) -> Self {
        let boxed: BoxError = Box::new(err);
        match boxed.downcast::<StrataError>() {
            Ok(strata) => Self(LayerErrorKind::Resolution(strata)),
            Err(other) => Self(LayerErrorKind::Failed(other)),
        }
    }
}

impl fmt::Debug for LayerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            LayerErrorKind::Resolution(err) => f.debug_tuple("Resolution").field(err).finish(),
            LayerErrorKind::Missing { name, view } => f
                .debug_struct("Missing")
                .field("name", name)
                .field("view", view)
                .finish(),
            LayerErrorKind::Ambiguous(field) => f.debug_tuple("Ambiguous").field(field).finish(),
            LayerErrorKind::Failed(err) => f.debug_tuple("Failed").field(err).finish(),
        }
    }
}

impl fmt::Display for LayerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            LayerErrorKind::Resolution(err) => err.fmt(f),
            LayerErrorKind::Missing { name, view } => {
                write!(f, "{}.{name} is not defined", view.as_str())
            }
            LayerErrorKind::Ambiguous(field) => write!(f, "ambiguous edit of \"{field}\""),
            LayerErrorKind::Failed(err) => err.fmt(f),
        }
    }
}

/// Which catalog view an origin is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum View {
    /// The catalog after all strictly earlier layers.
    Previous,
    /// The fixed point.
    Final,
}

impl View {
    /// Lowercase name of the view.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Previous => "previous",
            Self::Final => "final",
        }
    }
}

/// The component a derived contribution starts from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Origin {
    /// View the origin is read through.
    pub view: View,
    /// Component name within that view.
    pub name: String,
}

impl Origin {
    /// `previous[name]`.
    pub fn previous(name: impl Into<String>) -> Self {
        Self {
            view: View::Previous,
            name: name.into(),
        }
    }

    /// `final[name]`.
    pub fn final_(name: impl Into<String>) -> Self {
        Self {
            view: View::Final,
            name: name.into(),
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.view.as_str(), self.name)
    }
}

/// One layer's contribution for one name.
#[derive(Clone)]
pub enum Contribution {
    /// A constant component.
    Set(Arc<Component>),
    /// A component computed from the catalog views.
    Define(DefineFn),
    /// An existing component passed through a transform.
    Derive {
        /// Where the old value is read from.
        origin: Origin,
        /// How it is turned into the new value.
        transform: Transform,
    },
}

impl fmt::Debug for Contribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Set(c) => f.debug_tuple("Set").field(c).finish(),
            Self::Define(_) => f.write_str("Define(<fn>)"),
            Self::Derive { origin, transform } => f
                .debug_struct("Derive")
                .field("origin", origin)
                .field("transform", transform)
                .finish(),
        }
    }
}

/// The partial mapping of names to contributions a layer makes.
#[derive(Debug, Clone, Default)]
pub struct Overlay {
    entries: BTreeMap<String, Contribution>,
}

impl Overlay {
    /// Creates an empty overlay.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns a constant component to `name`.
    #[must_use]
    pub fn set(mut self, name: impl Into<String>, component: Component) -> Self {
        let _ = self
            .entries
            .insert(name.into(), Contribution::Set(Arc::new(component)));
        self
    }

    /// Assigns a lazily computed component to `name`.
    #[must_use]
    pub fn define<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Scope<'_>) -> LayerResult<Component> + Send + Sync + 'static,
    {
        let _ = self
            .entries
            .insert(name.into(), Contribution::Define(Arc::new(f)));
        self
    }

    /// Transforms `previous[name]` into the new value of `name`.
    #[must_use]
    pub fn modify(self, name: impl Into<String>, transform: impl Into<Transform>) -> Self {
        let name = name.into();
        let origin = Origin::previous(name.clone());
        self.derive(name, origin, transform)
    }

    /// Transforms the component at `origin` into the new value of `name`.
    #[must_use]
    pub fn derive(
        mut self,
        name: impl Into<String>,
        origin: Origin,
        transform: impl Into<Transform>,
    ) -> Self {
        let _ = self.entries.insert(
            name.into(),
            Contribution::Derive {
                origin,
                transform: transform.into(),
            },
        );
        self
    }

    /// Shorthand for [`Overlay::modify`] with an additive patch.
    #[must_use]
    pub fn patch(self, name: impl Into<String>, patch: ComponentPatch) -> Self {
        self.modify(name, patch)
    }

    /// Returns the contribution for `name`, if this overlay assigns it.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Contribution> {
        self.entries.get(name)
    }

    /// Iterates over the assigned names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of assigned names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the overlay assigns nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A source of contributions, applied in caller order.
pub trait OverrideLayer {
    /// Human-readable name used in diagnostics.
    fn name(&self) -> &str;

    /// The layer's contributions.
    fn overlay(&self) -> Overlay;
}

/// A named overlay built in code.
#[derive(Debug, Clone)]
pub struct Layer {
    name: String,
    overlay: Overlay,
}

impl Layer {
    /// Creates a layer from a name and its overlay.
    pub fn new(name: impl Into<String>, overlay: Overlay) -> Self {
        Self {
            name: name.into(),
            overlay,
        }
    }
}

impl OverrideLayer for Layer {
    fn name(&self) -> &str {
        &self.name
    }

    fn overlay(&self) -> Overlay {
        self.overlay.clone()
    }
}

/// The views a layer function sees while evaluating one contribution.
pub struct Scope<'a> {
    fixpoint: &'a Fixpoint<'a>,
    layer: usize,
}

impl<'a> Scope<'a> {
    pub(crate) const fn new(fixpoint: &'a Fixpoint<'a>, layer: usize) -> Self {
        Self { fixpoint, layer }
    }

    /// Zero-based index of the layer being evaluated.
    #[must_use]
    pub const fn layer_index(&self) -> usize {
        self.layer
    }

    /// Reads `name` from the catalog as composed by all strictly earlier layers.
    ///
    /// # Errors
    ///
    /// Fails if no earlier layer nor the base defines `name`, or if reading it
    /// re-enters a definition still being evaluated.
    pub fn previous(&self, name: &str) -> LayerResult<Arc<Component>> {
        if !self.fixpoint.defined_before(self.layer, name) {
            return Err(LayerError::missing(name, View::Previous));
        }
        self.fixpoint
            .previous(self.layer, name)
            .map_err(LayerError::resolution)
    }

    /// Reads `name` from the fixed point.
    ///
    /// # Errors
    ///
    /// Fails if the final catalog does not define `name`, or on a cycle.
    pub fn final_(&self, name: &str) -> LayerResult<Arc<Component>> {
        if !self.fixpoint.contains(name) {
            return Err(LayerError::missing(name, View::Final));
        }
        self.fixpoint.lookup(name).map_err(LayerError::resolution)
    }

    /// Returns `true` if `name` exists in the previous view.
    #[must_use]
    pub fn has_previous(&self, name: &str) -> bool {
        self.fixpoint.defined_before(self.layer, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("recipe missing")]
    struct RecipeMissing;

    #[test]
    fn std_errors_become_layer_failures() {
        let err: LayerError = RecipeMissing.into();
        let strata = err.into_strata("numpy", 1, "fixes");
        let msg = strata.to_string();
        assert!(msg.contains("layer 1"), "got: {msg}");
        assert!(msg.contains("recipe missing"), "got: {msg}");
    }

    #[test]
    fn strata_errors_pass_through_unwrapped() {
        let inner = StrataError::from(strata_common::error::CompositionError::Cycle {
            name: "a".into(),
            path: vec!["a".into(), "a".into()],
        });
        let err: LayerError = inner.into();
        let strata = err.into_strata("b", 0, "l");
        assert!(matches!(
            strata,
            StrataError::Composition(strata_common::error::CompositionError::Cycle { .. })
        ));
    }

    #[test]
    fn overlay_tracks_names_in_order() {
        let overlay = Overlay::new()
            .set("zlib", Component::new("zlib", "1.3", "autotools"))
            .modify("curl", ComponentPatch::new().version("8.5"))
            .define("app", |_| Ok(Component::new("app", "1", "cargo")));
        let names: Vec<_> = overlay.names().collect();
        assert_eq!(names, vec!["app", "curl", "zlib"]);
        assert!(matches!(overlay.get("curl"), Some(Contribution::Derive { .. })));
    }

    #[test]
    fn origin_display_round_trips_through_parser() {
        let origin = Origin::final_("numpy");
        let parsed = crate::reference::parse_origin(&origin.to_string()).expect("parse");
        assert_eq!(parsed, origin);
    }
}
