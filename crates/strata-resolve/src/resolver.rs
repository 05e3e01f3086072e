//! Entry point tying a base catalog to its ordered override layers.

use strata_common::error::Result;

use crate::catalog::Catalog;
use crate::fixpoint::Fixpoint;
use crate::layer::OverrideLayer;
use crate::resolved::ResolvedCatalog;

/// A base catalog plus the layers applied on top of it, in caller order.
///
/// The resolver never reorders layers. For fixed inputs the resolved catalog
/// is deterministic.
pub struct Resolver {
    base: Catalog,
    layers: Vec<Box<dyn OverrideLayer>>,
}

impl Resolver {
    /// Creates a resolver over `base` with no layers.
    #[must_use]
    pub fn new(base: Catalog) -> Self {
        Self {
            base,
            layers: Vec::new(),
        }
    }

    /// Appends a layer after all layers added so far.
    #[must_use]
    pub fn with_layer(mut self, layer: impl OverrideLayer + 'static) -> Self {
        self.layers.push(Box::new(layer));
        self
    }

    /// Appends an already boxed layer.
    pub fn push_layer(&mut self, layer: Box<dyn OverrideLayer>) {
        self.layers.push(layer);
    }

    /// Names of the layers in application order.
    pub fn layers(&self) -> impl Iterator<Item = &str> {
        self.layers.iter().map(|l| l.name())
    }

    /// The base catalog.
    #[must_use]
    pub const fn base(&self) -> &Catalog {
        &self.base
    }

    /// Builds a fresh lazy view for on-demand lookups.
    #[must_use]
    pub fn fixpoint(&self) -> Fixpoint<'_> {
        Fixpoint::new(&self.base, &self.layers)
    }

    /// Computes the complete resolved catalog.
    ///
    /// # Errors
    ///
    /// Returns the first composition error, cyclic definition, layer failure,
    /// or merge ambiguity met. Nothing partial is returned.
    pub fn resolve(&self) -> Result<ResolvedCatalog> {
        tracing::info!(
            components = self.base.len(),
            layers = self.layers.len(),
            "resolving catalog"
        );
        let resolved = self.fixpoint().resolve()?;
        tracing::info!(components = resolved.len(), "catalog resolved");
        Ok(resolved)
    }
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("base", &self.base.len())
            .field("layers", &self.layers().collect::<Vec<_>>())
            .finish()
    }
}
