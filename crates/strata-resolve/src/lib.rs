//! # strata-resolve
//!
//! Override-layer fixed-point resolver.
//!
//! Handles:
//! - **Component**: the buildable unit and its input references.
//! - **Catalog**: the trusted base mapping from names to components.
//! - **Layer**: override layers, their overlays, and the views they read.
//! - **Transform**: replacement and additive-merge transforms.
//! - **Fixpoint**: lazy, memoized, cycle-checked evaluation.
//! - **Resolved**: the resolved catalog and its build plans.
//! - **Declarative**: layers loaded from YAML files.
//! - **Graph**: dependency-first ordering with `petgraph`.

pub mod catalog;
pub mod component;
pub mod declarative;
pub mod fixpoint;
pub mod graph;
pub mod layer;
pub mod reference;
pub mod resolved;
pub mod resolver;
pub mod transform;

pub use catalog::Catalog;
pub use component::{Component, InputRef};
pub use declarative::DeclarativeLayer;
pub use fixpoint::Fixpoint;
pub use layer::{Layer, LayerError, LayerResult, Origin, Overlay, OverrideLayer, Scope, View};
pub use resolved::{BuildPlan, PlanInput, ResolvedCatalog, ResolvedComponent, ResolvedInput};
pub use resolver::Resolver;
pub use transform::{ComponentPatch, ListEdit, Transform};
