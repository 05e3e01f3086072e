//! Lazy fixed-point evaluation of a base catalog and its override layers.
//!
//! Every (slot, name) pair, where a slot is the base catalog or one layer,
//! owns a memo cell holding that slot's definition of the name. `final[name]`
//! is the cell of the last slot assigning `name`; `previous[name]` as seen by
//! layer `i` is the cell of the last slot before `i`. A definition is
//! evaluated on first access only, so a layer may reference a name that a
//! later layer redefines and observe the later definition.
//!
//! A second set of cells holds resolved plans: a name's final definition with
//! every catalog input resolved. Plans are shared through `Arc`, which gives
//! every component referencing a name the very same resolved value.
//!
//! The evaluation stack is the in-progress marker. Entering a frame already on
//! the stack is a cyclic definition. Frames are popped by a guard, so an error
//! anywhere unwinds the stack cleanly.

use std::cell::{OnceCell, RefCell};
use std::collections::BTreeMap;
use std::sync::Arc;

use strata_common::error::{CompositionError, Result, StrataError};

use crate::catalog::Catalog;
use crate::component::{Component, InputRef};
use crate::layer::{Contribution, Overlay, OverrideLayer, Scope, View};
use crate::resolved::{ResolvedCatalog, ResolvedComponent, ResolvedInput};

/// Where a definition comes from: the base catalog (`None`) or a layer index.
type Slot = Option<usize>;

#[derive(Debug)]
struct Definition {
    slot: Slot,
    cell: OnceCell<Arc<Component>>,
}

#[derive(Debug)]
struct LayerFrame {
    name: String,
    overlay: Overlay,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Frame {
    Define { name: String, slot: Slot },
    Plan(String),
}

impl Frame {
    fn name(&self) -> &str {
        match self {
            Self::Define { name, .. } | Self::Plan(name) => name,
        }
    }
}

/// A component whose plan is being built, holding its evaluation frame.
struct PendingPlan<'s> {
    name: String,
    component: Arc<Component>,
    _guard: FrameGuard<'s>,
}

/// Pops the top frame of the evaluation stack when dropped.
struct FrameGuard<'s> {
    stack: &'s RefCell<Vec<Frame>>,
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        let _ = self.stack.borrow_mut().pop();
    }
}

/// The self-referential catalog view under construction.
///
/// Memoization is local to one `Fixpoint`; building a second one re-evaluates
/// everything. Evaluation is single-threaded.
#[derive(Debug)]
pub struct Fixpoint<'r> {
    layers: Vec<LayerFrame>,
    definitions: BTreeMap<String, Vec<Definition>>,
    plans: BTreeMap<String, OnceCell<Arc<ResolvedComponent>>>,
    stack: RefCell<Vec<Frame>>,
    base: &'r Catalog,
}

impl<'r> Fixpoint<'r> {
    /// Prepares the lazy view of `base` overridden by `layers`, in order.
    ///
    /// Only the key sets of the layers are read here; no definition is
    /// evaluated.
    pub fn new(base: &'r Catalog, layers: &[Box<dyn OverrideLayer + '_>]) -> Self {
        let mut definitions: BTreeMap<String, Vec<Definition>> = BTreeMap::new();
        for (name, component) in base.iter() {
            let cell = OnceCell::new();
            let _ = cell.set(Arc::clone(component));
            definitions
                .entry(name.to_owned())
                .or_default()
                .push(Definition { slot: None, cell });
        }

        let mut frames = Vec::with_capacity(layers.len());
        for (index, layer) in layers.iter().enumerate() {
            let overlay = layer.overlay();
            tracing::debug!(
                layer = index,
                name = layer.name(),
                contributions = overlay.len(),
                "registering override layer"
            );
            for name in overlay.names() {
                definitions
                    .entry(name.to_owned())
                    .or_default()
                    .push(Definition {
                        slot: Some(index),
                        cell: OnceCell::new(),
                    });
            }
            frames.push(LayerFrame {
                name: layer.name().to_owned(),
                overlay,
            });
        }

        let plans = definitions
            .keys()
            .map(|name| (name.clone(), OnceCell::new()))
            .collect();

        Self {
            layers: frames,
            definitions,
            plans,
            stack: RefCell::new(Vec::new()),
            base,
        }
    }

    /// Returns `true` if any slot assigns `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    /// Iterates over every name ever contributed, in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }

    /// The base catalog this view was built over.
    #[must_use]
    pub const fn base(&self) -> &'r Catalog {
        self.base
    }

    /// Evaluates `final[name]`: the definition of the last slot assigning it.
    ///
    /// # Errors
    ///
    /// Fails if `name` is never assigned, on a cyclic definition, on a layer
    /// failure, or on a merge ambiguity.
    pub fn lookup(&self, name: &str) -> Result<Arc<Component>> {
        let slot = self
            .definitions
            .get(name)
            .and_then(|defs| defs.last())
            .map(|def| def.slot)
            .ok_or_else(|| unknown(name, View::Final))?;
        self.definition(name, slot)
    }

    /// Evaluates `previous[name]` as seen by layer `layer`.
    pub(crate) fn previous(&self, layer: usize, name: &str) -> Result<Arc<Component>> {
        let slot = self
            .slot_before(layer, name)
            .ok_or_else(|| unknown(name, View::Previous))?;
        self.definition(name, slot)
    }

    pub(crate) fn defined_before(&self, layer: usize, name: &str) -> bool {
        self.slot_before(layer, name).is_some()
    }

    fn slot_before(&self, layer: usize, name: &str) -> Option<Slot> {
        self.definitions
            .get(name)?
            .iter()
            .rev()
            .map(|def| def.slot)
            .find(|slot| *slot < Some(layer))
    }

    /// Resolves `name` and, transitively, every catalog input it references.
    ///
    /// The result is memoized: repeated calls return the same `Arc`. Inputs
    /// are walked with an explicit work stack, so the depth of a dependency
    /// chain is bounded by memory rather than by the thread's stack.
    ///
    /// # Errors
    ///
    /// Fails on a dangling input reference or any error of [`Fixpoint::lookup`].
    pub fn plan(&self, name: &str) -> Result<Arc<ResolvedComponent>> {
        if let Some(resolved) = self.planned(name)? {
            return Ok(resolved);
        }

        let mut pending = vec![self.begin_plan(name)?];
        while let Some(top) = pending.last() {
            if let Some(target) = self.next_unplanned(top)? {
                pending.push(self.begin_plan(&target)?);
                continue;
            }
            let Some(done) = pending.pop() else {
                break;
            };
            let resolved = self.finish_plan(done)?;
            if pending.is_empty() {
                return Ok(resolved);
            }
        }
        Err(unknown(name, View::Final))
    }

    /// The memoized plan of `name`, if already computed.
    fn planned(&self, name: &str) -> Result<Option<Arc<ResolvedComponent>>> {
        self.plans
            .get(name)
            .map(|cell| cell.get().map(Arc::clone))
            .ok_or_else(|| unknown(name, View::Final))
    }

    fn begin_plan(&self, name: &str) -> Result<PendingPlan<'_>> {
        let guard = self.enter(Frame::Plan(name.to_owned()))?;
        let component = self.lookup(name)?;
        Ok(PendingPlan {
            name: name.to_owned(),
            component,
            _guard: guard,
        })
    }

    /// First catalog input of `pending` without a plan yet, in slot order.
    fn next_unplanned(&self, pending: &PendingPlan<'_>) -> Result<Option<String>> {
        for (slot, reference) in &pending.component.inputs {
            let InputRef::Catalog(target) = reference else {
                continue;
            };
            if !self.contains(target) {
                return Err(CompositionError::DanglingReference {
                    name: target.clone(),
                    referenced_by: pending.name.clone(),
                    input: slot.clone(),
                }
                .into());
            }
            if self.planned(target)?.is_none() {
                return Ok(Some(target.clone()));
            }
        }
        Ok(None)
    }

    /// Builds and memoizes the plan of a component whose inputs are all planned.
    fn finish_plan(&self, pending: PendingPlan<'_>) -> Result<Arc<ResolvedComponent>> {
        let mut inputs = BTreeMap::new();
        for (slot, reference) in &pending.component.inputs {
            let input = match reference {
                InputRef::Catalog(target) => ResolvedInput::Component(
                    self.planned(target)?
                        .ok_or_else(|| unknown(target, View::Final))?,
                ),
                InputRef::External(id) => ResolvedInput::External(id.clone()),
            };
            let _ = inputs.insert(slot.clone(), input);
        }

        let name = pending.name.as_str();
        let resolved = Arc::new(ResolvedComponent::new(Arc::clone(&pending.component), inputs));
        tracing::debug!(name, artifact = %resolved.artifact(), "resolved component");
        if let Some(cell) = self.plans.get(name) {
            let _ = cell.set(Arc::clone(&resolved));
        }
        Ok(resolved)
    }

    /// Forces every name and returns the complete resolved catalog.
    ///
    /// # Errors
    ///
    /// Returns the first error met, in name order. No partial catalog is
    /// produced.
    pub fn resolve(&self) -> Result<ResolvedCatalog> {
        let mut entries = BTreeMap::new();
        for name in self.definitions.keys() {
            let _ = entries.insert(name.clone(), self.plan(name)?);
        }
        Ok(ResolvedCatalog::from_entries(entries))
    }

    fn definition(&self, name: &str, slot: Slot) -> Result<Arc<Component>> {
        let def = self
            .definitions
            .get(name)
            .and_then(|defs| defs.iter().find(|def| def.slot == slot))
            .ok_or_else(|| unknown(name, View::Final))?;
        if let Some(component) = def.cell.get() {
            return Ok(Arc::clone(component));
        }

        let _guard = self.enter(Frame::Define {
            name: name.to_owned(),
            slot,
        })?;
        let layer = slot.ok_or_else(|| unknown(name, View::Final))?;
        let mut component = self.evaluate(layer, name)?;
        name.clone_into(&mut component.name);

        let component = Arc::new(component);
        let _ = def.cell.set(Arc::clone(&component));
        Ok(component)
    }

    /// Runs layer `layer`'s contribution for `name`.
    fn evaluate(&self, layer: usize, name: &str) -> Result<Component> {
        let frame = &self.layers[layer];
        let contribution = frame
            .overlay
            .get(name)
            .ok_or_else(|| unknown(name, View::Final))?;
        tracing::debug!(name, layer, layer_name = %frame.name, "evaluating contribution");

        let scope = Scope::new(self, layer);
        let outcome = match contribution {
            Contribution::Set(component) => Ok(component.as_ref().clone()),
            Contribution::Define(f) => f(&scope),
            Contribution::Derive { origin, transform } => match origin.view {
                View::Previous => scope.previous(&origin.name),
                View::Final => scope.final_(&origin.name),
            }
            .and_then(|old| transform.apply(&old)),
        };
        outcome.map_err(|err| err.into_strata(name, layer, &frame.name))
    }

    /// Pushes `frame`, failing with the cycle if it is already in progress.
    fn enter(&self, frame: Frame) -> std::result::Result<FrameGuard<'_>, StrataError> {
        let mut stack = self.stack.borrow_mut();
        if let Some(start) = stack.iter().position(|f| *f == frame) {
            let mut path: Vec<String> = Vec::new();
            for name in stack[start..].iter().map(Frame::name).chain([frame.name()]) {
                if path.last().map(String::as_str) != Some(name) {
                    path.push(name.to_owned());
                }
            }
            if path.len() == 1 {
                path.push(path[0].clone());
            }
            tracing::debug!(name = frame.name(), path = ?path, "cyclic definition");
            return Err(CompositionError::Cycle {
                name: frame.name().to_owned(),
                path,
            }
            .into());
        }
        stack.push(frame);
        drop(stack);
        Ok(FrameGuard { stack: &self.stack })
    }
}

fn unknown(name: &str, view: View) -> StrataError {
    CompositionError::UnknownComponent {
        name: name.to_owned(),
        view: view.as_str(),
    }
    .into()
}
