//! The resolved catalog and its build plans.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;

use serde::Serialize;
use strata_common::error::{CompositionError, Result};
use strata_common::types::Sha256Hash;

use crate::component::Component;
use crate::graph::DependencyGraph;

/// A resolved input of a component.
#[derive(Debug, Clone)]
pub enum ResolvedInput {
    /// A catalog component, shared with every other component referencing it.
    Component(Arc<ResolvedComponent>),
    /// A pre-built dependency, passed through untouched.
    External(String),
}

/// A component whose inputs have been resolved transitively.
#[derive(Debug)]
pub struct ResolvedComponent {
    component: Arc<Component>,
    inputs: BTreeMap<String, ResolvedInput>,
    artifact: Sha256Hash,
}

impl ResolvedComponent {
    pub(crate) fn new(component: Arc<Component>, inputs: BTreeMap<String, ResolvedInput>) -> Self {
        let artifact = artifact_handle(&component, &inputs);
        Self {
            component,
            inputs,
            artifact,
        }
    }

    /// The final component definition.
    #[must_use]
    pub fn component(&self) -> &Arc<Component> {
        &self.component
    }

    /// Component name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.component.name
    }

    /// Resolved inputs keyed by slot.
    #[must_use]
    pub const fn inputs(&self) -> &BTreeMap<String, ResolvedInput> {
        &self.inputs
    }

    /// Resolved input in `slot`, if that slot refers to a catalog component.
    #[must_use]
    pub fn input(&self, slot: &str) -> Option<&Arc<ResolvedComponent>> {
        match self.inputs.get(slot) {
            Some(ResolvedInput::Component(c)) => Some(c),
            _ => None,
        }
    }

    /// Opaque artifact handle the external builder will produce.
    #[must_use]
    pub const fn artifact(&self) -> &Sha256Hash {
        &self.artifact
    }

    /// Flat, serializable view of this component.
    #[must_use]
    pub fn plan(&self) -> BuildPlan {
        let c = &self.component;
        BuildPlan {
            name: c.name.clone(),
            version: c.version.clone(),
            builder: c.builder.clone(),
            artifact: self.artifact.clone(),
            inputs: self
                .inputs
                .iter()
                .map(|(slot, input)| {
                    let plan_input = match input {
                        ResolvedInput::Component(dep) => PlanInput::Catalog {
                            name: dep.name().to_owned(),
                            artifact: dep.artifact.clone(),
                        },
                        ResolvedInput::External(id) => PlanInput::External { id: id.clone() },
                    };
                    (slot.clone(), plan_input)
                })
                .collect(),
            params: c.params.clone(),
            patches: c.patches.clone(),
            excluded_tests: c.excluded_tests.clone(),
            post_build: c.post_build.clone(),
        }
    }
}

/// Hashes everything that determines a component's build output.
///
/// Each record is a tag followed by length-prefixed fields, so distinct
/// components never encode to the same bytes.
fn artifact_handle(component: &Component, inputs: &BTreeMap<String, ResolvedInput>) -> Sha256Hash {
    let mut canonical = String::new();
    record(&mut canonical, "name", &[component.name.as_str()]);
    record(&mut canonical, "version", &[component.version.as_str()]);
    record(&mut canonical, "builder", &[component.builder.as_str()]);
    for (key, value) in &component.params {
        record(&mut canonical, "param", &[key.as_str(), value.as_str()]);
    }
    for patch in &component.patches {
        record(&mut canonical, "patch", &[patch.as_str()]);
    }
    for test in &component.excluded_tests {
        record(&mut canonical, "exclude", &[test.as_str()]);
    }
    for step in &component.post_build {
        record(&mut canonical, "post", &[step.as_str()]);
    }
    for (slot, input) in inputs {
        match input {
            ResolvedInput::Component(dep) => {
                record(&mut canonical, "input", &[slot.as_str(), dep.artifact.as_hex()]);
            }
            ResolvedInput::External(id) => {
                record(&mut canonical, "external", &[slot.as_str(), id.as_str()]);
            }
        }
    }
    Sha256Hash::digest(canonical.as_bytes())
}

fn record(out: &mut String, tag: &str, fields: &[&str]) {
    out.push_str(tag);
    for field in fields {
        let _ = write!(out, " {}:{field}", field.len());
    }
    out.push('\n');
}

/// Serializable build plan of one component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildPlan {
    /// Component name.
    pub name: String,
    /// Version.
    pub version: String,
    /// Opaque builder identifier.
    pub builder: String,
    /// Handle of the artifact the plan produces.
    pub artifact: Sha256Hash,
    /// Resolved inputs keyed by slot.
    pub inputs: BTreeMap<String, PlanInput>,
    /// Constant parameters.
    pub params: BTreeMap<String, String>,
    /// Patches in application order.
    pub patches: Vec<String>,
    /// Excluded test cases or paths.
    pub excluded_tests: Vec<String>,
    /// Post-build transforms.
    pub post_build: Vec<String>,
}

/// One input of a [`BuildPlan`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PlanInput {
    /// A catalog component and its artifact handle.
    Catalog {
        /// Component name.
        name: String,
        /// Its artifact handle.
        artifact: Sha256Hash,
    },
    /// A pre-built dependency.
    External {
        /// External identifier.
        id: String,
    },
}

/// The fixed point of a base catalog and its layers.
///
/// Immutable once built and cheap to clone; safe to share across threads and
/// across any number of deployment compilations.
#[derive(Debug, Clone, Default)]
pub struct ResolvedCatalog {
    entries: BTreeMap<String, Arc<ResolvedComponent>>,
}

impl ResolvedCatalog {
    pub(crate) const fn from_entries(entries: BTreeMap<String, Arc<ResolvedComponent>>) -> Self {
        Self { entries }
    }

    /// Looks up a resolved component.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<ResolvedComponent>> {
        self.entries.get(name)
    }

    /// Looks up the final definition of a component.
    #[must_use]
    pub fn component(&self, name: &str) -> Option<&Component> {
        self.entries.get(name).map(|r| r.component.as_ref())
    }

    /// Returns `true` if the catalog defines `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Iterates over names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Iterates over resolved components in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<ResolvedComponent>)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All build plans keyed by name.
    #[must_use]
    pub fn plans(&self) -> BTreeMap<String, BuildPlan> {
        self.entries
            .iter()
            .map(|(name, resolved)| (name.clone(), resolved.plan()))
            .collect()
    }

    /// Dependency-first order in which the components can be built.
    ///
    /// # Errors
    ///
    /// Returns a cycle error if the input graph is cyclic. Catalogs produced by
    /// the resolver never are.
    pub fn build_order(&self) -> Result<Vec<String>> {
        let mut graph = DependencyGraph::new();
        for (name, resolved) in &self.entries {
            let _ = graph.add_node(name);
            for dep in resolved.component.catalog_inputs().map(|(_, dep)| dep) {
                graph.add_dependency(name, dep);
            }
        }
        graph.resolve_order().map_err(|member| {
            CompositionError::Cycle {
                path: vec![member.clone(), member.clone()],
                name: member,
            }
            .into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(name: &str) -> Arc<ResolvedComponent> {
        Arc::new(ResolvedComponent::new(
            Arc::new(Component::new(name, "1", "b")),
            BTreeMap::new(),
        ))
    }

    #[test]
    fn artifact_depends_on_inputs() {
        let dep_a = leaf("dep");
        let dep_b = Arc::new(ResolvedComponent::new(
            Arc::new(Component::new("dep", "2", "b")),
            BTreeMap::new(),
        ));
        let top = Arc::new(Component::new("top", "1", "b").input("d", "dep"));

        let mut inputs_a = BTreeMap::new();
        let _ = inputs_a.insert("d".to_owned(), ResolvedInput::Component(dep_a));
        let mut inputs_b = BTreeMap::new();
        let _ = inputs_b.insert("d".to_owned(), ResolvedInput::Component(dep_b));

        let a = ResolvedComponent::new(Arc::clone(&top), inputs_a);
        let b = ResolvedComponent::new(top, inputs_b);
        assert_ne!(a.artifact(), b.artifact());
    }

    #[test]
    fn artifact_separates_param_boundaries() {
        let split = |key: &str, value: &str| {
            ResolvedComponent::new(
                Arc::new(Component::new("c", "1", "b").param(key, value)),
                BTreeMap::new(),
            )
        };
        assert_ne!(split("a=b", "c").artifact(), split("a", "b=c").artifact());

        let joined = ResolvedComponent::new(
            Arc::new(Component::new("c", "1", "b").param("k", "v\nparam:x=y")),
            BTreeMap::new(),
        );
        let two = ResolvedComponent::new(
            Arc::new(Component::new("c", "1", "b").param("k", "v").param("x", "y")),
            BTreeMap::new(),
        );
        assert_ne!(joined.artifact(), two.artifact());
    }

    #[test]
    fn plan_lists_inputs_by_kind() {
        let dep = leaf("dep");
        let top = Arc::new(
            Component::new("top", "1", "b")
                .input("d", "dep")
                .external_input("sdk", "/opt/sdk"),
        );
        let mut inputs = BTreeMap::new();
        let _ = inputs.insert("d".to_owned(), ResolvedInput::Component(Arc::clone(&dep)));
        let _ = inputs.insert("sdk".to_owned(), ResolvedInput::External("/opt/sdk".into()));
        let resolved = ResolvedComponent::new(top, inputs);

        let plan = resolved.plan();
        assert_eq!(
            plan.inputs["d"],
            PlanInput::Catalog {
                name: "dep".into(),
                artifact: dep.artifact().clone()
            }
        );
        let json = serde_json::to_value(&plan).expect("serialize");
        assert_eq!(json["inputs"]["sdk"]["kind"], "external");
        assert!(resolved.input("d").is_some());
        assert!(resolved.input("sdk").is_none());
    }

    #[test]
    fn build_order_puts_dependencies_first() {
        let dep = leaf("dep");
        let top = Arc::new(Component::new("top", "1", "b").input("d", "dep"));
        let mut inputs = BTreeMap::new();
        let _ = inputs.insert("d".to_owned(), ResolvedInput::Component(Arc::clone(&dep)));

        let mut entries = BTreeMap::new();
        let _ = entries.insert("top".to_owned(), Arc::new(ResolvedComponent::new(top, inputs)));
        let _ = entries.insert("dep".to_owned(), dep);
        let catalog = ResolvedCatalog::from_entries(entries);

        assert_eq!(catalog.build_order().expect("order"), vec!["dep", "top"]);
    }
}
