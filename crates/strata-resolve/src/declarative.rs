//! Override layers loaded from YAML files.
//!
//! ```yaml
//! name: python-fixes
//! components:
//!   numpy:
//!     modify:
//!       version: "1.26.4"
//!       excluded_tests: { union: [test_mem_policy] }
//!   numpy-mkl:
//!     derive:
//!       from: final.numpy
//!       patch:
//!         inputs: { blas: "external:/opt/intel/mkl" }
//!   my-tool:
//!     set: { version: "0.1.0", builder: cargo, inputs: { numpy: numpy } }
//! ```
//!
//! List fields inside a patch must be tagged `union` or `replace`. A bare list
//! is accepted by the loader but fails resolution as a merge ambiguity.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use strata_common::error::{Result, StrataError};

use crate::component::Component;
use crate::layer::{Overlay, OverrideLayer};
use crate::reference::{is_valid_name, parse_origin};
use crate::transform::ComponentPatch;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LayerFile {
    name: Option<String>,
    #[serde(default)]
    components: BTreeMap<String, EntrySpec>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct EntrySpec {
    set: Option<Component>,
    modify: Option<ComponentPatch>,
    derive: Option<DeriveSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DeriveSpec {
    from: String,
    #[serde(default)]
    patch: ComponentPatch,
}

/// A layer read from a YAML document.
#[derive(Debug, Clone)]
pub struct DeclarativeLayer {
    name: String,
    overlay: Overlay,
}

impl DeclarativeLayer {
    /// Parses a layer document. `fallback_name` is used when the document has
    /// no `name` key.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::Parse`] on malformed YAML, an invalid component
    /// name, an entry that is not exactly one of `set`/`modify`/`derive`, or a
    /// malformed origin.
    pub fn from_yaml_str(input: &str, fallback_name: &str) -> Result<Self> {
        let file: LayerFile = serde_yaml::from_str(input)
            .map_err(|e| StrataError::parse(format!("layer \"{fallback_name}\""), e))?;
        let name = file.name.unwrap_or_else(|| fallback_name.to_owned());

        let mut overlay = Overlay::new();
        for (component, entry) in file.components {
            if !is_valid_name(&component) {
                return Err(StrataError::parse(
                    format!("layer \"{name}\""),
                    format!("invalid component name \"{component}\""),
                ));
            }
            overlay = match entry {
                EntrySpec {
                    set: Some(c),
                    modify: None,
                    derive: None,
                } => overlay.set(component, c),
                EntrySpec {
                    set: None,
                    modify: Some(patch),
                    derive: None,
                } => overlay.modify(component, patch),
                EntrySpec {
                    set: None,
                    modify: None,
                    derive: Some(spec),
                } => {
                    let origin = parse_origin(&spec.from)?;
                    overlay.derive(component, origin, spec.patch)
                }
                _ => {
                    return Err(StrataError::parse(
                        format!("layer \"{name}\""),
                        format!(
                            "entry \"{component}\" must have exactly one of set, modify, derive"
                        ),
                    ));
                }
            };
        }
        tracing::debug!(layer = %name, contributions = overlay.len(), "parsed layer file");
        Ok(Self { name, overlay })
    }

    /// Reads a layer file; its stem names the layer unless the file says otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        tracing::info!(path = %path.display(), "loading override layer");
        let content = std::fs::read_to_string(path).map_err(|source| StrataError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let stem = path
            .file_stem()
            .map_or_else(|| path.display().to_string(), |s| s.to_string_lossy().into_owned());
        Self::from_yaml_str(&content, &stem)
    }
}

impl OverrideLayer for DeclarativeLayer {
    fn name(&self) -> &str {
        &self.name
    }

    fn overlay(&self) -> Overlay {
        self.overlay.clone()
    }
}
