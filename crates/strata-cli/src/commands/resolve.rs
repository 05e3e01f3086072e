//! `strata resolve`: Resolve the catalog and print build plans.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use clap::Args;

use crate::{output, project};

/// Arguments for the `resolve` command.
#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Only print plans for these components.
    pub names: Vec<String>,

    /// Write the plans to a file instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Executes the `resolve` command.
///
/// # Errors
///
/// Returns an error if resolution fails or a requested name is not in the
/// resolved catalog.
pub fn execute(manifest: &Path, args: ResolveArgs) -> anyhow::Result<()> {
    let project = project::load(manifest)?;
    let catalog = project::resolve(&project)?;

    let plans = if args.names.is_empty() {
        catalog.plans()
    } else {
        let mut selected = BTreeMap::new();
        for name in &args.names {
            let Some(component) = catalog.get(name) else {
                anyhow::bail!("component \"{name}\" is not in the resolved catalog");
            };
            let _ = selected.insert(name.clone(), component.plan());
        }
        selected
    };

    output::emit(args.output.as_deref(), &output::to_json(&plans)?)
}
