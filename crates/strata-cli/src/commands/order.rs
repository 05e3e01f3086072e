//! `strata order`: Print the dependency-first build order.

use std::path::Path;

use clap::Args;

use crate::{output, project};

/// Arguments for the `order` command.
#[derive(Args, Debug)]
pub struct OrderArgs {
    /// Print the order as a JSON array.
    #[arg(long)]
    pub json: bool,
}

/// Executes the `order` command.
///
/// # Errors
///
/// Returns an error if resolution fails.
pub fn execute(manifest: &Path, args: OrderArgs) -> anyhow::Result<()> {
    let project = project::load(manifest)?;
    let order = project::resolve(&project)?.build_order()?;
    let rendered = if args.json {
        output::to_json(&order)?
    } else {
        output::numbered(&order)
    };
    output::emit(None, &rendered)
}
