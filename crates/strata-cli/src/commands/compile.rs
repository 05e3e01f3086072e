//! `strata compile`: Compile the deployment description.

use std::path::{Path, PathBuf};

use clap::Args;

use crate::{output, project};

/// Arguments for the `compile` command.
#[derive(Args, Debug)]
pub struct CompileArgs {
    /// Write the deployment to a file instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Executes the `compile` command.
///
/// # Errors
///
/// Returns an error if resolution or compilation fails. Nothing is written
/// in that case.
pub fn execute(manifest: &Path, args: CompileArgs) -> anyhow::Result<()> {
    let project = project::load(manifest)?;
    let deployment = project::compile(&project)?;
    let mut rendered = deployment.to_json()?;
    rendered.push('\n');
    output::emit(args.output.as_deref(), &rendered)
}
