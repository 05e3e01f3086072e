//! `strata route`: Show where the reverse proxy sends a path.

use std::path::Path;

use clap::Args;

use crate::{output, project};

/// Arguments for the `route` command.
#[derive(Args, Debug)]
pub struct RouteArgs {
    /// Request path, e.g. `/api/chat`.
    pub path: String,
}

/// Executes the `route` command.
///
/// # Errors
///
/// Returns an error if compilation fails or the proxy is disabled.
pub fn execute(manifest: &Path, args: RouteArgs) -> anyhow::Result<()> {
    let project = project::load(manifest)?;
    let deployment = project::compile(&project)?;
    let Some(routing) = deployment.routing else {
        anyhow::bail!("the reverse proxy is disabled in this deployment");
    };
    let line = format!(
        "{} -> {} ({})\n",
        args.path,
        routing.route(&args.path),
        routing.upstream(&args.path)
    );
    output::emit(None, &line)
}
