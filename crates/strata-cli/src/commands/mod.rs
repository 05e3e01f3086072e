//! CLI command definitions and dispatch.

pub mod compile;
pub mod order;
pub mod resolve;
pub mod route;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Strata: override-layer catalog resolver and service deployment compiler.
#[derive(Parser, Debug)]
#[command(name = "strata", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Path to the project manifest.
    #[arg(
        long,
        global = true,
        env = "STRATA_PROJECT",
        default_value = strata_common::constants::DEFAULT_PROJECT_FILE
    )]
    pub project: PathBuf,

    /// Log filter directive, e.g. `debug` or `strata_resolve=trace`.
    #[arg(long, global = true, env = "STRATA_LOG", default_value = "warn")]
    pub log: String,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve the catalog and print build plans.
    Resolve(resolve::ResolveArgs),
    /// Print the dependency-first build order of the resolved catalog.
    Order(order::OrderArgs),
    /// Compile the deployment and print or write its description.
    Compile(compile::CompileArgs),
    /// Show which service the reverse proxy sends a request path to.
    Route(route::RouteArgs),
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Resolve(args) => resolve::execute(&cli.project, args),
        Command::Order(args) => order::execute(&cli.project, args),
        Command::Compile(args) => compile::execute(&cli.project, args),
        Command::Route(args) => route::execute(&cli.project, args),
    }
}
