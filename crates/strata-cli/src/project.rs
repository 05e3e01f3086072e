//! Loading the inputs named by a project manifest.

use std::path::Path;

use anyhow::Context;
use strata_common::config::ProjectConfig;
use strata_deploy::{Deployment, DeploymentConfig, SecretSet};
use strata_resolve::{Catalog, DeclarativeLayer, ResolvedCatalog, Resolver};

/// Reads the project manifest.
///
/// # Errors
///
/// Returns an error if the manifest cannot be read or parsed.
pub fn load(path: &Path) -> anyhow::Result<ProjectConfig> {
    ProjectConfig::load(path)
        .with_context(|| format!("failed to load project manifest {}", path.display()))
}

/// Builds a resolver from the manifest's catalog and layer files.
///
/// # Errors
///
/// Returns an error if any input file cannot be loaded.
pub fn resolver(project: &ProjectConfig) -> anyhow::Result<Resolver> {
    let base = Catalog::load(&project.catalog)
        .with_context(|| format!("failed to load catalog {}", project.catalog.display()))?;
    let mut resolver = Resolver::new(base);
    for path in &project.layers {
        let layer = DeclarativeLayer::load(path)
            .with_context(|| format!("failed to load layer {}", path.display()))?;
        resolver.push_layer(Box::new(layer));
    }
    Ok(resolver)
}

/// Resolves the project's catalog.
///
/// # Errors
///
/// Returns an error if loading or resolution fails.
pub fn resolve(project: &ProjectConfig) -> anyhow::Result<ResolvedCatalog> {
    let resolver = resolver(project)?;
    tracing::debug!(layers = ?resolver.layers().collect::<Vec<_>>(), "layer order");
    Ok(resolver.resolve()?)
}

/// Resolves the catalog and compiles the deployment.
///
/// A manifest without a deployment file compiles the default configuration;
/// one without a secrets file compiles against an empty secret set.
///
/// # Errors
///
/// Returns an error if loading, resolution, or compilation fails.
pub fn compile(project: &ProjectConfig) -> anyhow::Result<Deployment> {
    let catalog = resolve(project)?;
    let config = match &project.deployment {
        Some(path) => DeploymentConfig::load(path)
            .with_context(|| format!("failed to load deployment config {}", path.display()))?,
        None => DeploymentConfig::default(),
    };
    let secrets = match &project.secrets {
        Some(path) => SecretSet::load(path)
            .with_context(|| format!("failed to load secrets {}", path.display()))?,
        None => SecretSet::new(),
    };
    Ok(strata_deploy::compile(&catalog, &config, &secrets)?)
}
