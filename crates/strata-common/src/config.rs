//! Project manifest naming the inputs of a resolution and compile run.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, StrataError};

/// Root project manifest (`strata.yaml`).
///
/// Relative paths are interpreted against the directory holding the manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
    /// Base catalog in JSON.
    pub catalog: PathBuf,
    /// Override layer files, applied in this order.
    pub layers: Vec<PathBuf>,
    /// Deployment configuration record.
    pub deployment: Option<PathBuf>,
    /// Secret reference set.
    pub secrets: Option<PathBuf>,
}

impl ProjectConfig {
    /// Loads a manifest and rebases its relative paths onto the manifest's directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid YAML.
    pub fn load(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "loading project manifest");
        let content = std::fs::read_to_string(path).map_err(|source| StrataError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Self = serde_yaml::from_str(&content)
            .map_err(|e| StrataError::parse(path.display().to_string(), e))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.rebase(base);
        Ok(config)
    }

    fn rebase(&mut self, base: &Path) {
        let join = |p: &Path| {
            if p.is_relative() {
                base.join(p)
            } else {
                p.to_path_buf()
            }
        };
        self.catalog = join(&self.catalog);
        self.layers = self.layers.iter().map(|p| join(p)).collect();
        self.deployment = self.deployment.as_deref().map(join);
        self.secrets = self.secrets.as_deref().map(join);
    }
}
