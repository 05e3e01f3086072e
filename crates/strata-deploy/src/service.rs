//! Compiled service descriptions and the deployment they make up.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;
use strata_common::error::Result;
use strata_common::types::Sha256Hash;

use crate::config::AccessMode;
use crate::routing::RoutingTable;
use crate::secrets::SecretRef;

/// A host and port a service listens on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Endpoint {
    /// Listen address.
    pub host: String,
    /// Listen port.
    pub port: u16,
}

impl Endpoint {
    /// Plain HTTP URL for the endpoint.
    #[must_use]
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// The program a supervisor launches for a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entrypoint {
    /// Resolved component providing the program.
    pub package: String,
    /// Artifact handle of that component.
    pub artifact: Sha256Hash,
    /// Program path inside the artifact.
    pub program: String,
    /// Program arguments.
    pub args: Vec<String>,
}

/// A credential the supervisor must materialize before launch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Credential {
    /// Handle of the secret.
    pub secret: SecretRef,
    /// Where the service expects to read it.
    pub path: PathBuf,
}

/// A path a service may access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathAccess {
    /// Absolute path.
    pub path: PathBuf,
    /// Access mode.
    pub mode: AccessMode,
}

/// A declarative description of one supervised service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceDescription {
    /// Service name.
    pub name: String,
    /// Program to launch.
    pub entrypoint: Entrypoint,
    /// User the service runs as.
    pub user: String,
    /// Listener, if the service has one.
    pub listen: Option<Endpoint>,
    /// Complete environment.
    pub environment: BTreeMap<String, String>,
    /// Credentials keyed by secret name.
    pub credentials: BTreeMap<String, Credential>,
    /// Services that must be started first.
    pub after: Vec<String>,
    /// Paths the service may access.
    pub paths: Vec<PathAccess>,
}

/// A directory the supervisor creates or adjusts before launching services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathDirective {
    /// Absolute path.
    pub path: PathBuf,
    /// Strongest access mode any service requested.
    pub mode: AccessMode,
    /// Owning user.
    pub owner: String,
    /// Octal permission bits.
    pub permissions: u32,
}

/// Everything a supervisor needs to bring the services up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Deployment {
    /// Service descriptions in startup order.
    pub services: Vec<ServiceDescription>,
    /// Directory directives, sorted by path.
    pub paths: Vec<PathDirective>,
    /// Reverse-proxy routing rules, when the proxy is enabled.
    pub routing: Option<RoutingTable>,
}

impl Deployment {
    /// Looks up a compiled service.
    #[must_use]
    pub fn service(&self, name: &str) -> Option<&ServiceDescription> {
        self.services.iter().find(|s| s.name == name)
    }

    /// Service names in startup order.
    pub fn startup_order(&self) -> impl Iterator<Item = &str> {
        self.services.iter().map(|s| s.name.as_str())
    }

    /// Pretty-printed JSON rendering. Identical inputs give identical bytes.
    ///
    /// # Errors
    ///
    /// Returns [`strata_common::error::StrataError::Serialization`] if encoding fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_url() {
        let ep = Endpoint {
            host: "127.0.0.1".into(),
            port: 8001,
        };
        assert_eq!(ep.url(), "http://127.0.0.1:8001");
    }

    #[test]
    fn access_mode_serializes_short() {
        let access = PathAccess {
            path: PathBuf::from("/srv/models"),
            mode: AccessMode::ReadOnly,
        };
        let json = serde_json::to_string(&access).expect("json");
        assert_eq!(json, r#"{"path":"/srv/models","mode":"ro"}"#);
    }

    #[test]
    fn empty_deployment_renders() {
        let deployment = Deployment {
            services: Vec::new(),
            paths: Vec::new(),
            routing: None,
        };
        let json = deployment.to_json().expect("json");
        assert!(json.contains("\"routing\": null"));
        assert_eq!(deployment.startup_order().count(), 0);
    }
}
