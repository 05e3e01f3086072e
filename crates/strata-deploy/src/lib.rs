//! # strata-deploy
//!
//! Service deployment compiler.
//!
//! Handles:
//! - **Config**: the deployment options record and its defaults.
//! - **Secrets**: named secret references, never values.
//! - **Env**: derived environment variables and connection wiring.
//! - **Compiler**: validation, startup ordering, and emission.
//! - **Service**: the compiled service descriptions.
//! - **Routing**: reverse-proxy prefix rules.

pub mod compiler;
pub mod config;
pub mod env;
pub mod routing;
pub mod secrets;
pub mod service;

pub use compiler::{Compiler, compile};
pub use config::{
    AccessMode, DeploymentConfig, EmbeddingConfig, PathGrant, ProviderBinding, ProviderRole,
    ProxyConfig, RouteConfig, SearchConfig, SearchProvider, ServiceConfig, Vendor,
};
pub use routing::{Route, RoutingTable};
pub use secrets::{SecretRef, SecretSet};
pub use service::{
    Credential, Deployment, Endpoint, Entrypoint, PathAccess, PathDirective, ServiceDescription,
};
