//! Deployment compiler.
//!
//! Turns a resolved catalog plus a deployment configuration into service
//! descriptions, directory directives, and optional routing rules. Every
//! check runs before anything is emitted, so compilation either yields a
//! complete [`Deployment`] or an error.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use strata_common::constants::{DATA_ROOT_MODE, READ_ONLY_MODE, STATE_DIR_MODE};
use strata_common::error::{ConfigurationError, Result};
use strata_resolve::ResolvedCatalog;
use strata_resolve::graph::DependencyGraph;

use crate::config::{AccessMode, DeploymentConfig, ProviderRole, ServiceConfig};
use crate::env::{DerivedEnv, ProviderEnv, binding_env, connection_env, search_env};
use crate::routing::{Route, RoutingTable};
use crate::secrets::SecretSet;
use crate::service::{
    Credential, Deployment, Endpoint, Entrypoint, PathAccess, PathDirective, ServiceDescription,
};

/// Compiles a deployment in one call.
///
/// # Errors
///
/// Returns a [`ConfigurationError`] naming the offending service (and the
/// service it references, where there is one).
pub fn compile(
    catalog: &ResolvedCatalog,
    config: &DeploymentConfig,
    secrets: &SecretSet,
) -> Result<Deployment> {
    Compiler::new(catalog, config, secrets).compile()
}

/// Holds the inputs of one compilation.
#[derive(Debug, Clone, Copy)]
pub struct Compiler<'a> {
    catalog: &'a ResolvedCatalog,
    config: &'a DeploymentConfig,
    secrets: &'a SecretSet,
}

impl<'a> Compiler<'a> {
    /// Creates a compiler over borrowed inputs.
    #[must_use]
    pub const fn new(
        catalog: &'a ResolvedCatalog,
        config: &'a DeploymentConfig,
        secrets: &'a SecretSet,
    ) -> Self {
        Self {
            catalog,
            config,
            secrets,
        }
    }

    /// Runs every check and builds the deployment.
    ///
    /// # Errors
    ///
    /// See [`compile`].
    pub fn compile(&self) -> Result<Deployment> {
        tracing::info!(
            services = self.config.enabled_services().count(),
            proxy = self.config.proxy.enable,
            "compiling deployment"
        );
        self.check_references()?;
        let routing = self.routing()?;
        let order = self.startup_order()?;

        let mut services = Vec::with_capacity(order.len());
        for name in &order {
            let Some(svc) = self.config.services.get(name) else {
                continue;
            };
            services.push(self.describe(name, svc)?);
        }
        let paths = self.path_directives(&services);

        tracing::info!(
            services = services.len(),
            paths = paths.len(),
            "deployment compiled"
        );
        Ok(Deployment {
            services,
            paths,
            routing,
        })
    }

    fn check_references(&self) -> Result<()> {
        for (name, svc) in self.config.enabled_services() {
            for target in &svc.connect {
                let _ = self.listener_of(name, target)?;
            }
            for target in &svc.after {
                let _ = self.target(name, target)?;
            }
        }
        Ok(())
    }

    /// Looks up an enabled service referenced by `service`.
    fn target(&self, service: &str, target: &str) -> Result<&'a ServiceConfig> {
        match self.config.services.get(target) {
            None => Err(ConfigurationError::UnknownService {
                service: service.to_owned(),
                target: target.to_owned(),
            }
            .into()),
            Some(t) if !t.enable => Err(ConfigurationError::DisabledService {
                service: service.to_owned(),
                target: target.to_owned(),
            }
            .into()),
            Some(t) => Ok(t),
        }
    }

    /// Looks up the listener of an enabled service referenced by `service`.
    fn listener_of(&self, service: &str, target: &str) -> Result<Endpoint> {
        let config = self.target(service, target)?;
        listener(config).ok_or_else(|| {
            ConfigurationError::InvalidOption {
                option: format!("services.{target}.port"),
                message: format!("\"{service}\" connects to \"{target}\", which has no listener"),
            }
            .into()
        })
    }

    fn routing(&self) -> Result<Option<RoutingTable>> {
        let proxy = &self.config.proxy;
        if !proxy.enable {
            return Ok(None);
        }
        let default_upstream = self.listener_of("proxy", &proxy.default)?.url();
        let mut routes = Vec::with_capacity(proxy.routes.len());
        for (i, route) in proxy.routes.iter().enumerate() {
            if !route.prefix.starts_with('/') {
                return Err(ConfigurationError::InvalidOption {
                    option: format!("proxy.routes[{i}].prefix"),
                    message: format!("\"{}\" must start with '/'", route.prefix),
                }
                .into());
            }
            routes.push(Route {
                prefix: route.prefix.clone(),
                service: route.service.clone(),
                upstream: self.listener_of("proxy", &route.service)?.url(),
            });
        }
        Ok(Some(RoutingTable {
            listen: Endpoint {
                host: proxy.host.clone(),
                port: proxy.port,
            },
            routes,
            default_service: proxy.default.clone(),
            default_upstream,
        }))
    }

    /// Enabled services, dependencies first.
    fn startup_order(&self) -> Result<Vec<String>> {
        let mut graph = DependencyGraph::new();
        for (name, _) in self.config.enabled_services() {
            let _ = graph.add_node(name);
        }
        for (name, svc) in self.config.enabled_services() {
            for target in svc.connect.iter().chain(&svc.after) {
                graph.add_dependency(name, target);
            }
        }
        graph
            .resolve_order()
            .map_err(|service| ConfigurationError::StartupCycle { service }.into())
    }

    fn describe(&self, name: &str, svc: &ServiceConfig) -> Result<ServiceDescription> {
        let package = svc.package_or(name);
        let resolved =
            self.catalog
                .get(package)
                .ok_or_else(|| ConfigurationError::MissingEntrypoint {
                    service: name.to_owned(),
                    package: package.to_owned(),
                })?;
        let entrypoint = Entrypoint {
            package: package.to_owned(),
            artifact: resolved.artifact().clone(),
            program: svc.program_or(name),
            args: svc.args.clone(),
        };

        let state_dir = self.config.data_dir.join(name);
        let listen = listener(svc);
        let mut environment = DerivedEnv::new(name);
        environment.insert("STRATA_SERVICE".to_owned(), name.to_owned(), "service")?;
        environment.insert(
            "LOG_LEVEL".to_owned(),
            self.config.log_level.as_str().to_owned(),
            "service",
        )?;
        environment.insert(
            "DATA_DIR".to_owned(),
            state_dir.display().to_string(),
            "service",
        )?;
        if let Some(ep) = &listen {
            environment.insert("HOST".to_owned(), ep.host.clone(), "service")?;
            environment.insert("PORT".to_owned(), ep.port.to_string(), "service")?;
        }

        let mut credentials = BTreeMap::new();
        let roles: BTreeSet<ProviderRole> = svc.providers.iter().copied().collect();
        for role in roles {
            let source = format!("provider {}", role.as_str());
            let provided = self.provider_env(name, role)?;
            environment.extend(provided.vars, &source)?;
            if let Some(cred) = provided.credential {
                let secret = self.secrets.get(&cred.secret).ok_or_else(|| {
                    ConfigurationError::MissingSecret {
                        service: name.to_owned(),
                        secret: cred.secret.clone(),
                    }
                })?;
                let path = self.config.credentials_dir.join(name).join(&cred.secret);
                environment.insert(cred.variable, path.display().to_string(), &source)?;
                let _ = credentials.insert(
                    cred.secret,
                    Credential {
                        secret: secret.clone(),
                        path,
                    },
                );
            }
        }

        for target in &svc.connect {
            let endpoint = self.listener_of(name, target)?;
            environment.extend(
                connection_env(target, &endpoint),
                &format!("connect target \"{target}\""),
            )?;
        }

        let environment = environment.with_operator(&svc.environment);

        let after: BTreeSet<&String> = svc.connect.iter().chain(&svc.after).collect();

        let mut paths = vec![PathAccess {
            path: state_dir,
            mode: AccessMode::ReadWrite,
        }];
        for (i, grant) in svc.paths.iter().enumerate() {
            if !grant.path.is_absolute() {
                return Err(ConfigurationError::InvalidOption {
                    option: format!("services.{name}.paths[{i}]"),
                    message: format!("\"{}\" is not an absolute path", grant.path.display()),
                }
                .into());
            }
            paths.push(PathAccess {
                path: grant.path.clone(),
                mode: grant.mode,
            });
        }

        tracing::debug!(
            service = name,
            package,
            artifact = %entrypoint.artifact,
            variables = environment.len(),
            "described service"
        );
        Ok(ServiceDescription {
            name: name.to_owned(),
            entrypoint,
            user: self.config.user.clone(),
            listen,
            environment,
            credentials,
            after: after.into_iter().cloned().collect(),
            paths,
        })
    }

    fn provider_env(&self, service: &str, role: ProviderRole) -> Result<ProviderEnv> {
        match role {
            ProviderRole::Llm => binding_env("LLM", "llm", &self.config.llm),
            ProviderRole::Embedding => {
                let embedding = &self.config.embedding;
                let mut env = binding_env("EMBEDDING", "embedding.binding", &embedding.binding)?;
                let _ = env.vars.insert(
                    "EMBEDDING_DIMENSION".to_owned(),
                    embedding.dimension.to_string(),
                );
                Ok(env)
            }
            ProviderRole::Search => {
                if !self.config.search.enable {
                    return Err(ConfigurationError::DisabledSubsystem {
                        service: service.to_owned(),
                        subsystem: "search",
                    }
                    .into());
                }
                Ok(search_env(&self.config.search))
            }
        }
    }

    /// One directive per path, with the strongest requested mode.
    fn path_directives(&self, services: &[ServiceDescription]) -> Vec<PathDirective> {
        let mut directives: BTreeMap<PathBuf, PathDirective> = BTreeMap::new();
        let _ = directives.insert(
            self.config.data_dir.clone(),
            PathDirective {
                path: self.config.data_dir.clone(),
                mode: AccessMode::ReadWrite,
                owner: self.config.user.clone(),
                permissions: DATA_ROOT_MODE,
            },
        );
        for access in services.iter().flat_map(|s| &s.paths) {
            let directive = directives
                .entry(access.path.clone())
                .or_insert_with(|| PathDirective {
                    path: access.path.clone(),
                    mode: access.mode,
                    owner: self.config.user.clone(),
                    permissions: permissions(access.mode),
                });
            if access.mode > directive.mode {
                directive.mode = access.mode;
                directive.permissions = permissions(access.mode);
            }
        }
        directives.into_values().collect()
    }
}

fn listener(svc: &ServiceConfig) -> Option<Endpoint> {
    (svc.port > 0).then(|| Endpoint {
        host: svc.host.clone(),
        port: svc.port,
    })
}

const fn permissions(mode: AccessMode) -> u32 {
    match mode {
        AccessMode::ReadOnly => READ_ONLY_MODE,
        AccessMode::ReadWrite => STATE_DIR_MODE,
    }
}

#[cfg(test)]
mod tests {
    use strata_resolve::{Catalog, Component, Resolver};

    use super::*;
    use crate::config::{PathGrant, ProviderBinding, Vendor};

    fn catalog() -> ResolvedCatalog {
        let base = Catalog::new()
            .with(Component::new("python", "3.12.4", "autotools"))
            .with(Component::new("backend", "0.4.0", "python").input("python", "python"))
            .with(Component::new("frontend", "0.4.0", "npm"));
        Resolver::new(base).resolve().expect("resolve")
    }

    #[test]
    fn default_configuration_compiles() {
        let catalog = catalog();
        let deployment =
            compile(&catalog, &DeploymentConfig::default(), &SecretSet::new()).expect("compile");
        let order: Vec<&str> = deployment.startup_order().collect();
        assert_eq!(order, vec!["backend", "frontend"]);

        let backend = deployment.service("backend").expect("backend");
        assert_eq!(backend.environment["PORT"], "8001");
        assert_eq!(backend.environment["LLM_BINDING"], "local");
        assert_eq!(backend.environment["EMBEDDING_DIMENSION"], "1536");
        assert_eq!(backend.environment["DATA_DIR"], "/var/lib/strata/backend");
        assert_eq!(
            &backend.entrypoint.artifact,
            catalog.get("backend").expect("resolved").artifact()
        );

        let frontend = deployment.service("frontend").expect("frontend");
        assert_eq!(frontend.environment["BACKEND_URL"], "http://127.0.0.1:8001");
        assert_eq!(frontend.after, vec!["backend"]);
        assert!(deployment.routing.is_none());
    }

    #[test]
    fn vendor_credential_becomes_file_path() {
        let catalog = catalog();
        let mut config = DeploymentConfig::default();
        config.llm = ProviderBinding::Vendor {
            vendor: Vendor::DeepSeek,
            model: "deepseek-chat".into(),
            api_key: Some("deepseek".into()),
            base_url: None,
        };
        let secrets = SecretSet::new().with("deepseek", "vault://kv/deepseek");
        let deployment = compile(&catalog, &config, &secrets).expect("compile");
        let backend = deployment.service("backend").expect("backend");
        assert_eq!(
            backend.environment["LLM_API_KEY_FILE"],
            "/run/credentials/backend/deepseek"
        );
        assert_eq!(
            backend.credentials["deepseek"].secret.handle(),
            "vault://kv/deepseek"
        );
        let json = deployment.to_json().expect("json");
        assert!(json.contains("vault://kv/deepseek"));
    }

    #[test]
    fn after_target_must_exist() {
        let catalog = catalog();
        let mut config = DeploymentConfig::default();
        if let Some(svc) = config.services.get_mut("frontend") {
            svc.after.push("cache".into());
        }
        let err = compile(&catalog, &config, &SecretSet::new()).unwrap_err();
        assert!(err.to_string().contains("unknown service \"cache\""), "got: {err}");
    }

    #[test]
    fn relative_grant_is_invalid() {
        let catalog = catalog();
        let mut config = DeploymentConfig::default();
        if let Some(svc) = config.services.get_mut("backend") {
            svc.paths.push(PathGrant {
                path: PathBuf::from("models"),
                mode: AccessMode::ReadOnly,
            });
        }
        let err = compile(&catalog, &config, &SecretSet::new()).unwrap_err();
        assert!(err.to_string().contains("services.backend.paths[0]"), "got: {err}");
    }

    #[test]
    fn shared_path_takes_strongest_mode() {
        let catalog = catalog();
        let mut config = DeploymentConfig::default();
        for (name, mode) in [
            ("backend", AccessMode::ReadOnly),
            ("frontend", AccessMode::ReadWrite),
        ] {
            if let Some(svc) = config.services.get_mut(name) {
                svc.paths.push(PathGrant {
                    path: PathBuf::from("/srv/shared"),
                    mode,
                });
            }
        }
        let deployment = compile(&catalog, &config, &SecretSet::new()).expect("compile");
        let shared: Vec<&PathDirective> = deployment
            .paths
            .iter()
            .filter(|p| p.path == PathBuf::from("/srv/shared"))
            .collect();
        assert_eq!(shared.len(), 1);
        assert_eq!(shared[0].mode, AccessMode::ReadWrite);
        assert_eq!(shared[0].permissions, STATE_DIR_MODE);
    }

    #[test]
    fn connect_target_shadowing_provider_variable_is_invalid() {
        let catalog = catalog();
        let mut config = DeploymentConfig::default();
        let _ = config.services.insert(
            "llm".into(),
            ServiceConfig {
                package: Some("python".into()),
                host: "10.0.0.5".into(),
                port: 9000,
                ..ServiceConfig::default()
            },
        );
        if let Some(backend) = config.services.get_mut("backend") {
            backend.providers = vec![ProviderRole::Llm];
            backend.connect = vec!["llm".into()];
        }
        let err = compile(&catalog, &config, &SecretSet::new()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("LLM_HOST"), "got: {message}");
        assert!(message.contains("provider llm"), "got: {message}");
        assert!(message.contains("connect target \"llm\""), "got: {message}");
    }

    #[test]
    fn connect_targets_with_same_prefix_are_invalid() {
        let catalog = catalog();
        let mut config = DeploymentConfig::default();
        for (name, port) in [("rag-api", 9001), ("rag_api", 9002)] {
            let _ = config.services.insert(
                name.into(),
                ServiceConfig {
                    package: Some("python".into()),
                    port,
                    ..ServiceConfig::default()
                },
            );
        }
        if let Some(frontend) = config.services.get_mut("frontend") {
            frontend.connect = vec!["rag-api".into(), "rag_api".into()];
        }
        let err = compile(&catalog, &config, &SecretSet::new()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("services.frontend"), "got: {message}");
        assert!(message.contains("RAG_API_HOST"), "got: {message}");
    }

    #[test]
    fn connect_to_listenerless_service_is_invalid() {
        let catalog = catalog();
        let mut config = DeploymentConfig::default();
        if let Some(svc) = config.services.get_mut("backend") {
            svc.port = 0;
        }
        let err = compile(&catalog, &config, &SecretSet::new()).unwrap_err();
        assert!(err.to_string().contains("services.backend.port"), "got: {err}");
    }
}
