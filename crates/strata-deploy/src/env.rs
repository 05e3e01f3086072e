//! Derived environment variables.
//!
//! Every service gets its listener, state directory, and log level. Provider
//! roles add model bindings; `connect` targets add `<TARGET>_HOST`,
//! `<TARGET>_PORT`, and `<TARGET>_URL`. Two sources deriving the same key is
//! an error. Operator-supplied variables are applied last and win.

use std::collections::BTreeMap;

use strata_common::error::{ConfigurationError, Result};

use crate::config::{ProviderBinding, SearchConfig};
use crate::service::Endpoint;

/// A variable whose value is the path of a materialized credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialVar {
    /// Variable name, e.g. `LLM_API_KEY_FILE`.
    pub variable: String,
    /// Secret reference name the credential comes from.
    pub secret: String,
}

/// Variables contributed by one provider role.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderEnv {
    /// Plain variables.
    pub vars: BTreeMap<String, String>,
    /// Credential the role needs, if any.
    pub credential: Option<CredentialVar>,
}

/// Derived variables of one service, each remembering what produced it.
///
/// Two different sources deriving the same key is a configuration error;
/// operator variables are applied afterwards and are exempt.
#[derive(Debug, Clone)]
pub struct DerivedEnv {
    service: String,
    vars: BTreeMap<String, String>,
    sources: BTreeMap<String, String>,
}

impl DerivedEnv {
    /// Starts an empty environment for `service`.
    #[must_use]
    pub fn new(service: &str) -> Self {
        Self {
            service: service.to_owned(),
            vars: BTreeMap::new(),
            sources: BTreeMap::new(),
        }
    }

    /// Adds one variable produced by `source`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidOption`] naming both sources when
    /// a different source already derived `key`.
    pub fn insert(&mut self, key: String, value: String, source: &str) -> Result<()> {
        if let Some(previous) = self.sources.get(&key) {
            if previous != source {
                return Err(ConfigurationError::InvalidOption {
                    option: format!("services.{}", self.service),
                    message: format!("{key} is derived from both {previous} and {source}"),
                }
                .into());
            }
        }
        let _ = self.sources.insert(key.clone(), source.to_owned());
        let _ = self.vars.insert(key, value);
        Ok(())
    }

    /// Adds every variable of `vars` as produced by `source`.
    ///
    /// # Errors
    ///
    /// See [`DerivedEnv::insert`].
    pub fn extend<I>(&mut self, vars: I, source: &str) -> Result<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            self.insert(key, value, source)?;
        }
        Ok(())
    }

    /// Applies operator variables, which win over derived ones.
    #[must_use]
    pub fn with_operator(mut self, operator: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        self.vars.extend(operator.clone());
        self.vars
    }
}

/// Turns a service name into an environment variable prefix.
///
/// `rag-api` becomes `RAG_API`.
#[must_use]
pub fn env_key(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Variables a consumer receives for one `connect` target.
#[must_use]
pub fn connection_env(target: &str, endpoint: &Endpoint) -> [(String, String); 3] {
    let key = env_key(target);
    [
        (format!("{key}_HOST"), endpoint.host.clone()),
        (format!("{key}_PORT"), endpoint.port.to_string()),
        (format!("{key}_URL"), endpoint.url()),
    ]
}

/// Variables for a model binding under `prefix` (`LLM`, `EMBEDDING`).
///
/// # Errors
///
/// Returns [`ConfigurationError::InvalidOption`] when a vendor has no public
/// endpoint and none was configured.
pub fn binding_env(prefix: &str, option: &str, binding: &ProviderBinding) -> Result<ProviderEnv> {
    let mut env = ProviderEnv::default();
    match binding {
        ProviderBinding::Local { model, base_url } => {
            let _ = env.vars.insert(format!("{prefix}_BINDING"), "local".to_owned());
            let _ = env.vars.insert(format!("{prefix}_MODEL"), model.clone());
            let _ = env.vars.insert(format!("{prefix}_HOST"), base_url.clone());
        }
        ProviderBinding::Vendor {
            vendor,
            model,
            api_key,
            base_url,
        } => {
            let host = base_url
                .as_deref()
                .or_else(|| vendor.default_base_url())
                .ok_or_else(|| ConfigurationError::InvalidOption {
                    option: format!("{option}.base_url"),
                    message: format!("vendor {vendor} has no default endpoint"),
                })?;
            let _ = env
                .vars
                .insert(format!("{prefix}_BINDING"), vendor.as_str().to_owned());
            let _ = env.vars.insert(format!("{prefix}_MODEL"), model.clone());
            let _ = env.vars.insert(format!("{prefix}_HOST"), host.to_owned());
            env.credential = Some(CredentialVar {
                variable: format!("{prefix}_API_KEY_FILE"),
                secret: api_key.clone().unwrap_or_else(|| vendor.default_secret()),
            });
        }
    }
    Ok(env)
}

/// Variables for the search subsystem.
#[must_use]
pub fn search_env(search: &SearchConfig) -> ProviderEnv {
    let key_variable = search.provider.key_variable();
    let mut env = ProviderEnv::default();
    let _ = env
        .vars
        .insert("SEARCH_PROVIDER".to_owned(), search.provider.as_str().to_owned());
    env.credential = Some(CredentialVar {
        variable: format!("{key_variable}_FILE"),
        secret: search.api_key.clone().unwrap_or(key_variable),
    });
    env
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SearchProvider, Vendor};

    #[test]
    fn env_key_normalizes() {
        assert_eq!(env_key("backend"), "BACKEND");
        assert_eq!(env_key("rag-api.v2"), "RAG_API_V2");
    }

    #[test]
    fn connection_env_has_host_port_url() {
        let ep = Endpoint {
            host: "127.0.0.1".into(),
            port: 8001,
        };
        let vars = connection_env("backend", &ep);
        assert_eq!(vars[0], ("BACKEND_HOST".into(), "127.0.0.1".into()));
        assert_eq!(vars[1], ("BACKEND_PORT".into(), "8001".into()));
        assert_eq!(vars[2], ("BACKEND_URL".into(), "http://127.0.0.1:8001".into()));
    }

    #[test]
    fn derived_collision_names_both_sources() {
        let mut env = DerivedEnv::new("backend");
        env.insert("LLM_HOST".into(), "http://127.0.0.1:11434/v1".into(), "provider llm")
            .expect("first");
        let err = env
            .insert("LLM_HOST".into(), "10.0.0.5".into(), "connect target \"llm\"")
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("services.backend"), "got: {message}");
        assert!(message.contains("provider llm"), "got: {message}");
        assert!(message.contains("connect target \"llm\""), "got: {message}");
    }

    #[test]
    fn same_source_may_repeat_and_operator_wins() {
        let mut env = DerivedEnv::new("frontend");
        let ep = Endpoint {
            host: "127.0.0.1".into(),
            port: 8001,
        };
        env.extend(connection_env("backend", &ep), "connect target \"backend\"")
            .expect("first");
        env.extend(connection_env("backend", &ep), "connect target \"backend\"")
            .expect("repeat");
        let mut operator = BTreeMap::new();
        let _ = operator.insert("BACKEND_URL".to_owned(), "https://api.internal".to_owned());
        let vars = env.with_operator(&operator);
        assert_eq!(vars["BACKEND_URL"], "https://api.internal");
        assert_eq!(vars["BACKEND_PORT"], "8001");
    }

    #[test]
    fn local_binding_needs_no_credential() {
        let env = binding_env("LLM", "llm", &ProviderBinding::default()).expect("env");
        assert_eq!(env.vars["LLM_BINDING"], "local");
        assert!(env.credential.is_none());
    }

    #[test]
    fn vendor_binding_requests_credential() {
        let binding = ProviderBinding::Vendor {
            vendor: Vendor::OpenAi,
            model: "gpt-4o".into(),
            api_key: None,
            base_url: None,
        };
        let env = binding_env("LLM", "llm", &binding).expect("env");
        assert_eq!(env.vars["LLM_HOST"], "https://api.openai.com/v1");
        let cred = env.credential.expect("credential");
        assert_eq!(cred.variable, "LLM_API_KEY_FILE");
        assert_eq!(cred.secret, "OPENAI_API_KEY");
    }

    #[test]
    fn azure_without_endpoint_is_invalid() {
        let binding = ProviderBinding::Vendor {
            vendor: Vendor::Azure,
            model: "gpt-4o".into(),
            api_key: Some("azure-key".into()),
            base_url: None,
        };
        let err = binding_env("EMBEDDING", "embedding.binding", &binding).unwrap_err();
        assert!(err.to_string().contains("embedding.binding.base_url"), "got: {err}");
    }

    #[test]
    fn search_env_uses_provider_key() {
        let search = SearchConfig {
            enable: true,
            provider: SearchProvider::Kagi,
            api_key: None,
        };
        let env = search_env(&search);
        assert_eq!(env.vars["SEARCH_PROVIDER"], "kagi");
        let cred = env.credential.expect("credential");
        assert_eq!(cred.variable, "KAGI_API_KEY_FILE");
        assert_eq!(cred.secret, "KAGI_API_KEY");
    }
}
