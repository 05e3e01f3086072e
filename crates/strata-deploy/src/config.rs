//! Deployment configuration record.
//!
//! Every option carries a default, so an empty document is a valid
//! configuration: a back-end on port 8001 using a local model server and a
//! front-end on port 3782 wired to it.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strata_common::constants::{
    DEFAULT_BACKEND_PORT, DEFAULT_CREDENTIALS_DIR, DEFAULT_DATA_DIR, DEFAULT_EMBEDDING_DIMENSION,
    DEFAULT_FRONTEND_PORT, DEFAULT_LOCAL_PROVIDER_URL, DEFAULT_SERVICE_USER,
};
use strata_common::error::{Result, StrataError};
use strata_common::types::LogLevel;

/// Root deployment configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeploymentConfig {
    /// Base directory for service state.
    pub data_dir: PathBuf,
    /// Directory under which the supervisor materializes credentials.
    pub credentials_dir: PathBuf,
    /// Log verbosity handed to every service.
    pub log_level: LogLevel,
    /// System user owning state directories.
    pub user: String,
    /// Chat model binding.
    pub llm: ProviderBinding,
    /// Embedding model binding.
    pub embedding: EmbeddingConfig,
    /// Optional web search subsystem.
    pub search: SearchConfig,
    /// Logical services keyed by name.
    pub services: BTreeMap<String, ServiceConfig>,
    /// Optional reverse-proxy front.
    pub proxy: ProxyConfig,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        let mut services = BTreeMap::new();
        let _ = services.insert(
            "backend".to_owned(),
            ServiceConfig {
                port: DEFAULT_BACKEND_PORT,
                providers: vec![ProviderRole::Llm, ProviderRole::Embedding],
                ..ServiceConfig::default()
            },
        );
        let _ = services.insert(
            "frontend".to_owned(),
            ServiceConfig {
                port: DEFAULT_FRONTEND_PORT,
                connect: vec!["backend".to_owned()],
                ..ServiceConfig::default()
            },
        );
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            credentials_dir: PathBuf::from(DEFAULT_CREDENTIALS_DIR),
            log_level: LogLevel::default(),
            user: DEFAULT_SERVICE_USER.to_owned(),
            llm: ProviderBinding::default(),
            embedding: EmbeddingConfig::default(),
            search: SearchConfig::default(),
            services,
            proxy: ProxyConfig::default(),
        }
    }
}

impl DeploymentConfig {
    /// Parses a configuration from YAML.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::Parse`] on malformed YAML or unknown keys.
    pub fn from_yaml_str(input: &str) -> Result<Self> {
        serde_yaml::from_str(input).map_err(|e| StrataError::parse("deployment configuration", e))
    }

    /// Reads a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        tracing::info!(path = %path.display(), "loading deployment configuration");
        let content = std::fs::read_to_string(path).map_err(|source| StrataError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    /// Names of enabled services, in sorted order.
    pub fn enabled_services(&self) -> impl Iterator<Item = (&str, &ServiceConfig)> {
        self.services
            .iter()
            .filter(|(_, svc)| svc.enable)
            .map(|(name, svc)| (name.as_str(), svc))
    }
}

/// One logical service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    /// Whether the service is deployed.
    pub enable: bool,
    /// Entrypoint component; defaults to the service name.
    pub package: Option<String>,
    /// Program inside the artifact; defaults to `bin/<service>`.
    pub program: Option<String>,
    /// Arguments passed to the program.
    pub args: Vec<String>,
    /// Listen address.
    pub host: String,
    /// Listen port; `0` means the service exposes no listener.
    pub port: u16,
    /// Services whose address this service consumes.
    pub connect: Vec<String>,
    /// Services that must start first without address wiring.
    pub after: Vec<String>,
    /// Provider bindings injected into the environment.
    pub providers: Vec<ProviderRole>,
    /// Operator-supplied variables; these win over derived ones.
    pub environment: BTreeMap<String, String>,
    /// Extra file-system grants.
    pub paths: Vec<PathGrant>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            enable: true,
            package: None,
            program: None,
            args: Vec::new(),
            host: "127.0.0.1".to_owned(),
            port: 0,
            connect: Vec::new(),
            after: Vec::new(),
            providers: Vec::new(),
            environment: BTreeMap::new(),
            paths: Vec::new(),
        }
    }
}

impl ServiceConfig {
    /// Effective entrypoint component name.
    #[must_use]
    pub fn package_or<'a>(&'a self, service: &'a str) -> &'a str {
        self.package.as_deref().unwrap_or(service)
    }

    /// Effective program path inside the artifact.
    #[must_use]
    pub fn program_or(&self, service: &str) -> String {
        self.program
            .clone()
            .unwrap_or_else(|| format!("bin/{service}"))
    }
}

/// A provider binding a service consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderRole {
    /// Chat model.
    Llm,
    /// Embedding model.
    Embedding,
    /// Web search.
    Search,
}

impl ProviderRole {
    /// Lowercase role identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Llm => "llm",
            Self::Embedding => "embedding",
            Self::Search => "search",
        }
    }
}

/// How a model provider is reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase", deny_unknown_fields)]
pub enum ProviderBinding {
    /// A server on the local network; no credential needed.
    Local {
        /// Model identifier.
        #[serde(default = "default_local_model")]
        model: String,
        /// Base URL of the server.
        #[serde(default = "default_local_url")]
        base_url: String,
    },
    /// A vendor API reached with a credential.
    Vendor {
        /// Which vendor.
        vendor: Vendor,
        /// Model identifier.
        model: String,
        /// Secret reference name; defaults to `<VENDOR>_API_KEY`.
        #[serde(default)]
        api_key: Option<String>,
        /// Base URL; defaults to the vendor's public endpoint.
        #[serde(default)]
        base_url: Option<String>,
    },
}

fn default_local_model() -> String {
    "llama3.2".to_owned()
}

fn default_local_url() -> String {
    DEFAULT_LOCAL_PROVIDER_URL.to_owned()
}

impl Default for ProviderBinding {
    fn default() -> Self {
        Self::Local {
            model: default_local_model(),
            base_url: default_local_url(),
        }
    }
}

/// Vendor APIs a binding can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vendor {
    /// `OpenAI`.
    OpenAi,
    /// Anthropic.
    Anthropic,
    /// Azure `OpenAI`; has no public default endpoint.
    Azure,
    /// `DeepSeek`.
    DeepSeek,
    /// Google Gemini, `OpenAI`-compatible endpoint.
    Gemini,
    /// `OpenRouter`.
    OpenRouter,
}

impl Vendor {
    /// Binding identifier exported to services.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Azure => "azure_openai",
            Self::DeepSeek => "deepseek",
            Self::Gemini => "gemini",
            Self::OpenRouter => "openrouter",
        }
    }

    /// Public endpoint, when the vendor has one.
    #[must_use]
    pub const fn default_base_url(self) -> Option<&'static str> {
        match self {
            Self::OpenAi => Some("https://api.openai.com/v1"),
            Self::Anthropic => Some("https://api.anthropic.com/v1"),
            Self::Azure => None,
            Self::DeepSeek => Some("https://api.deepseek.com/v1"),
            Self::Gemini => Some("https://generativelanguage.googleapis.com/v1beta/openai"),
            Self::OpenRouter => Some("https://openrouter.ai/api/v1"),
        }
    }

    /// Default secret reference name.
    #[must_use]
    pub fn default_secret(self) -> String {
        format!("{}_API_KEY", self.as_str().to_ascii_uppercase())
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Embedding model binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmbeddingConfig {
    /// How the model is reached.
    pub binding: ProviderBinding,
    /// Vector dimension.
    pub dimension: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            binding: ProviderBinding::Local {
                model: "nomic-embed-text".to_owned(),
                base_url: default_local_url(),
            },
            dimension: DEFAULT_EMBEDDING_DIMENSION,
        }
    }
}

/// Web search subsystem.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchConfig {
    /// Whether the subsystem is available to services.
    pub enable: bool,
    /// Search vendor.
    pub provider: SearchProvider,
    /// Secret reference name; defaults to `<PROVIDER>_API_KEY`.
    pub api_key: Option<String>,
}

/// Search vendors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchProvider {
    /// Perplexity.
    #[default]
    Perplexity,
    /// Kagi.
    Kagi,
    /// Baidu.
    Baidu,
}

impl SearchProvider {
    /// Lowercase provider identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Perplexity => "perplexity",
            Self::Kagi => "kagi",
            Self::Baidu => "baidu",
        }
    }

    /// Environment variable the provider's key is read from, and the default secret name.
    #[must_use]
    pub fn key_variable(self) -> String {
        format!("{}_API_KEY", self.as_str().to_ascii_uppercase())
    }
}

/// Reverse-proxy front.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProxyConfig {
    /// Whether routing rules are emitted.
    pub enable: bool,
    /// Listen address.
    pub host: String,
    /// Listen port.
    pub port: u16,
    /// Service receiving requests no prefix matches.
    pub default: String,
    /// Prefix routes, matched in declaration order.
    pub routes: Vec<RouteConfig>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            enable: false,
            host: "0.0.0.0".to_owned(),
            port: 80,
            default: "frontend".to_owned(),
            routes: Vec::new(),
        }
    }
}

/// One prefix route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteConfig {
    /// Path prefix, starting with `/`.
    pub prefix: String,
    /// Target service.
    pub service: String,
}

/// Access mode of a file-system path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AccessMode {
    /// Read-only.
    #[serde(rename = "ro")]
    ReadOnly,
    /// Read-write.
    #[serde(rename = "rw")]
    ReadWrite,
}

/// An extra path a service needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PathGrant {
    /// Absolute path.
    pub path: PathBuf,
    /// Access mode.
    #[serde(default = "default_access_mode")]
    pub mode: AccessMode,
}

const fn default_access_mode() -> AccessMode {
    AccessMode::ReadOnly
}
