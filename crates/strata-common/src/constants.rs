//! System-wide constants and default values.

/// Default base directory for service state.
pub const DEFAULT_DATA_DIR: &str = "/var/lib/strata";

/// Default directory under which the supervisor materializes credentials.
pub const DEFAULT_CREDENTIALS_DIR: &str = "/run/credentials";

/// Default system user owning service state directories.
pub const DEFAULT_SERVICE_USER: &str = "strata";

/// Default project manifest consumed by the CLI.
pub const DEFAULT_PROJECT_FILE: &str = "strata.yaml";

/// Prefix marking an input reference as an external, pre-built dependency.
pub const EXTERNAL_PREFIX: &str = "external:";

/// Default listen port of the back-end service.
pub const DEFAULT_BACKEND_PORT: u16 = 8001;

/// Default listen port of the front-end service.
pub const DEFAULT_FRONTEND_PORT: u16 = 3782;

/// Default base URL of a local-network model server.
pub const DEFAULT_LOCAL_PROVIDER_URL: &str = "http://127.0.0.1:11434/v1";

/// Default embedding vector dimension.
pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 1536;

/// Permissions of the data directory root.
pub const DATA_ROOT_MODE: u32 = 0o755;

/// Permissions of read-write state directories.
pub const STATE_DIR_MODE: u32 = 0o750;

/// Permissions of read-only path grants.
pub const READ_ONLY_MODE: u32 = 0o550;

/// SHA-256 digest length in hex characters.
pub const SHA256_HEX_LENGTH: usize = 64;

/// Application name used in CLI output.
pub const APP_NAME: &str = "strata";

/// Binary name for the CLI.
pub const BIN_NAME: &str = "strata";
