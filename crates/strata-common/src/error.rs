//! Error taxonomy for the Strata workspace.
//!
//! Resolution failures are [`CompositionError`]s, compiler input failures are
//! [`ConfigurationError`]s, and [`StrataError`] is the umbrella type returned
//! by every fallible library operation. None of these are retried: callers fix
//! their inputs and re-invoke.

use std::path::PathBuf;

use thiserror::Error;

/// Boxed error produced by a layer function or transform.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A failure while computing the fixed point of a catalog and its layers.
#[derive(Debug, Error)]
pub enum CompositionError {
    /// An input reference names a component absent from the final catalog.
    #[error(
        "dangling reference: input \"{input}\" of \"{referenced_by}\" points to \"{name}\", \
         which is not in the final catalog"
    )]
    DanglingReference {
        /// The missing component name.
        name: String,
        /// Component holding the reference.
        referenced_by: String,
        /// Input slot carrying the reference.
        input: String,
    },

    /// A layer reads a name that its origin view does not define.
    #[error(
        "dangling reference: layer {layer} (\"{layer_name}\") reads {view}.{name} while \
         resolving \"{referenced_by}\", which is not defined in that view"
    )]
    DanglingOrigin {
        /// The missing component name.
        name: String,
        /// View the layer read through (`previous`, `final`).
        view: &'static str,
        /// The name whose definition made the read.
        referenced_by: String,
        /// Zero-based index of the reading layer.
        layer: usize,
        /// Human-readable layer name.
        layer_name: String,
    },

    /// Evaluating a name re-entered itself before completing.
    #[error("cyclic definition of \"{name}\": {}", .path.join(" -> "))]
    Cycle {
        /// The name whose evaluation re-entered itself.
        name: String,
        /// Chain of names leading back to `name`, starting and ending with it.
        path: Vec<String>,
    },

    /// A layer function returned an error while resolving a name.
    #[error("layer {layer} (\"{layer_name}\") failed while resolving \"{name}\": {source}")]
    LayerFailed {
        /// The name being resolved.
        name: String,
        /// Zero-based index of the failing layer.
        layer: usize,
        /// Human-readable layer name.
        layer_name: String,
        /// Error raised by the layer.
        #[source]
        source: BoxError,
    },

    /// A lookup named a component that no view defines.
    #[error("component \"{name}\" is not defined in the {view} catalog")]
    UnknownComponent {
        /// The requested name.
        name: String,
        /// View the lookup went through (`previous`, `final`).
        view: &'static str,
    },
}

/// A failure while compiling service descriptions from configuration.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// A service references another service that is configured but disabled.
    #[error("service \"{service}\" references \"{target}\", which is disabled")]
    DisabledService {
        /// The referencing service.
        service: String,
        /// The disabled service.
        target: String,
    },

    /// A service references a name that is not configured at all.
    #[error("service \"{service}\" references unknown service \"{target}\"")]
    UnknownService {
        /// The referencing service.
        service: String,
        /// The missing service.
        target: String,
    },

    /// The entrypoint component of a service is not in the resolved catalog.
    #[error("service \"{service}\" uses package \"{package}\", which is not in the resolved catalog")]
    MissingEntrypoint {
        /// The service.
        service: String,
        /// The component name it requires.
        package: String,
    },

    /// A required secret reference was not supplied.
    #[error("service \"{service}\" requires secret \"{secret}\", which was not supplied")]
    MissingSecret {
        /// The service needing the credential.
        service: String,
        /// Name of the secret reference.
        secret: String,
    },

    /// A service consumes an optional subsystem that is switched off.
    #[error("service \"{service}\" uses the {subsystem} subsystem, which is disabled")]
    DisabledSubsystem {
        /// The service.
        service: String,
        /// Subsystem name.
        subsystem: &'static str,
    },

    /// Startup ordering between services contains a cycle.
    #[error("startup ordering cycle involving service \"{service}\"")]
    StartupCycle {
        /// A service on the cycle.
        service: String,
    },

    /// An option carries a value the compiler cannot use.
    #[error("invalid option {option}: {message}")]
    InvalidOption {
        /// Dotted option path.
        option: String,
        /// What is wrong with it.
        message: String,
    },
}

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum StrataError {
    /// Resolution of the catalog failed.
    #[error(transparent)]
    Composition(#[from] CompositionError),

    /// Compilation of the deployment failed.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// A list-typed field edit neither unions nor replaces.
    #[error(
        "ambiguous merge of field \"{field}\" on \"{component}\" in layer {layer}: \
         list edits must be tagged union or replace"
    )]
    MergeAmbiguity {
        /// Component being modified.
        component: String,
        /// The list-typed field.
        field: &'static str,
        /// Zero-based index of the offending layer.
        layer: usize,
    },

    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Input text could not be parsed.
    #[error("failed to parse {what}: {message}")]
    Parse {
        /// What was being parsed.
        what: String,
        /// Parser diagnostic.
        message: String,
    },

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

impl StrataError {
    /// Builds a [`StrataError::Parse`] from any displayable diagnostic.
    pub fn parse(what: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Parse {
            what: what.into(),
            message: message.to_string(),
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, StrataError>;
