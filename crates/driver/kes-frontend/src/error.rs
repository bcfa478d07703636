//! Session-level error taxonomy

use kes_buffers::RegistryError;
use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors raised by session setup and the parse/check pipeline
#[derive(Debug, Error, Diagnostic)]
pub enum FrontendError {
    /// The configured target triple maps to no known platform
    #[error("unrecognized target triple `{triple}`")]
    #[diagnostic(code(frontend::unknown_target_triple))]
    UnknownTargetTriple {
        /// The offending triple
        triple: String,
    },

    /// A file input could not be opened or read
    #[error("failed to read {path}: {source}")]
    #[diagnostic(code(frontend::input_io_error))]
    Io {
        /// Path of the failing input
        path: PathBuf,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// An SDK path was configured but this build has no bridge
    #[error("foreign module support is not available in this build (SDK path `{sdk}` was configured)")]
    #[diagnostic(
        code(frontend::bridge_unavailable),
        help("rebuild with the `foreign-bridge` feature enabled")
    )]
    BridgeUnavailable {
        /// The configured SDK path
        sdk: PathBuf,
    },

    /// The bridge constructor exists but failed
    #[error("failed to create the foreign module bridge: {message}")]
    #[diagnostic(code(frontend::bridge_creation_failed))]
    BridgeCreation {
        /// Constructor failure message
        message: String,
    },

    /// One or more serialized module images failed to merge
    ///
    /// Collected after every input was attempted, not on first failure.
    #[error("failed to load serialized module images: {}", failed.join(", "))]
    #[diagnostic(code(frontend::serialized_load_failed))]
    SerializedLoad {
        /// Identifiers of the failing images
        failed: Vec<String>,
    },
}

impl FrontendError {
    /// The diagnostic code the error is reported under
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownTargetTriple { .. } => "frontend::unknown_target_triple",
            Self::Io { .. } => "frontend::input_io_error",
            Self::BridgeUnavailable { .. } => "frontend::bridge_unavailable",
            Self::BridgeCreation { .. } => "frontend::bridge_creation_failed",
            Self::SerializedLoad { .. } => "frontend::serialized_load_failed",
        }
    }
}

impl From<RegistryError> for FrontendError {
    fn from(error: RegistryError) -> Self {
        let RegistryError::Io { path, source } = error;
        Self::Io { path, source }
    }
}
