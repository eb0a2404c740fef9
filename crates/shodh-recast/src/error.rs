//! Error taxonomy for the generation pipeline.
//!
//! Only [`PipelineError`] ever reaches a caller of the public entry points.
//! Generation failures are absorbed by the fallback chain and configuration
//! problems are defaulted where they are detected.

use thiserror::Error;

/// Failure of a single engine invocation.
#[derive(Debug, Error)]
pub enum GenerationFailure {
    /// The engine ran but returned an error.
    #[error("generation engine error: {0}")]
    Engine(String),

    /// The engine did not answer within its client timeout.
    #[error("generation timed out after {0}s")]
    Timeout(u64),

    /// No engine could be loaded or reached for the requested model.
    #[error("generation engine unavailable: {0}")]
    Unavailable(String),
}

impl GenerationFailure {
    /// Map a provider error into the taxonomy.
    ///
    /// Providers report through `anyhow`; a typed `GenerationFailure` inside the
    /// chain is kept as-is, anything else becomes `Engine`.
    pub fn from_provider(err: anyhow::Error) -> Self {
        match err.downcast::<GenerationFailure>() {
            Ok(failure) => failure,
            Err(other) => GenerationFailure::Engine(format!("{:#}", other)),
        }
    }
}

/// Invalid names or parameter values.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("unknown creativity level '{0}'")]
    UnknownLevel(String),

    #[error("unknown task kind '{0}'")]
    UnknownTask(String),

    #[error("unknown domain '{0}'")]
    UnknownDomain(String),

    #[error("unknown length profile '{0}'")]
    UnknownLengthProfile(String),

    #[error("invalid decoding parameter {field}: {reason}")]
    InvalidDecoding { field: &'static str, reason: String },

    #[error("invalid pipeline configuration: {0}")]
    Invalid(String),
}

/// Errors surfaced by the public entry points.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PipelineError {
    #[error("input text is empty")]
    EmptyInput,

    #[error("candidate count must be at least 1")]
    InvalidCandidateCount,
}
