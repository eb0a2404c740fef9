pub mod collaborators;
pub mod config;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod transform;
pub mod types;

// Re-export primary types for convenience
pub use config::PipelineConfig;
pub use error::{ConfigError, GenerationFailure, PipelineError};
pub use pipeline::TransformPipeline;
pub use types::{
    AttemptOutcome, CreativityLevel, Domain, GenerationAttempt, LengthProfile,
    NormalizedCandidate, TaskKind, Tier, TransformationRequest, TransformationResult,
    ValidationVerdict,
};

// Re-export LLM types
pub use llm::{
    DecodingConfig, DecodingConfigBuilder, EngineHandle, EngineMode, GenerationProvider, ModelKey,
    ModelRegistry, ProviderFactory, ProviderInfo,
};

// Re-export common types
pub use anyhow::{Error, Result};
pub use uuid::Uuid;
