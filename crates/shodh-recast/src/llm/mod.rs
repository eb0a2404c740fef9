//! LLM Module - seq2seq generation engines and their registry
//! Engines are reached through `GenerationProvider`; the registry owns their lifecycle.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub mod decoding;
pub mod hf_inference;
pub mod presets;
pub mod registry;

pub use decoding::{DecodingConfig, DecodingConfigBuilder};
pub use hf_inference::HfInferenceProvider;
pub use presets::LengthBudget;
pub use registry::{EngineHandle, ModelRegistry};

use crate::config::EngineConfig;
use crate::types::TaskKind;

/// Engine operation mode
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineMode {
    /// Hosted text2text-generation endpoint (Hugging Face inference API compatible)
    Http {
        endpoint: String,
        #[serde(default)]
        api_token: Option<String>,
    },
    /// No engine; every request is served by the rule-based tier
    Disabled,
}

/// Cache key for a loaded engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelKey {
    pub task: TaskKind,
    pub model_id: String,
}

impl ModelKey {
    pub fn new(task: TaskKind, model_id: impl Into<String>) -> Self {
        Self {
            task,
            model_id: model_id.into(),
        }
    }
}

impl fmt::Display for ModelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.task, self.model_id)
    }
}

/// Core trait for generation engines
///
/// Implementations need not be safe for concurrent `generate` calls; the
/// registry serializes access per engine.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Generate `config.num_return_sequences()` candidates for a prompt
    async fn generate(&self, prompt: &str, config: &DecodingConfig) -> Result<Vec<String>>;

    /// Get provider info
    fn info(&self) -> ProviderInfo;
}

/// Provider information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub name: String,
    pub model: String,
    pub is_local: bool,
}

/// Loads an engine for a key. Called at most once per key while it stays cached.
pub trait ProviderFactory: Send + Sync {
    fn load(&self, key: &ModelKey) -> Result<Arc<dyn GenerationProvider>>;
}

/// Factory selected by `EngineMode`.
pub struct DefaultProviderFactory {
    config: EngineConfig,
}

impl DefaultProviderFactory {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }
}

impl ProviderFactory for DefaultProviderFactory {
    fn load(&self, key: &ModelKey) -> Result<Arc<dyn GenerationProvider>> {
        match &self.config.mode {
            EngineMode::Http { endpoint, api_token } => {
                let provider = HfInferenceProvider::new(
                    endpoint,
                    api_token.clone(),
                    &key.model_id,
                    self.config.connect_timeout_secs,
                    self.config.request_timeout_secs,
                )?;
                Ok(Arc::new(provider))
            }
            EngineMode::Disabled => Err(anyhow!("generation engine is disabled")),
        }
    }
}
