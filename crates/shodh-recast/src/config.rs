//! Pipeline configuration, loaded from JSON with per-section defaults.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::ConfigError;
use crate::llm::EngineMode;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub engine: EngineConfig,
    pub models: ModelCatalog,
    pub registry: RegistryConfig,
    pub relevance: RelevanceConfig,
    pub summary: SummaryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub mode: EngineMode,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelCatalog {
    /// Short names accepted as paraphrase model keys
    pub paraphrase_aliases: HashMap<String, String>,
    pub default_paraphrase: String,
    /// Model used for conversational input
    pub dialogue_summary: String,
    /// Model trained with `summarize {domain}:` prompts
    pub multidomain_summary: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub capacity: usize,
    /// Keys loaded when the pipeline is opened
    pub preload: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelevanceConfig {
    /// Minimum share of the original's meaningful words a candidate must keep
    pub min_overlap: f32,
    pub blacklist: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    /// Inputs longer than this many words are summarized chunk by chunk
    pub long_text_words: usize,
    pub chunk_words: usize,
}

impl ModelCatalog {
    /// Resolve a paraphrase model key: known aliases map to model ids, anything
    /// else is taken as a model id.
    pub fn paraphrase_model(&self, key: Option<&str>) -> String {
        let key = key
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .unwrap_or(&self.default_paraphrase);
        self.paraphrase_aliases
            .get(&key.to_lowercase())
            .cloned()
            .unwrap_or_else(|| key.to_string())
    }
}

impl PipelineConfig {
    /// Validate config values, returning errors for clearly broken configurations.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.registry.capacity == 0 {
            return Err(ConfigError::Invalid("registry.capacity must be > 0".into()));
        }
        if !(0.0..=1.0).contains(&self.relevance.min_overlap) {
            return Err(ConfigError::Invalid(
                "relevance.min_overlap must be in [0.0, 1.0]".into(),
            ));
        }
        if self.summary.chunk_words == 0 {
            return Err(ConfigError::Invalid("summary.chunk_words must be > 0".into()));
        }
        if self.summary.chunk_words > self.summary.long_text_words {
            return Err(ConfigError::Invalid(
                "summary.chunk_words must be <= long_text_words".into(),
            ));
        }
        if self.models.default_paraphrase.trim().is_empty() {
            return Err(ConfigError::Invalid("models.default_paraphrase is empty".into()));
        }
        if let EngineMode::Http { endpoint, .. } = &self.engine.mode {
            if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                return Err(ConfigError::Invalid(format!(
                    "engine endpoint '{}' is not an http(s) URL",
                    endpoint
                )));
            }
        }
        Ok(())
    }

    /// Load config from a JSON file, falling back to defaults for missing fields.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Invalid(format!("Failed to read config file: {}", e)))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| ConfigError::Invalid(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            models: ModelCatalog::default(),
            registry: RegistryConfig::default(),
            relevance: RelevanceConfig::default(),
            summary: SummaryConfig::default(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        let api_token = std::env::var("HUGGINGFACE_TOKEN")
            .ok()
            .or_else(|| std::env::var("HF_TOKEN").ok());
        let endpoint = std::env::var("RECAST_INFERENCE_URL")
            .unwrap_or_else(|_| "https://api-inference.huggingface.co".to_string());

        Self {
            mode: EngineMode::Http { endpoint, api_token },
            connect_timeout_secs: 15,
            request_timeout_secs: 120,
        }
    }
}

impl Default for ModelCatalog {
    fn default() -> Self {
        // Fine-tuned checkpoints live next to the cache dir when present.
        let local = dirs::data_local_dir().map(|d| d.join("shodh-recast").join("models"));
        let local_or = |dir: &str, fallback: &str| {
            local
                .as_ref()
                .map(|base| base.join(dir))
                .filter(|p| p.exists())
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| fallback.to_string())
        };

        let paraphrase_aliases = HashMap::from([
            ("t5".to_string(), "ramsrigouthamg/t5_paraphraser".to_string()),
            ("bart".to_string(), "eugenesiow/bart-paraphrase".to_string()),
        ]);

        Self {
            paraphrase_aliases,
            default_paraphrase: "t5".to_string(),
            dialogue_summary: local_or("byt5-finetuned", "philschmid/bart-large-cnn-samsum"),
            multidomain_summary: local_or("t5-multi-domain-finetuned", "t5-base"),
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            capacity: 3,
            preload: false,
        }
    }
}

impl Default for RelevanceConfig {
    fn default() -> Self {
        let blacklist = [
            "subscription",
            "subscribe",
            "premium",
            "monthly",
            "yearly",
            "member",
            "plan",
            "pricing",
            "copyright",
            "terms of service",
            "privacy policy",
            "login",
            "register",
            "click here",
            "download now",
            "free trial",
            "upgrade",
            "purchase",
        ];
        Self {
            min_overlap: 0.10,
            blacklist: blacklist.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            long_text_words: 500,
            chunk_words: 400,
        }
    }
}
