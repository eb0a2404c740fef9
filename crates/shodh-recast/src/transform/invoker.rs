//! Generation invoker - builds the task prompt and makes one engine call.

use std::sync::Arc;
use std::time::Instant;

use crate::error::GenerationFailure;
use crate::llm::{DecodingConfig, ModelKey, ModelRegistry};

/// Collapse whitespace runs and make sure the text ends like a sentence.
pub fn preprocess(text: &str) -> String {
    let mut cleaned = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if !cleaned.is_empty() && !cleaned.ends_with(['.', '!', '?']) {
        cleaned.push('.');
    }
    cleaned
}

/// Builds prompts and runs one engine call per invocation. Never retries.
pub struct GenerationInvoker {
    registry: Arc<ModelRegistry>,
}

impl GenerationInvoker {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    /// Generate raw candidates for `prefix + cleaned_text`.
    ///
    /// `config.num_return_sequences()` is the requested candidate count; the
    /// engine may return fewer.
    pub async fn generate(
        &self,
        model: &ModelKey,
        prefix: &str,
        cleaned_text: &str,
        config: &DecodingConfig,
    ) -> Result<Vec<String>, GenerationFailure> {
        let prompt = format!("{}{}", prefix, cleaned_text);
        let engine = self.registry.engine(model).await?;

        let started = Instant::now();
        let raw = engine
            .generate(&prompt, config)
            .await
            .map_err(GenerationFailure::from_provider)?;

        tracing::debug!(
            model = %model,
            requested = config.num_return_sequences(),
            received = raw.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Generation finished"
        );
        Ok(raw.into_iter().map(|s| s.trim().to_string()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{GenerationProvider, ProviderFactory, ProviderInfo};
    use crate::types::TaskKind;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use parking_lot::Mutex;

    struct RecordingProvider {
        prompts: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl GenerationProvider for RecordingProvider {
        async fn generate(&self, prompt: &str, config: &DecodingConfig) -> Result<Vec<String>> {
            self.prompts.lock().push(prompt.to_string());
            if prompt.contains("explode") {
                return Err(anyhow!("device lost"));
            }
            Ok(vec![format!("  {}  ", prompt); config.num_return_sequences()])
        }

        fn info(&self) -> ProviderInfo {
            ProviderInfo {
                name: "recording".into(),
                model: "recording".into(),
                is_local: true,
            }
        }
    }

    struct RecordingFactory {
        prompts: Arc<Mutex<Vec<String>>>,
    }

    impl ProviderFactory for RecordingFactory {
        fn load(&self, _key: &ModelKey) -> Result<Arc<dyn GenerationProvider>> {
            Ok(Arc::new(RecordingProvider {
                prompts: Arc::clone(&self.prompts),
            }))
        }
    }

    fn invoker() -> (GenerationInvoker, Arc<Mutex<Vec<String>>>) {
        let prompts = Arc::new(Mutex::new(Vec::new()));
        let registry = ModelRegistry::with_factory(
            RecordingFactory {
                prompts: Arc::clone(&prompts),
            },
            2,
        );
        (GenerationInvoker::new(Arc::new(registry)), prompts)
    }

    #[test]
    fn test_preprocess_collapses_whitespace_and_terminates() {
        assert_eq!(preprocess("  The   fox\n\tjumps  "), "The fox jumps.");
        assert_eq!(preprocess("Is it raining?"), "Is it raining?");
        assert_eq!(preprocess("Stop!"), "Stop!");
        assert_eq!(preprocess("   "), "");
    }

    #[tokio::test]
    async fn test_prompt_is_prefix_plus_text() {
        let (invoker, prompts) = invoker();
        let key = ModelKey::new(TaskKind::Paraphrase, "t5");
        let config = DecodingConfig::builder().num_return_sequences(2).build().unwrap();

        let raw = invoker
            .generate(&key, "paraphrase: ", "The fox jumps.", &config)
            .await
            .unwrap();
        assert_eq!(raw, vec!["paraphrase: The fox jumps."; 2]);
        assert_eq!(prompts.lock().as_slice(), ["paraphrase: The fox jumps."]);
    }

    #[tokio::test]
    async fn test_engine_errors_become_generation_failures() {
        let (invoker, _) = invoker();
        let key = ModelKey::new(TaskKind::Paraphrase, "t5");
        let config = DecodingConfig::builder().build().unwrap();

        let err = invoker
            .generate(&key, "paraphrase: ", "Things explode.", &config)
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationFailure::Engine(msg) if msg.contains("device lost")));
    }
}
