//! Transform pipeline - public entry points
//!
//! Wires the classifier, preset table, registry, fallback chain and validator
//! together. Entry points fail only on invalid requests; every valid request
//! gets a non-empty result, from the rule tier if nothing else works.

use std::sync::Arc;
use std::time::Instant;

use crate::config::PipelineConfig;
use crate::error::{ConfigError, PipelineError};
use crate::llm::{presets, DecodingConfig, LengthBudget, ModelKey, ModelRegistry};
use crate::transform::{
    preprocess, ChainInput, DomainClassifier, FallbackChain, GenerationInvoker,
    RelevanceValidator, SummaryRoute,
};
use crate::types::{
    CreativityLevel, Domain, LengthProfile, NormalizedCandidate, TaskKind, TransformationRequest,
    TransformationResult,
};

const PARAPHRASE_PREFIX: &str = "paraphrase: ";

pub struct TransformPipeline {
    config: PipelineConfig,
    invoker: GenerationInvoker,
    validator: RelevanceValidator,
    classifier: DomainClassifier,
}

impl TransformPipeline {
    /// Validate `config` and open a registry for its engine.
    pub fn open(config: PipelineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let registry = ModelRegistry::open(&config.engine, config.registry.capacity);
        Self::with_registry(config, Arc::new(registry))
    }

    /// Build a pipeline over an existing registry, e.g. one shared by several pipelines.
    pub fn with_registry(config: PipelineConfig, registry: Arc<ModelRegistry>) -> Result<Self, ConfigError> {
        config.validate()?;
        let validator = RelevanceValidator::new(&config.relevance)?;
        Ok(Self {
            config,
            invoker: GenerationInvoker::new(registry),
            validator,
            classifier: DomainClassifier::new(),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        self.invoker.registry()
    }

    /// Load the default paraphrase and summary engines when `registry.preload`
    /// is set. Returns the number of engines that loaded.
    pub async fn warm_up(&self) -> usize {
        if !self.config.registry.preload {
            return 0;
        }
        let models = &self.config.models;
        let keys = [
            ModelKey::new(TaskKind::Paraphrase, models.paraphrase_model(None)),
            ModelKey::new(TaskKind::Summary, models.multidomain_summary.clone()),
            ModelKey::new(TaskKind::Summary, models.dialogue_summary.clone()),
        ];
        let mut loaded = 0;
        for (key, outcome) in self.registry().preload(&keys).await {
            match outcome {
                Ok(()) => loaded += 1,
                Err(e) => tracing::warn!(model = %key, error = %e, "Preload failed"),
            }
        }
        loaded
    }

    /// Paraphrase `text`. Unknown level names fall back to `balanced`.
    ///
    /// Returns the candidates, best first, and the decoding config that
    /// produced them (`None` when the rule-based tier answered).
    pub async fn paraphrase(
        &self,
        text: &str,
        level: &str,
        candidate_count: usize,
        max_new_tokens: usize,
        model_key: Option<&str>,
    ) -> Result<(Vec<String>, Option<DecodingConfig>), PipelineError> {
        let mut request = TransformationRequest::new(text, TaskKind::Paraphrase)?
            .with_level(CreativityLevel::parse_or_default(level))
            .with_candidate_count(candidate_count)?
            .with_max_new_tokens(max_new_tokens);
        if let Some(key) = model_key {
            request = request.with_model_key(key);
        }

        let result = self.transform(&request).await;
        Ok((result.texts(), result.decoding))
    }

    /// Summarize `text` and return the best summary.
    pub async fn summarize(
        &self,
        text: &str,
        domain_override: Option<&str>,
        length: LengthProfile,
    ) -> Result<String, PipelineError> {
        let result = self.summarize_detailed(text, domain_override, length).await?;
        Ok(result.best().to_string())
    }

    /// Like [`summarize`](Self::summarize) but returns the full result.
    ///
    /// An unknown domain override is logged and ignored.
    pub async fn summarize_detailed(
        &self,
        text: &str,
        domain_override: Option<&str>,
        length: LengthProfile,
    ) -> Result<TransformationResult, PipelineError> {
        let domain = domain_override.and_then(|name| match name.parse::<Domain>() {
            Ok(domain) => Some(domain),
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring domain override, classifying instead");
                None
            }
        });
        let request = TransformationRequest::new(text, TaskKind::Summary)?
            .with_domain_override(domain)
            .with_length_profile(length);
        Ok(self.transform(&request).await)
    }

    /// Run a request through the full fallback chain.
    pub async fn transform(&self, request: &TransformationRequest) -> TransformationResult {
        let started = Instant::now();
        let result = match request.task() {
            TaskKind::Paraphrase => self.run_paraphrase(request).await,
            TaskKind::Summary => self.run_summary(request).await,
        };
        tracing::info!(
            request_id = %result.request_id,
            task = %result.task,
            tier = result.tier.index(),
            candidates = result.candidates.len(),
            rule_fallback = result.used_rule_fallback,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Transformation complete"
        );
        result
    }

    async fn run_paraphrase(&self, request: &TransformationRequest) -> TransformationResult {
        let model = ModelKey::new(
            TaskKind::Paraphrase,
            self.config.models.paraphrase_model(request.model_key()),
        );
        let cleaned = preprocess(request.text());
        let sampling = presets::with_budget(
            &presets::resolve(TaskKind::Paraphrase, request.level()),
            request.max_new_tokens(),
            request.candidate_count(),
        );

        let input = ChainInput {
            original: request.text(),
            cleaned: &cleaned,
            task: TaskKind::Paraphrase,
            level: request.level(),
            model: &model,
            prefix: PARAPHRASE_PREFIX,
            domain: None,
            sampling,
            retry_beams: presets::RETRY_BEAMS,
        };
        FallbackChain::new(&self.invoker, &self.validator).run(&input).await
    }

    fn summary_route(&self, request: &TransformationRequest) -> SummaryRoute {
        let mut route = self.classifier.summary_route(
            request.text(),
            request.domain_override(),
            &self.config.models,
        );
        if let Some(key) = request.model_key() {
            route.model = ModelKey::new(TaskKind::Summary, key);
        }
        route
    }

    async fn run_summary(&self, request: &TransformationRequest) -> TransformationResult {
        let route = self.summary_route(request);
        let words = request.text().split_whitespace().count();

        if words <= self.config.summary.long_text_words {
            return self.summarize_passage(request, &route, request.text()).await;
        }

        let chunks = chunk_sentences(request.text(), self.config.summary.chunk_words);
        tracing::info!(words, chunks = chunks.len(), "Summarizing long text in chunks");

        let mut merged: Option<TransformationResult> = None;
        for chunk in &chunks {
            let part = self.summarize_passage(request, &route, chunk).await;
            merged = Some(match merged {
                Some(acc) => merge_chunk_result(acc, part),
                None => part,
            });
        }
        match merged {
            Some(result) => result,
            None => self.summarize_passage(request, &route, request.text()).await,
        }
    }

    async fn summarize_passage(
        &self,
        request: &TransformationRequest,
        route: &SummaryRoute,
        text: &str,
    ) -> TransformationResult {
        let budget = LengthBudget::for_profile(request.length_profile());
        let sampling = presets::with_budget(
            &presets::for_summary(request.level(), request.length_profile()),
            budget.max_new_tokens,
            request.candidate_count(),
        );
        let cleaned = preprocess(text);

        let input = ChainInput {
            original: text,
            cleaned: &cleaned,
            task: TaskKind::Summary,
            level: request.level(),
            model: &route.model,
            prefix: &route.prefix,
            domain: route.domain,
            sampling,
            retry_beams: budget.num_beams,
        };
        FallbackChain::new(&self.invoker, &self.validator).run(&input).await
    }
}

/// Split on sentence boundaries into chunks of at most `chunk_words` words.
/// A single sentence longer than that is cut at word boundaries.
pub fn chunk_sentences(text: &str, chunk_words: usize) -> Vec<String> {
    let chunk_words = chunk_words.max(1);
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for sentence in text.split_inclusive(['.', '!', '?']) {
        let words: Vec<&str> = sentence.split_whitespace().collect();
        if words.is_empty() {
            continue;
        }
        if current.len() + words.len() > chunk_words && !current.is_empty() {
            chunks.push(current.join(" "));
            current.clear();
        }
        for piece in words.chunks(chunk_words) {
            if current.len() + piece.len() > chunk_words {
                chunks.push(current.join(" "));
                current.clear();
            }
            current.extend_from_slice(piece);
        }
    }
    if !current.is_empty() {
        chunks.push(current.join(" "));
    }
    chunks
}

/// Append one chunk's summary to the running result. The merged result
/// reports the deepest tier any chunk needed.
fn merge_chunk_result(mut merged: TransformationResult, part: TransformationResult) -> TransformationResult {
    let text = format!("{} {}", merged.best(), part.best());
    if part.tier > merged.tier {
        merged.tier = part.tier;
        merged.decoding = part.decoding;
    }
    merged.used_rule_fallback |= part.used_rule_fallback;
    merged.attempts.extend(part.attempts);
    merged.candidates = vec![NormalizedCandidate {
        text,
        tier: merged.tier,
        index: 0,
    }];
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::llm::{EngineMode, GenerationProvider, ProviderFactory, ProviderInfo};
    use crate::types::Tier;
    use anyhow::Result;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    type Responder = dyn Fn(&str, &DecodingConfig) -> Result<Vec<String>> + Send + Sync;

    struct FnProvider {
        respond: Arc<Responder>,
        prompts: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl GenerationProvider for FnProvider {
        async fn generate(&self, prompt: &str, config: &DecodingConfig) -> Result<Vec<String>> {
            self.prompts.lock().push(prompt.to_string());
            (self.respond)(prompt, config)
        }

        fn info(&self) -> ProviderInfo {
            ProviderInfo {
                name: "fn".into(),
                model: "fn".into(),
                is_local: true,
            }
        }
    }

    struct FnFactory {
        respond: Arc<Responder>,
        prompts: Arc<Mutex<Vec<String>>>,
    }

    impl ProviderFactory for FnFactory {
        fn load(&self, _key: &ModelKey) -> Result<Arc<dyn GenerationProvider>> {
            Ok(Arc::new(FnProvider {
                respond: Arc::clone(&self.respond),
                prompts: Arc::clone(&self.prompts),
            }))
        }
    }

    fn pipeline_with(
        respond: impl Fn(&str, &DecodingConfig) -> Result<Vec<String>> + Send + Sync + 'static,
    ) -> (TransformPipeline, Arc<Mutex<Vec<String>>>) {
        let prompts = Arc::new(Mutex::new(Vec::new()));
        let factory = FnFactory {
            respond: Arc::new(respond),
            prompts: Arc::clone(&prompts),
        };
        let registry = Arc::new(ModelRegistry::with_factory(factory, 3));
        let pipeline = TransformPipeline::with_registry(PipelineConfig::default(), registry).unwrap();
        (pipeline, prompts)
    }

    /// Returns the prompt itself for every requested sequence.
    fn echo_pipeline() -> (TransformPipeline, Arc<Mutex<Vec<String>>>) {
        pipeline_with(|prompt, config| Ok(vec![prompt.to_string(); config.num_return_sequences()]))
    }

    fn disabled_pipeline() -> TransformPipeline {
        let config = PipelineConfig {
            engine: EngineConfig {
                mode: EngineMode::Disabled,
                ..EngineConfig::default()
            },
            ..PipelineConfig::default()
        };
        TransformPipeline::open(config).unwrap()
    }

    const FOX: &str = "The quick brown fox jumps over the lazy dog.";
    const FINANCE: &str = "The bank reported record profit as trading revenue rose and the stock \
                           market rallied, while loan demand and credit growth beat the budget.";

    #[tokio::test]
    async fn test_conservative_fox_with_failing_engine() {
        let pipeline = disabled_pipeline();
        let (candidates, config) = pipeline
            .paraphrase(FOX, "conservative", 3, 50, None)
            .await
            .unwrap();
        assert_eq!(candidates, vec!["The fast tan canine leaps above the sleepy hound."]);
        assert!(config.is_none());
    }

    #[tokio::test]
    async fn test_echo_engine_escalates_through_all_tiers() {
        let (pipeline, prompts) = echo_pipeline();
        let request = TransformationRequest::new(FOX, TaskKind::Paraphrase)
            .unwrap()
            .with_level(CreativityLevel::Creative)
            .with_candidate_count(3)
            .unwrap();
        let result = pipeline.transform(&request).await;

        assert!(result.used_rule_fallback);
        assert_eq!(result.tier, Tier::RuleFallback);
        assert_eq!(result.attempts.len(), 3);
        assert_eq!(result.attempts[0].raw_candidates.len(), 3);
        assert_eq!(result.attempts[1].raw_candidates.len(), 1);
        assert_eq!(
            result.best(),
            "Notably, the rapid amber animal hops beyond the lethargic puppy."
        );
        let prompts = prompts.lock();
        assert_eq!(prompts.len(), 2);
        assert!(prompts.iter().all(|p| p == &format!("paraphrase: {}", FOX)));
    }

    #[tokio::test]
    async fn test_entry_points_are_total_for_non_empty_input() {
        let pipeline = disabled_pipeline();
        let inputs = ["x", "Hi.", "???", "one two three four five six seven", FINANCE];
        for text in inputs {
            let (candidates, _) = pipeline.paraphrase(text, "wild", 1, 10, None).await.unwrap();
            assert!(!candidates.is_empty(), "no paraphrase for {text:?}");
            assert!(!candidates[0].is_empty());

            let summary = pipeline.summarize(text, None, LengthProfile::Short).await.unwrap();
            assert!(!summary.is_empty(), "no summary for {text:?}");
        }
    }

    #[tokio::test]
    async fn test_invalid_requests_are_rejected() {
        let pipeline = disabled_pipeline();
        assert_eq!(
            pipeline.paraphrase("  ", "balanced", 1, 50, None).await.unwrap_err(),
            PipelineError::EmptyInput
        );
        assert_eq!(
            pipeline.paraphrase(FOX, "balanced", 0, 50, None).await.unwrap_err(),
            PipelineError::InvalidCandidateCount
        );
        assert_eq!(
            pipeline.summarize("", None, LengthProfile::Medium).await.unwrap_err(),
            PipelineError::EmptyInput
        );
    }

    #[tokio::test]
    async fn test_subscribe_candidate_is_replaced() {
        let (pipeline, _) = pipeline_with(|_, config| {
            if config.do_sample() {
                Ok(vec!["The quick brown fox jumps, subscribe now for premium access.".into()])
            } else {
                Ok(vec!["A quick brown fox leaps over a sleepy dog.".into()])
            }
        });
        let (candidates, config) = pipeline.paraphrase(FOX, "balanced", 1, 50, Some("bart")).await.unwrap();
        assert_eq!(candidates, vec!["A quick brown fox leaps over a sleepy dog."]);
        assert!(!config.unwrap().do_sample());
    }

    #[tokio::test]
    async fn test_finance_text_uses_finance_prompt() {
        let (pipeline, prompts) = pipeline_with(|_, _| {
            Ok(vec!["summarize finance: the bank posted record profit on trading revenue".into()])
        });
        let result = pipeline
            .summarize_detailed(FINANCE, None, LengthProfile::Medium)
            .await
            .unwrap();

        assert_eq!(result.domain, Some(Domain::Finance));
        assert_eq!(result.tier, Tier::Sampling);
        assert_eq!(result.best(), "The bank posted record profit on trading revenue.");
        assert!(prompts.lock()[0].starts_with("summarize finance: The bank reported"));
        assert_eq!(result.decoding.unwrap().max_new_tokens(), 70);
    }

    #[tokio::test]
    async fn test_unknown_domain_override_is_ignored() {
        let (pipeline, prompts) = echo_pipeline();
        let result = pipeline
            .summarize_detailed(FINANCE, Some("astrology"), LengthProfile::Short)
            .await
            .unwrap();
        assert_eq!(result.domain, Some(Domain::Finance));
        assert!(prompts.lock()[0].starts_with("summarize finance: "));

        let result = pipeline
            .summarize_detailed(FINANCE, Some("News"), LengthProfile::Short)
            .await
            .unwrap();
        assert_eq!(result.domain, Some(Domain::News));
    }

    #[tokio::test]
    async fn test_long_text_is_summarized_per_chunk() {
        let (pipeline, prompts) = echo_pipeline();
        let sentence = "The research team measured river levels across the valley every day. ";
        let text = sentence.repeat(60);

        let result = pipeline
            .summarize_detailed(&text, None, LengthProfile::Short)
            .await
            .unwrap();
        let chunks = chunk_sentences(&text, pipeline.config().summary.chunk_words);
        assert_eq!(chunks.len(), 2);
        assert_eq!(result.attempts.len(), 3 * chunks.len());
        assert_eq!(prompts.lock().len(), 2 * chunks.len());
        assert!(result.used_rule_fallback);
        assert_eq!(result.candidates.len(), 1);
    }

    #[test]
    fn test_chunk_sentences_respects_word_limit() {
        let text = "One two three. Four five six seven. Eight nine.";
        assert_eq!(
            chunk_sentences(text, 4),
            vec!["One two three.", "Four five six seven.", "Eight nine."]
        );
        assert_eq!(chunk_sentences(text, 100), vec![text]);
        assert_eq!(
            chunk_sentences("a b c d e f g", 3),
            vec!["a b c", "d e f", "g"]
        );
    }

    #[test]
    fn test_shared_registry_still_validates_config() {
        let registry = Arc::new(ModelRegistry::open(&PipelineConfig::default().engine, 2));

        let mut config = PipelineConfig::default();
        config.relevance.min_overlap = 5.0;
        assert!(TransformPipeline::with_registry(config, Arc::clone(&registry)).is_err());

        let mut config = PipelineConfig::default();
        config.summary.chunk_words = config.summary.long_text_words + 1;
        assert!(TransformPipeline::with_registry(config, Arc::clone(&registry)).is_err());

        assert!(TransformPipeline::with_registry(PipelineConfig::default(), registry).is_ok());
    }

    #[tokio::test]
    async fn test_warm_up_respects_preload_flag() {
        let (pipeline, _) = echo_pipeline();
        assert_eq!(pipeline.warm_up().await, 0);

        let mut config = PipelineConfig::default();
        config.registry.preload = true;
        let registry = Arc::clone(pipeline.registry());
        let pipeline = TransformPipeline::with_registry(config, registry).unwrap();
        assert_eq!(pipeline.warm_up().await, 3);
        assert_eq!(pipeline.registry().loaded_keys().len(), 3);
    }
}
