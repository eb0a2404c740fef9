//! Fallback Chain
//!
//! Runs the tiers of a single request in order:
//!
//! 1. `Sampling`: the level preset, several candidates
//! 2. `BeamRetry`: deterministic beam search, one candidate
//! 3. `RuleFallback`: lexicon or extractive transform, no engine call
//!
//! Each model tier ends in an [`AttemptOutcome`]; only `Accepted` stops the
//! chain early. The rule tier always yields exactly one candidate, so the chain
//! never returns an empty result.

use crate::llm::{presets, DecodingConfig, ModelKey};
use crate::types::{
    AttemptOutcome, CreativityLevel, Domain, GenerationAttempt, NormalizedCandidate, TaskKind,
    Tier, TransformationResult,
};

use super::assembler::{self, ResultMeta};
use super::fallback;
use super::invoker::GenerationInvoker;
use super::normalizer::{OutputNormalizer, SentenceMood};
use super::relevance::RelevanceValidator;

/// Fewest words a model candidate may have.
const MIN_CANDIDATE_WORDS: usize = 3;

/// Everything the chain needs to know about one request.
#[derive(Debug, Clone)]
pub struct ChainInput<'a> {
    /// Text as the caller gave it.
    pub original: &'a str,
    /// Output of `invoker::preprocess`.
    pub cleaned: &'a str,
    pub task: TaskKind,
    pub level: CreativityLevel,
    pub model: &'a ModelKey,
    pub prefix: &'a str,
    pub domain: Option<Domain>,
    /// Tier-0 decoding config.
    pub sampling: DecodingConfig,
    /// Beam width for tier 1.
    pub retry_beams: usize,
}

enum ChainState {
    Sampling(DecodingConfig),
    BeamRetry(DecodingConfig),
    RuleFallback,
}

impl ChainState {
    fn tier(&self) -> Tier {
        match self {
            Self::Sampling(_) => Tier::Sampling,
            Self::BeamRetry(_) => Tier::BeamRetry,
            Self::RuleFallback => Tier::RuleFallback,
        }
    }

    /// Transition taken when a tier produced nothing acceptable.
    fn advance(self, input: &ChainInput<'_>) -> Self {
        match self {
            Self::Sampling(config) => match presets::beam_retry(&config, input.retry_beams) {
                Ok(retry) => Self::BeamRetry(retry),
                Err(e) => {
                    tracing::warn!(error = %e, "Beam retry config rejected, skipping to rules");
                    Self::RuleFallback
                }
            },
            Self::BeamRetry(_) | Self::RuleFallback => Self::RuleFallback,
        }
    }
}

/// Comparison key for "same text as the input": case, whitespace runs and
/// trailing sentence punctuation are ignored.
fn identity_key(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end_matches(['.', '!', '?'])
        .trim_end()
        .to_lowercase()
}

/// Acceptance test applied to each normalized model candidate.
pub fn is_acceptable(candidate: &str, original: &str) -> bool {
    if candidate.split_whitespace().count() < MIN_CANDIDATE_WORDS {
        return false;
    }
    if identity_key(candidate) == identity_key(original) {
        return false;
    }
    // Engines sometimes turn statements into questions.
    let is_question = candidate.trim_end().ends_with('?');
    !(is_question && SentenceMood::of(original) != SentenceMood::Question)
}

pub struct FallbackChain<'a> {
    invoker: &'a GenerationInvoker,
    validator: &'a RelevanceValidator,
}

impl<'a> FallbackChain<'a> {
    pub fn new(invoker: &'a GenerationInvoker, validator: &'a RelevanceValidator) -> Self {
        Self { invoker, validator }
    }

    pub async fn run(&self, input: &ChainInput<'_>) -> TransformationResult {
        let mut attempts = Vec::with_capacity(3);
        let mut state = ChainState::Sampling(input.sampling.clone());

        loop {
            let tier = state.tier();
            let config = match &state {
                ChainState::Sampling(config) | ChainState::BeamRetry(config) => config.clone(),
                ChainState::RuleFallback => {
                    let result = self.rule_tier(input, &mut attempts);
                    return finish(result, attempts);
                }
            };

            tracing::info!(tier = tier.index(), task = %input.task, model = %input.model, "Running generation tier");
            let (attempt, accepted) = self.model_tier(tier, config, input).await;
            let outcome = attempt.outcome.clone();
            attempts.push(attempt);

            if let Some(result) = accepted {
                return finish(result, attempts);
            }
            tracing::info!(tier = tier.index(), outcome = ?outcome, "Tier rejected, escalating");
            state = state.advance(input);
        }
    }

    async fn model_tier(
        &self,
        tier: Tier,
        config: DecodingConfig,
        input: &ChainInput<'_>,
    ) -> (GenerationAttempt, Option<TransformationResult>) {
        let raw = match self
            .invoker
            .generate(input.model, input.prefix, input.cleaned, &config)
            .await
        {
            Ok(raw) => raw,
            Err(failure) => {
                tracing::warn!(tier = tier.index(), error = %failure, "Generation failed");
                let attempt = GenerationAttempt {
                    tier,
                    config: Some(config),
                    raw_candidates: Vec::new(),
                    outcome: AttemptOutcome::Failed {
                        reason: failure.to_string(),
                    },
                };
                return (attempt, None);
            }
        };

        let normalizer = OutputNormalizer::new(input.prefix, input.original);
        let candidates: Vec<NormalizedCandidate> = raw
            .iter()
            .enumerate()
            .filter_map(|(index, text)| {
                let text = normalizer.normalize(text);
                if is_acceptable(&text, input.original) {
                    Some(NormalizedCandidate { text, tier, index })
                } else {
                    tracing::debug!(tier = tier.index(), index, candidate = %text, "Candidate rejected");
                    None
                }
            })
            .collect();

        let mut attempt = GenerationAttempt {
            tier,
            config: Some(config.clone()),
            raw_candidates: raw,
            outcome: AttemptOutcome::NoAcceptableCandidate,
        };
        if candidates.is_empty() {
            return (attempt, None);
        }

        let verdicts = self.validator.validate_all(input.original, &candidates);
        let meta = ResultMeta {
            task: input.task,
            tier,
            decoding: Some(config),
            domain: input.domain,
        };
        match assembler::assemble(candidates, &verdicts, meta) {
            Some(result) => {
                attempt.outcome = AttemptOutcome::Accepted {
                    candidates: result.candidates.len(),
                };
                (attempt, Some(result))
            }
            None => {
                attempt.outcome = AttemptOutcome::AllIrrelevant;
                (attempt, None)
            }
        }
    }

    fn rule_tier(
        &self,
        input: &ChainInput<'_>,
        attempts: &mut Vec<GenerationAttempt>,
    ) -> TransformationResult {
        let text = match input.task {
            TaskKind::Paraphrase => fallback::rule_paraphrase(input.cleaned, input.level),
            TaskKind::Summary => fallback::extractive_summary(input.cleaned),
        };
        tracing::info!(task = %input.task, level = %input.level, "Using rule-based fallback");

        attempts.push(GenerationAttempt {
            tier: Tier::RuleFallback,
            config: None,
            raw_candidates: vec![text.clone()],
            outcome: AttemptOutcome::Unconditional,
        });
        assembler::unconditional(
            text,
            ResultMeta {
                task: input.task,
                tier: Tier::RuleFallback,
                decoding: None,
                domain: input.domain,
            },
        )
    }
}

fn finish(mut result: TransformationResult, attempts: Vec<GenerationAttempt>) -> TransformationResult {
    result.attempts = attempts;
    result
}
