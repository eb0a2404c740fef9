//! Level preset table.
//!
//! Maps (task, creativity level) to a fixed decoding bundle. Conservative rows
//! keep temperature low and repetition penalty high so output stays close to
//! the source; creative rows widen the nucleus and raise temperature.

use serde::Serialize;

use super::decoding::DecodingConfig;
use crate::error::ConfigError;
use crate::types::{CreativityLevel, LengthProfile, TaskKind};

const PARAPHRASE_CONSERVATIVE: DecodingConfig = DecodingConfig::preset(0.8, 0.85, 1.3, 2);
const PARAPHRASE_BALANCED: DecodingConfig = DecodingConfig::preset(1.0, 0.92, 1.15, 2);
const PARAPHRASE_CREATIVE: DecodingConfig = DecodingConfig::preset(1.2, 0.95, 1.0, 2);

const SUMMARY_CONSERVATIVE: DecodingConfig = DecodingConfig::preset(0.5, 0.80, 1.3, 2);
const SUMMARY_BALANCED: DecodingConfig = DecodingConfig::preset(0.7, 0.90, 1.2, 2);
const SUMMARY_CREATIVE: DecodingConfig = DecodingConfig::preset(0.9, 0.95, 1.1, 2);

/// Beam width used by the deterministic retry for paraphrases.
pub const RETRY_BEAMS: usize = 5;
const RETRY_REPETITION_PENALTY: f32 = 1.2;
const RETRY_NO_REPEAT_NGRAM: usize = 3;

/// Resolve the preset for a task and level.
pub fn resolve(task: TaskKind, level: CreativityLevel) -> DecodingConfig {
    match (task, level) {
        (TaskKind::Paraphrase, CreativityLevel::Conservative) => PARAPHRASE_CONSERVATIVE,
        (TaskKind::Paraphrase, CreativityLevel::Balanced) => PARAPHRASE_BALANCED,
        (TaskKind::Paraphrase, CreativityLevel::Creative) => PARAPHRASE_CREATIVE,
        (TaskKind::Summary, CreativityLevel::Conservative) => SUMMARY_CONSERVATIVE,
        (TaskKind::Summary, CreativityLevel::Balanced) => SUMMARY_BALANCED,
        (TaskKind::Summary, CreativityLevel::Creative) => SUMMARY_CREATIVE,
    }
}

/// Resolve by level name; unknown names fall back to `balanced`.
pub fn resolve_named(task: TaskKind, level: &str) -> DecodingConfig {
    resolve(task, CreativityLevel::parse_or_default(level))
}

/// Apply the caller's token budget and candidate count to a preset.
///
/// Zero values are clamped to one. If the result would still be invalid the
/// preset is returned unchanged.
pub fn with_budget(base: &DecodingConfig, max_new_tokens: usize, candidates: usize) -> DecodingConfig {
    let max_new_tokens = max_new_tokens.max(1);
    base.to_builder()
        .max_new_tokens(max_new_tokens)
        .min_new_tokens(base.min_new_tokens().min(max_new_tokens))
        .num_return_sequences(candidates.max(1))
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Keeping preset budget");
            base.clone()
        })
}

/// Length constraints for a summary profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LengthBudget {
    pub max_new_tokens: usize,
    pub min_new_tokens: usize,
    pub length_penalty: f32,
    pub num_beams: usize,
}

impl LengthBudget {
    pub fn for_profile(profile: LengthProfile) -> Self {
        match profile {
            LengthProfile::Short => Self {
                max_new_tokens: 45,
                min_new_tokens: 10,
                length_penalty: 1.0,
                num_beams: 3,
            },
            LengthProfile::Medium => Self {
                max_new_tokens: 70,
                min_new_tokens: 40,
                length_penalty: 1.5,
                num_beams: 5,
            },
            LengthProfile::Long => Self {
                max_new_tokens: 100,
                min_new_tokens: 80,
                length_penalty: 2.0,
                num_beams: 6,
            },
        }
    }
}

/// Summary preset for a level with the profile's length constraints applied.
pub fn for_summary(level: CreativityLevel, profile: LengthProfile) -> DecodingConfig {
    let base = resolve(TaskKind::Summary, level);
    let budget = LengthBudget::for_profile(profile);
    base.to_builder()
        .max_new_tokens(budget.max_new_tokens)
        .min_new_tokens(budget.min_new_tokens)
        .length_penalty(budget.length_penalty)
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Length profile rejected, using bare summary preset");
            base
        })
}

/// Deterministic tier-1 config derived from the tier-0 one: beam search,
/// moderate repetition penalty, a single candidate, same length limits.
pub fn beam_retry(base: &DecodingConfig, num_beams: usize) -> Result<DecodingConfig, ConfigError> {
    base.to_builder()
        .beam_search(num_beams)
        .repetition_penalty(RETRY_REPETITION_PENALTY)
        .no_repeat_ngram_size(RETRY_NO_REPEAT_NGRAM)
        .num_return_sequences(1)
        .build()
}
