//! Request, attempt and result types shared across the pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{ConfigError, PipelineError};
use crate::llm::DecodingConfig;

/// Kind of text transformation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Summary,
    Paraphrase,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Summary => "summary",
            Self::Paraphrase => "paraphrase",
        }
    }
}

impl FromStr for TaskKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "summary" | "summarize" => Ok(Self::Summary),
            "paraphrase" => Ok(Self::Paraphrase),
            other => Err(ConfigError::UnknownTask(other.to_string())),
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How far generated text may drift from the source wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreativityLevel {
    Conservative,
    #[default]
    Balanced,
    Creative,
}

impl CreativityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Conservative => "conservative",
            Self::Balanced => "balanced",
            Self::Creative => "creative",
        }
    }

    /// Parse a level name, falling back to `Balanced` for anything unknown.
    pub fn parse_or_default(name: &str) -> Self {
        name.parse().unwrap_or_else(|e: ConfigError| {
            tracing::warn!(error = %e, "Defaulting creativity level to balanced");
            Self::Balanced
        })
    }
}

impl FromStr for CreativityLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "conservative" => Ok(Self::Conservative),
            "balanced" => Ok(Self::Balanced),
            "creative" => Ok(Self::Creative),
            other => Err(ConfigError::UnknownLevel(other.to_string())),
        }
    }
}

impl fmt::Display for CreativityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Target summary length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LengthProfile {
    Short,
    #[default]
    Medium,
    Long,
}

impl FromStr for LengthProfile {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "short" => Ok(Self::Short),
            "medium" => Ok(Self::Medium),
            "long" => Ok(Self::Long),
            other => Err(ConfigError::UnknownLengthProfile(other.to_string())),
        }
    }
}

/// Content domain used to pick the summarization prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Finance,
    Health,
    News,
    Science,
    Technical,
    General,
}

impl Domain {
    /// Scored domains in declaration order; earlier entries win ties.
    pub const SCORED: [Domain; 5] = [
        Domain::Finance,
        Domain::Health,
        Domain::News,
        Domain::Science,
        Domain::Technical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Finance => "finance",
            Self::Health => "health",
            Self::News => "news",
            Self::Science => "science",
            Self::Technical => "technical",
            Self::General => "general",
        }
    }
}

impl FromStr for Domain {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "finance" => Ok(Self::Finance),
            "health" => Ok(Self::Health),
            "news" => Ok(Self::News),
            "science" => Ok(Self::Science),
            "technical" => Ok(Self::Technical),
            "general" => Ok(Self::General),
            other => Err(ConfigError::UnknownDomain(other.to_string())),
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single transformation request. Fields are fixed at construction.
#[derive(Debug, Clone, Serialize)]
pub struct TransformationRequest {
    text: String,
    task: TaskKind,
    level: CreativityLevel,
    domain_override: Option<Domain>,
    max_new_tokens: usize,
    candidate_count: usize,
    model_key: Option<String>,
    length_profile: LengthProfile,
}

impl TransformationRequest {
    pub const DEFAULT_MAX_NEW_TOKENS: usize = 50;

    pub fn new(text: impl Into<String>, task: TaskKind) -> Result<Self, PipelineError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(PipelineError::EmptyInput);
        }
        Ok(Self {
            text,
            task,
            level: CreativityLevel::default(),
            domain_override: None,
            max_new_tokens: Self::DEFAULT_MAX_NEW_TOKENS,
            candidate_count: 1,
            model_key: None,
            length_profile: LengthProfile::default(),
        })
    }

    pub fn with_level(mut self, level: CreativityLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_domain_override(mut self, domain: Option<Domain>) -> Self {
        self.domain_override = domain;
        self
    }

    pub fn with_max_new_tokens(mut self, max_new_tokens: usize) -> Self {
        self.max_new_tokens = max_new_tokens;
        self
    }

    pub fn with_candidate_count(mut self, count: usize) -> Result<Self, PipelineError> {
        if count == 0 {
            return Err(PipelineError::InvalidCandidateCount);
        }
        self.candidate_count = count;
        Ok(self)
    }

    pub fn with_model_key(mut self, key: impl Into<String>) -> Self {
        self.model_key = Some(key.into());
        self
    }

    pub fn with_length_profile(mut self, profile: LengthProfile) -> Self {
        self.length_profile = profile;
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn task(&self) -> TaskKind {
        self.task
    }

    pub fn level(&self) -> CreativityLevel {
        self.level
    }

    pub fn domain_override(&self) -> Option<Domain> {
        self.domain_override
    }

    pub fn max_new_tokens(&self) -> usize {
        self.max_new_tokens
    }

    pub fn candidate_count(&self) -> usize {
        self.candidate_count
    }

    pub fn model_key(&self) -> Option<&str> {
        self.model_key.as_deref()
    }

    pub fn length_profile(&self) -> LengthProfile {
        self.length_profile
    }
}

/// Position in the fallback chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Sampling,
    BeamRetry,
    RuleFallback,
}

impl Tier {
    pub fn index(&self) -> u8 {
        match self {
            Self::Sampling => 0,
            Self::BeamRetry => 1,
            Self::RuleFallback => 2,
        }
    }
}

/// What happened to one tier's attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Accepted { candidates: usize },
    NoAcceptableCandidate,
    AllIrrelevant,
    Failed { reason: String },
    /// Rule-based output, taken without checks.
    Unconditional,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationAttempt {
    pub tier: Tier,
    pub config: Option<DecodingConfig>,
    pub raw_candidates: Vec<String>,
    pub outcome: AttemptOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedCandidate {
    pub text: String,
    pub tier: Tier,
    /// Index of the raw candidate this came from within its tier.
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationVerdict {
    /// Index into the candidate slice that was validated.
    pub candidate: usize,
    pub relevant: bool,
    /// `None` when the original has no meaningful words to compare against.
    pub overlap_ratio: Option<f32>,
    pub blacklisted_phrase: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransformationResult {
    pub request_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub task: TaskKind,
    /// Best first; never empty.
    pub candidates: Vec<NormalizedCandidate>,
    pub tier: Tier,
    pub decoding: Option<DecodingConfig>,
    pub used_rule_fallback: bool,
    pub domain: Option<Domain>,
    pub attempts: Vec<GenerationAttempt>,
}

impl TransformationResult {
    /// Text of the top-ranked candidate.
    pub fn best(&self) -> &str {
        self.candidates
            .first()
            .map(|c| c.text.as_str())
            .unwrap_or_default()
    }

    pub fn texts(&self) -> Vec<String> {
        self.candidates.iter().map(|c| c.text.clone()).collect()
    }
}
