//! Domain Classification
//!
//! Keyword scoring that picks the summarization prompt for a passage, plus the
//! dialogue check that routes conversational text to its own model.

use regex::Regex;
use std::sync::LazyLock;

use crate::config::ModelCatalog;
use crate::llm::ModelKey;
use crate::types::{Domain, TaskKind};

const FINANCE_KEYWORDS: &[&str] = &[
    "bank",
    "money",
    "investment",
    "stock",
    "market",
    "financial",
    "economy",
    "trading",
    "profit",
    "revenue",
    "budget",
    "loan",
    "credit",
    "insurance",
    "mortgage",
];

const HEALTH_KEYWORDS: &[&str] = &[
    "health",
    "medical",
    "doctor",
    "patient",
    "medicine",
    "treatment",
    "disease",
    "symptom",
    "therapy",
    "hospital",
    "clinic",
    "diagnosis",
    "pharmaceutical",
    "wellness",
];

const NEWS_KEYWORDS: &[&str] = &[
    "breaking",
    "report",
    "announcement",
    "statement",
    "official",
    "government",
    "politics",
    "election",
    "policy",
    "minister",
    "president",
    "congress",
    "parliament",
];

const SCIENCE_KEYWORDS: &[&str] = &[
    "research",
    "study",
    "experiment",
    "scientific",
    "discovery",
    "technology",
    "innovation",
    "laboratory",
    "analysis",
    "data",
    "methodology",
    "hypothesis",
];

const TECHNICAL_KEYWORDS: &[&str] = &[
    "software",
    "programming",
    "algorithm",
    "code",
    "development",
    "system",
    "application",
    "database",
    "server",
    "api",
    "framework",
    "technical",
    "engineering",
];

static DIALOGUE_WORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(dialogue|conversation|chat|said|replied|asked)\b")
        .expect("dialogue word regex is valid")
});

static SPEAKER_MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\bperson [a-z]:|\bspeaker\b)")
        .expect("speaker marker regex is valid")
});

pub const DIALOGUE_PREFIX: &str = "summarize dialogue: ";

fn keywords(domain: Domain) -> &'static [&'static str] {
    match domain {
        Domain::Finance => FINANCE_KEYWORDS,
        Domain::Health => HEALTH_KEYWORDS,
        Domain::News => NEWS_KEYWORDS,
        Domain::Science => SCIENCE_KEYWORDS,
        Domain::Technical => TECHNICAL_KEYWORDS,
        Domain::General => &[],
    }
}

/// Where a summary request goes: which model and which task prefix.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRoute {
    pub model: ModelKey,
    pub prefix: String,
    /// `None` for dialogue input.
    pub domain: Option<Domain>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DomainClassifier;

impl DomainClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Count, per scored domain, how many of its keywords occur in the text.
    pub fn scores(&self, text: &str) -> [(Domain, usize); 5] {
        let lower = text.to_lowercase();
        Domain::SCORED.map(|domain| {
            let hits = keywords(domain)
                .iter()
                .filter(|kw| lower.contains(*kw))
                .count();
            (domain, hits)
        })
    }

    /// Best-scoring domain; ties go to the earlier domain, no hits to `General`.
    pub fn classify(&self, text: &str) -> Domain {
        let mut best = (Domain::General, 0usize);
        for (domain, hits) in self.scores(text) {
            if hits > best.1 {
                best = (domain, hits);
            }
        }
        best.0
    }

    pub fn is_dialogue(&self, text: &str) -> bool {
        DIALOGUE_WORD_RE.is_match(text) || SPEAKER_MARKER_RE.is_match(text)
    }

    /// Choose model and prompt prefix for a summary.
    ///
    /// An explicit domain override skips dialogue detection.
    pub fn summary_route(
        &self,
        text: &str,
        domain_override: Option<Domain>,
        models: &ModelCatalog,
    ) -> SummaryRoute {
        if domain_override.is_none() && self.is_dialogue(text) {
            tracing::debug!("Routing summary to dialogue model");
            return SummaryRoute {
                model: ModelKey::new(TaskKind::Summary, models.dialogue_summary.clone()),
                prefix: DIALOGUE_PREFIX.to_string(),
                domain: None,
            };
        }

        let domain = domain_override.unwrap_or_else(|| self.classify(text));
        tracing::debug!(domain = %domain, overridden = domain_override.is_some(), "Summary domain");
        SummaryRoute {
            model: ModelKey::new(TaskKind::Summary, models.multidomain_summary.clone()),
            prefix: format!("summarize {}: ", domain),
            domain: Some(domain),
        }
    }
}
