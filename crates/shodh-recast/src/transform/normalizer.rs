//! Output Normalization
//!
//! Turns raw engine output into clean prose: leaked task prefixes and
//! instruction words are stripped from the front, the first letter is
//! capitalized and the sentence gets an ending that matches the source.
//! `normalize` is idempotent.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::types::Domain;

/// Task prefixes engines echo back. Longest first so the most specific wins.
const KNOWN_PREFIXES: &[&str] = &[
    "rephrase this sentence in a formal way:",
    "rewrite this sentence with different words:",
    "rephrase this sentence:",
    "rewrite this sentence:",
    "summarize dialogue:",
    "paraphrased text:",
    "paraphrasing:",
    "paraphrase:",
    "rephrased:",
    "rewritten:",
    "rewriting:",
    "summarize:",
    "rephrase:",
    "rewrite:",
    "reword:",
];

static TASK_WORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?i)(summarize|paraphrase|rephrase|rewrite|reword|dialogue)[\s:]")
        .expect("task word regex is valid")
});

static DOMAIN_COLON_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?i)(finance|health|news|science|technical|general)\s*:")
        .expect("domain colon regex is valid")
});

static DOMAIN_WORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?i)(finance|health|news|science|technical|general)\s")
        .expect("domain word regex is valid")
});

/// How the source sentence ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentenceMood {
    #[default]
    Statement,
    Question,
    Exclamation,
}

impl SentenceMood {
    pub fn of(text: &str) -> Self {
        let text = text.trim_end();
        if text.ends_with('?') {
            Self::Question
        } else if text.ends_with('!') {
            Self::Exclamation
        } else {
            Self::Statement
        }
    }

    fn terminal(&self) -> char {
        match self {
            Self::Statement => '.',
            Self::Question => '?',
            Self::Exclamation => '!',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strip {
    Separator,
    Prefix,
    TaskWord,
    DomainWord,
}

fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
    text.get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

pub struct OutputNormalizer {
    prompt_prefix: String,
    mood: SentenceMood,
    domain_prefixes: Vec<String>,
}

impl OutputNormalizer {
    /// `prompt_prefix` is the exact prefix sent with this request's prompt.
    pub fn new(prompt_prefix: &str, source_text: &str) -> Self {
        let domain_prefixes = Domain::SCORED
            .iter()
            .chain(std::iter::once(&Domain::General))
            .map(|d| format!("summarize {}:", d))
            .collect();

        Self {
            prompt_prefix: prompt_prefix.trim().to_string(),
            mood: SentenceMood::of(source_text),
            domain_prefixes,
        }
    }

    pub fn mood(&self) -> SentenceMood {
        self.mood
    }

    pub fn normalize(&self, raw: &str) -> String {
        let mut text = raw.split_whitespace().collect::<Vec<_>>().join(" ");

        // Every productive step shortens the text, so this bound is never hit.
        let mut after_task_word = false;
        for _ in 0..=text.len() {
            let Some((kind, rest)) = self.strip_once(&text, after_task_word) else {
                break;
            };
            match kind {
                Strip::TaskWord => after_task_word = true,
                Strip::Separator => {}
                Strip::Prefix | Strip::DomainWord => after_task_word = false,
            }
            text = rest;
        }

        let mut text = text.trim().to_string();
        if text.is_empty() {
            return text;
        }

        if let Some(first) = text.chars().next() {
            if first.is_lowercase() {
                let upper: String = first.to_uppercase().collect();
                text.replace_range(..first.len_utf8(), &upper);
            }
        }

        if !text.ends_with(['.', '!', '?']) {
            text.push(self.mood.terminal());
        }
        text
    }

    fn strip_once(&self, text: &str, after_task_word: bool) -> Option<(Strip, String)> {
        let trimmed = text.trim_start_matches(|c: char| c == ':' || c.is_whitespace());
        if trimmed.len() < text.len() {
            return Some((Strip::Separator, trimmed.to_string()));
        }

        if !self.prompt_prefix.is_empty() && starts_with_ignore_case(text, &self.prompt_prefix) {
            return Some((Strip::Prefix, text[self.prompt_prefix.len()..].to_string()));
        }

        let prefixes = KNOWN_PREFIXES
            .iter()
            .copied()
            .chain(self.domain_prefixes.iter().map(String::as_str));
        for prefix in prefixes {
            if starts_with_ignore_case(text, prefix) {
                return Some((Strip::Prefix, text[prefix.len()..].to_string()));
            }
        }

        if let Some(m) = TASK_WORD_RE.find(text) {
            return Some((Strip::TaskWord, text[m.end()..].to_string()));
        }
        if let Some(m) = DOMAIN_COLON_RE.find(text) {
            return Some((Strip::DomainWord, text[m.end()..].to_string()));
        }
        if after_task_word {
            if let Some(m) = DOMAIN_WORD_RE.find(text) {
                return Some((Strip::DomainWord, text[m.end()..].to_string()));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paraphrase_normalizer(source: &str) -> OutputNormalizer {
        OutputNormalizer::new("paraphrase: ", source)
    }

    #[test]
    fn test_strips_echoed_prompt_prefix() {
        let n = paraphrase_normalizer("The fox jumps.");
        assert_eq!(n.normalize("paraphrase: a swift fox leaps"), "A swift fox leaps.");
        assert_eq!(n.normalize("PARAPHRASE: A swift fox leaps."), "A swift fox leaps.");
    }

    #[test]
    fn test_strips_stacked_artifacts() {
        let n = OutputNormalizer::new("summarize finance: ", "Markets fell.");
        assert_eq!(
            n.normalize("summarize finance: summarize: : markets dropped sharply"),
            "Markets dropped sharply."
        );
        assert_eq!(n.normalize("Summarize finance markets dropped"), "Markets dropped.");
        assert_eq!(n.normalize("rewrite this sentence: stocks slid"), "Stocks slid.");
        assert_eq!(n.normalize("news: stocks slid"), "Stocks slid.");
    }

    #[test]
    fn test_domain_word_kept_without_preceding_task_word() {
        let n = OutputNormalizer::new("summarize news: ", "A report came out.");
        assert_eq!(n.normalize("News travels fast"), "News travels fast.");
        assert_eq!(n.normalize("summarize news: news travels fast"), "News travels fast.");
    }

    #[test]
    fn test_terminal_punctuation_follows_source_mood() {
        assert_eq!(paraphrase_normalizer("Is it late?").normalize("is it late now"), "Is it late now?");
        assert_eq!(paraphrase_normalizer("Run now!").normalize("run at once"), "Run at once!");
        assert_eq!(paraphrase_normalizer("It runs").normalize("it moves"), "It moves.");
        assert_eq!(paraphrase_normalizer("It runs.").normalize("It moves!"), "It moves!");
    }

    #[test]
    fn test_artifact_only_output_is_empty() {
        let n = paraphrase_normalizer("The fox jumps.");
        assert_eq!(n.normalize("paraphrase:"), "");
        assert_eq!(n.normalize("  :: "), "");
        assert_eq!(n.normalize(""), "");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let n = OutputNormalizer::new("summarize health: ", "Patients recovered.");
        let samples = [
            "summarize health: patients recovered quickly",
            "summarize",
            "summarize.",
            "dialogue: health: the clinic reopened",
            "reword  rewrite the plan",
            "health",
            "  : ",
            "ärzte halfen",
            "The clinic reopened?",
        ];
        for raw in samples {
            let once = n.normalize(raw);
            assert_eq!(n.normalize(&once), once, "not idempotent for {raw:?}");
        }
    }
}
