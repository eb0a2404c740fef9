//! Relevance Validation Module
//!
//! Flags hallucinated candidates: output that shares too few meaningful words
//! with the source, or that introduces boilerplate phrases (pricing, sign-up,
//! legal notices) the source never mentioned.

use regex::Regex;
use std::collections::HashSet;

use crate::config::RelevanceConfig;
use crate::error::ConfigError;
use crate::types::{NormalizedCandidate, ValidationVerdict};

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by", "is",
    "are", "was", "were", "be", "been", "have", "has", "had", "do", "does", "did", "will", "would",
    "could", "should", "may", "might", "must", "this", "that", "these", "those",
];

/// Inflections accepted on a phrase's last word, so "plan" also catches
/// "plans" and "member" catches "membership".
const INFLECTIONS: &str = r"(?:s|es|d|ed|ing|ship|ships)?";

/// Lower-cased tokens with surrounding punctuation removed, minus stop words.
pub fn meaningful_words(text: &str) -> HashSet<String> {
    text.split_whitespace()
        .map(|token| {
            token
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|word| !word.is_empty() && !STOP_WORDS.contains(&word.as_str()))
        .collect()
}

struct BlacklistEntry {
    phrase: String,
    pattern: Regex,
}

pub struct RelevanceValidator {
    min_overlap: f32,
    blacklist: Vec<BlacklistEntry>,
}

impl RelevanceValidator {
    pub fn new(config: &RelevanceConfig) -> Result<Self, ConfigError> {
        let blacklist = config
            .blacklist
            .iter()
            .map(|phrase| phrase.trim().to_lowercase())
            .filter(|phrase| !phrase.is_empty())
            .map(|phrase| {
                let words: Vec<String> = phrase.split_whitespace().map(regex::escape).collect();
                let source = format!(r"(?i)\b{}{}\b", words.join(r"\s+"), INFLECTIONS);
                let pattern = Regex::new(&source).map_err(|e| {
                    ConfigError::Invalid(format!("blacklist phrase '{}': {}", phrase, e))
                })?;
                Ok(BlacklistEntry { phrase, pattern })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(Self {
            min_overlap: config.min_overlap,
            blacklist,
        })
    }

    /// Blacklisted phrase present in `candidate` but absent from `original`.
    fn introduced_phrase(&self, original: &str, candidate: &str) -> Option<&str> {
        self.blacklist
            .iter()
            .find(|entry| entry.pattern.is_match(candidate) && !entry.pattern.is_match(original))
            .map(|entry| entry.phrase.as_str())
    }

    /// Share of the original's meaningful words that survive in the candidate.
    pub fn overlap_ratio(original: &str, candidate: &str) -> Option<f32> {
        let source = meaningful_words(original);
        if source.is_empty() {
            return None;
        }
        let produced = meaningful_words(candidate);
        let shared = source.intersection(&produced).count();
        Some(shared as f32 / source.len() as f32)
    }

    pub fn validate(&self, original: &str, candidate: &str) -> ValidationVerdict {
        let overlap_ratio = Self::overlap_ratio(original, candidate);
        let blacklisted_phrase = self.introduced_phrase(original, candidate).map(str::to_string);

        let overlap_ok = overlap_ratio.map_or(true, |ratio| ratio >= self.min_overlap);
        let relevant = overlap_ok && blacklisted_phrase.is_none();

        if !relevant {
            tracing::debug!(
                overlap = ?overlap_ratio,
                phrase = ?blacklisted_phrase,
                "Candidate flagged as irrelevant"
            );
        }

        ValidationVerdict {
            candidate: 0,
            relevant,
            overlap_ratio,
            blacklisted_phrase,
        }
    }

    /// Validate each candidate; verdicts line up with the input slice.
    pub fn validate_all(
        &self,
        original: &str,
        candidates: &[NormalizedCandidate],
    ) -> Vec<ValidationVerdict> {
        candidates
            .iter()
            .enumerate()
            .map(|(i, candidate)| ValidationVerdict {
                candidate: i,
                ..self.validate(original, &candidate.text)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Tier;

    const FOX: &str = "The quick brown fox jumps over the lazy dog.";

    fn validator() -> RelevanceValidator {
        RelevanceValidator::new(&RelevanceConfig::default()).unwrap()
    }

    #[test]
    fn test_meaningful_words_drop_stop_words_and_punctuation() {
        let words = meaningful_words("The quick, brown fox -- is (very) lazy!");
        let expected: HashSet<String> = ["quick", "brown", "fox", "very", "lazy"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(words, expected);
    }

    #[test]
    fn test_close_paraphrase_is_relevant() {
        let verdict = validator().validate(
            "The quick brown fox jumps over the lazy dog.",
            "A quick brown fox leaps over a sleepy dog.",
        );
        assert!(verdict.relevant);
        assert!(verdict.overlap_ratio.unwrap() > 0.5);
        assert_eq!(verdict.blacklisted_phrase, None);
    }

    #[test]
    fn test_unrelated_output_is_irrelevant() {
        let verdict = validator().validate(
            "The quick brown fox jumps over the lazy dog.",
            "Weather tomorrow looks cloudy everywhere.",
        );
        assert!(!verdict.relevant);
        assert_eq!(verdict.overlap_ratio, Some(0.0));
    }

    #[test]
    fn test_introduced_marketing_phrase_is_irrelevant() {
        let verdict = validator().validate(
            "The quick brown fox jumps over the lazy dog.",
            "The quick brown fox jumps, subscribe now for premium access.",
        );
        assert!(!verdict.relevant);
        assert_eq!(verdict.blacklisted_phrase.as_deref(), Some("subscribe"));
        // Overlap alone would have passed.
        assert!(verdict.overlap_ratio.unwrap() >= 0.10);
    }

    #[test]
    fn test_phrase_already_in_original_is_allowed() {
        let verdict = validator().validate(
            "Our premium plan costs ten dollars.",
            "The premium plan is ten dollars.",
        );
        assert!(verdict.relevant);
    }

    #[test]
    fn test_blacklist_matches_whole_words_only() {
        let v = validator();
        assert!(v.validate("Plants need light.", "Planet plants need daylight.").relevant);
        assert!(!v.validate("Read the page.", "Read the page and click   here.").relevant);
    }

    #[test]
    fn test_blacklist_catches_inflected_forms() {
        let v = validator();
        let appended = format!("{} Members get exclusive upgrades.", FOX);
        let verdict = v.validate(FOX, &appended);
        assert!(!verdict.relevant);
        assert_eq!(verdict.blacklisted_phrase.as_deref(), Some("member"));

        let verdict = v.validate(
            FOX,
            "The quick brown fox jumps over the lazy dog with newsletter subscriptions.",
        );
        assert!(!verdict.relevant);
        assert_eq!(verdict.blacklisted_phrase.as_deref(), Some("subscription"));

        let verdict = v.validate(FOX, "The quick brown fox plans to jump over the lazy dog.");
        assert_eq!(verdict.blacklisted_phrase.as_deref(), Some("plan"));
        assert!(v.validate("Read the page.", "Read the page after you clicked here.").relevant);
    }

    #[test]
    fn test_original_without_meaningful_words_skips_overlap() {
        let verdict = validator().validate("This is that.", "Something else entirely.");
        assert_eq!(verdict.overlap_ratio, None);
        assert!(verdict.relevant);
    }

    #[test]
    fn test_validate_all_indexes_verdicts() {
        let candidates = vec![
            NormalizedCandidate {
                text: "A fast brown fox.".into(),
                tier: Tier::Sampling,
                index: 0,
            },
            NormalizedCandidate {
                text: "Upgrade today.".into(),
                tier: Tier::Sampling,
                index: 1,
            },
        ];
        let verdicts = validator().validate_all("The brown fox runs.", &candidates);
        assert_eq!(verdicts.len(), 2);
        assert_eq!(verdicts[1].candidate, 1);
        assert!(verdicts[0].relevant);
        assert!(!verdicts[1].relevant);
    }
}
