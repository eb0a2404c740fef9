//! Rule-based transforms used when the engine cannot produce an acceptable
//! candidate. Nothing here touches a model, and every function is deterministic.

use std::collections::HashMap;
use std::sync::LazyLock;

use crate::types::CreativityLevel;

/// Synonyms ordered from most literal to most expressive.
const LEXICON: &[(&str, &[&str])] = &[
    ("quick", &["fast", "swift", "speedy", "rapid"]),
    ("brown", &["tan", "chestnut", "russet", "amber"]),
    ("fox", &["canine", "creature", "animal"]),
    ("jumps", &["leaps", "bounds", "springs", "hops"]),
    ("over", &["above", "across", "beyond"]),
    ("lazy", &["sleepy", "idle", "sluggish", "lethargic"]),
    ("dog", &["hound", "canine", "puppy"]),
    ("fast", &["quick", "swift", "rapid", "speedy"]),
    ("big", &["large", "huge", "massive", "enormous"]),
    ("small", &["little", "tiny", "compact", "miniature"]),
    ("good", &["great", "excellent", "wonderful", "outstanding"]),
    ("bad", &["poor", "terrible", "awful", "dreadful"]),
    ("happy", &["pleased", "content", "delighted", "joyful"]),
    ("sad", &["unhappy", "upset", "disappointed", "sorrowful"]),
    ("important", &["significant", "essential", "crucial", "vital"]),
    ("simple", &["basic", "easy", "straightforward", "uncomplicated"]),
    ("complex", &["complicated", "intricate", "elaborate", "sophisticated"]),
    ("easy", &["simple", "effortless", "straightforward", "uncomplicated"]),
    ("difficult", &["hard", "tough", "challenging", "demanding"]),
    ("beautiful", &["lovely", "attractive", "gorgeous", "stunning"]),
    ("old", &["aged", "elderly", "ancient", "vintage"]),
    ("new", &["recent", "fresh", "modern", "contemporary"]),
    ("truly", &["genuinely"]),
    ("marvels", &["wonders"]),
    ("numerous", &["many"]),
    ("various", &["different"]),
    ("designed", &["created"]),
    ("items", &["things"]),
];

static SYNONYMS: LazyLock<HashMap<&'static str, &'static [&'static str]>> =
    LazyLock::new(|| LEXICON.iter().copied().collect());

/// Shortest sentence kept by the extractive summary, in characters.
const MIN_SENTENCE_CHARS: usize = 15;
/// Length of the truncated summary used when too few sentences qualify.
const TRUNCATE_CHARS: usize = 150;
const NOTABLY_MIN_WORDS: usize = 5;

/// Sentence-level change applied after word substitution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestructureStrategy {
    Keep,
    /// ` is ` → ` becomes `, ` was ` → ` became `
    CopulaShift,
    /// `Notably, ` lead-in for sentences longer than five words
    NotablyLeadIn,
}

impl RestructureStrategy {
    pub fn for_level(level: CreativityLevel) -> Self {
        match level {
            CreativityLevel::Conservative => Self::Keep,
            CreativityLevel::Balanced => Self::CopulaShift,
            CreativityLevel::Creative => Self::NotablyLeadIn,
        }
    }

    pub fn apply(&self, text: &str) -> String {
        match self {
            Self::Keep => text.to_string(),
            Self::CopulaShift => text.replace(" is ", " becomes ").replace(" was ", " became "),
            Self::NotablyLeadIn => {
                if text.split_whitespace().count() > NOTABLY_MIN_WORDS {
                    format!("Notably, {}", lower_leading_word(text))
                } else {
                    text.to_string()
                }
            }
        }
    }
}

/// Lower-case a capitalized first word; acronyms and one-letter words are kept.
fn lower_leading_word(text: &str) -> String {
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(first), Some(second)) if first.is_uppercase() && second.is_lowercase() => {
            first.to_lowercase().chain(text[first.len_utf8()..].chars()).collect()
        }
        _ => text.to_string(),
    }
}

fn pick(options: &[&'static str], level: CreativityLevel) -> Option<&'static str> {
    let index = match level {
        CreativityLevel::Conservative => 0,
        CreativityLevel::Creative => options.len().checked_sub(1)?,
        CreativityLevel::Balanced => options.len() / 2,
    };
    options.get(index).copied()
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn substitute_token(token: &str, level: CreativityLevel) -> String {
    let core_start = token.find(char::is_alphanumeric);
    let core_end = token
        .char_indices()
        .rev()
        .find(|(_, c)| c.is_alphanumeric())
        .map(|(i, c)| i + c.len_utf8());
    let (Some(start), Some(end)) = (core_start, core_end) else {
        return token.to_string();
    };

    let core = &token[start..end];
    let Some(replacement) = SYNONYMS
        .get(core.to_lowercase().as_str())
        .and_then(|options| pick(options, level))
    else {
        return token.to_string();
    };

    let replacement = if core.starts_with(char::is_uppercase) {
        capitalize(replacement)
    } else {
        replacement.to_string()
    };
    format!("{}{}{}", &token[..start], replacement, &token[end..])
}

/// Swap known words for synonyms picked by level, keeping each token's
/// capitalization and surrounding punctuation.
pub fn substitute(text: &str, level: CreativityLevel) -> String {
    text.split_whitespace()
        .map(|token| substitute_token(token, level))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Tier-2 paraphrase: substitution followed by the level's restructuring.
pub fn rule_paraphrase(text: &str, level: CreativityLevel) -> String {
    let substituted = substitute(text, level);
    RestructureStrategy::for_level(level).apply(&substituted)
}

/// Tier-2 summary: first and last substantial sentences, or a truncation of
/// the input when fewer than two qualify.
pub fn extractive_summary(text: &str) -> String {
    let sentences: Vec<&str> = text
        .split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| s.chars().count() > MIN_SENTENCE_CHARS)
        .collect();

    if let [first, .., last] = sentences.as_slice() {
        return format!("{}. {}.", first, last);
    }

    if text.chars().count() > TRUNCATE_CHARS {
        let head: String = text.chars().take(TRUNCATE_CHARS).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}
