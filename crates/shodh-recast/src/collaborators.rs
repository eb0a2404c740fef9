//! Seams for services that live outside the pipeline: result storage,
//! translation and readability scoring. The fallback chain never calls these;
//! callers compose them around the entry points.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::{TaskKind, TransformationResult};

/// Persists produced text. Returns the stored record's id.
#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn save(
        &self,
        user_ref: &str,
        original: &str,
        produced: &str,
        task: TaskKind,
    ) -> Result<String>;
}

/// Translation output; `success == false` means `text` is the untranslated input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Translation {
    pub text: String,
    pub success: bool,
}

#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, target_lang: &str) -> Translation;
}

/// Named readability metrics, e.g. `flesch_reading_ease`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadabilityScores {
    pub metrics: HashMap<String, f64>,
}

pub trait ReadabilityScorer: Send + Sync {
    fn score(&self, text: &str) -> ReadabilityScores;
}

/// Store the best candidate of `result` against `original`.
pub async fn record_result(
    store: &dyn ResultStore,
    user_ref: &str,
    original: &str,
    result: &TransformationResult,
) -> Result<String> {
    let id = store.save(user_ref, original, result.best(), result.task).await?;
    tracing::debug!(record = %id, request_id = %result.request_id, "Stored transformation result");
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::assembler::{unconditional, ResultMeta};
    use crate::types::Tier;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct MemoryStore {
        rows: Mutex<Vec<(String, String, String, TaskKind)>>,
    }

    #[async_trait]
    impl ResultStore for MemoryStore {
        async fn save(
            &self,
            user_ref: &str,
            original: &str,
            produced: &str,
            task: TaskKind,
        ) -> Result<String> {
            let mut rows = self.rows.lock();
            rows.push((user_ref.into(), original.into(), produced.into(), task));
            Ok(format!("rec-{}", rows.len()))
        }
    }

    #[tokio::test]
    async fn test_record_result_saves_best_candidate() {
        let store = MemoryStore::default();
        let result = unconditional(
            "The fast tan canine leaps.".into(),
            ResultMeta {
                task: TaskKind::Paraphrase,
                tier: Tier::RuleFallback,
                decoding: None,
                domain: None,
            },
        );

        let id = record_result(&store, "user-7", "The quick brown fox jumps.", &result)
            .await
            .unwrap();
        assert_eq!(id, "rec-1");

        let rows = store.rows.lock();
        assert_eq!(rows[0].0, "user-7");
        assert_eq!(rows[0].2, "The fast tan canine leaps.");
        assert_eq!(rows[0].3, TaskKind::Paraphrase);
    }

    struct PassthroughTranslator;

    #[async_trait]
    impl Translator for PassthroughTranslator {
        async fn translate(&self, text: &str, target_lang: &str) -> Translation {
            Translation {
                text: text.to_string(),
                success: target_lang == "en",
            }
        }
    }

    struct WordCountScorer;

    impl ReadabilityScorer for WordCountScorer {
        fn score(&self, text: &str) -> ReadabilityScores {
            let words = text.split_whitespace().count() as f64;
            ReadabilityScores {
                metrics: HashMap::from([("words".to_string(), words)]),
            }
        }
    }

    #[tokio::test]
    async fn test_collaborators_are_object_safe() {
        let translator: Box<dyn Translator> = Box::new(PassthroughTranslator);
        let scorer: Box<dyn ReadabilityScorer> = Box::new(WordCountScorer);

        let out = translator.translate("Hello there.", "fr").await;
        assert!(!out.success);
        assert_eq!(out.text, "Hello there.");
        assert_eq!(scorer.score("Hello there.").metrics["words"], 2.0);
    }
}
