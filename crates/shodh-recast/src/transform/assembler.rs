//! Result assembly - filter, dedupe and rank validated candidates.

use chrono::Utc;
use std::collections::HashSet;
use uuid::Uuid;

use crate::llm::DecodingConfig;
use crate::types::{
    Domain, NormalizedCandidate, TaskKind, Tier, TransformationResult, ValidationVerdict,
};

/// Metadata attached to whatever a tier produces.
#[derive(Debug, Clone)]
pub struct ResultMeta {
    pub task: TaskKind,
    pub tier: Tier,
    pub decoding: Option<DecodingConfig>,
    pub domain: Option<Domain>,
}

fn build(candidates: Vec<NormalizedCandidate>, meta: ResultMeta) -> TransformationResult {
    TransformationResult {
        request_id: Uuid::new_v4(),
        created_at: Utc::now(),
        task: meta.task,
        candidates,
        tier: meta.tier,
        decoding: meta.decoding,
        used_rule_fallback: meta.tier == Tier::RuleFallback,
        domain: meta.domain,
        attempts: Vec::new(),
    }
}

/// Keep relevant candidates, drop exact duplicates, order by tier then index.
///
/// `verdicts[i].candidate` refers to `candidates[i]`. Returns `None` when
/// nothing survives.
pub fn assemble(
    candidates: Vec<NormalizedCandidate>,
    verdicts: &[ValidationVerdict],
    meta: ResultMeta,
) -> Option<TransformationResult> {
    let relevant: HashSet<usize> = verdicts
        .iter()
        .filter(|v| v.relevant)
        .map(|v| v.candidate)
        .collect();

    let mut kept: Vec<NormalizedCandidate> = candidates
        .into_iter()
        .enumerate()
        .filter(|(i, _)| relevant.contains(i))
        .map(|(_, c)| c)
        .collect();
    kept.sort_by_key(|c| (c.tier, c.index));

    let mut seen = HashSet::new();
    kept.retain(|c| seen.insert(c.text.clone()));

    if kept.is_empty() {
        return None;
    }
    Some(build(kept, meta))
}

/// Wrap rule-based output, which is taken without validation.
pub fn unconditional(text: String, meta: ResultMeta) -> TransformationResult {
    let candidate = NormalizedCandidate {
        text,
        tier: meta.tier,
        index: 0,
    };
    build(vec![candidate], meta)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(text: &str, tier: Tier, index: usize) -> NormalizedCandidate {
        NormalizedCandidate {
            text: text.to_string(),
            tier,
            index,
        }
    }

    fn verdict(candidate: usize, relevant: bool) -> ValidationVerdict {
        ValidationVerdict {
            candidate,
            relevant,
            overlap_ratio: Some(0.5),
            blacklisted_phrase: None,
        }
    }

    fn meta() -> ResultMeta {
        ResultMeta {
            task: TaskKind::Paraphrase,
            tier: Tier::Sampling,
            decoding: None,
            domain: None,
        }
    }

    #[test]
    fn test_dedups_and_orders_by_index() {
        let candidates = vec![
            candidate("A swift fox leaps.", Tier::Sampling, 2),
            candidate("A fast fox leaps.", Tier::Sampling, 0),
            candidate("A swift fox leaps.", Tier::Sampling, 1),
        ];
        let verdicts = vec![verdict(0, true), verdict(1, true), verdict(2, true)];

        let result = assemble(candidates, &verdicts, meta()).unwrap();
        assert_eq!(result.texts(), vec!["A fast fox leaps.", "A swift fox leaps."]);
        assert_eq!(result.candidates[1].index, 1);
        assert!(!result.used_rule_fallback);
        assert!(result.attempts.is_empty());
    }

    #[test]
    fn test_irrelevant_candidates_are_dropped() {
        let candidates = vec![
            candidate("Subscribe for premium.", Tier::Sampling, 0),
            candidate("A fast fox leaps.", Tier::Sampling, 1),
        ];
        let verdicts = vec![verdict(0, false), verdict(1, true)];
        let result = assemble(candidates, &verdicts, meta()).unwrap();
        assert_eq!(result.best(), "A fast fox leaps.");
    }

    #[test]
    fn test_nothing_relevant_is_none() {
        let candidates = vec![candidate("Upgrade now.", Tier::BeamRetry, 0)];
        assert!(assemble(candidates, &[verdict(0, false)], meta()).is_none());
        assert!(assemble(Vec::new(), &[], meta()).is_none());
    }

    #[test]
    fn test_unconditional_marks_rule_fallback() {
        let result = unconditional(
            "The fast tan canine leaps.".into(),
            ResultMeta {
                tier: Tier::RuleFallback,
                ..meta()
            },
        );
        assert!(result.used_rule_fallback);
        assert_eq!(result.candidates.len(), 1);
        assert_eq!(result.tier, Tier::RuleFallback);
    }
}
