//! Transformation stages - classification, generation, cleanup, validation
//! and the fallback chain that ties them together.

pub mod assembler;
pub mod chain;
pub mod classifier;
pub mod fallback;
pub mod invoker;
pub mod normalizer;
pub mod relevance;

pub use assembler::{assemble, ResultMeta};
pub use chain::{is_acceptable, ChainInput, FallbackChain};
pub use classifier::{DomainClassifier, SummaryRoute, DIALOGUE_PREFIX};
pub use fallback::{extractive_summary, rule_paraphrase, substitute, RestructureStrategy};
pub use invoker::{preprocess, GenerationInvoker};
pub use normalizer::{OutputNormalizer, SentenceMood};
pub use relevance::{meaningful_words, RelevanceValidator};
