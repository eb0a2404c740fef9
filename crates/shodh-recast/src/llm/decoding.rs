//! Decoding parameters sent to a generation engine.
//!
//! `DecodingConfig` can only be obtained through [`DecodingConfigBuilder::build`],
//! which rejects out-of-range values and contradictory combinations, so every
//! config that reaches an engine is valid.

use serde::Serialize;

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodingConfig {
    do_sample: bool,
    temperature: f32,
    top_p: f32,
    repetition_penalty: f32,
    num_beams: usize,
    num_return_sequences: usize,
    max_new_tokens: usize,
    min_new_tokens: usize,
    length_penalty: f32,
    no_repeat_ngram_size: usize,
}

impl DecodingConfig {
    pub fn builder() -> DecodingConfigBuilder {
        DecodingConfigBuilder::default()
    }

    /// Sampling config from a hard-coded preset row. Only the preset table calls
    /// this; its rows are checked against the builder in tests.
    pub(crate) const fn preset(
        temperature: f32,
        top_p: f32,
        repetition_penalty: f32,
        no_repeat_ngram_size: usize,
    ) -> Self {
        Self {
            do_sample: true,
            temperature,
            top_p,
            repetition_penalty,
            num_beams: 1,
            num_return_sequences: 1,
            max_new_tokens: 50,
            min_new_tokens: 0,
            length_penalty: 1.0,
            no_repeat_ngram_size,
        }
    }

    /// Start a builder from this config's values.
    pub fn to_builder(&self) -> DecodingConfigBuilder {
        DecodingConfigBuilder {
            do_sample: self.do_sample,
            temperature: self.temperature,
            top_p: self.top_p,
            repetition_penalty: self.repetition_penalty,
            num_beams: self.num_beams,
            num_return_sequences: self.num_return_sequences,
            max_new_tokens: self.max_new_tokens,
            min_new_tokens: self.min_new_tokens,
            length_penalty: self.length_penalty,
            no_repeat_ngram_size: self.no_repeat_ngram_size,
        }
    }

    pub fn do_sample(&self) -> bool {
        self.do_sample
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    pub fn top_p(&self) -> f32 {
        self.top_p
    }

    pub fn repetition_penalty(&self) -> f32 {
        self.repetition_penalty
    }

    pub fn num_beams(&self) -> usize {
        self.num_beams
    }

    pub fn num_return_sequences(&self) -> usize {
        self.num_return_sequences
    }

    pub fn max_new_tokens(&self) -> usize {
        self.max_new_tokens
    }

    pub fn min_new_tokens(&self) -> usize {
        self.min_new_tokens
    }

    pub fn length_penalty(&self) -> f32 {
        self.length_penalty
    }

    pub fn no_repeat_ngram_size(&self) -> usize {
        self.no_repeat_ngram_size
    }
}

#[derive(Debug, Clone)]
pub struct DecodingConfigBuilder {
    do_sample: bool,
    temperature: f32,
    top_p: f32,
    repetition_penalty: f32,
    num_beams: usize,
    num_return_sequences: usize,
    max_new_tokens: usize,
    min_new_tokens: usize,
    length_penalty: f32,
    no_repeat_ngram_size: usize,
}

impl Default for DecodingConfigBuilder {
    fn default() -> Self {
        Self {
            do_sample: true,
            temperature: 1.0,
            top_p: 0.92,
            repetition_penalty: 1.0,
            num_beams: 1,
            num_return_sequences: 1,
            max_new_tokens: 50,
            min_new_tokens: 0,
            length_penalty: 1.0,
            no_repeat_ngram_size: 0,
        }
    }
}

impl DecodingConfigBuilder {
    /// Stochastic decoding with the given temperature and nucleus threshold.
    pub fn sampling(mut self, temperature: f32, top_p: f32) -> Self {
        self.do_sample = true;
        self.temperature = temperature;
        self.top_p = top_p;
        self.num_beams = 1;
        self
    }

    /// Deterministic beam search.
    pub fn beam_search(mut self, num_beams: usize) -> Self {
        self.do_sample = false;
        self.num_beams = num_beams;
        self
    }

    pub fn repetition_penalty(mut self, penalty: f32) -> Self {
        self.repetition_penalty = penalty;
        self
    }

    pub fn num_return_sequences(mut self, count: usize) -> Self {
        self.num_return_sequences = count;
        self
    }

    pub fn max_new_tokens(mut self, tokens: usize) -> Self {
        self.max_new_tokens = tokens;
        self
    }

    pub fn min_new_tokens(mut self, tokens: usize) -> Self {
        self.min_new_tokens = tokens;
        self
    }

    pub fn length_penalty(mut self, penalty: f32) -> Self {
        self.length_penalty = penalty;
        self
    }

    pub fn no_repeat_ngram_size(mut self, size: usize) -> Self {
        self.no_repeat_ngram_size = size;
        self
    }

    pub fn build(self) -> Result<DecodingConfig, ConfigError> {
        let invalid = |field: &'static str, reason: String| {
            Err(ConfigError::InvalidDecoding { field, reason })
        };

        if self.do_sample {
            if !(self.temperature > 0.0 && self.temperature <= 2.0) {
                return invalid("temperature", format!("{} not in (0, 2]", self.temperature));
            }
            if !(self.top_p > 0.0 && self.top_p <= 1.0) {
                return invalid("top_p", format!("{} not in (0, 1]", self.top_p));
            }
        }
        if !(1.0..=2.0).contains(&self.repetition_penalty) {
            return invalid(
                "repetition_penalty",
                format!("{} not in [1, 2]", self.repetition_penalty),
            );
        }
        if self.num_beams == 0 {
            return invalid("num_beams", "must be at least 1".into());
        }
        if self.num_return_sequences == 0 {
            return invalid("num_return_sequences", "must be at least 1".into());
        }
        if !self.do_sample && self.num_return_sequences > self.num_beams {
            return invalid(
                "num_return_sequences",
                format!(
                    "{} exceeds beam count {}",
                    self.num_return_sequences, self.num_beams
                ),
            );
        }
        if self.max_new_tokens == 0 {
            return invalid("max_new_tokens", "must be at least 1".into());
        }
        if self.min_new_tokens > self.max_new_tokens {
            return invalid(
                "min_new_tokens",
                format!(
                    "{} exceeds max_new_tokens {}",
                    self.min_new_tokens, self.max_new_tokens
                ),
            );
        }
        if !(self.length_penalty.is_finite() && self.length_penalty > 0.0) {
            return invalid("length_penalty", format!("{} must be positive", self.length_penalty));
        }

        Ok(DecodingConfig {
            do_sample: self.do_sample,
            temperature: self.temperature,
            top_p: self.top_p,
            repetition_penalty: self.repetition_penalty,
            num_beams: self.num_beams,
            num_return_sequences: self.num_return_sequences,
            max_new_tokens: self.max_new_tokens,
            min_new_tokens: self.min_new_tokens,
            length_penalty: self.length_penalty,
            no_repeat_ngram_size: self.no_repeat_ngram_size,
        })
    }
}
