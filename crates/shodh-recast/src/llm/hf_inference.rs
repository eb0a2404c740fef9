//! Hosted text2text-generation provider.
//! Speaks the Hugging Face inference API shape; any server exposing
//! `POST {endpoint}/models/{model_id}` with the same JSON works.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use super::{DecodingConfig, GenerationProvider, ProviderInfo};
use crate::error::GenerationFailure;

#[derive(Debug, Deserialize)]
struct GeneratedText {
    generated_text: String,
}

pub struct HfInferenceProvider {
    endpoint: String,
    api_token: Option<String>,
    model: String,
    client: Client,
    request_timeout_secs: u64,
}

impl HfInferenceProvider {
    pub fn new(
        base_url: &str,
        api_token: Option<String>,
        model_id: &str,
        connect_timeout_secs: u64,
        request_timeout_secs: u64,
    ) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .timeout(Duration::from_secs(request_timeout_secs))
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_nodelay(true)
            .build()?;

        let endpoint = Self::endpoint_for(base_url, model_id);
        tracing::info!(model = %model_id, endpoint = %endpoint, "Creating HfInferenceProvider");

        Ok(Self {
            endpoint,
            api_token,
            model: model_id.to_string(),
            client,
            request_timeout_secs,
        })
    }

    fn endpoint_for(base_url: &str, model_id: &str) -> String {
        format!("{}/models/{}", base_url.trim_end_matches('/'), model_id)
    }

    /// Engine-side parameter names for a decoding config.
    fn parameters(config: &DecodingConfig) -> Value {
        let mut params = json!({
            "do_sample": config.do_sample(),
            "num_beams": config.num_beams(),
            "num_return_sequences": config.num_return_sequences(),
            "max_new_tokens": config.max_new_tokens(),
            "repetition_penalty": config.repetition_penalty(),
            "length_penalty": config.length_penalty(),
            "clean_up_tokenization_spaces": true,
        });
        if config.do_sample() {
            params["temperature"] = json!(config.temperature());
            params["top_p"] = json!(config.top_p());
        }
        if config.min_new_tokens() > 0 {
            params["min_new_tokens"] = json!(config.min_new_tokens());
        }
        if config.no_repeat_ngram_size() > 0 {
            params["no_repeat_ngram_size"] = json!(config.no_repeat_ngram_size());
        }
        if !config.do_sample() && config.num_beams() > 1 {
            params["early_stopping"] = json!(true);
        }
        params
    }

    /// Parse a response body, returning a clear error if the server returned HTML
    /// (e.g. a gateway error page) instead of JSON.
    fn parse_generations(body: &str, endpoint: &str, status: StatusCode) -> Result<Vec<String>> {
        let trimmed = body.trim_start();
        if trimmed.starts_with('<') {
            let preview: String = trimmed.chars().take(200).collect();
            return Err(anyhow!(
                "Endpoint {} returned HTML instead of JSON (HTTP {}): {}",
                endpoint,
                status,
                preview
            ));
        }

        let generations: Vec<GeneratedText> = serde_json::from_str(body).map_err(|e| {
            let preview: String = body.chars().take(300).collect();
            anyhow!(
                "Failed to parse JSON from {} (HTTP {}): {}. Response body: {}",
                endpoint,
                status,
                e,
                preview
            )
        })?;

        Ok(generations.into_iter().map(|g| g.generated_text).collect())
    }
}

#[async_trait]
impl GenerationProvider for HfInferenceProvider {
    async fn generate(&self, prompt: &str, config: &DecodingConfig) -> Result<Vec<String>> {
        let request = json!({
            "inputs": prompt,
            "parameters": Self::parameters(config),
            "options": { "wait_for_model": true, "use_cache": false }
        });

        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(token) = &self.api_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                anyhow::Error::new(GenerationFailure::Timeout(self.request_timeout_secs))
            } else if e.is_connect() {
                anyhow::Error::new(GenerationFailure::Unavailable(format!(
                    "cannot reach {}: {}",
                    self.endpoint, e
                )))
            } else {
                anyhow!("Request to {} failed: {}", self.endpoint, e)
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| anyhow!("Failed to read response body from {}: {}", self.endpoint, e))?;

        if status == StatusCode::SERVICE_UNAVAILABLE {
            return Err(anyhow::Error::new(GenerationFailure::Unavailable(format!(
                "{} is loading or overloaded",
                self.model
            ))));
        }
        if !status.is_success() {
            let preview: String = body.chars().take(300).collect();
            return Err(anyhow!("Inference API error ({}): {}", status, preview));
        }

        let generations = Self::parse_generations(&body, &self.endpoint, status)?;
        tracing::debug!(model = %self.model, count = generations.len(), "Received generations");
        Ok(generations)
    }

    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            name: "HfInference".to_string(),
            model: self.model.clone(),
            is_local: false,
        }
    }
}
