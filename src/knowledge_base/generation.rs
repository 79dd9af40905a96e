//! Text generation through Bedrock `InvokeModel`.

use crate::aws::{AwsClient, AwsError, AwsService, signer::uri_encode};
use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

/// Sampling parameters forwarded to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    /// Sampling temperature.
    pub temperature: f64,
    /// Nucleus sampling probability mass.
    pub top_p: f64,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
    /// Sequences that end generation early.
    pub stop_sequences: Vec<String>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.9,
            max_tokens: 1000,
            stop_sequences: Vec::new(),
        }
    }
}

/// Hosted text-generation model.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Complete `prompt` with the given model and sampling parameters.
    async fn generate(
        &self,
        model_id: &str,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, AwsError>;
}

/// [`TextGenerator`] speaking the Titan text request format.
pub struct BedrockTextGenerator {
    client: Arc<AwsClient>,
}

impl BedrockTextGenerator {
    /// Wrap a shared AWS client.
    pub fn new(client: Arc<AwsClient>) -> Self {
        Self { client }
    }
}

#[derive(Debug, Deserialize)]
struct InvokeResponse {
    #[serde(default)]
    results: Vec<InvokeResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InvokeResult {
    output_text: String,
}

#[async_trait]
impl TextGenerator for BedrockTextGenerator {
    async fn generate(
        &self,
        model_id: &str,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, AwsError> {
        let url = self.client.service_url(
            AwsService::BedrockRuntime,
            &format!("model/{}/invoke", uri_encode(model_id)),
        );
        let body = json!({
            "inputText": prompt,
            "textGenerationConfig": {
                "temperature": params.temperature,
                "maxTokenCount": params.max_tokens,
                "topP": params.top_p,
                "stopSequences": params.stop_sequences,
            }
        });

        let response: InvokeResponse = self
            .client
            .send_json(AwsService::BedrockRuntime, Method::POST, &url, Some(&body))
            .await
            .inspect_err(|err| tracing::error!(error = %err, "Error generating answer"))?;

        let output = response
            .results
            .into_iter()
            .next()
            .map(|result| result.output_text)
            .ok_or_else(|| AwsError::MalformedResponse {
                service: AwsService::BedrockRuntime.name(),
                message: "model returned no results".to_string(),
            })?;
        tracing::debug!(model_id, output_length = output.len(), "Model invocation complete");
        Ok(output)
    }
}
