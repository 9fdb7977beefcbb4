//! OpenRouter-backed implementation of the agent gateway.

use agent_flow::{AgentGateway, GatewayError, GenerateOptions, ResponseShape};
use async_trait::async_trait;
use rig::{client::CompletionClient, completion::Prompt, providers::openrouter};
use serde_json::json;

const DEFAULT_MODEL: &str = "openai/gpt-4.1-mini";

pub struct OpenRouterGateway {
    model: String,
}

impl OpenRouterGateway {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
        }
    }

    /// Model from `LLM_MODEL`, falling back to the default deployment.
    pub fn from_env() -> Self {
        Self::new(std::env::var("LLM_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()))
    }
}

#[async_trait]
impl AgentGateway for OpenRouterGateway {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: GenerateOptions,
    ) -> Result<String, GatewayError> {
        let api_key = std::env::var("OPENROUTER_API_KEY")
            .map_err(|_| GatewayError::NotConfigured("OPENROUTER_API_KEY not set".to_string()))?;

        let client = openrouter::Client::new(&api_key);
        let mut builder = client
            .agent(&self.model)
            .preamble(system_prompt)
            .temperature(options.temperature)
            .max_tokens(options.max_tokens);

        if options.shape == ResponseShape::JsonObject {
            builder = builder.additional_params(json!({
                "response_format": { "type": "json_object" }
            }));
        }

        let response = builder
            .build()
            .prompt(user_prompt)
            .await
            .map_err(|e| GatewayError::Api(e.to_string()))?;

        let trimmed = response.trim();
        if trimmed.is_empty() {
            return Err(GatewayError::EmptyResponse);
        }
        Ok(trimmed.to_string())
    }
}
