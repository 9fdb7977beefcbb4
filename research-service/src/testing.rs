//! Gateway stubs shared by unit tests.

use agent_flow::{AgentGateway, GatewayError, GenerateOptions};
use async_trait::async_trait;

/// A gateway that answers by matching substrings of the incoming prompts.
///
/// Rules are checked in insertion order against the user prompt first, then
/// the system prompt; an unmatched call fails loudly so tests never pass on
/// an accidental default.
pub struct StubGateway {
    rules: Vec<(String, Result<String, GatewayError>)>,
}

impl StubGateway {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn reply(mut self, pattern: &str, response: &str) -> Self {
        self.rules
            .push((pattern.to_string(), Ok(response.to_string())));
        self
    }

    pub fn fail(mut self, pattern: &str, error: GatewayError) -> Self {
        self.rules.push((pattern.to_string(), Err(error)));
        self
    }
}

#[async_trait]
impl AgentGateway for StubGateway {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        _options: GenerateOptions,
    ) -> Result<String, GatewayError> {
        for (pattern, response) in &self.rules {
            if user_prompt.contains(pattern) || system_prompt.contains(pattern) {
                return response.clone();
            }
        }
        Err(GatewayError::Api(format!(
            "no stub rule matched prompt: {}",
            user_prompt
        )))
    }
}
