use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

/// Errors produced by the model gateway.
///
/// Callers never inspect response text to detect failure; every failure mode
/// is a variant here and a failed call carries no payload.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    #[error("Gateway is not configured: {0}")]
    NotConfigured(String),

    #[error("Model API error: {0}")]
    Api(String),

    #[error("Gateway call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Model returned an empty response")]
    EmptyResponse,

    #[error("Malformed model response: {0}")]
    MalformedResponse(String),
}

/// Expected shape of the generated output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseShape {
    Text,
    JsonObject,
}

/// Sampling and shape options for a single generation call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateOptions {
    pub shape: ResponseShape,
    pub max_tokens: u64,
    pub temperature: f64,
}

impl GenerateOptions {
    pub fn text(max_tokens: u64, temperature: f64) -> Self {
        Self {
            shape: ResponseShape::Text,
            max_tokens,
            temperature,
        }
    }

    pub fn json(max_tokens: u64, temperature: f64) -> Self {
        Self {
            shape: ResponseShape::JsonObject,
            max_tokens,
            temperature,
        }
    }
}

/// Boundary abstraction over the hosted text-generation service
#[async_trait]
pub trait AgentGateway: Send + Sync {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: GenerateOptions,
    ) -> Result<String, GatewayError>;
}

/// Timeout and retry budget applied to each gateway call.
///
/// A timed-out call is indistinguishable from any other gateway failure from
/// the caller's perspective: the attempt is abandoned and the error returned.
#[derive(Debug, Clone, Copy)]
pub struct CallPolicy {
    pub timeout: Duration,
    pub max_attempts: u32,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            max_attempts: 1,
        }
    }
}

/// Run one gateway call under the given policy.
///
/// Retries only on failure, up to `max_attempts` total attempts, and returns
/// the last error when the budget is exhausted.
pub async fn generate_with_policy(
    gateway: &dyn AgentGateway,
    system_prompt: &str,
    user_prompt: &str,
    options: GenerateOptions,
    policy: CallPolicy,
) -> Result<String, GatewayError> {
    let attempts = policy.max_attempts.max(1);
    let mut last_error = GatewayError::EmptyResponse;

    for attempt in 1..=attempts {
        let call = gateway.generate(system_prompt, user_prompt, options.clone());
        match tokio::time::timeout(policy.timeout, call).await {
            Ok(Ok(text)) => return Ok(text),
            Ok(Err(e)) => last_error = e,
            Err(_) => last_error = GatewayError::Timeout(policy.timeout),
        }

        if attempt < attempts {
            warn!(
                "Gateway call failed (attempt {} of {}): {}",
                attempt, attempts, last_error
            );
        }
    }

    Err(last_error)
}

/// Extract the first balanced top-level JSON object embedded in `text`.
///
/// Models frequently wrap JSON output in prose or code fences. This scans for
/// the first `{`, tracks brace depth (string- and escape-aware), and parses
/// the balanced slice. Anything unparseable degrades to an empty object
/// rather than an error.
pub fn extract_json(text: &str) -> Value {
    match first_balanced_object(text) {
        Some(slice) => serde_json::from_str(slice).unwrap_or_else(|_| Value::Object(Map::new())),
        None => Value::Object(Map::new()),
    }
}

fn first_balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }

    None
}
