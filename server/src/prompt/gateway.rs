use std::sync::Arc;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::json;
use tokio::time::Duration;

use crate::email::normalized_input::EmailInput;
use crate::error::{AppError, AppResult};
use crate::rate_limiters::RateLimiters;
use crate::server_config::cfg;
use crate::HttpClient;

use super::triage::{batch_user_prompt, system_prompt};
use super::{ChatApiResponseOrError, PromptUsage};

/// One chat completion from the provider.
#[derive(Debug)]
pub struct ChatCompletion {
    pub content: String,
    pub usage: PromptUsage,
}

/// Seam over the outbound chat API so the pipeline can run against a test
/// double with no network.
#[async_trait]
pub trait ChatCompleter: Send + Sync {
    async fn complete(&self, model: &str, system: &str, user: &str) -> AppResult<ChatCompletion>;
}

/// Mistral chat-completions client.
#[derive(Clone)]
pub struct MistralClient {
    http_client: HttpClient,
    base_url: String,
    api_key: String,
    temperature: f64,
}

impl MistralClient {
    pub fn new(http_client: HttpClient, base_url: String, api_key: String, temperature: f64) -> Self {
        Self {
            http_client,
            base_url,
            api_key,
            temperature,
        }
    }

    pub fn from_env(http_client: HttpClient) -> Self {
        Self::new(
            http_client,
            cfg.api.base_url.clone(),
            cfg.api.key.clone(),
            cfg.model.temperature,
        )
    }
}

#[async_trait]
impl ChatCompleter for MistralClient {
    async fn complete(&self, model: &str, system: &str, user: &str) -> AppResult<ChatCompletion> {
        let url = format!("{}/chat/completions", self.base_url);
        let resp = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": model,
                "temperature": self.temperature,
                "messages": [
                    { "role": "system", "content": system },
                    { "role": "user", "content": user }
                ]
            }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::BAD_REQUEST => AppError::BadRequest(message),
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AppError::Unauthorized(message),
                StatusCode::REQUEST_TIMEOUT => AppError::RequestTimeout,
                StatusCode::TOO_MANY_REQUESTS => AppError::TooManyRequests,
                s => AppError::Upstream {
                    status: s.as_u16(),
                    message,
                },
            });
        }

        let value = resp.json::<serde_json::Value>().await?;
        let parsed = serde_json::from_value::<ChatApiResponseOrError>(value.clone())
            .context(format!("Could not parse chat response: {}", value))?;

        match parsed {
            ChatApiResponseOrError::Error(error) => {
                if error.message == "Requests rate limit exceeded" {
                    return Err(AppError::TooManyRequests);
                }
                Err(anyhow!("Chat API error: {:?}", error).into())
            }
            ChatApiResponseOrError::Response(parsed) => {
                let choice = parsed
                    .choices
                    .into_iter()
                    .next()
                    .context("No choices in response")?;
                Ok(ChatCompletion {
                    content: choice.message.content,
                    usage: parsed.usage,
                })
            }
        }
    }
}

/// Raw batch completion plus which model actually produced it.
#[derive(Debug)]
pub struct BatchCompletion {
    pub raw_text: String,
    pub usage: PromptUsage,
    pub model_used: String,
}

/// Owns the outbound call discipline: global rate limiting, exponential
/// backoff on transient failures, then one attempt on the fallback model
/// before the batch is declared failed.
#[derive(Clone)]
pub struct LlmGateway {
    client: Arc<dyn ChatCompleter>,
    rate_limiters: RateLimiters,
    primary_model: String,
    fallback_model: String,
    max_attempts: u32,
    backoff_base: Duration,
}

impl LlmGateway {
    pub fn new(
        client: Arc<dyn ChatCompleter>,
        rate_limiters: RateLimiters,
        primary_model: String,
        fallback_model: String,
        max_attempts: u32,
        backoff_base: Duration,
    ) -> Self {
        Self {
            client,
            rate_limiters,
            primary_model,
            fallback_model,
            max_attempts,
            backoff_base,
        }
    }

    pub fn from_env(client: Arc<dyn ChatCompleter>, rate_limiters: RateLimiters) -> Self {
        Self::new(
            client,
            rate_limiters,
            cfg.model.primary.clone(),
            cfg.model.fallback.clone(),
            cfg.model.max_retries,
            Duration::from_millis(cfg.model.retry_backoff_ms),
        )
    }

    /// Send one batch through the primary model with retries; after primary
    /// exhaustion make a single fallback attempt. Non-retryable failures
    /// (bad request, auth) surface immediately without burning the budget.
    pub async fn process_batch(&self, inputs: &[EmailInput]) -> AppResult<BatchCompletion> {
        let system = system_prompt();
        let user = batch_user_prompt(inputs);

        for attempt in 0..self.max_attempts {
            if attempt > 0 {
                tokio::time::sleep(self.backoff_base * 2u32.pow(attempt - 1)).await;
            }
            self.rate_limiters.acquire_one().await;

            match self.client.complete(&self.primary_model, &system, &user).await {
                Ok(completion) => return Ok(self.finish(completion, &self.primary_model)),
                Err(e) if e.is_transient() => {
                    if matches!(e, AppError::TooManyRequests) {
                        self.rate_limiters.trigger_backoff();
                    }
                    tracing::warn!(
                        "Attempt {}/{} on {} failed: {}",
                        attempt + 1,
                        self.max_attempts,
                        self.primary_model,
                        e
                    );
                }
                Err(e) => return Err(e),
            }
        }

        tracing::warn!(
            "Primary model {} exhausted, falling back to {}",
            self.primary_model,
            self.fallback_model
        );
        self.rate_limiters.acquire_one().await;
        match self
            .client
            .complete(&self.fallback_model, &system, &user)
            .await
        {
            Ok(completion) => Ok(self.finish(completion, &self.fallback_model)),
            Err(e) => Err(e),
        }
    }

    fn finish(&self, completion: ChatCompletion, model: &str) -> BatchCompletion {
        // Best-effort cost observability, not a billing ledger.
        tracing::info!(
            model,
            prompt_tokens = completion.usage.prompt_tokens,
            completion_tokens = completion.usage.completion_tokens,
            total_tokens = completion.usage.total_tokens,
            "prompt usage"
        );
        BatchCompletion {
            raw_text: completion.content,
            usage: completion.usage,
            model_used: model.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::common::{completion, one_input, ScriptedCompleter};

    fn gateway(client: Arc<ScriptedCompleter>, max_attempts: u32) -> LlmGateway {
        LlmGateway::new(
            client,
            RateLimiters::new(1),
            "primary-model".to_string(),
            "fallback-model".to_string(),
            max_attempts,
            Duration::from_millis(1),
        )
    }

    #[tokio::test]
    async fn test_primary_success_reports_primary_model() {
        let client = Arc::new(ScriptedCompleter::new(vec![Ok(completion("[]"))]));
        let gw = gateway(client.clone(), 3);

        let result = gw.process_batch(&[one_input("eml_1")]).await.unwrap();
        assert_eq!(result.model_used, "primary-model");
        assert_eq!(client.models_called(), vec!["primary-model"]);
    }

    #[tokio::test]
    async fn test_falls_back_after_primary_exhaustion() {
        let client = Arc::new(ScriptedCompleter::new(vec![
            Err(AppError::Upstream {
                status: 500,
                message: "boom".to_string(),
            }),
            Err(AppError::RequestTimeout),
            Err(AppError::Upstream {
                status: 503,
                message: "unavailable".to_string(),
            }),
            Ok(completion("[]")),
        ]));
        let gw = gateway(client.clone(), 3);

        let result = gw.process_batch(&[one_input("eml_1")]).await.unwrap();
        assert_eq!(result.model_used, "fallback-model");
        assert_eq!(
            client.models_called(),
            vec![
                "primary-model",
                "primary-model",
                "primary-model",
                "fallback-model"
            ]
        );
    }

    #[tokio::test]
    async fn test_non_retryable_error_fails_immediately() {
        let client = Arc::new(ScriptedCompleter::new(vec![Err(AppError::BadRequest(
            "malformed".to_string(),
        ))]));
        let gw = gateway(client.clone(), 3);

        let err = gw.process_batch(&[one_input("eml_1")]).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert_eq!(client.models_called().len(), 1);
    }

    #[tokio::test]
    async fn test_fallback_failure_surfaces_error() {
        let client = Arc::new(ScriptedCompleter::new(vec![
            Err(AppError::RequestTimeout),
            Err(AppError::Upstream {
                status: 502,
                message: "bad gateway".to_string(),
            }),
        ]));
        let gw = gateway(client.clone(), 1);

        let err = gw.process_batch(&[one_input("eml_1")]).await.unwrap_err();
        assert!(matches!(err, AppError::Upstream { status: 502, .. }));
        assert_eq!(
            client.models_called(),
            vec!["primary-model", "fallback-model"]
        );
    }
}
