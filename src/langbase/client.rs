use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use super::types::{CreatePipeRequest, CreatePipeResponse, PipeRequest, PipeResponse};
use crate::config::{LangbaseConfig, RequestConfig};
use crate::error::{LangbaseError, LangbaseResult};
use crate::prompts::THOUGHT_GENERATION_PROMPT;

/// Model used when provisioning the thought pipe.
const THOUGHT_PIPE_MODEL: &str = "openai:gpt-4o-mini";

/// Client for the Langbase Pipes API
#[derive(Clone)]
pub struct LangbaseClient {
    client: Client,
    base_url: String,
    api_key: String,
    request_config: RequestConfig,
}

impl LangbaseClient {
    pub fn new(config: &LangbaseConfig, request_config: RequestConfig) -> LangbaseResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(request_config.timeout_ms))
            .build()
            .map_err(LangbaseError::Http)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            request_config,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Run a pipe, retrying with exponential backoff.
    pub async fn call_pipe(&self, request: PipeRequest) -> LangbaseResult<PipeResponse> {
        let url = format!("{}/v1/pipes/run", self.base_url);
        let max_retries = self.request_config.max_retries;
        let mut last_error = None;

        for attempt in 0..=max_retries {
            if attempt > 0 {
                let delay = self.backoff(attempt);
                warn!(
                    pipe = %request.name,
                    retry = attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying Langbase request"
                );
                tokio::time::sleep(delay).await;
            }

            debug!(pipe = %request.name, messages = request.messages.len(), "Calling Langbase pipe");
            let start = Instant::now();

            match self.post_json::<_, PipeResponse>(&url, &request).await {
                Ok(response) => {
                    info!(
                        pipe = %request.name,
                        latency_ms = start.elapsed().as_millis() as u64,
                        total_tokens = ?response.total_tokens(),
                        "Langbase pipe call succeeded"
                    );
                    return Ok(response);
                }
                // Client errors other than rate limiting will not improve on retry.
                Err(LangbaseError::Api { status, message })
                    if (400..500).contains(&status) && status != 429 =>
                {
                    error!(pipe = %request.name, status = status, "Langbase rejected request");
                    return Err(LangbaseError::Api { status, message });
                }
                Err(e) => {
                    error!(
                        pipe = %request.name,
                        error = %e,
                        latency_ms = start.elapsed().as_millis() as u64,
                        retry = attempt,
                        "Langbase pipe call failed"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(LangbaseError::Unavailable {
            message: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Unknown error".to_string()),
            retries: max_retries + 1,
        })
    }

    /// Create or update a pipe.
    pub async fn create_pipe(&self, request: CreatePipeRequest) -> LangbaseResult<CreatePipeResponse> {
        let url = format!("{}/v1/pipes", self.base_url);
        info!(pipe = %request.name, "Creating Langbase pipe");
        let response: CreatePipeResponse = self.post_json(&url, &request).await?;
        info!(pipe = %response.name, url = ?response.url, "Pipe ready");
        Ok(response)
    }

    /// Provision the thought-generation pipe. An existing pipe is fine.
    pub async fn ensure_thought_pipe(&self, pipe_name: &str) -> LangbaseResult<()> {
        let request = CreatePipeRequest::new(pipe_name)
            .with_description("Tree-of-Thoughts candidate thought generation")
            .with_model(THOUGHT_PIPE_MODEL)
            .with_json_output(true)
            .with_temperature(0.8)
            .with_max_tokens(1000)
            .with_system_prompt(THOUGHT_GENERATION_PROMPT);

        match self.create_pipe(request).await {
            Ok(_) => Ok(()),
            Err(LangbaseError::Api { status: 409, .. }) => {
                info!(pipe = %pipe_name, "Pipe already exists");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(
            self.request_config
                .retry_delay_ms
                .saturating_mul(2_u64.saturating_pow(attempt - 1)),
        )
    }

    async fn post_json<B: Serialize, R: DeserializeOwned>(&self, url: &str, body: &B) -> LangbaseResult<R> {
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LangbaseError::Timeout {
                        timeout_ms: self.request_config.timeout_ms,
                    }
                } else {
                    LangbaseError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LangbaseError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| LangbaseError::InvalidResponse {
                message: format!("Failed to parse response: {}", e),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(retry_delay_ms: u64) -> LangbaseClient {
        let config = LangbaseConfig {
            api_key: "test_key".to_string(),
            base_url: "https://api.langbase.com/".to_string(),
        };
        let request_config = RequestConfig {
            retry_delay_ms,
            ..RequestConfig::default()
        };
        LangbaseClient::new(&config, request_config).unwrap()
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        assert_eq!(client(100).base_url(), "https://api.langbase.com");
    }

    #[test]
    fn test_backoff_doubles() {
        let client = client(100);
        assert_eq!(client.backoff(1), Duration::from_millis(100));
        assert_eq!(client.backoff(2), Duration::from_millis(200));
        assert_eq!(client.backoff(3), Duration::from_millis(400));
    }
}
