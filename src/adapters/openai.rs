//! OpenAI compatible embeddings and chat completions over `reqwest`.

use crate::config::OpenAiConfig;
use crate::domain::ports::{Embedder, LanguageModel};
use crate::utils::error::{ContractError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

// 單次重試等待上限
const MAX_BACKOFF: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn api_key(&self) -> Result<&str> {
        match self.config.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => Ok(key),
            _ => Err(ContractError::MissingConfigError {
                field: "openai.api_key".to_string(),
            }),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = self.endpoint(path);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            match self.post_once(&url, body).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && attempt <= self.config.max_retries => {
                    let backoff = backoff_delay(self.config.retry_backoff_ms, attempt);
                    tracing::warn!(
                        "Request to {} failed (attempt {}/{}): {}. Retrying in {}ms",
                        path,
                        attempt,
                        self.config.max_retries.saturating_add(1),
                        e,
                        backoff.as_millis()
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn post_once<B, R>(&self, url: &str, body: &B) -> Result<R>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let response = self
            .client
            .post(url)
            .bearer_auth(self.api_key()?)
            .timeout(Duration::from_secs(self.config.timeout_seconds))
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&text)
                .map(|b| b.error.message)
                .unwrap_or(text);
            return Err(ContractError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json::<R>().await?)
    }
}

#[async_trait]
impl Embedder for OpenAiClient {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.config.embedding_batch_size.max(1)) {
            let request = EmbeddingRequest {
                model: &self.config.embedding_model,
                input: batch,
            };
            let mut response: EmbeddingResponse = self.post_json("embeddings", &request).await?;

            if response.data.len() != batch.len() {
                return Err(ContractError::ApiError {
                    status: 200,
                    message: format!(
                        "Expected {} embeddings, received {}",
                        batch.len(),
                        response.data.len()
                    ),
                });
            }

            // 回應順序不保證，依 index 排回輸入順序
            response.data.sort_by_key(|d| d.index);
            embeddings.extend(response.data.into_iter().map(|d| d.embedding));
        }

        tracing::debug!(
            "Generated {} embeddings with model '{}'",
            embeddings.len(),
            self.config.embedding_model
        );
        Ok(embeddings)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let mut embeddings = self.embed_documents(&[text.to_string()]).await?;
        embeddings.pop().ok_or_else(|| ContractError::ApiError {
            status: 200,
            message: "No embedding returned".to_string(),
        })
    }

    fn model_name(&self) -> &str {
        &self.config.embedding_model
    }
}

#[async_trait]
impl LanguageModel for OpenAiClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        tracing::debug!(
            "Generating answer with model '{}' (prompt length: {} chars)",
            self.config.chat_model,
            prompt.len()
        );

        let request = ChatRequest {
            model: &self.config.chat_model,
            temperature: self.config.temperature,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };
        let response: ChatResponse = self.post_json("chat/completions", &request).await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| ContractError::ApiError {
                status: 200,
                message: "Completion response contained no content".to_string(),
            })
    }
}

/// 指數退避：base * 2^(attempt-1)，不超過 MAX_BACKOFF
fn backoff_delay(base_ms: u64, attempt: u32) -> Duration {
    let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
    Duration::from_millis(base_ms.saturating_mul(factor)).min(MAX_BACKOFF)
}
