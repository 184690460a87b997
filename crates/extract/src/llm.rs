use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::prompt;

/// Which HTTP dialect the language-model endpoint speaks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LlmProvider {
    #[default]
    #[serde(rename = "ollama")]
    Ollama,
    #[serde(rename = "openai")]
    OpenAi,
}

#[derive(Clone)]
pub struct LlmClient {
    provider: LlmProvider,
    base_url: String,
    model: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a str>, // "json" for structured output
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl LlmClient {
    pub fn new(base_url: String, model: String) -> Self {
        Self::with_provider(LlmProvider::Ollama, base_url, model, None)
    }

    pub fn openai(base_url: String, model: String, api_key: String) -> Self {
        Self::with_provider(LlmProvider::OpenAi, base_url, model, Some(api_key))
    }

    pub fn with_provider(
        provider: LlmProvider,
        base_url: String,
        model: String,
        api_key: Option<String>,
    ) -> Self {
        Self {
            provider,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            api_key,
            client: reqwest::Client::new(),
        }
    }

    /// Swap in a preconfigured client (timeouts, proxies)
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn provider(&self) -> LlmProvider {
        self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Free-form text completion
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        self.complete(prompt, false).await
    }

    /// Completion constrained to a JSON object
    pub async fn generate_json(&self, prompt: &str) -> Result<String> {
        let raw = self.complete(prompt, true).await?;
        Ok(strip_code_fences(&raw).to_string())
    }

    /// Generate with retry for invalid JSON
    pub async fn generate_json_with_retry(
        &self,
        prompt: &str,
        max_attempts: usize,
    ) -> Result<String> {
        let max_attempts = max_attempts.max(1);
        let mut response = self.generate_json(prompt).await?;

        for attempt in 1..=max_attempts {
            if serde_json::from_str::<serde_json::Value>(&response).is_ok() {
                return Ok(response);
            }

            tracing::warn!(
                attempt,
                max_attempts,
                model = %self.model,
                "Model returned invalid JSON"
            );

            if attempt < max_attempts {
                response = self
                    .generate_json(&prompt::build_retry_prompt(&response))
                    .await?;
            }
        }

        anyhow::bail!("Failed to get valid JSON after {} attempts", max_attempts)
    }

    async fn complete(&self, prompt: &str, json: bool) -> Result<String> {
        match self.provider {
            LlmProvider::Ollama => self.complete_ollama(prompt, json).await,
            LlmProvider::OpenAi => self.complete_openai(prompt, json).await,
        }
    }

    async fn complete_ollama(&self, prompt: &str, json: bool) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);

        let request = OllamaRequest {
            model: &self.model,
            prompt,
            stream: false,
            format: json.then_some("json"),
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("Failed to send request to Ollama")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Ollama request failed: {} {}", status, body);
        }

        let ollama_response: OllamaResponse = response
            .json()
            .await
            .context("Failed to parse Ollama response")?;

        Ok(ollama_response.response)
    }

    async fn complete_openai(&self, prompt: &str, json: bool) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: 0.0,
            response_format: json.then_some(ResponseFormat {
                kind: "json_object",
            }),
        };

        let mut builder = self.client.post(&url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .context("Failed to send chat completion request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Chat completion request failed: {} {}", status, body);
        }

        let chat: ChatResponse = response
            .json()
            .await
            .context("Failed to parse chat completion response")?;

        chat.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .context("Chat completion response had no content")
    }
}

impl Default for LlmClient {
    fn default() -> Self {
        Self::new(
            "http://localhost:11434".to_string(),
            "llama3".to_string(),
        )
    }
}

/// Models sometimes wrap JSON in a ```json fence despite instructions
fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}
