use async_trait::async_trait;
use extract::LlmProvider;
use serde::{Deserialize, Serialize};

use crate::error::{IndexError, IndexResult};
use crate::store::Embedder;

const SERVICE: &str = "embedding";

#[derive(Clone)]
pub struct EmbeddingClient {
    provider: LlmProvider,
    base_url: String,
    model: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct OllamaEmbeddingResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Vec<OpenAiEmbedding>,
}

#[derive(Deserialize)]
struct OpenAiEmbedding {
    index: usize,
    embedding: Vec<f32>,
}

impl EmbeddingClient {
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

    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Generate embedding for a single text
    pub async fn embed_one(&self, text: &str) -> IndexResult<Vec<f32>> {
        let mut vectors = self.embed(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| IndexError::backend(SERVICE, "empty embedding response"))
    }

    /// Get embedding dimension
    pub async fn get_dimension(&self) -> IndexResult<usize> {
        let test_embedding = self.embed_one("test").await?;
        Ok(test_embedding.len())
    }

    async fn post(&self, url: &str, texts: &[String]) -> IndexResult<reqwest::Response> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };

        let mut builder = self.client.post(url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| IndexError::from_http(SERVICE, e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(IndexError::from_status(SERVICE, status, &body));
        }

        Ok(response)
    }

    async fn embed_ollama(&self, texts: &[String]) -> IndexResult<Vec<Vec<f32>>> {
        let url = format!("{}/api/embed", self.base_url);
        let response: OllamaEmbeddingResponse = self
            .post(&url, texts)
            .await?
            .json()
            .await
            .map_err(|e| IndexError::backend(SERVICE, format!("Failed to parse embedding response: {}", e)))?;

        Ok(response.embeddings)
    }

    async fn embed_openai(&self, texts: &[String]) -> IndexResult<Vec<Vec<f32>>> {
        let url = format!("{}/v1/embeddings", self.base_url);
        let mut response: OpenAiEmbeddingResponse = self
            .post(&url, texts)
            .await?
            .json()
            .await
            .map_err(|e| IndexError::backend(SERVICE, format!("Failed to parse embedding response: {}", e)))?;

        response.data.sort_by_key(|item| item.index);
        Ok(response.data.into_iter().map(|item| item.embedding).collect())
    }
}

impl Default for EmbeddingClient {
    fn default() -> Self {
        Self::new(
            "http://localhost:11434".to_string(),
            "nomic-embed-text".to_string(),
        )
    }
}

#[async_trait]
impl Embedder for EmbeddingClient {
    async fn embed(&self, texts: &[String]) -> IndexResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let vectors = match self.provider {
            LlmProvider::Ollama => self.embed_ollama(texts).await?,
            LlmProvider::OpenAi => self.embed_openai(texts).await?,
        };

        if vectors.len() != texts.len() {
            return Err(IndexError::backend(
                SERVICE,
                format!("expected {} embeddings, got {}", texts.len(), vectors.len()),
            ));
        }

        tracing::debug!(
            model = %self.model,
            count = vectors.len(),
            dimension = vectors.first().map(|v| v.len()).unwrap_or(0),
            "Generated embeddings"
        );
        Ok(vectors)
    }
}
