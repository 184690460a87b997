use anyhow::{Context, Result};
use async_trait::async_trait;
use extract::LlmClient;

/// Turns a formatted context and a question into an answer.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn generate(&self, context: &str, query: &str) -> Result<String>;
}

/// Answer generator backed by a plain-text LLM completion.
#[derive(Clone)]
pub struct QueryLLM {
    client: LlmClient,
}

impl QueryLLM {
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &LlmClient {
        &self.client
    }
}

impl Default for QueryLLM {
    fn default() -> Self {
        Self::new(LlmClient::default())
    }
}

#[async_trait]
impl AnswerGenerator for QueryLLM {
    async fn generate(&self, context: &str, query: &str) -> Result<String> {
        let prompt = build_answer_prompt(context, query);
        let answer = self
            .client
            .generate(&prompt)
            .await
            .context("Failed to generate answer")?;
        Ok(answer.trim().to_string())
    }
}

pub fn build_answer_prompt(context: &str, query: &str) -> String {
    format!(
        r#"You are a helpful assistant answering questions about a knowledge graph.

CONTEXT (one relationship per line):
{}

USER QUESTION: {}

INSTRUCTIONS:
- Answer the question using only information from the context above
- Name the entities and relationships your answer relies on
- If the context doesn't contain enough information, say so
- Keep your answer concise and factual

ANSWER:"#,
        context, query
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_prompt_carries_context_and_question() {
        let prompt = build_answer_prompt("Person(Bob) -[WORKS_ON]-> Project(Alpha)", "What does Bob work on?");
        assert!(prompt.contains("Person(Bob) -[WORKS_ON]-> Project(Alpha)"));
        assert!(prompt.contains("USER QUESTION: What does Bob work on?"));
    }

    #[tokio::test]
    async fn test_generate_trims_answer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "response": "  Bob works on Alpha.\n"
            })))
            .mount(&server)
            .await;

        let llm = QueryLLM::new(LlmClient::new(server.uri(), "llama3".to_string()));
        let answer = llm.generate("ctx", "q").await.unwrap();
        assert_eq!(answer, "Bob works on Alpha.");
    }

    #[tokio::test]
    async fn test_generate_propagates_http_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let llm = QueryLLM::new(LlmClient::new(server.uri(), "llama3".to_string()));
        assert!(llm.generate("ctx", "q").await.is_err());
    }
}
