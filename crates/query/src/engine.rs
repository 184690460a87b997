use anyhow::Result;
use index::{IndexResult, NodeId};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::context::{ContextFormatter, NO_CONTEXT};
use crate::llm::AnswerGenerator;
use crate::retriever::{RetrievalResult, Retriever, SearchTrace};

#[derive(Debug, Clone, Serialize)]
pub struct GraphRagAnswer {
    pub answer: String,
    pub context: String,
    pub ids: Vec<NodeId>,
    pub trace: SearchTrace,
}

/// Retrieval, context formatting and answer generation for one question.
#[derive(Clone)]
pub struct GraphRagEngine {
    retriever: Retriever,
    formatter: ContextFormatter,
    answerer: Arc<dyn AnswerGenerator>,
}

impl GraphRagEngine {
    pub fn new(retriever: Retriever, answerer: Arc<dyn AnswerGenerator>) -> Self {
        Self {
            retriever,
            formatter: ContextFormatter::default(),
            answerer,
        }
    }

    pub fn with_formatter(mut self, formatter: ContextFormatter) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub async fn retrieve(&self, collection: &str, query: &str, limit: usize) -> IndexResult<RetrievalResult> {
        self.retriever.search(collection, query, limit).await
    }

    pub fn format(&self, retrieval: &RetrievalResult) -> String {
        self.formatter.format(&retrieval.subgraph)
    }

    pub async fn generate(&self, context: &str, query: &str) -> Result<String> {
        self.answerer.generate(context, query).await
    }

    /// Run the whole pipeline; retrieval errors come back as `IndexError` inside the `anyhow::Error`
    pub async fn answer(&self, collection: &str, query: &str, limit: usize) -> Result<GraphRagAnswer> {
        let retrieval = self.retrieve(collection, query, limit).await?;
        let context = self.format(&retrieval);
        let empty = context == NO_CONTEXT;
        info!(context_chars = context.len(), empty, "Formatted graph context");

        let answer = self.generate(&context, query).await?;

        Ok(GraphRagAnswer {
            answer,
            context,
            ids: retrieval.ids,
            trace: retrieval.trace,
        })
    }
}
