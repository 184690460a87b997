pub mod context;
pub mod engine;
pub mod llm;
pub mod retriever;
pub mod subgraph;

pub use context::{
    ContextFormatter, DEFAULT_MAX_CONTEXT_CHARS, NO_CONTEXT, TRUNCATION_MARKER, format_graph_context, node_label,
};
pub use engine::{GraphRagAnswer, GraphRagEngine};
pub use llm::{AnswerGenerator, QueryLLM};
pub use retriever::{RetrievalResult, Retriever, SearchTrace};
pub use subgraph::Subgraph;
