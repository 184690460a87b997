use anyhow::{Context, Result};
use extract::{EntityExtractor, LlmClient, LlmExtractor};
use index::{Embedder, EmbeddingClient, GraphStore, Indexer, Neo4jStore, QdrantStore, VectorStore};
use ingest::PassageSplitter;
use query::{AnswerGenerator, ContextFormatter, GraphRagEngine, QueryLLM, Retriever};
use std::sync::Arc;
use tracing::warn;

use crate::cache::{Cache, CachingEmbedder};
use crate::config::{AppConfig, known_embedding_dimension};
use crate::metrics::Metrics;
use crate::retry::RetryPolicy;

/// Backend handles the application is assembled from.
pub struct Services {
    pub graph: Arc<dyn GraphStore>,
    pub vectors: Arc<dyn VectorStore>,
    pub embedder: Arc<dyn Embedder>,
    pub extractor: Arc<dyn EntityExtractor>,
    pub answerer: Arc<dyn AnswerGenerator>,
}

impl Services {
    /// Build the Qdrant, Neo4j and LLM clients described by `config`
    pub async fn connect(config: &AppConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .context("Failed to build HTTP client")?;

        let llm_config = &config.llm;
        if let Some(dimension) = known_embedding_dimension(&llm_config.embedding_model) {
            if dimension != config.qdrant.dimension {
                warn!(
                    model = %llm_config.embedding_model,
                    model_dimension = dimension,
                    collection_dimension = config.qdrant.dimension,
                    "Embedding model and collection dimension disagree"
                );
            }
        }

        let embedder = EmbeddingClient::with_provider(
            llm_config.provider,
            llm_config.base_url.clone(),
            llm_config.embedding_model.clone(),
            llm_config.api_key.clone(),
        )
        .with_http_client(http.clone());

        let llm = LlmClient::with_provider(
            llm_config.provider,
            llm_config.base_url.clone(),
            llm_config.model.clone(),
            llm_config.api_key.clone(),
        )
        .with_http_client(http.clone());

        let vectors = QdrantStore::new(config.qdrant.url.clone())
            .with_api_key(config.qdrant.api_key.clone())
            .with_http_client(http);

        let graph = Neo4jStore::connect(&config.neo4j.uri, &config.neo4j.user, &config.neo4j.password)
            .await
            .context("Failed to connect to Neo4j")?;

        Ok(Self {
            graph: Arc::new(graph),
            vectors: Arc::new(vectors),
            embedder: Arc::new(embedder),
            extractor: Arc::new(LlmExtractor::new(llm.clone()).with_max_attempts(llm_config.max_json_attempts)),
            answerer: Arc::new(QueryLLM::new(llm)),
        })
    }
}

/// Shared state behind every request handler.
pub struct AppState {
    pub config: AppConfig,
    pub graph: Arc<dyn GraphStore>,
    pub vectors: Arc<dyn VectorStore>,
    pub extractor: Arc<dyn EntityExtractor>,
    pub indexer: Indexer,
    pub engine: GraphRagEngine,
    pub splitter: PassageSplitter,
    pub cache: Arc<Cache>,
    pub metrics: Metrics,
    pub retry: RetryPolicy,
}

impl AppState {
    pub fn new(config: AppConfig, services: Services) -> Self {
        let cache = Arc::new(Cache::new(config.cache.max_entries));

        // Only query embeddings repeat often enough to be worth caching
        let query_embedder: Arc<dyn Embedder> = if config.cache.enabled {
            Arc::new(CachingEmbedder::new(services.embedder.clone(), cache.clone()))
        } else {
            services.embedder.clone()
        };

        let indexer = Indexer::new(
            services.graph.clone(),
            services.vectors.clone(),
            services.embedder,
            config.qdrant.collection.clone(),
            config.qdrant.dimension,
        );

        let retriever = Retriever::new(query_embedder, services.vectors.clone(), services.graph.clone());
        let engine = GraphRagEngine::new(retriever, services.answerer)
            .with_formatter(ContextFormatter::new(config.context.max_chars));

        Self {
            retry: RetryPolicy::from_config(&config.retry),
            graph: services.graph,
            vectors: services.vectors,
            extractor: services.extractor,
            indexer,
            engine,
            splitter: PassageSplitter::default(),
            cache,
            metrics: Metrics::new(),
            config,
        }
    }

    /// Create the collection and graph schema, retrying while the stores come up
    pub async fn init_stores(&self) -> Result<()> {
        self.retry
            .retry_if("init_stores", || self.indexer.init(), index::IndexError::is_retryable)
            .await
            .context("Failed to initialize stores")
    }
}
