pub mod embeddings;
pub mod error;
pub mod graph;
pub mod memory;
pub mod neo4j_index;
pub mod qdrant_index;
pub mod store;

pub use embeddings::EmbeddingClient;
pub use error::{IndexError, IndexResult};
pub use graph::{
    GraphStats, Neighborhood, Node, NodeId, NodeIdMapping, Relationship, SearchHit, TieBreak,
    VectorRecord,
};
pub use memory::{DeterministicEmbedder, MemoryGraphStore, MemoryVectorStore};
pub use neo4j_index::Neo4jStore;
pub use qdrant_index::QdrantStore;
pub use store::{Embedder, GraphStore, VectorStore, check_dimension, validate_extraction};

use extract::ExtractedPassage;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Writes extracted passages into the graph store and their embeddings into
/// the vector store, correlating the two through explicit node ids.
pub struct Indexer {
    graph: Arc<dyn GraphStore>,
    vectors: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    collection: String,
    dimension: usize,
    embed_batch_size: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexReport {
    pub passages_indexed: usize,
    pub passages_skipped: usize,
    pub entities: usize,
    pub relations: usize,
    pub vectors_upserted: usize,
    /// passage index -> graph nodes the passage was embedded under
    pub passage_nodes: BTreeMap<usize, Vec<NodeId>>,
}

impl Indexer {
    pub fn new(
        graph: Arc<dyn GraphStore>,
        vectors: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        collection: impl Into<String>,
        dimension: usize,
    ) -> Self {
        Self {
            graph,
            vectors,
            embedder,
            collection: collection.into(),
            dimension,
            embed_batch_size: 64,
        }
    }

    pub fn with_embed_batch_size(mut self, size: usize) -> Self {
        self.embed_batch_size = size.max(1);
        self
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Initialize both stores
    pub async fn init(&self) -> IndexResult<()> {
        tracing::info!(collection = %self.collection, dimension = self.dimension, "Initializing vector store");
        self.vectors
            .ensure_collection(&self.collection, self.dimension)
            .await?;

        tracing::info!("Initializing graph store");
        self.graph.init_schema().await?;

        tracing::info!("Indexer initialized");
        Ok(())
    }

    pub async fn index_passages(&self, passages: &[ExtractedPassage]) -> IndexResult<IndexReport> {
        let mut report = IndexReport::default();
        let mut embeddable: Vec<(&ExtractedPassage, Vec<NodeId>)> = Vec::new();

        for passage in passages {
            let mapping = self.graph.ingest(&passage.extraction).await?;
            report.entities += passage.extraction.entities.len();
            report.relations += passage.extraction.relations.len();

            let mut node_ids: Vec<NodeId> = Vec::new();
            for entity in &passage.extraction.entities {
                if let Some(id) = mapping.get(&entity.id) {
                    if !node_ids.contains(id) {
                        node_ids.push(id.clone());
                    }
                }
            }

            if node_ids.is_empty() {
                tracing::debug!(passage = passage.passage_index, "Passage has no entities, not embedded");
                report.passages_skipped += 1;
                continue;
            }
            embeddable.push((passage, node_ids));
        }

        for batch in embeddable.chunks(self.embed_batch_size) {
            let texts: Vec<String> = batch.iter().map(|(p, _)| p.text.clone()).collect();
            let vectors = self.embedder.embed(&texts).await?;
            if vectors.len() != texts.len() {
                return Err(IndexError::backend(
                    "embedding",
                    format!("expected {} embeddings, got {}", texts.len(), vectors.len()),
                ));
            }

            let mut records = Vec::new();
            for ((passage, node_ids), vector) in batch.iter().zip(vectors) {
                store::check_dimension(self.dimension, &vector)?;
                for node_id in node_ids {
                    records.push(VectorRecord {
                        node_id: node_id.clone(),
                        passage_hash: passage.passage_hash.clone(),
                        vector: vector.clone(),
                    });
                }
                report
                    .passage_nodes
                    .insert(passage.passage_index, node_ids.clone());
            }

            self.vectors.upsert(&self.collection, &records).await?;
            report.vectors_upserted += records.len();
            report.passages_indexed += batch.len();
        }

        tracing::info!(
            passages = report.passages_indexed,
            skipped = report.passages_skipped,
            entities = report.entities,
            relations = report.relations,
            vectors = report.vectors_upserted,
            "Indexed passages"
        );
        Ok(report)
    }

    /// Get overall stats
    pub async fn get_stats(&self) -> IndexResult<GraphStats> {
        self.graph.stats().await
    }
}
