use futures::future::join_all;
use index::{Embedder, GraphStore, IndexError, IndexResult, NodeId, VectorStore, check_dimension};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::subgraph::Subgraph;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchTrace {
    pub seeds_requested: usize,
    pub seeds_found: usize,
    pub seeds_missing: usize,
    pub nodes: usize,
    pub relationships: usize,
}

/// Seed ids in rank order, their scores, and the merged 1-hop subgraph.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RetrievalResult {
    pub ids: Vec<NodeId>,
    pub scores: Vec<f32>,
    pub subgraph: Subgraph,
    pub trace: SearchTrace,
}

/// Vector search for seed nodes followed by a 1-hop graph expansion.
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    vectors: Arc<dyn VectorStore>,
    graph: Arc<dyn GraphStore>,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        vectors: Arc<dyn VectorStore>,
        graph: Arc<dyn GraphStore>,
    ) -> Self {
        Self {
            embedder,
            vectors,
            graph,
        }
    }

    pub async fn search(&self, collection: &str, query: &str, limit: usize) -> IndexResult<RetrievalResult> {
        if limit == 0 {
            return Err(IndexError::InvalidArgument("limit must be positive".to_string()));
        }
        if query.trim().is_empty() {
            return Err(IndexError::InvalidArgument("query must not be blank".to_string()));
        }

        let dimension = self.vectors.dimension(collection).await?;

        let mut embeddings = self.embedder.embed(&[query.to_string()]).await?;
        let query_vector = match embeddings.pop() {
            Some(vector) if embeddings.is_empty() => vector,
            _ => {
                return Err(IndexError::backend(
                    "embedding",
                    "expected exactly one vector for the query",
                ))
            }
        };
        check_dimension(dimension, &query_vector)?;

        let hits = self.vectors.search(collection, &query_vector, limit).await?;
        debug!(
            collection,
            hits = hits.len(),
            tie_break = ?self.vectors.tie_break(),
            "Vector search complete"
        );

        let mut seen = HashSet::new();
        let (ids, scores): (Vec<NodeId>, Vec<f32>) = hits
            .into_iter()
            .filter(|hit| seen.insert(hit.id.clone()))
            .take(limit)
            .map(|hit| (hit.id, hit.score))
            .unzip();

        let (subgraph, seeds_missing) = self.expand(&ids).await?;

        let trace = SearchTrace {
            seeds_requested: limit,
            seeds_found: ids.len(),
            seeds_missing,
            nodes: subgraph.node_count(),
            relationships: subgraph.relationship_count(),
        };
        info!(
            collection,
            seeds = trace.seeds_found,
            missing = trace.seeds_missing,
            nodes = trace.nodes,
            relationships = trace.relationships,
            "Retrieved subgraph"
        );

        Ok(RetrievalResult {
            ids,
            scores,
            subgraph,
            trace,
        })
    }

    /// Merge the 1-hop neighborhoods of `seeds` in seed order.
    /// Returns the subgraph and the number of seeds the graph store does not know.
    pub async fn expand(&self, seeds: &[NodeId]) -> IndexResult<(Subgraph, usize)> {
        let lookups = join_all(seeds.iter().map(|id| self.graph.get_neighborhood(id))).await;

        let mut subgraph = Subgraph::new();
        let mut missing = 0;
        for (id, lookup) in seeds.iter().zip(lookups) {
            match lookup? {
                Some(neighborhood) => subgraph.merge_neighborhood(neighborhood),
                None => {
                    warn!(node_id = %id, "Seed node missing from graph store, skipping");
                    missing += 1;
                }
            }
        }

        Ok((subgraph, missing))
    }
}
