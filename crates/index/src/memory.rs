//! In-process stores and embedder. They implement the same traits as the
//! Qdrant/Neo4j/HTTP clients and back the tests and offline runs.

use async_trait::async_trait;
use extract::ExtractionResult;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

use crate::error::{IndexError, IndexResult};
use crate::graph::{
    GraphStats, Neighborhood, Node, NodeId, NodeIdMapping, Relationship, SearchHit, TieBreak,
    VectorRecord,
};
use crate::store::{Embedder, GraphStore, VectorStore, check_dimension, validate_extraction};

struct Collection {
    dimension: usize,
    /// Insertion order is the tie-break order
    records: Vec<VectorRecord>,
}

#[derive(Default)]
pub struct MemoryVectorStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self, name: &str) -> usize {
        self.collections
            .read()
            .await
            .get(name)
            .map(|c| c.records.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn ensure_collection(&self, name: &str, dimension: usize) -> IndexResult<()> {
        if dimension == 0 {
            return Err(IndexError::InvalidArgument("dimension must be positive".to_string()));
        }

        let mut collections = self.collections.write().await;
        match collections.get(name) {
            Some(existing) if existing.dimension != dimension => Err(IndexError::DimensionMismatch {
                expected: existing.dimension,
                actual: dimension,
            }),
            Some(_) => Ok(()),
            None => {
                collections.insert(
                    name.to_string(),
                    Collection {
                        dimension,
                        records: Vec::new(),
                    },
                );
                Ok(())
            }
        }
    }

    async fn dimension(&self, name: &str) -> IndexResult<usize> {
        self.collections
            .read()
            .await
            .get(name)
            .map(|c| c.dimension)
            .ok_or_else(|| IndexError::CollectionNotFound(name.to_string()))
    }

    async fn upsert(&self, name: &str, records: &[VectorRecord]) -> IndexResult<()> {
        let mut collections = self.collections.write().await;
        let collection = collections
            .get_mut(name)
            .ok_or_else(|| IndexError::CollectionNotFound(name.to_string()))?;

        for record in records {
            check_dimension(collection.dimension, &record.vector)?;
        }

        for record in records {
            let existing = collection.records.iter_mut().find(|r| {
                r.node_id == record.node_id && r.passage_hash == record.passage_hash
            });
            match existing {
                Some(slot) => slot.vector = record.vector.clone(),
                None => collection.records.push(record.clone()),
            }
        }

        Ok(())
    }

    async fn search(&self, name: &str, vector: &[f32], limit: usize) -> IndexResult<Vec<SearchHit>> {
        let collections = self.collections.read().await;
        let collection = collections
            .get(name)
            .ok_or_else(|| IndexError::CollectionNotFound(name.to_string()))?;

        check_dimension(collection.dimension, vector)?;

        let mut scored: Vec<SearchHit> = collection
            .records
            .iter()
            .map(|record| SearchHit {
                id: record.node_id.clone(),
                score: cosine_similarity(vector, &record.vector),
            })
            .collect();

        // stable: equal scores stay in insertion order; NaN (overflowed cosine) ranks last
        scored.sort_by(|a, b| rank(b.score).total_cmp(&rank(a.score)));

        let mut hits: Vec<SearchHit> = Vec::with_capacity(limit);
        for hit in scored {
            if hits.len() == limit {
                break;
            }
            if !hits.iter().any(|h| h.id == hit.id) {
                hits.push(hit);
            }
        }

        Ok(hits)
    }

    fn tie_break(&self) -> TieBreak {
        TieBreak::InsertionOrder
    }

    async fn health(&self) -> IndexResult<()> {
        Ok(())
    }
}

fn rank(score: f32) -> f32 {
    if score.is_nan() { f32::NEG_INFINITY } else { score }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[derive(Default)]
struct GraphInner {
    nodes: BTreeMap<NodeId, Node>,
    /// canonical entity key -> node id
    keys: HashMap<String, NodeId>,
    relationships: Vec<Relationship>,
    next_id: u64,
}

#[derive(Default)]
pub struct MemoryGraphStore {
    inner: RwLock<GraphInner>,
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop a node and its relationships, leaving any vectors that point at it
    pub async fn remove_node(&self, id: &NodeId) -> bool {
        let mut inner = self.inner.write().await;
        let removed = inner.nodes.remove(id).is_some();
        inner.keys.retain(|_, v| *v != *id);
        inner.relationships.retain(|r| !r.touches(id));
        removed
    }
}

#[async_trait]
impl GraphStore for MemoryGraphStore {
    async fn init_schema(&self) -> IndexResult<()> {
        Ok(())
    }

    async fn ingest(&self, extraction: &ExtractionResult) -> IndexResult<NodeIdMapping> {
        validate_extraction(extraction)?;

        let mut inner = self.inner.write().await;
        let mut mapping = NodeIdMapping::new();

        for entity in &extraction.entities {
            let id = match inner.keys.get(&entity.id) {
                Some(id) => id.clone(),
                None => {
                    inner.next_id += 1;
                    let id = NodeId::new(format!("n{}", inner.next_id));
                    inner.keys.insert(entity.id.clone(), id.clone());
                    id
                }
            };

            let node = inner
                .nodes
                .entry(id.clone())
                .or_insert_with(|| Node::new(id.clone(), entity.entity_type.clone()));
            node.label = entity.entity_type.clone();
            node.properties.extend(entity.node_properties());

            mapping.insert(entity.id.clone(), id);
        }

        for relation in &extraction.relations {
            // validated above, both endpoints are in the mapping
            let (Some(source), Some(target)) = (mapping.get(&relation.source), mapping.get(&relation.target)) else {
                continue;
            };
            let incoming = Relationship {
                rel_type: relation.relation.clone(),
                source: source.clone(),
                target: target.clone(),
                properties: relation.relationship_properties(),
            };

            match inner.relationships.iter_mut().find(|r| r.key() == incoming.key()) {
                Some(existing) => existing.properties.extend(incoming.properties),
                None => inner.relationships.push(incoming),
            }
        }

        Ok(mapping)
    }

    async fn get_node(&self, id: &NodeId) -> IndexResult<Option<Node>> {
        Ok(self.inner.read().await.nodes.get(id).cloned())
    }

    async fn get_neighborhood(&self, id: &NodeId) -> IndexResult<Option<Neighborhood>> {
        let inner = self.inner.read().await;
        let Some(node) = inner.nodes.get(id) else {
            return Ok(None);
        };

        let relationships: Vec<Relationship> = inner
            .relationships
            .iter()
            .filter(|r| r.touches(id))
            .cloned()
            .collect();

        let mut neighbors: Vec<Node> = Vec::new();
        for rel in &relationships {
            let other = if &rel.source == id { &rel.target } else { &rel.source };
            if other == id || neighbors.iter().any(|n| &n.id == other) {
                continue;
            }
            if let Some(neighbor) = inner.nodes.get(other) {
                neighbors.push(neighbor.clone());
            }
        }

        Ok(Some(Neighborhood {
            node: node.clone(),
            neighbors,
            relationships,
        }))
    }

    async fn stats(&self) -> IndexResult<GraphStats> {
        let inner = self.inner.read().await;
        Ok(GraphStats {
            entity_count: inner.nodes.len(),
            relation_count: inner.relationships.len(),
        })
    }

    async fn health(&self) -> IndexResult<()> {
        Ok(())
    }
}

/// Bag-of-words hashing embedder: texts sharing words get similar vectors.
pub struct DeterministicEmbedder {
    dimension: usize,
}

impl DeterministicEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let digest = Sha256::digest(token.to_lowercase().as_bytes());
            let mut bucket = [0u8; 8];
            bucket.copy_from_slice(&digest[..8]);
            let slot = (u64::from_be_bytes(bucket) % self.dimension as u64) as usize;
            vector[slot] += 1.0;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        vector
    }
}

impl Default for DeterministicEmbedder {
    fn default() -> Self {
        Self::new(1536)
    }
}

#[async_trait]
impl Embedder for DeterministicEmbedder {
    async fn embed(&self, texts: &[String]) -> IndexResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}
