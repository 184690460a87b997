use async_trait::async_trait;
use extract::ExtractionResult;

use crate::error::{IndexError, IndexResult};
use crate::graph::{GraphStats, Neighborhood, Node, NodeId, NodeIdMapping, SearchHit, TieBreak, VectorRecord};

/// Named collections of fixed-dimension vectors keyed by graph node id.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create the collection if missing; an existing one must have `dimension`
    async fn ensure_collection(&self, name: &str, dimension: usize) -> IndexResult<()>;

    /// Vector length of an existing collection
    async fn dimension(&self, name: &str) -> IndexResult<usize>;

    async fn upsert(&self, name: &str, records: &[VectorRecord]) -> IndexResult<()>;

    /// Up to `limit` distinct node ids, best score first
    async fn search(&self, name: &str, vector: &[f32], limit: usize) -> IndexResult<Vec<SearchHit>>;

    fn tie_break(&self) -> TieBreak;

    async fn health(&self) -> IndexResult<()>;
}

/// Property graph of extracted entities.
#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn init_schema(&self) -> IndexResult<()>;

    /// Merge entities and relations; returns local id -> store id for every entity
    async fn ingest(&self, extraction: &ExtractionResult) -> IndexResult<NodeIdMapping>;

    async fn get_node(&self, id: &NodeId) -> IndexResult<Option<Node>>;

    /// `None` when the node does not exist
    async fn get_neighborhood(&self, id: &NodeId) -> IndexResult<Option<Neighborhood>>;

    async fn stats(&self) -> IndexResult<GraphStats>;

    async fn health(&self) -> IndexResult<()>;
}

/// Text to fixed-length vectors, one per input, in input order.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: &[String]) -> IndexResult<Vec<Vec<f32>>>;
}

/// Reject batches that would write relationships to unknown nodes
pub fn validate_extraction(extraction: &ExtractionResult) -> IndexResult<()> {
    if let Some(entity) = extraction.entities.iter().find(|e| e.id.trim().is_empty()) {
        return Err(IndexError::InvalidArgument(format!(
            "entity '{}' has an empty id",
            entity.name
        )));
    }

    if let Some(relation) = extraction.dangling_relations().first() {
        return Err(IndexError::InvalidArgument(format!(
            "relation {} -[{}]-> {} references an unknown entity",
            relation.source, relation.relation, relation.target
        )));
    }

    Ok(())
}

/// Vector length and finiteness check shared by the stores
pub fn check_dimension(expected: usize, vector: &[f32]) -> IndexResult<()> {
    if vector.len() != expected {
        return Err(IndexError::DimensionMismatch {
            expected,
            actual: vector.len(),
        });
    }
    if let Some(position) = vector.iter().position(|x| !x.is_finite()) {
        return Err(IndexError::InvalidArgument(format!(
            "vector component {} is not finite",
            position
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use extract::{Entity, Relation};

    #[test]
    fn test_validate_extraction() {
        let mut extraction = ExtractionResult {
            entities: vec![Entity::new("bob", "Bob", "Person")],
            relations: vec![Relation::new("bob", "KNOWS", "bob")],
        };
        assert!(validate_extraction(&extraction).is_ok());

        extraction.relations.push(Relation::new("bob", "KNOWS", "ghost"));
        let err = validate_extraction(&extraction).unwrap_err();
        assert!(matches!(err, IndexError::InvalidArgument(msg) if msg.contains("ghost")));
    }

    #[test]
    fn test_check_dimension() {
        assert!(check_dimension(2, &[0.1, 0.2]).is_ok());
        assert!(matches!(
            check_dimension(3, &[0.1]),
            Err(IndexError::DimensionMismatch { expected: 3, actual: 1 })
        ));
        assert!(matches!(
            check_dimension(2, &[f32::NAN, 1.0]),
            Err(IndexError::InvalidArgument(_))
        ));
        assert!(matches!(
            check_dimension(2, &[0.5, f32::INFINITY]),
            Err(IndexError::InvalidArgument(_))
        ));
    }
}
