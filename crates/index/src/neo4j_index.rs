use async_trait::async_trait;
use extract::{ExtractionResult, Properties};
use neo4rs::{Graph, Query, Row};

use crate::error::{IndexError, IndexResult};
use crate::graph::{GraphStats, Neighborhood, Node, NodeId, NodeIdMapping, Relationship};
use crate::store::{GraphStore, validate_extraction};

const SERVICE: &str = "neo4j";

/// Graph store over Bolt. Entities are `:Entity` nodes merged on `key`;
/// the node type and property map are stored as `type` and a JSON string.
pub struct Neo4jStore {
    graph: Graph,
}

impl Neo4jStore {
    pub fn new(graph: Graph) -> Self {
        Self { graph }
    }

    pub async fn connect(uri: &str, user: &str, password: &str) -> IndexResult<Self> {
        let graph = Graph::new(uri, user, password)
            .await
            .map_err(classify)?;
        tracing::info!(uri, "Connected to Neo4j");
        Ok(Self::new(graph))
    }

    async fn run(&self, query: Query) -> IndexResult<()> {
        self.graph
            .run(query)
            .await
            .map_err(classify)
    }

    async fn rows(&self, query: Query) -> IndexResult<Vec<Row>> {
        let mut result = self
            .graph
            .execute(query)
            .await
            .map_err(classify)?;

        let mut rows = Vec::new();
        while let Some(row) = result
            .next()
            .await
            .map_err(classify)?
        {
            rows.push(row);
        }
        Ok(rows)
    }

    async fn count(&self, cypher: &str) -> IndexResult<usize> {
        let rows = self.rows(Query::new(cypher.to_string())).await?;
        Ok(rows
            .first()
            .and_then(|row| row.get::<i64>("count").ok())
            .unwrap_or(0) as usize)
    }
}

/// Connection loss and Neo4j transient codes are retryable; syntax, constraint
/// and auth failures are not.
fn classify(err: neo4rs::Error) -> IndexError {
    match &err {
        neo4rs::Error::IOError { .. } | neo4rs::Error::ConnectionError => {
            IndexError::unavailable(SERVICE, err)
        }
        // server failures only surface as the debug text of the FAILURE message
        neo4rs::Error::UnexpectedMessage(msg) if msg.contains("Neo.TransientError") => {
            IndexError::unavailable(SERVICE, err)
        }
        _ => IndexError::backend(SERVICE, err),
    }
}

fn column<T: serde::de::DeserializeOwned>(row: &Row, key: &str) -> IndexResult<T> {
    row.get::<T>(key)
        .map_err(|e| IndexError::backend(SERVICE, format!("column '{}': {}", key, e)))
}

fn to_json(properties: &Properties) -> IndexResult<String> {
    serde_json::to_string(properties).map_err(|e| IndexError::backend(SERVICE, e))
}

/// Properties are written by this store as JSON; anything else is treated as empty
fn parse_properties(raw: Option<String>) -> Properties {
    raw.and_then(|json| serde_json::from_str(&json).ok())
        .unwrap_or_default()
}

fn node_from_row(row: &Row, prefix: &str, id: NodeId) -> Node {
    let label: String = row
        .get(&format!("{}type", prefix))
        .unwrap_or_else(|_| "Unknown".to_string());
    let mut properties = parse_properties(row.get(&format!("{}properties", prefix)).ok());

    if !properties.contains_key("name") {
        if let Ok(name) = row.get::<String>(&format!("{}name", prefix)) {
            properties.insert("name".to_string(), name.into());
        }
    }

    Node {
        id,
        label,
        properties,
    }
}

#[async_trait]
impl GraphStore for Neo4jStore {
    /// Initialize schema: create indexes
    async fn init_schema(&self) -> IndexResult<()> {
        self.run(Query::new(
            "CREATE INDEX entity_key_index IF NOT EXISTS FOR (e:Entity) ON (e.key)".to_string(),
        ))
        .await?;

        self.run(Query::new(
            "CREATE INDEX entity_name_index IF NOT EXISTS FOR (e:Entity) ON (e.name)".to_string(),
        ))
        .await?;

        tracing::info!("Neo4j indexes created");
        Ok(())
    }

    async fn ingest(&self, extraction: &ExtractionResult) -> IndexResult<NodeIdMapping> {
        validate_extraction(extraction)?;

        let mut mapping = NodeIdMapping::new();

        for entity in &extraction.entities {
            let query = Query::new(
                r#"
                MERGE (e:Entity {key: $key})
                SET e.name = $name,
                    e.type = $type,
                    e.properties = $properties
                RETURN elementId(e) AS id
                "#
                .to_string(),
            )
            .param("key", entity.id.clone())
            .param("name", entity.name.clone())
            .param("type", entity.entity_type.clone())
            .param("properties", to_json(&entity.node_properties())?);

            let rows = self.rows(query).await?;
            let row = rows
                .first()
                .ok_or_else(|| IndexError::backend(SERVICE, "MERGE returned no row"))?;
            mapping.insert(entity.id.clone(), NodeId::new(column::<String>(row, "id")?));
        }

        for relation in &extraction.relations {
            let (Some(source), Some(target)) =
                (mapping.get(&relation.source), mapping.get(&relation.target))
            else {
                continue;
            };

            let query = Query::new(
                r#"
                MATCH (source:Entity) WHERE elementId(source) = $source_id
                MATCH (target:Entity) WHERE elementId(target) = $target_id
                MERGE (source)-[r:RELATION {type: $relation_type}]->(target)
                SET r.properties = $properties
                "#
                .to_string(),
            )
            .param("source_id", source.as_str().to_string())
            .param("target_id", target.as_str().to_string())
            .param("relation_type", relation.relation.clone())
            .param("properties", to_json(&relation.relationship_properties())?);

            self.run(query).await?;
        }

        tracing::debug!(
            entities = extraction.entities.len(),
            relations = extraction.relations.len(),
            "Ingested extraction into Neo4j"
        );
        Ok(mapping)
    }

    async fn get_node(&self, id: &NodeId) -> IndexResult<Option<Node>> {
        let query = Query::new(
            r#"
            MATCH (e:Entity) WHERE elementId(e) = $id
            RETURN e.type AS type, e.properties AS properties, e.name AS name
            "#
            .to_string(),
        )
        .param("id", id.as_str().to_string());

        let rows = self.rows(query).await?;
        Ok(rows.first().map(|row| node_from_row(row, "", id.clone())))
    }

    async fn get_neighborhood(&self, id: &NodeId) -> IndexResult<Option<Neighborhood>> {
        let Some(node) = self.get_node(id).await? else {
            return Ok(None);
        };

        let query = Query::new(
            r#"
            MATCH (e:Entity)-[r:RELATION]-(n:Entity) WHERE elementId(e) = $id
            RETURN elementId(n) AS neighbor_id,
                   n.type AS neighbor_type,
                   n.properties AS neighbor_properties,
                   n.name AS neighbor_name,
                   r.type AS relation_type,
                   r.properties AS relation_properties,
                   elementId(startNode(r)) AS source_id,
                   elementId(endNode(r)) AS target_id
            "#
            .to_string(),
        )
        .param("id", id.as_str().to_string());

        let mut neighbors: Vec<Node> = Vec::new();
        let mut relationships: Vec<Relationship> = Vec::new();

        for row in self.rows(query).await? {
            let neighbor_id = NodeId::new(column::<String>(&row, "neighbor_id")?);
            let relationship = Relationship {
                rel_type: column(&row, "relation_type")?,
                source: NodeId::new(column::<String>(&row, "source_id")?),
                target: NodeId::new(column::<String>(&row, "target_id")?),
                properties: parse_properties(row.get("relation_properties").ok()),
            };

            if !relationships.iter().any(|r| r.key() == relationship.key()) {
                relationships.push(relationship);
            }
            if &neighbor_id != id && !neighbors.iter().any(|n| n.id == neighbor_id) {
                neighbors.push(node_from_row(&row, "neighbor_", neighbor_id));
            }
        }

        Ok(Some(Neighborhood {
            node,
            neighbors,
            relationships,
        }))
    }

    /// Get graph statistics
    async fn stats(&self) -> IndexResult<GraphStats> {
        let entity_count = self
            .count("MATCH (e:Entity) RETURN count(e) as count")
            .await?;
        let relation_count = self
            .count("MATCH ()-[r:RELATION]->() RETURN count(r) as count")
            .await?;

        Ok(GraphStats {
            entity_count,
            relation_count,
        })
    }

    async fn health(&self) -> IndexResult<()> {
        self.run(neo4rs::query("RETURN 1")).await
    }
}
