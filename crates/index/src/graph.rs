use extract::Properties;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Store-assigned node identifier. Opaque to everything but the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    /// Type label such as `Person` or `Location`
    pub label: String,
    pub properties: Properties,
}

impl Node {
    pub fn new(id: impl Into<NodeId>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            properties: Properties::new(),
        }
    }

    pub fn with_property(mut self, key: &str, value: impl Into<extract::PropertyValue>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub rel_type: String,
    pub source: NodeId,
    pub target: NodeId,
    #[serde(default)]
    pub properties: Properties,
}

impl Relationship {
    pub fn new(source: impl Into<NodeId>, rel_type: impl Into<String>, target: impl Into<NodeId>) -> Self {
        Self {
            rel_type: rel_type.into(),
            source: source.into(),
            target: target.into(),
            properties: Properties::new(),
        }
    }

    /// Identity used for deduplication: parallel edges of one type collapse
    pub fn key(&self) -> (&NodeId, &str, &NodeId) {
        (&self.source, &self.rel_type, &self.target)
    }

    pub fn touches(&self, id: &NodeId) -> bool {
        &self.source == id || &self.target == id
    }
}

/// A node, its direct neighbors and the relationships connecting them.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighborhood {
    pub node: Node,
    pub neighbors: Vec<Node>,
    pub relationships: Vec<Relationship>,
}

/// Extractor-local ids to store-assigned ids, produced by one ingest call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeIdMapping {
    ids: BTreeMap<String, NodeId>,
}

impl NodeIdMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, local_id: impl Into<String>, node_id: NodeId) {
        self.ids.insert(local_id.into(), node_id);
    }

    pub fn get(&self, local_id: &str) -> Option<&NodeId> {
        self.ids.get(local_id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &NodeId)> {
        self.ids.iter()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    pub entity_count: usize,
    pub relation_count: usize,
}

/// One embedded passage attached to one graph node.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorRecord {
    pub node_id: NodeId,
    pub passage_hash: String,
    pub vector: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub id: NodeId,
    pub score: f32,
}

/// How a vector store orders hits with equal scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Equal scores keep the order in which records were first upserted
    InsertionOrder,
    /// The store gives no guarantee; equal scores may come back in any order
    Unspecified,
}
