use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Scalar property value carried by entities, nodes and relationships.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl PropertyValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Boolean(b) => write!(f, "{}", b),
            PropertyValue::Integer(i) => write!(f, "{}", i),
            PropertyValue::Float(x) => write!(f, "{}", x),
            PropertyValue::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::String(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Integer(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Float(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Boolean(value)
    }
}

pub type Properties = BTreeMap<String, PropertyValue>;

/// An entity as returned by extraction. `id` is local to one extraction batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub properties: Properties,
}

impl Entity {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        entity_type: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            entity_type: entity_type.into(),
            description: String::new(),
            properties: Properties::new(),
        }
    }

    /// Properties as they should be stored on the graph node
    pub fn node_properties(&self) -> Properties {
        let mut properties = self.properties.clone();
        properties.insert("name".to_string(), self.name.clone().into());
        if !self.description.is_empty() {
            properties.insert("description".to_string(), self.description.clone().into());
        }
        properties
    }
}

/// A directed relation between two entities of the same extraction batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub source: String,
    pub target: String,
    pub relation: String,
    #[serde(default)]
    pub evidence: String,
}

impl Relation {
    pub fn new(
        source: impl Into<String>,
        relation: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            relation: relation.into(),
            evidence: String::new(),
        }
    }

    pub fn relationship_properties(&self) -> Properties {
        let mut properties = Properties::new();
        if !self.evidence.is_empty() {
            properties.insert("evidence".to_string(), self.evidence.clone().into());
        }
        properties
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub relations: Vec<Relation>,
}

impl ExtractionResult {
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.relations.is_empty()
    }

    /// Relations whose source or target is not an entity of this batch
    pub fn dangling_relations(&self) -> Vec<&Relation> {
        self.relations
            .iter()
            .filter(|r| !self.has_entity(&r.source) || !self.has_entity(&r.target))
            .collect()
    }

    fn has_entity(&self, id: &str) -> bool {
        self.entities.iter().any(|e| e.id == id)
    }
}

/// Extraction output for one passage, keeping the passage identity with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedPassage {
    pub passage_index: usize,
    pub passage_hash: String,
    pub text: String,
    pub extraction: ExtractionResult,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_llm_shape() {
        let json = r#"{
            "entities": [
                {"id": "E1", "name": "Bob", "type": "PERSON", "description": "engineer"},
                {"id": "E2", "name": "Alpha Project", "type": "PROJECT"}
            ],
            "relations": [
                {"source": "E1", "target": "E2", "relation": "works_on", "evidence": "Bob works on Alpha"}
            ]
        }"#;

        let result: ExtractionResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.entities.len(), 2);
        assert_eq!(result.entities[1].description, "");
        assert_eq!(result.relations[0].relation, "works_on");
        assert!(result.dangling_relations().is_empty());
    }

    #[test]
    fn test_dangling_relations() {
        let result = ExtractionResult {
            entities: vec![Entity::new("bob", "Bob", "Person")],
            relations: vec![
                Relation::new("bob", "KNOWS", "carol"),
                Relation::new("bob", "KNOWS", "bob"),
            ],
        };

        let dangling = result.dangling_relations();
        assert_eq!(dangling.len(), 1);
        assert_eq!(dangling[0].target, "carol");
    }

    #[test]
    fn test_node_properties_include_name() {
        let mut entity = Entity::new("bob", "Bob", "Person");
        entity.description = "engineer".to_string();
        entity.properties.insert("age".to_string(), 42i64.into());

        let props = entity.node_properties();
        assert_eq!(props.get("name"), Some(&PropertyValue::from("Bob")));
        assert_eq!(props.get("description"), Some(&PropertyValue::from("engineer")));
        assert_eq!(props.get("age"), Some(&PropertyValue::Integer(42)));
    }

    #[test]
    fn test_property_value_untagged() {
        let props: Properties =
            serde_json::from_str(r#"{"a": "x", "b": 3, "c": 1.5, "d": true}"#).unwrap();

        assert_eq!(props["a"], PropertyValue::from("x"));
        assert_eq!(props["b"], PropertyValue::Integer(3));
        assert_eq!(props["c"], PropertyValue::Float(1.5));
        assert_eq!(props["d"], PropertyValue::Boolean(true));
    }
}
