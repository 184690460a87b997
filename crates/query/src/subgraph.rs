use index::{Neighborhood, Node, NodeId, Relationship};
use serde::Serialize;
use std::collections::BTreeMap;

/// Nodes deduplicated by id plus the relationships among them.
///
/// Every relationship has both endpoints in `nodes`; inserting one that
/// does not is rejected, and `merge_neighborhood` only keeps edges whose
/// far end was merged too.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Subgraph {
    nodes: BTreeMap<NodeId, Node>,
    relationships: Vec<Relationship>,
}

impl Subgraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from loose parts; relationships with an endpoint outside `nodes` are dropped
    pub fn from_parts(nodes: Vec<Node>, relationships: Vec<Relationship>) -> Self {
        let mut subgraph = Self::new();
        for node in nodes {
            subgraph.insert_node(node);
        }
        for relationship in relationships {
            subgraph.insert_relationship(relationship);
        }
        subgraph
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn relationship_count(&self) -> usize {
        self.relationships.len()
    }

    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Nodes in id order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }

    /// First insert of an id wins; returns false for a duplicate
    pub fn insert_node(&mut self, node: Node) -> bool {
        if self.nodes.contains_key(&node.id) {
            return false;
        }
        self.nodes.insert(node.id.clone(), node);
        true
    }

    /// Returns false for duplicates and for edges leaving the node set
    pub fn insert_relationship(&mut self, relationship: Relationship) -> bool {
        if !self.contains(&relationship.source) || !self.contains(&relationship.target) {
            return false;
        }
        if self.relationships.iter().any(|r| r.key() == relationship.key()) {
            return false;
        }
        self.relationships.push(relationship);
        true
    }

    /// Union a seed's 1-hop neighborhood into this subgraph
    pub fn merge_neighborhood(&mut self, neighborhood: Neighborhood) {
        self.insert_node(neighborhood.node);
        for neighbor in neighborhood.neighbors {
            self.insert_node(neighbor);
        }
        for relationship in neighborhood.relationships {
            self.insert_relationship(relationship);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person(id: &str, name: &str) -> Node {
        Node::new(id, "Person").with_property("name", name)
    }

    #[test]
    fn test_nodes_dedup_by_id() {
        let mut subgraph = Subgraph::new();
        assert!(subgraph.insert_node(person("n1", "Bob")));
        assert!(!subgraph.insert_node(person("n1", "Robert")));

        assert_eq!(subgraph.node_count(), 1);
        let bob = subgraph.node(&NodeId::new("n1")).unwrap();
        assert_eq!(bob.properties["name"].as_str(), Some("Bob"));
    }

    #[test]
    fn test_relationships_need_both_endpoints() {
        let subgraph = Subgraph::from_parts(
            vec![person("n1", "Bob"), person("n2", "Carol")],
            vec![
                Relationship::new("n1", "KNOWS", "n2"),
                Relationship::new("n1", "KNOWS", "n2"),
                Relationship::new("n1", "KNOWS", "n3"),
            ],
        );

        assert_eq!(subgraph.relationship_count(), 1);
    }

    #[test]
    fn test_merge_overlapping_neighborhoods() {
        let bob = person("n1", "Bob");
        let alpha = Node::new("n2", "Project").with_property("name", "Alpha");
        let ny = Node::new("n3", "Location").with_property("name", "New York");
        let works = Relationship::new("n1", "WORKS_ON", "n2");
        let managed = Relationship::new("n2", "MANAGED_FROM", "n3");

        let mut subgraph = Subgraph::new();
        subgraph.merge_neighborhood(Neighborhood {
            node: bob.clone(),
            neighbors: vec![alpha.clone()],
            relationships: vec![works.clone()],
        });
        subgraph.merge_neighborhood(Neighborhood {
            node: alpha,
            neighbors: vec![bob, ny],
            relationships: vec![works, managed],
        });

        assert_eq!(subgraph.node_count(), 3);
        assert_eq!(subgraph.relationship_count(), 2);
    }

    #[test]
    fn test_empty() {
        assert!(Subgraph::new().is_empty());
        assert!(Subgraph::from_parts(vec![], vec![Relationship::new("a", "R", "b")]).is_empty());
    }
}
