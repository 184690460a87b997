use index::{Node, NodeId};

use crate::subgraph::Subgraph;

/// Returned instead of an empty string when nothing was retrieved
pub const NO_CONTEXT: &str = "No relevant context found.";
pub const TRUNCATION_MARKER: &str = "[context truncated]";
pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 4000;

/// Property keys tried in order when naming a node
const KEY_PROPERTIES: [&str; 3] = ["name", "title", "id"];

/// Renders a subgraph as one line per relationship, for use in an LLM prompt.
///
/// Output is deterministic: relationship lines are sorted by type and then by
/// endpoint labels, nodes without relationships follow sorted by label. The
/// result never exceeds `max_chars` bytes; when it would, whole lines are
/// dropped from the end and [`TRUNCATION_MARKER`] is appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextFormatter {
    max_chars: usize,
}

impl Default for ContextFormatter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONTEXT_CHARS)
    }
}

impl ContextFormatter {
    /// `max_chars` below the marker length is raised to it
    pub fn new(max_chars: usize) -> Self {
        Self {
            max_chars: max_chars.max(TRUNCATION_MARKER.len()),
        }
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    pub fn format(&self, subgraph: &Subgraph) -> String {
        if subgraph.is_empty() {
            return NO_CONTEXT.to_string();
        }
        self.fit(&render_lines(subgraph))
    }

    fn fit(&self, lines: &[String]) -> String {
        let full = lines.join("\n");
        if full.len() <= self.max_chars {
            return full;
        }

        // Each kept line is followed by a newline, then the marker
        let budget = self.max_chars - TRUNCATION_MARKER.len();
        let mut out = String::with_capacity(self.max_chars);
        for line in lines {
            if out.len() + line.len() + 1 > budget {
                break;
            }
            out.push_str(line);
            out.push('\n');
        }
        out.push_str(TRUNCATION_MARKER);
        out
    }
}

/// Format with the default size bound
pub fn format_graph_context(subgraph: &Subgraph) -> String {
    ContextFormatter::default().format(subgraph)
}

/// `Type(key)`: key is the first of `name`, `title`, `id` present, else the node id
pub fn node_label(node: &Node) -> String {
    let key = KEY_PROPERTIES
        .iter()
        .find_map(|k| node.properties.get(*k))
        .map(|value| value.to_string())
        .unwrap_or_else(|| node.id.to_string());

    let label = if node.label.trim().is_empty() {
        "Unknown"
    } else {
        node.label.as_str()
    };

    single_line(&format!("{label}({key})"))
}

fn unknown_label(id: &NodeId) -> String {
    single_line(&format!("Unknown({id})"))
}

fn single_line(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect()
}

fn render_lines(subgraph: &Subgraph) -> Vec<String> {
    let label_of = |id: &NodeId| {
        subgraph
            .node(id)
            .map(node_label)
            .unwrap_or_else(|| unknown_label(id))
    };

    let mut edges: Vec<_> = subgraph
        .relationships()
        .iter()
        .map(|rel| {
            (
                single_line(&rel.rel_type),
                label_of(&rel.source),
                label_of(&rel.target),
                &rel.source,
                &rel.target,
            )
        })
        .collect();
    edges.sort();

    let mut isolated: Vec<_> = subgraph
        .nodes()
        .filter(|node| !subgraph.relationships().iter().any(|rel| rel.touches(&node.id)))
        .map(|node| (node_label(node), &node.id))
        .collect();
    isolated.sort();

    edges
        .into_iter()
        .map(|(rel_type, source, target, _, _)| format!("{source} -[{rel_type}]-> {target}"))
        .chain(
            isolated
                .into_iter()
                .map(|(label, _)| format!("{label} (no recorded relationships)")),
        )
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use index::Relationship;

    fn sample() -> Subgraph {
        Subgraph::from_parts(
            vec![
                Node::new("n1", "Person").with_property("name", "Bob"),
                Node::new("n2", "Project").with_property("name", "AlphaProject"),
                Node::new("n3", "Location").with_property("name", "NewYorkOffice"),
            ],
            vec![
                Relationship::new("n1", "WORKS_ON", "n2"),
                Relationship::new("n2", "MANAGED_FROM", "n3"),
            ],
        )
    }

    #[test]
    fn test_empty_subgraph_gives_sentinel() {
        assert_eq!(format_graph_context(&Subgraph::new()), NO_CONTEXT);
    }

    #[test]
    fn test_relationship_lines_sorted_by_type() {
        let context = format_graph_context(&sample());
        assert_eq!(
            context,
            "Project(AlphaProject) -[MANAGED_FROM]-> Location(NewYorkOffice)\n\
             Person(Bob) -[WORKS_ON]-> Project(AlphaProject)"
        );
    }

    #[test]
    fn test_isolated_nodes_follow_relationships() {
        let subgraph = Subgraph::from_parts(
            vec![
                Node::new("n1", "Person").with_property("name", "Bob"),
                Node::new("n2", "Project").with_property("name", "Alpha"),
                Node::new("n9", "Person").with_property("name", "Alice"),
            ],
            vec![Relationship::new("n1", "WORKS_ON", "n2")],
        );

        let context = format_graph_context(&subgraph);
        let lines: Vec<&str> = context.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Person(Bob) -[WORKS_ON]-> Project(Alpha)",
                "Person(Alice) (no recorded relationships)",
            ]
        );
    }

    #[test]
    fn test_single_node() {
        let subgraph = Subgraph::from_parts(vec![Node::new("n1", "Person").with_property("name", "Bob")], vec![]);
        assert_eq!(format_graph_context(&subgraph), "Person(Bob) (no recorded relationships)");
    }

    #[test]
    fn test_node_label_fallbacks() {
        let titled = Node::new("n1", "Document").with_property("title", "Q3 Report");
        let keyed = Node::new("n2", "Thing").with_property("id", 42i64);
        let bare = Node::new("n3", "");
        let named = Node::new("n4", "Person")
            .with_property("id", "p-4")
            .with_property("name", "Dana");

        assert_eq!(node_label(&titled), "Document(Q3 Report)");
        assert_eq!(node_label(&keyed), "Thing(42)");
        assert_eq!(node_label(&bare), "Unknown(n3)");
        assert_eq!(node_label(&named), "Person(Dana)");
    }

    #[test]
    fn test_labels_stay_on_one_line() {
        let node = Node::new("n1", "Person").with_property("name", "Bob\nSmith");
        assert_eq!(node_label(&node), "Person(Bob Smith)");
    }

    #[test]
    fn test_deterministic_across_insertion_order() {
        let a = sample();
        let b = Subgraph::from_parts(
            vec![
                Node::new("n3", "Location").with_property("name", "NewYorkOffice"),
                Node::new("n2", "Project").with_property("name", "AlphaProject"),
                Node::new("n1", "Person").with_property("name", "Bob"),
            ],
            vec![
                Relationship::new("n2", "MANAGED_FROM", "n3"),
                Relationship::new("n1", "WORKS_ON", "n2"),
            ],
        );

        assert_eq!(format_graph_context(&a), format_graph_context(&b));
    }

    #[test]
    fn test_truncation_keeps_whole_lines() {
        let nodes: Vec<Node> = (0..50)
            .map(|i| Node::new(format!("n{i:02}"), "Person").with_property("name", format!("Person{i:02}")))
            .collect();
        let relationships: Vec<Relationship> = (1..50)
            .map(|i| Relationship::new("n00", "KNOWS", format!("n{i:02}")))
            .collect();
        let subgraph = Subgraph::from_parts(nodes, relationships);

        let formatter = ContextFormatter::new(200);
        let context = formatter.format(&subgraph);

        assert!(context.len() <= 200);
        assert!(context.ends_with(TRUNCATION_MARKER));
        for line in context.lines().filter(|l| *l != TRUNCATION_MARKER) {
            assert!(line.starts_with("Person(Person00) -[KNOWS]-> Person(Person"));
            assert!(line.ends_with(')'));
        }
    }

    #[test]
    fn test_fits_without_marker() {
        let subgraph = sample();
        let full = format_graph_context(&subgraph);
        assert_eq!(ContextFormatter::new(full.len()).format(&subgraph), full);
    }

    #[test]
    fn test_tiny_bound_gives_marker_only() {
        let formatter = ContextFormatter::new(1);
        assert_eq!(formatter.max_chars(), TRUNCATION_MARKER.len());
        assert_eq!(formatter.format(&sample()), TRUNCATION_MARKER);
    }
}
