use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use std::collections::HashMap;

/// What happened to the edge between two URLs when a link was recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkUpdate {
    /// First time the pair was seen, edge created with weight 1
    Created,
    /// Pair already connected, weight bumped to the contained value
    Reweighted(u32),
}

/// Undirected link graph keyed by exact URL strings.
///
/// Each unordered pair of URLs has at most one edge whose weight counts how many
/// times a link between the two was observed. Nodes and edges are never removed,
/// so petgraph indices follow insertion order for the whole lifetime of the graph.
#[derive(Debug, Default)]
pub struct WeightedGraph {
    graph: UnGraph<String, u32>,
    nodes: HashMap<String, NodeIndex>,
}

impl WeightedGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn node(&mut self, url: &str) -> NodeIndex {
        if let Some(idx) = self.nodes.get(url) {
            return *idx;
        }
        let idx = self.graph.add_node(url.to_string());
        self.nodes.insert(url.to_string(), idx);
        idx
    }

    /// Records one observed link `from -- to`
    pub fn add_link(&mut self, from: &str, to: &str) -> LinkUpdate {
        let a = self.node(from);
        let b = self.node(to);

        match self.graph.find_edge(a, b) {
            Some(edge) => {
                let weight = &mut self.graph[edge];
                *weight += 1;
                LinkUpdate::Reweighted(*weight)
            }
            None => {
                self.graph.add_edge(a, b, 1);
                LinkUpdate::Created
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn contains(&self, url: &str) -> bool {
        self.nodes.contains_key(url)
    }

    /// Weight of the edge between `a` and `b` in either direction
    pub fn weight(&self, a: &str, b: &str) -> Option<u32> {
        let a = *self.nodes.get(a)?;
        let b = *self.nodes.get(b)?;
        self.graph.find_edge(a, b).map(|edge| self.graph[edge])
    }

    /// Node URLs in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.graph.node_indices().map(move |idx| self.graph[idx].as_str())
    }

    /// Edges as `(endpoint, endpoint, weight)` in insertion order
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str, u32)> {
        self.graph.edge_references().map(move |edge| {
            (
                self.graph[edge.source()].as_str(),
                self.graph[edge.target()].as_str(),
                *edge.weight(),
            )
        })
    }
}
