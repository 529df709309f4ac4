use crate::error::SynthError;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum GraphError {
    #[error("Circular dependency detected: {0}")]
    Cycle(String),
}

impl From<GraphError> for SynthError {
    fn from(err: GraphError) -> Self {
        match err {
            GraphError::Cycle(node) => SynthError::Cycle(node),
        }
    }
}

/// Dependency graph over resource URNs (or any other string keys).
#[derive(Default)]
pub struct ExecutionDag {
    graph: DiGraph<String, ()>,
    node_map: HashMap<String, NodeIndex>,
}

impl ExecutionDag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, name: impl Into<String>) -> NodeIndex {
        let name = name.into();
        if let Some(&idx) = self.node_map.get(&name) {
            idx
        } else {
            let idx = self.graph.add_node(name.clone());
            self.node_map.insert(name, idx);
            idx
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.node_map.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// `from` depends on `to`: `to` is provisioned first.
    pub fn add_dependency(&mut self, from: &str, to: &str) {
        let from_idx = self.add_node(from);
        let to_idx = self.add_node(to);

        if self.graph.find_edge(to_idx, from_idx).is_none() {
            self.graph.add_edge(to_idx, from_idx, ());
        }
    }

    /// Fails on the first cycle without computing an order.
    pub fn check_acyclic(&self) -> Result<(), GraphError> {
        toposort(&self.graph, None)
            .map(|_| ())
            .map_err(|cycle| GraphError::Cycle(self.graph[cycle.node_id()].clone()))
    }

    /// Linear provisioning order; ties broken by name so the order is stable.
    pub fn resolve(&self) -> Result<Vec<String>, GraphError> {
        Ok(self.resolve_batched()?.into_iter().flatten().collect())
    }

    /// Teardown order: dependents before what they depend on.
    pub fn resolve_reversed(&self) -> Result<Vec<String>, GraphError> {
        let mut order = self.resolve()?;
        order.reverse();
        Ok(order)
    }

    /// Layers of nodes whose dependencies are all in earlier layers. Each layer
    /// is sorted.
    pub fn resolve_batched(&self) -> Result<Vec<Vec<String>>, GraphError> {
        let mut batches = Vec::new();
        let mut in_degrees: HashMap<NodeIndex, usize> = self
            .graph
            .node_indices()
            .map(|idx| {
                (
                    idx,
                    self.graph.edges_directed(idx, Direction::Incoming).count(),
                )
            })
            .collect();

        while !in_degrees.is_empty() {
            let current_batch: Vec<NodeIndex> = in_degrees
                .iter()
                .filter(|(_, &deg)| deg == 0)
                .map(|(&idx, _)| idx)
                .collect();

            if current_batch.is_empty() {
                // Report the smallest remaining name so the error is stable.
                let mut remaining: Vec<&String> = in_degrees.keys().map(|idx| &self.graph[*idx]).collect();
                remaining.sort();
                let node = remaining.first().map(|n| n.to_string()).unwrap_or_default();
                return Err(GraphError::Cycle(node));
            }

            let mut batch_names = Vec::new();
            for &node_idx in &current_batch {
                batch_names.push(self.graph[node_idx].clone());

                for neighbor in self.graph.neighbors_directed(node_idx, Direction::Outgoing) {
                    if let Some(deg) = in_degrees.get_mut(&neighbor) {
                        *deg -= 1;
                    }
                }
                in_degrees.remove(&node_idx);
            }

            batch_names.sort();
            batches.push(batch_names);
        }

        Ok(batches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_dag() {
        let mut dag = ExecutionDag::new();
        dag.add_dependency("Api", "ApiRole");
        dag.add_dependency("ApiRole", "Uploads");

        assert_eq!(dag.resolve().unwrap(), vec!["Uploads", "ApiRole", "Api"]);
        assert_eq!(dag.resolve_reversed().unwrap(), vec!["Api", "ApiRole", "Uploads"]);
        assert_eq!(
            dag.resolve_batched().unwrap(),
            vec![vec!["Uploads"], vec!["ApiRole"], vec!["Api"]]
        );
    }

    #[test]
    fn test_parallel_layers_are_sorted() {
        let mut dag = ExecutionDag::new();
        dag.add_dependency("Site", "Queue");
        dag.add_dependency("Site", "Bucket");
        dag.add_dependency("Queue", "Key");
        dag.add_dependency("Bucket", "Key");

        let batched = dag.resolve_batched().unwrap();
        assert_eq!(batched, vec![vec!["Key"], vec!["Bucket", "Queue"], vec!["Site"]]);
    }

    #[test]
    fn test_independent_nodes() {
        let mut dag = ExecutionDag::new();
        dag.add_node("B");
        dag.add_node("A");
        assert_eq!(dag.resolve().unwrap(), vec!["A", "B"]);
    }

    #[test]
    fn test_cycle() {
        let mut dag = ExecutionDag::new();
        dag.add_dependency("A", "B");
        dag.add_dependency("B", "A");

        assert!(dag.check_acyclic().is_err());
        assert_eq!(dag.resolve_batched(), Err(GraphError::Cycle("A".into())));
        assert_eq!(SynthError::from(GraphError::Cycle("A".into())), SynthError::Cycle("A".into()));
    }
}
