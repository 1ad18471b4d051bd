// SPDX-License-Identifier: MIT

//! DAG declaration and validation

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use super::executor::{CompiledGraph, CompiledNode};
use super::types::Node;
use crate::adk::error::GraphConfigError;

struct Declared {
    name: String,
    node: Arc<dyn Node>,
    depends_on: Vec<String>,
}

/// A task graph under construction.
///
/// Nodes are declared with `register` and may gain extra edges through
/// `add_dependency`. Both reject edges that would close a cycle, so the
/// declared graph is acyclic at every step.
#[derive(Default)]
pub struct TaskGraph {
    nodes: Vec<Declared>,
    index: HashMap<String, usize>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a node and the nodes it depends on.
    ///
    /// Dependencies must already be registered.
    pub fn register(
        &mut self,
        name: &str,
        node: Arc<dyn Node>,
        dependencies: &[&str],
    ) -> Result<(), GraphConfigError> {
        if self.index.contains_key(name) {
            return Err(GraphConfigError::DuplicateNode(name.to_string()));
        }

        let mut depends_on: Vec<String> = Vec::with_capacity(dependencies.len());
        for dep in dependencies {
            if *dep == name {
                return Err(GraphConfigError::Cycle(vec![
                    name.to_string(),
                    name.to_string(),
                ]));
            }
            if !self.index.contains_key(*dep) {
                return Err(GraphConfigError::UnknownDependency {
                    node: name.to_string(),
                    dependency: dep.to_string(),
                });
            }
            if !depends_on.iter().any(|d| d == dep) {
                depends_on.push(dep.to_string());
            }
        }

        self.index.insert(name.to_string(), self.nodes.len());
        self.nodes.push(Declared {
            name: name.to_string(),
            node,
            depends_on,
        });
        Ok(())
    }

    /// Add an edge between two registered nodes: `node` will wait for `dependency`.
    pub fn add_dependency(&mut self, node: &str, dependency: &str) -> Result<(), GraphConfigError> {
        let node_idx = *self
            .index
            .get(node)
            .ok_or_else(|| GraphConfigError::UnknownNode(node.to_string()))?;
        if !self.index.contains_key(dependency) {
            return Err(GraphConfigError::UnknownDependency {
                node: node.to_string(),
                dependency: dependency.to_string(),
            });
        }

        if node == dependency {
            return Err(GraphConfigError::Cycle(vec![
                node.to_string(),
                node.to_string(),
            ]));
        }
        if let Some(path) = self.dependency_path(dependency, node) {
            let mut cycle = Vec::with_capacity(path.len() + 1);
            cycle.push(node.to_string());
            cycle.extend(path);
            return Err(GraphConfigError::Cycle(cycle));
        }

        let deps = &mut self.nodes[node_idx].depends_on;
        if !deps.iter().any(|d| d == dependency) {
            deps.push(dependency.to_string());
        }
        Ok(())
    }

    /// Path `from -> ... -> to` following dependency edges, if `from` depends on `to`
    fn dependency_path(&self, from: &str, to: &str) -> Option<Vec<String>> {
        let mut stack: Vec<Vec<&str>> = vec![vec![from]];
        let mut seen: HashSet<&str> = HashSet::new();

        while let Some(path) = stack.pop() {
            let current = *path.last()?;
            if current == to {
                return Some(path.into_iter().map(str::to_string).collect());
            }
            if !seen.insert(current) {
                continue;
            }
            let declared = &self.nodes[self.index[current]];
            for dep in &declared.depends_on {
                let mut next = path.clone();
                next.push(dep.as_str());
                stack.push(next);
            }
        }
        None
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Validate write declarations and freeze the graph
    pub fn build(self) -> Result<CompiledGraph, GraphConfigError> {
        if self.nodes.is_empty() {
            return Err(GraphConfigError::Empty);
        }

        let order = self.topological_order();

        let mut ancestors: HashMap<&str, HashSet<&str>> = HashMap::new();
        for &idx in &order {
            let declared = &self.nodes[idx];
            let mut set: HashSet<&str> = HashSet::new();
            for dep in &declared.depends_on {
                set.insert(dep.as_str());
                if let Some(inherited) = ancestors.get(dep.as_str()) {
                    set.extend(inherited.iter().copied());
                }
            }
            ancestors.insert(declared.name.as_str(), set);
        }

        // Any two writers of one key must be ordered by the graph
        let mut writers: HashMap<&str, Vec<&str>> = HashMap::new();
        for &idx in &order {
            let declared = &self.nodes[idx];
            for &key in declared.node.writes() {
                let previous = writers.entry(key).or_default();
                for earlier in previous.iter() {
                    if !ancestors[declared.name.as_str()].contains(earlier) {
                        return Err(GraphConfigError::ConflictingWrites {
                            key: key.to_string(),
                            first: earlier.to_string(),
                            second: declared.name.clone(),
                        });
                    }
                }
                previous.push(declared.name.as_str());
            }
        }

        let mut slots: Vec<Option<Declared>> = self.nodes.into_iter().map(Some).collect();
        let compiled = order
            .into_iter()
            .filter_map(|idx| slots[idx].take())
            .map(|d| CompiledNode {
                id: d.name,
                node: d.node,
                depends_on: d.depends_on,
            })
            .collect();

        Ok(CompiledGraph::new(compiled))
    }

    /// Kahn's algorithm, breaking ties by registration order
    fn topological_order(&self) -> Vec<usize> {
        let mut remaining: Vec<usize> = self.nodes.iter().map(|d| d.depends_on.len()).collect();
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); self.nodes.len()];
        for (idx, declared) in self.nodes.iter().enumerate() {
            for dep in &declared.depends_on {
                dependents[self.index[dep.as_str()]].push(idx);
            }
        }

        let mut ready: VecDeque<usize> = (0..self.nodes.len())
            .filter(|&i| remaining[i] == 0)
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(idx) = ready.pop_front() {
            order.push(idx);
            for &next in &dependents[idx] {
                remaining[next] -= 1;
                if remaining[next] == 0 {
                    ready.push_back(next);
                }
            }
        }
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::error::ReportError;
    use crate::submarket::state::{ReportState, StateUpdate};
    use async_trait::async_trait;

    struct Writes(&'static [&'static str]);

    #[async_trait]
    impl Node for Writes {
        fn writes(&self) -> &[&'static str] {
            self.0
        }

        async fn run(&self, _state: &ReportState) -> Result<StateUpdate, ReportError> {
            Ok(StateUpdate::new())
        }
    }

    fn noop() -> Arc<dyn Node> {
        Arc::new(Writes(&[]))
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let mut graph = TaskGraph::new();
        graph.register("a", noop(), &[]).unwrap();
        assert_eq!(
            graph.register("a", noop(), &[]),
            Err(GraphConfigError::DuplicateNode("a".to_string()))
        );
    }

    #[test]
    fn test_register_rejects_unknown_dependency() {
        let mut graph = TaskGraph::new();
        assert_eq!(
            graph.register("b", noop(), &["a"]),
            Err(GraphConfigError::UnknownDependency {
                node: "b".to_string(),
                dependency: "a".to_string()
            })
        );
        assert!(graph.is_empty());
    }

    #[test]
    fn test_register_rejects_self_dependency() {
        let mut graph = TaskGraph::new();
        assert!(matches!(
            graph.register("a", noop(), &["a"]),
            Err(GraphConfigError::Cycle(_))
        ));
    }

    #[test]
    fn test_add_dependency_detects_cycle() {
        let mut graph = TaskGraph::new();
        graph.register("a", noop(), &[]).unwrap();
        graph.register("b", noop(), &["a"]).unwrap();
        graph.register("c", noop(), &["b"]).unwrap();

        let err = graph.add_dependency("a", "c").unwrap_err();
        assert_eq!(
            err,
            GraphConfigError::Cycle(vec![
                "a".to_string(),
                "c".to_string(),
                "b".to_string(),
                "a".to_string()
            ])
        );

        // The rejected edge was not recorded
        assert!(graph.build().is_ok());
    }

    #[test]
    fn test_add_dependency_unknown_nodes() {
        let mut graph = TaskGraph::new();
        graph.register("a", noop(), &[]).unwrap();
        assert_eq!(
            graph.add_dependency("x", "a"),
            Err(GraphConfigError::UnknownNode("x".to_string()))
        );
        assert!(matches!(
            graph.add_dependency("a", "x"),
            Err(GraphConfigError::UnknownDependency { .. })
        ));
    }

    #[test]
    fn test_add_dependency_reorders_topology() {
        let mut graph = TaskGraph::new();
        graph.register("late", noop(), &[]).unwrap();
        graph.register("early", noop(), &[]).unwrap();
        graph.add_dependency("late", "early").unwrap();

        let compiled = graph.build().unwrap();
        assert_eq!(compiled.node_names(), vec!["early", "late"]);
    }

    #[test]
    fn test_build_rejects_empty_graph() {
        let result = TaskGraph::new().build();
        assert!(matches!(result, Err(GraphConfigError::Empty)));
    }

    #[test]
    fn test_build_rejects_unordered_writers() {
        let mut graph = TaskGraph::new();
        graph
            .register("left", Arc::new(Writes(&["k"])), &[])
            .unwrap();
        graph
            .register("right", Arc::new(Writes(&["k"])), &[])
            .unwrap();

        assert_eq!(
            graph.build().err(),
            Some(GraphConfigError::ConflictingWrites {
                key: "k".to_string(),
                first: "left".to_string(),
                second: "right".to_string()
            })
        );
    }

    #[test]
    fn test_build_allows_writer_overwritten_by_descendant() {
        let mut graph = TaskGraph::new();
        graph
            .register("collector", Arc::new(Writes(&["k"])), &[])
            .unwrap();
        graph.register("middle", noop(), &["collector"]).unwrap();
        graph
            .register("processor", Arc::new(Writes(&["k"])), &["middle"])
            .unwrap();

        assert!(graph.build().is_ok());
    }
}
