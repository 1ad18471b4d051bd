//! Task graph executor
//!
//! The scheduler computes the frontier (nodes whose dependencies have all
//! completed), spawns each frontier node as its own tokio task against a
//! shared snapshot of the state, and merges results as tasks finish. Only the
//! scheduler loop mutates the state, so every merge is applied whole before
//! the next frontier is computed.
//!
//! On the first failure no further nodes are scheduled. Tasks already in
//! flight are drained (their results discarded) and the failure is returned.

use futures::FutureExt;
use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;

use super::types::{ExecutionTrace, Node, NodeSpan};
use crate::adk::error::ReportError;
use crate::submarket::state::{ReportState, StateUpdate};

/// Compiled node ready for execution
pub struct CompiledNode {
    pub id: String,
    pub node: Arc<dyn Node>,
    pub depends_on: Vec<String>,
}

type NodeOutcome = (usize, NodeSpan, Result<StateUpdate, ReportError>);

/// A validated, immutable task graph
pub struct CompiledGraph {
    /// Nodes in topological order
    nodes: Vec<CompiledNode>,
    index: HashMap<String, usize>,
}

impl CompiledGraph {
    pub(super) fn new(nodes: Vec<CompiledNode>) -> Self {
        let index = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.clone(), i))
            .collect();
        Self { nodes, index }
    }

    /// Node names in topological order
    pub fn node_names(&self) -> Vec<&str> {
        self.nodes.iter().map(|n| n.id.as_str()).collect()
    }

    pub fn dependencies_of(&self, name: &str) -> Option<&[String]> {
        self.index
            .get(name)
            .map(|&i| self.nodes[i].depends_on.as_slice())
    }

    /// Nodes that no other node depends on
    pub fn terminal_nodes(&self) -> Vec<&str> {
        let all_deps: HashSet<&str> = self
            .nodes
            .iter()
            .flat_map(|n| n.depends_on.iter().map(String::as_str))
            .collect();

        self.nodes
            .iter()
            .filter(|n| !all_deps.contains(n.id.as_str()))
            .map(|n| n.id.as_str())
            .collect()
    }

    /// Nodes that have not started and whose dependencies have all completed
    fn frontier(&self, completed: &HashSet<usize>, started: &HashSet<usize>) -> Vec<usize> {
        (0..self.nodes.len())
            .filter(|i| !started.contains(i))
            .filter(|&i| self.dependencies_satisfied(&self.nodes[i], completed))
            .collect()
    }

    fn dependencies_satisfied(&self, node: &CompiledNode, completed: &HashSet<usize>) -> bool {
        node.depends_on
            .iter()
            .all(|d| self.index.get(d).is_some_and(|i| completed.contains(i)))
    }

    /// Reject undeclared keys, then merge the whole update
    fn apply_update(
        node: &CompiledNode,
        update: StateUpdate,
        state: &mut ReportState,
    ) -> Result<(), ReportError> {
        let declared = node.node.writes();
        if let Some(key) = update
            .keys()
            .find(|k| !declared.iter().any(|w| *w == k.as_str()))
        {
            return Err(ReportError::UndeclaredWrite {
                node: node.id.clone(),
                key: key.clone(),
            });
        }
        state.merge(update);
        Ok(())
    }

    fn spawn_node(
        &self,
        idx: usize,
        snapshot: Arc<ReportState>,
        clock: Instant,
        in_flight: &mut JoinSet<NodeOutcome>,
    ) {
        let node = Arc::clone(&self.nodes[idx].node);
        let name = self.nodes[idx].id.clone();

        in_flight.spawn(async move {
            let started = clock.elapsed();
            log::info!("Executing node: {}", name);

            let attempt = AssertUnwindSafe(node.run(&snapshot)).catch_unwind();
            let result = match attempt.await {
                Ok(result) => result,
                Err(_) => Err(ReportError::TaskFailed {
                    node: name.clone(),
                    message: "node panicked".to_string(),
                }),
            };

            let span = NodeSpan {
                node: name,
                started,
                finished: clock.elapsed(),
            };
            (idx, span, result)
        });
    }

    /// Execute the graph to completion and return the merged state
    pub async fn run(&self, initial: ReportState) -> Result<ReportState, ReportError> {
        self.run_traced(initial).await.map(|(state, _)| state)
    }

    /// Execute the graph, also returning per-node timing
    pub async fn run_traced(
        &self,
        initial: ReportState,
    ) -> Result<(ReportState, ExecutionTrace), ReportError> {
        let clock = Instant::now();
        let mut state = initial;
        let mut completed: HashSet<usize> = HashSet::new();
        let mut started: HashSet<usize> = HashSet::new();
        let mut in_flight: JoinSet<NodeOutcome> = JoinSet::new();
        let mut failure: Option<ReportError> = None;
        let mut trace = ExecutionTrace::default();

        loop {
            if failure.is_none() {
                let ready = self.frontier(&completed, &started);
                if !ready.is_empty() {
                    log::info!(
                        "Dispatching {} nodes: {:?}",
                        ready.len(),
                        ready.iter().map(|&i| &self.nodes[i].id).collect::<Vec<_>>()
                    );
                    let snapshot = Arc::new(state.clone());
                    for idx in ready {
                        started.insert(idx);
                        self.spawn_node(idx, Arc::clone(&snapshot), clock, &mut in_flight);
                    }
                }
            }

            let Some(joined) = in_flight.join_next().await else {
                break;
            };

            match joined {
                Ok((idx, span, Ok(update))) => {
                    let node = &self.nodes[idx];
                    if failure.is_some() {
                        log::info!("Node {} finished after run was aborted", node.id);
                        continue;
                    }
                    match Self::apply_update(node, update, &mut state) {
                        Ok(()) => {
                            log::info!(
                                "Node {} completed in {:?}",
                                node.id,
                                span.finished.saturating_sub(span.started)
                            );
                            completed.insert(idx);
                            trace.spans.push(span);
                        }
                        Err(e) => {
                            log::error!("Node {} rejected: {}", node.id, e);
                            failure = Some(e);
                        }
                    }
                }
                Ok((idx, _, Err(e))) => {
                    log::error!("Node {} failed: {}", self.nodes[idx].id, e);
                    if failure.is_none() {
                        failure = Some(e);
                    }
                }
                Err(join_err) => {
                    log::error!("Node task failed to join: {}", join_err);
                    if failure.is_none() {
                        failure = Some(ReportError::TaskFailed {
                            node: "unknown".to_string(),
                            message: join_err.to_string(),
                        });
                    }
                }
            }
        }

        if let Some(e) = failure {
            return Err(e);
        }

        let pending = (0..self.nodes.len()).find(|i| !completed.contains(i));
        if let Some(pending) = pending {
            return Err(ReportError::TaskFailed {
                node: self.nodes[pending].id.clone(),
                message: "node never became eligible".to_string(),
            });
        }

        log::info!(
            "Graph completed {} nodes in {:?}",
            completed.len(),
            clock.elapsed()
        );
        Ok((state, trace))
    }

    /// Execute with a wall-clock budget. Dropping the run on timeout aborts
    /// every in-flight node task.
    pub async fn run_with_timeout(
        &self,
        initial: ReportState,
        timeout: Option<Duration>,
    ) -> Result<ReportState, ReportError> {
        match timeout {
            None => self.run(initial).await,
            Some(limit) => match tokio::time::timeout(limit, self.run(initial)).await {
                Ok(result) => result,
                Err(_) => Err(ReportError::Timeout {
                    seconds: limit.as_secs(),
                }),
            },
        }
    }
}
