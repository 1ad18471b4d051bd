//! Task graph type definitions

use async_trait::async_trait;
use std::time::Duration;

use crate::adk::error::ReportError;
use crate::submarket::state::{ReportState, StateUpdate};

/// A unit of work in the task graph.
///
/// Nodes are functions of the full current state to a partial update. The
/// keys a node may write are declared up front through `writes()`; the
/// engine rejects any other key at merge time.
#[async_trait]
pub trait Node: Send + Sync {
    /// State keys this node may write
    fn writes(&self) -> &[&'static str];

    /// Run the node against a consistent snapshot of the state
    async fn run(&self, state: &ReportState) -> Result<StateUpdate, ReportError>;
}

/// Start/finish offsets of one node, relative to the start of the run
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSpan {
    pub node: String,
    pub started: Duration,
    pub finished: Duration,
}

/// Completed node spans in completion order
#[derive(Debug, Clone, Default)]
pub struct ExecutionTrace {
    pub spans: Vec<NodeSpan>,
}

impl ExecutionTrace {
    pub fn span(&self, node: &str) -> Option<&NodeSpan> {
        self.spans.iter().find(|s| s.node == node)
    }

    /// Node names in completion order
    pub fn completion_order(&self) -> Vec<&str> {
        self.spans.iter().map(|s| s.node.as_str()).collect()
    }
}
