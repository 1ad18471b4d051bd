// SPDX-License-Identifier: MIT

//! Task graph execution
//!
//! This module provides the DAG declaration (`TaskGraph`), its validated
//! form (`CompiledGraph`), and the frontier scheduler that runs nodes as
//! soon as their dependencies complete.

mod dag;
pub mod executor;
pub mod types;

pub use dag::TaskGraph;
pub use executor::CompiledGraph;
pub use types::{ExecutionTrace, Node, NodeSpan};
