// SPDX-License-Identifier: MIT

//! Agent module - defines agent types for the LLM stages
//!
//! - `ReActAgent` - bounded Reasoning + Acting loop with tool calling

mod react;

pub use react::ReActAgent;

use crate::adk::error::ReportError;
use async_trait::async_trait;

/// Core agent trait for all agent types
#[async_trait]
pub trait Agent: Send + Sync {
    /// Returns the agent name
    fn name(&self) -> &str;

    /// Run the agent with the given input
    async fn run(&self, input: String) -> Result<String, ReportError>;
}
