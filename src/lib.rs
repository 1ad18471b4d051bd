// SPDX-License-Identifier: MIT

//! Automated property submarket analysis
//!
//! - [adk] - model, tool, and agent kit shared by the LLM stages
//! - [submarket] - the report task graph, its nodes, and the outer surfaces

pub mod adk;
pub mod submarket;
