//! Submarket report generation
//!
//! A report is one run of a fixed task graph: collectors fetch raw data,
//! processors normalize it, two LLM stages draft and finalize the narrative,
//! and the renderer writes the PDF.

pub mod analysis;
pub mod batch;
pub mod collectors;
pub mod config;
pub mod graph;
pub mod input;
pub mod pipeline;
pub mod processors;
pub mod render;
pub mod server;
pub mod stages;
pub mod state;
pub mod telemetry;
