// SPDX-License-Identifier: MIT

//! LLM stages: drafting and finalizing
//!
//! Both stages are plain `Node`s. The pipeline wraps each one in a
//! `RetryingNode` so a failed attempt is retried before the run is aborted.

mod draft;
mod finalize;
pub mod prompts;
pub mod retry;

pub use draft::DraftReportGenerator;
pub use finalize::FinalReportGenerator;
pub use retry::{RetryOutcome, RetryPolicy, RetryingNode};
