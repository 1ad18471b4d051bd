// SPDX-License-Identifier: MIT

//! Natural-language analysis over the report tables
//!
//! The drafting agent asks questions through the `data_analyzer` tool. An
//! `Analyst` answers each one with a table, a number, a string, a chart
//! path, or an error. The model-backed analyst sees only table schemas and a
//! few sample rows; it replies with an [`AnalysisPlan`] that runs locally.

pub mod chart;
mod query;
mod tool;

pub use query::{Aggregate, AnalysisPlan, ChartKind, Comparison, Filter, SortKey, MAX_TABLE_ROWS};
pub use tool::DataAnalyzerTool;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

use crate::adk::error::ReportError;
use crate::adk::model::{Content, GenerationConfig, Model};
use crate::submarket::state::{keys, Record, ReportState};

/// Sample rows shown per table
const SAMPLE_ROWS: usize = 3;
/// Longest sample cell, in characters, before it is cut
const SAMPLE_CELL_CHARS: usize = 60;
/// Hard ceiling on the table context sent to the analyst model
pub const MAX_CONTEXT_BYTES: usize = 24 * 1024;

/// One analysis answer, tagged by kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum AnalysisResponse {
    Table(Vec<Record>),
    Number(f64),
    String(String),
    /// Path of a saved chart image
    Chart(String),
    Error(String),
}

/// Named tables in prompt order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisTables {
    tables: Vec<(String, Vec<Record>)>,
}

impl AnalysisTables {
    /// The eight report tables; every one must be present
    pub fn from_state(state: &ReportState) -> Result<Self, ReportError> {
        let tables = keys::ANALYSIS_TABLES
            .iter()
            .map(|name| Ok((name.to_string(), state.records(name)?)))
            .collect::<Result<Vec<_>, ReportError>>()?;
        Ok(Self { tables })
    }

    pub fn get(&self, name: &str) -> Option<&[Record]> {
        self.tables
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, rows)| rows.as_slice())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(|(n, _)| n.as_str())
    }

    /// Model context: name, row count, columns, and up to three sample rows
    /// per table. Samples are dropped if the whole text would pass
    /// `MAX_CONTEXT_BYTES`.
    pub fn describe(&self) -> String {
        let full = self.describe_with(SAMPLE_ROWS);
        if full.len() <= MAX_CONTEXT_BYTES {
            return full;
        }
        log::warn!(
            "Table context is {} bytes; sending schemas without samples",
            full.len()
        );
        self.describe_with(0)
    }

    fn describe_with(&self, samples: usize) -> String {
        let mut out = String::new();
        for (name, rows) in &self.tables {
            let columns = rows
                .first()
                .map(|r| r.keys().cloned().collect::<Vec<_>>().join(", "))
                .unwrap_or_default();
            out.push_str(&format!(
                "## {} ({} rows)\ncolumns: {}\n",
                name,
                rows.len(),
                columns
            ));
            for row in rows.iter().take(samples) {
                out.push_str(&sample(row).to_string());
                out.push('\n');
            }
            out.push('\n');
        }
        out
    }
}

/// Copy of a row with long strings and arrays shortened
fn sample(row: &Record) -> Value {
    let shorten = |value: &Value| match value {
        Value::String(s) if s.chars().count() > SAMPLE_CELL_CHARS => {
            let head: String = s.chars().take(SAMPLE_CELL_CHARS).collect();
            Value::String(format!("{}...", head))
        }
        Value::Array(items) if items.len() > SAMPLE_ROWS => {
            Value::String(format!("[{} items]", items.len()))
        }
        other => other.clone(),
    };
    let shortened = row.iter().map(|(k, v)| (k.clone(), shorten(v)));
    Value::Object(shortened.collect())
}

/// Answers one natural-language query over the tables
#[async_trait]
pub trait Analyst: Send + Sync {
    async fn analyze(
        &self,
        query: &str,
        tables: &AnalysisTables,
    ) -> Result<AnalysisResponse, ReportError>;
}

const ANALYST_INSTRUCTION: &str = r#"You are a data analyst. You translate one question about the real-estate tables
below into a single computation. Only the schemas and a few sample rows are shown; the
computation runs on every row. Null values are missing and are skipped.

Reply with a single JSON object and nothing else, shaped as one of:
{"type": "aggregate", "table": "<table>", "function": "count|sum|mean|median|min|max", "column": "<column>", "filters": [...]}
{"type": "table", "table": "<table>", "columns": ["<column>", ...], "filters": [...], "sort": {"column": "<column>", "descending": true}, "limit": 10}
{"type": "chart", "table": "<table>", "chart": "scatter|histogram", "x": "<column>", "y": "<column>", "bins": 10, "filters": [...]}
{"type": "string", "value": "an answer that needs no computation"}
{"type": "error", "value": "why the question cannot be answered"}

A filter is {"column": "<column>", "op": "eq|ne|lt|le|gt|ge", "value": <value>}. Filters, columns,
sort, limit and bins are optional. `count` without a column counts rows. Tables return at most 50
rows. Scatter charts need `y`; histograms use `x` only."#;

/// Analyst backed by a language model. The model chooses a plan; the plan
/// runs locally and charts are saved under `chart_dir`.
pub struct LlmAnalyst {
    model: Arc<dyn Model>,
    config: Option<GenerationConfig>,
    chart_dir: PathBuf,
}

impl LlmAnalyst {
    pub fn new(model: Arc<dyn Model>) -> Self {
        Self {
            model,
            config: None,
            chart_dir: PathBuf::from("./output/charts"),
        }
    }

    pub fn with_generation_config(mut self, config: GenerationConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_chart_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.chart_dir = dir.into();
        self
    }

    /// System prompt for one call
    pub fn instruction(tables: &AnalysisTables) -> String {
        format!("{}\n\n# Tables\n{}", ANALYST_INSTRUCTION, tables.describe())
    }
}

#[async_trait]
impl Analyst for LlmAnalyst {
    async fn analyze(
        &self,
        query: &str,
        tables: &AnalysisTables,
    ) -> Result<AnalysisResponse, ReportError> {
        let history = vec![
            Content::system(Self::instruction(tables)),
            Content::user(query),
        ];
        let reply = self
            .model
            .generate_content(&history, self.config.as_ref(), None)
            .await?;

        let plan = match parse_plan(&reply.text()) {
            Ok(plan) => plan,
            Err(message) => return Ok(AnalysisResponse::Error(message)),
        };
        log::debug!("Analysis plan: {:?}", plan);
        let chart_dir = self.chart_dir.clone();
        let tables = tables.clone();
        // Chart drawing is CPU and file work
        tokio::task::spawn_blocking(move || plan.execute(&tables, &chart_dir))
            .await
            .map_err(|e| ReportError::TaskFailed {
                node: "data_analyzer".to_string(),
                message: e.to_string(),
            })
    }
}

/// Decode a plan reply, tolerating a surrounding code fence
pub fn parse_plan(reply: &str) -> Result<AnalysisPlan, String> {
    serde_json::from_str::<AnalysisPlan>(strip_code_fence(reply)).map_err(|e| {
        log::warn!("Unreadable analyst reply: {}", e);
        format!("could not interpret analysis plan: {}", e)
    })
}

fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop an info string such as `json` on the opening fence
    let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
