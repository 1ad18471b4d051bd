use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{AnalysisTables, Analyst};
use crate::adk::error::ReportError;
use crate::adk::tool::Tool;

static DATA_ANALYZER_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "query": {
                "type": "string",
                "description": "Natural-language question about the report tables"
            }
        },
        "required": ["query"]
    })
});

#[derive(Debug, Deserialize)]
struct DataAnalyzerArgs {
    query: String,
}

/// `data_analyzer`: answers questions over the tables of one report run
pub struct DataAnalyzerTool {
    analyst: Arc<dyn Analyst>,
    tables: Arc<AnalysisTables>,
}

impl DataAnalyzerTool {
    pub fn new(analyst: Arc<dyn Analyst>, tables: Arc<AnalysisTables>) -> Self {
        Self { analyst, tables }
    }
}

#[async_trait]
impl Tool for DataAnalyzerTool {
    fn name(&self) -> &str {
        "data_analyzer"
    }

    fn description(&self) -> &str {
        "Analyzes the report tables (subject_property, sale_listings, sale_comps, \
         sale_listings_stats, rental_listings, rental_comps, rental_listings_stats, \
         demographic_stats) from a natural-language query. Returns a typed result: \
         table, number, string, chart path, or error."
    }

    fn schema(&self) -> &Value {
        &DATA_ANALYZER_SCHEMA
    }

    async fn execute(&self, input: Value) -> Result<Value, ReportError> {
        let args: DataAnalyzerArgs = serde_json::from_value(input)?;
        log::info!("data_analyzer query: {}", args.query);

        let response = self.analyst.analyze(&args.query, &self.tables).await?;
        Ok(serde_json::to_value(response)?)
    }
}
