// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use std::sync::Arc;

use super::prompts::{draft_request, DRAFT_REPORT_INSTRUCTION};
use crate::adk::agent::{Agent, ReActAgent};
use crate::adk::error::{ModelError, ReportError};
use crate::adk::model::{GenerationConfig, Model};
use crate::adk::tool::Tool;
use crate::submarket::analysis::{AnalysisTables, Analyst, DataAnalyzerTool};
use crate::submarket::graph::Node;
use crate::submarket::state::{keys, ReportState, StateUpdate};

/// Drafts the report with a tool-calling agent over the processed tables
pub struct DraftReportGenerator {
    model: Arc<dyn Model>,
    analyst: Arc<dyn Analyst>,
    max_iterations: u32,
    config: Option<GenerationConfig>,
}

impl DraftReportGenerator {
    pub fn new(model: Arc<dyn Model>, analyst: Arc<dyn Analyst>, max_iterations: u32) -> Self {
        Self {
            model,
            analyst,
            max_iterations,
            config: None,
        }
    }

    pub fn with_generation_config(mut self, config: GenerationConfig) -> Self {
        self.config = Some(config);
        self
    }

    fn agent(&self, tables: AnalysisTables) -> ReActAgent {
        let tool: Arc<dyn Tool> = Arc::new(DataAnalyzerTool::new(
            Arc::clone(&self.analyst),
            Arc::new(tables),
        ));
        let agent = ReActAgent::new(
            "draft_report_generator",
            DRAFT_REPORT_INSTRUCTION,
            Arc::clone(&self.model),
            vec![tool],
            self.max_iterations,
        );
        match &self.config {
            Some(config) => agent.with_generation_config(config.clone()),
            None => agent,
        }
    }
}

#[async_trait]
impl Node for DraftReportGenerator {
    fn writes(&self) -> &[&'static str] {
        &[keys::DRAFT_REPORT]
    }

    async fn run(&self, state: &ReportState) -> Result<StateUpdate, ReportError> {
        let address = state.text(keys::ADDRESS)?;
        let property_type = state.text(keys::PROPERTY_TYPE)?;
        let tables = AnalysisTables::from_state(state)?;

        log::info!("Drafting report for {}", address);
        let draft = self
            .agent(tables)
            .run(draft_request(address, property_type))
            .await?;

        if draft.trim().is_empty() {
            return Err(ModelError::InvalidResponse("empty draft report".to_string()).into());
        }
        Ok(StateUpdate::new().with(keys::DRAFT_REPORT, draft))
    }
}
