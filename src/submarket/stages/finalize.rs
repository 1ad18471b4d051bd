use async_trait::async_trait;
use std::sync::Arc;

use super::prompts::{final_request, FINAL_REPORT_INSTRUCTION};
use crate::adk::error::{ModelError, ReportError};
use crate::adk::model::{Content, GenerationConfig, Model};
use crate::submarket::graph::Node;
use crate::submarket::state::{keys, ReportState, StateUpdate};

/// Rewrites the draft into the final narrative with a single model call
pub struct FinalReportGenerator {
    model: Arc<dyn Model>,
    config: Option<GenerationConfig>,
}

impl FinalReportGenerator {
    pub fn new(model: Arc<dyn Model>) -> Self {
        Self { model, config: None }
    }

    pub fn with_generation_config(mut self, config: GenerationConfig) -> Self {
        self.config = Some(config);
        self
    }
}

#[async_trait]
impl Node for FinalReportGenerator {
    fn writes(&self) -> &[&'static str] {
        &[keys::FINAL_REPORT]
    }

    async fn run(&self, state: &ReportState) -> Result<StateUpdate, ReportError> {
        let draft = state.text(keys::DRAFT_REPORT)?;
        let history = vec![
            Content::system(FINAL_REPORT_INSTRUCTION),
            Content::user(final_request(draft)),
        ];

        let response = self
            .model
            .generate_content(&history, self.config.as_ref(), None)
            .await?;
        let report = response.text().trim().to_string();
        if report.is_empty() {
            return Err(ModelError::InvalidResponse("empty final report".to_string()).into());
        }

        log::info!("Final report is {} characters", report.len());
        Ok(StateUpdate::new().with(keys::FINAL_REPORT, report))
    }
}
