use async_trait::async_trait;

use super::table::reindex;
use crate::adk::error::ReportError;
use crate::submarket::collectors::DEMOGRAPHIC_VARIABLES;
use crate::submarket::graph::Node;
use crate::submarket::state::{keys, ReportState, StateUpdate};

/// Projects the enrichment attributes onto the requested variables.
pub struct DemographicStatsProcessor;

#[async_trait]
impl Node for DemographicStatsProcessor {
    fn writes(&self) -> &[&'static str] {
        &[keys::DEMOGRAPHIC_STATS]
    }

    async fn run(&self, state: &ReportState) -> Result<StateUpdate, ReportError> {
        let rows = state
            .records(keys::DEMOGRAPHIC_STATS)?
            .iter()
            .map(|attributes| reindex(attributes, &DEMOGRAPHIC_VARIABLES))
            .collect();
        Ok(StateUpdate::new().with_records(keys::DEMOGRAPHIC_STATS, rows))
    }
}
