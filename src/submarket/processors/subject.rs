use async_trait::async_trait;

use super::table::normalize;
use crate::adk::error::ReportError;
use crate::submarket::graph::Node;
use crate::submarket::state::{keys, ReportState, StateUpdate};

pub const SUBJECT_COLUMNS: [&str; 12] = [
    "addressLine1",
    "addressLine2",
    "bedrooms",
    "bathrooms",
    "squareFootage",
    "lotSize",
    "yearBuilt",
    "hoaFee",
    "lastSaleDate",
    "lastSalePrice",
    "ownerNames",
    "ownerType",
];

const SUBJECT_RENAMES: [(&str, &str); 3] = [
    ("hoa.fee", "hoaFee"),
    ("owner.names", "ownerNames"),
    ("owner.type", "ownerType"),
];

/// Rewrites `subject_property` in place as the 12-column subject table
pub struct SubjectPropertyProcessor;

#[async_trait]
impl Node for SubjectPropertyProcessor {
    fn writes(&self) -> &[&'static str] {
        &[keys::SUBJECT_PROPERTY]
    }

    async fn run(&self, state: &ReportState) -> Result<StateUpdate, ReportError> {
        let rows = state
            .records(keys::SUBJECT_PROPERTY)?
            .iter()
            .map(|raw| normalize(raw, &SUBJECT_RENAMES, &SUBJECT_COLUMNS))
            .collect();
        Ok(StateUpdate::new().with_records(keys::SUBJECT_PROPERTY, rows))
    }
}
