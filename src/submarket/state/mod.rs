// SPDX-License-Identifier: MIT

//! State management for the report graph
//!
//! This module provides:
//! - `ReportState` - the per-request record threaded through every node
//! - `StateUpdate` - a node's partial output, merged key-wise by the engine
//! - `keys` - the field names of the report state

mod store;

pub use store::{Record, ReportState, StateUpdate};

/// Field names of the report state
pub mod keys {
    pub const ADDRESS: &str = "address";
    pub const PROPERTY_TYPE: &str = "property_type";
    pub const SUBJECT_PROPERTY: &str = "subject_property";
    pub const SALE_LISTINGS: &str = "sale_listings";
    pub const SALE_COMPS: &str = "sale_comps";
    pub const SALE_LISTINGS_STATS: &str = "sale_listings_stats";
    pub const RENTAL_LISTINGS: &str = "rental_listings";
    pub const RENTAL_COMPS: &str = "rental_comps";
    pub const RENTAL_LISTINGS_STATS: &str = "rental_listings_stats";
    pub const DEMOGRAPHIC_STATS: &str = "demographic_stats";
    pub const DRAFT_REPORT: &str = "draft_report";
    pub const FINAL_REPORT: &str = "final_report";
    pub const OUTPUT_PATH: &str = "output_path";

    /// Tables handed to the drafting stage and its analysis tool, in prompt order
    pub const ANALYSIS_TABLES: [&str; 8] = [
        SUBJECT_PROPERTY,
        SALE_LISTINGS,
        SALE_COMPS,
        SALE_LISTINGS_STATS,
        RENTAL_LISTINGS,
        RENTAL_COMPS,
        RENTAL_LISTINGS_STATS,
        DEMOGRAPHIC_STATS,
    ];
}
