// SPDX-License-Identifier: MIT

//! Processor nodes
//!
//! Each processor rewrites its collector's key with a normalized table
//! (canonical column order, missing fields as `null`). The listing
//! processors also derive comps and summary stats.

pub mod comps;
mod demographics;
mod listings;
pub mod stats;
mod subject;
pub mod table;

pub use comps::{select_comps, SubjectProfile};
pub use demographics::DemographicStatsProcessor;
pub use listings::{
    process_listings, ListingSchema, ListingsProcessor, ProcessedListings, RENTAL_SCHEMA,
    SALE_SCHEMA,
};
pub use subject::{SubjectPropertyProcessor, SUBJECT_COLUMNS};
