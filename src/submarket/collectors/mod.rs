// SPDX-License-Identifier: MIT

//! Collector nodes: one per external data source
//!
//! Collectors read `address` and `property_type` from the state and write the
//! raw provider records. They never retry; a provider failure aborts the run.

mod arcgis;
mod rentcast;

pub use arcgis::{ArcGisClient, DEMOGRAPHIC_VARIABLES};
pub use rentcast::RentCastClient;

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

use crate::adk::error::{FetchError, ReportError};
use crate::submarket::graph::Node;
use crate::submarket::state::{keys, Record, ReportState, StateUpdate};

/// Which listing search to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListingKind {
    Sale,
    Rental,
}

impl ListingKind {
    pub fn label(&self) -> &'static str {
        match self {
            ListingKind::Sale => "sale",
            ListingKind::Rental => "rental",
        }
    }

    /// State key holding the listings of this kind
    pub fn state_key(&self) -> &'static str {
        match self {
            ListingKind::Sale => keys::SALE_LISTINGS,
            ListingKind::Rental => keys::RENTAL_LISTINGS,
        }
    }
}

/// One page of a listing search
#[derive(Debug, Clone, PartialEq)]
pub struct ListingQuery {
    pub address: String,
    pub property_type: String,
    pub radius: f64,
    pub limit: usize,
    pub offset: usize,
}

/// Property records and listing search
#[async_trait]
pub trait PropertySource: Send + Sync {
    /// The property record for an address
    async fn property_record(&self, address: &str) -> Result<Record, FetchError>;

    /// One page of listings; a page shorter than `query.limit` is the last one
    async fn listings_page(
        &self,
        kind: ListingKind,
        query: &ListingQuery,
    ) -> Result<Vec<Record>, FetchError>;
}

/// Demographic enrichment around an address
#[async_trait]
pub trait DemographicsSource: Send + Sync {
    async fn demographic_record(&self, address: &str) -> Result<Record, FetchError>;
}

/// Full pages accepted from one search before it is treated as runaway
pub const MAX_PAGES: usize = 200;

/// Fetch limit/offset pages until one comes back shorter than `limit`.
///
/// A limit of zero is read as one. A search that is still returning full pages
/// after `MAX_PAGES` fails rather than looping on a provider that ignores the
/// offset.
pub async fn collect_pages<T, F, Fut>(limit: usize, mut fetch: F) -> Result<Vec<T>, FetchError>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<Vec<T>, FetchError>>,
{
    let limit = limit.max(1);
    let mut offset = 0;
    let mut collected = Vec::new();

    for _ in 0..MAX_PAGES {
        let page = fetch(offset).await?;
        let count = page.len();
        collected.extend(page);
        log::debug!("Fetched page at offset {} with {} records", offset, count);
        if count < limit {
            return Ok(collected);
        }
        offset += limit;
    }

    Err(FetchError::malformed(
        "listings",
        format!("still full after {} pages of {}", MAX_PAGES, limit),
    ))
}

/// Writes `[record]` for the subject address
pub struct SubjectPropertyCollector {
    source: Arc<dyn PropertySource>,
}

impl SubjectPropertyCollector {
    pub fn new(source: Arc<dyn PropertySource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl Node for SubjectPropertyCollector {
    fn writes(&self) -> &[&'static str] {
        &[keys::SUBJECT_PROPERTY]
    }

    async fn run(&self, state: &ReportState) -> Result<StateUpdate, ReportError> {
        let address = state.text(keys::ADDRESS)?;
        log::info!("Collecting subject property for {}", address);

        let record = self.source.property_record(address).await?;
        let rows = vec![record];
        Ok(StateUpdate::new().with_records(keys::SUBJECT_PROPERTY, rows))
    }
}

/// Collects every page of sale or rental listings around the subject
pub struct ListingsCollector {
    source: Arc<dyn PropertySource>,
    kind: ListingKind,
    radius: f64,
    page_limit: usize,
}

impl ListingsCollector {
    /// `page_limit` below one is raised to one
    pub fn new(
        source: Arc<dyn PropertySource>,
        kind: ListingKind,
        radius: f64,
        page_limit: usize,
    ) -> Self {
        Self {
            source,
            kind,
            radius,
            page_limit: page_limit.max(1),
        }
    }
}

#[async_trait]
impl Node for ListingsCollector {
    fn writes(&self) -> &[&'static str] {
        match self.kind {
            ListingKind::Sale => &[keys::SALE_LISTINGS],
            ListingKind::Rental => &[keys::RENTAL_LISTINGS],
        }
    }

    async fn run(&self, state: &ReportState) -> Result<StateUpdate, ReportError> {
        let kind = self.kind;
        let address = state.text(keys::ADDRESS)?.to_string();
        let property_type = state.text(keys::PROPERTY_TYPE)?.to_string();
        log::info!("Collecting {} listings near {}", kind.label(), address);

        let listings = collect_pages(self.page_limit, |offset| {
            let source = Arc::clone(&self.source);
            let query = ListingQuery {
                address: address.clone(),
                property_type: property_type.clone(),
                radius: self.radius,
                limit: self.page_limit,
                offset,
            };
            async move { source.listings_page(kind, &query).await }
        })
        .await?;

        log::info!("Collected {} {} listings", listings.len(), kind.label());
        Ok(StateUpdate::new().with_records(kind.state_key(), listings))
    }
}

/// Writes `[attributes]` from the demographic enrichment
pub struct DemographicStatsCollector {
    source: Arc<dyn DemographicsSource>,
}

impl DemographicStatsCollector {
    pub fn new(source: Arc<dyn DemographicsSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl Node for DemographicStatsCollector {
    fn writes(&self) -> &[&'static str] {
        &[keys::DEMOGRAPHIC_STATS]
    }

    async fn run(&self, state: &ReportState) -> Result<StateUpdate, ReportError> {
        let address = state.text(keys::ADDRESS)?;
        log::info!("Collecting demographic statistics for {}", address);

        let attributes = self.source.demographic_record(address).await?;
        let rows = vec![attributes];
        Ok(StateUpdate::new().with_records(keys::DEMOGRAPHIC_STATS, rows))
    }
}

/// Convert a JSON array of objects into records
pub(crate) fn into_records(
    provider: &str,
    value: serde_json::Value,
) -> Result<Vec<Record>, FetchError> {
    match value {
        serde_json::Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                serde_json::Value::Object(record) => Ok(record),
                other => Err(FetchError::malformed(
                    provider,
                    format!("expected an object, got {}", other),
                )),
            })
            .collect(),
        other => Err(FetchError::malformed(
            provider,
            format!("expected an array, got {}", other),
        )),
    }
}
