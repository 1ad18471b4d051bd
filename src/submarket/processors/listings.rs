// SPDX-License-Identifier: MIT

use async_trait::async_trait;

use super::comps::{select_comps, SubjectProfile};
use super::stats::{summarize, Metric};
use super::table::{flatten, float_value, number, rename, reindex, round2};
use crate::adk::error::ReportError;
use crate::submarket::collectors::ListingKind;
use crate::submarket::graph::Node;
use crate::submarket::state::{keys, Record, ReportState, StateUpdate};

/// Columns and names that differ between sale and rental tables
#[derive(Debug, Clone, Copy)]
pub struct ListingSchema {
    /// Column holding the asking price or rent after renames
    pub amount: &'static str,
    /// Derived amount per square foot
    pub per_square_foot: &'static str,
    pub renames: &'static [(&'static str, &'static str)],
    pub columns: &'static [&'static str; 13],
    pub metrics: &'static [Metric; 5],
}

const SALE_COLUMNS: [&str; 13] = [
    "addressLine1",
    "addressLine2",
    "bedrooms",
    "bathrooms",
    "squareFootage",
    "lotSize",
    "yearBuilt",
    "hoaFee",
    "price",
    "pricePerSquareFoot",
    "listedDate",
    "lastSeenDate",
    "daysOnMarket",
];

const RENTAL_COLUMNS: [&str; 13] = [
    "addressLine1",
    "addressLine2",
    "bedrooms",
    "bathrooms",
    "squareFootage",
    "lotSize",
    "yearBuilt",
    "hoaFee",
    "rent",
    "rentPerSquareFoot",
    "listedDate",
    "lastSeenDate",
    "daysOnMarket",
];

const SALE_METRICS: [Metric; 5] = [
    Metric {
        column: "price",
        label: "Price",
    },
    Metric {
        column: "pricePerSquareFoot",
        label: "PricePerSquareFoot",
    },
    Metric {
        column: "squareFootage",
        label: "SquareFootage",
    },
    Metric {
        column: "yearBuilt",
        label: "YearBuilt",
    },
    Metric {
        column: "daysOnMarket",
        label: "DaysOnMarket",
    },
];

const RENTAL_METRICS: [Metric; 5] = [
    Metric {
        column: "rent",
        label: "Rent",
    },
    Metric {
        column: "rentPerSquareFoot",
        label: "RentPerSquareFoot",
    },
    Metric {
        column: "squareFootage",
        label: "SquareFootage",
    },
    Metric {
        column: "yearBuilt",
        label: "YearBuilt",
    },
    Metric {
        column: "daysOnMarket",
        label: "DaysOnMarket",
    },
];

pub const SALE_SCHEMA: ListingSchema = ListingSchema {
    amount: "price",
    per_square_foot: "pricePerSquareFoot",
    renames: &[("hoa.fee", "hoaFee")],
    columns: &SALE_COLUMNS,
    metrics: &SALE_METRICS,
};

pub const RENTAL_SCHEMA: ListingSchema = ListingSchema {
    amount: "rent",
    per_square_foot: "rentPerSquareFoot",
    renames: &[("hoa.fee", "hoaFee"), ("price", "rent")],
    columns: &RENTAL_COLUMNS,
    metrics: &RENTAL_METRICS,
};

impl ListingSchema {
    pub fn for_kind(kind: ListingKind) -> &'static ListingSchema {
        match kind {
            ListingKind::Sale => &SALE_SCHEMA,
            ListingKind::Rental => &RENTAL_SCHEMA,
        }
    }

    /// Flatten and rename a raw listing, derive the per-square-foot amount,
    /// then project onto the table columns
    pub fn normalize(&self, raw: &Record) -> Record {
        let mut row = rename(flatten(raw), self.renames);
        let per_square_foot = match (number(&row, self.amount), number(&row, "squareFootage")) {
            (Some(amount), Some(size)) if size > 0.0 => float_value(round2(amount / size)),
            _ => serde_json::Value::Null,
        };
        row.insert(self.per_square_foot.to_string(), per_square_foot);
        reindex(&row, self.columns)
    }
}

/// Listing table, comps subset, and summary stats for one listing kind
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedListings {
    pub listings: Vec<Record>,
    pub comps: Vec<Record>,
    pub stats: Record,
}

pub fn process_listings(
    schema: &ListingSchema,
    subject: &SubjectProfile,
    raw: &[Record],
) -> ProcessedListings {
    let listings: Vec<Record> = raw.iter().map(|r| schema.normalize(r)).collect();
    let comps = select_comps(subject, &listings);
    // Stats always cover every listing, never just the comps
    let stats = summarize(&listings, schema.metrics);
    ProcessedListings {
        listings,
        comps,
        stats,
    }
}

/// Normalizes one kind of listings against the subject property
pub struct ListingsProcessor {
    kind: ListingKind,
}

impl ListingsProcessor {
    pub fn new(kind: ListingKind) -> Self {
        Self { kind }
    }

    /// Listings, comps, and stats keys for this kind
    fn output_keys(&self) -> &'static [&'static str; 3] {
        match self.kind {
            ListingKind::Sale => &[
                keys::SALE_LISTINGS,
                keys::SALE_COMPS,
                keys::SALE_LISTINGS_STATS,
            ],
            ListingKind::Rental => &[
                keys::RENTAL_LISTINGS,
                keys::RENTAL_COMPS,
                keys::RENTAL_LISTINGS_STATS,
            ],
        }
    }
}

#[async_trait]
impl Node for ListingsProcessor {
    fn writes(&self) -> &[&'static str] {
        self.output_keys()
    }

    async fn run(&self, state: &ReportState) -> Result<StateUpdate, ReportError> {
        let subject_row = flatten(&state.first_record(keys::SUBJECT_PROPERTY)?);
        let subject = SubjectProfile::from_record(&subject_row);
        let raw = state.records(self.kind.state_key())?;
        let schema = ListingSchema::for_kind(self.kind);

        let processed = process_listings(schema, &subject, &raw);
        log::info!(
            "Processed {} {} listings ({} comps)",
            processed.listings.len(),
            self.kind.label(),
            processed.comps.len()
        );

        let [listings_key, comps_key, stats_key] = *self.output_keys();

        Ok(StateUpdate::new()
            .with_records(listings_key, processed.listings)
            .with_records(comps_key, processed.comps)
            .with_records(stats_key, vec![processed.stats]))
    }
}
