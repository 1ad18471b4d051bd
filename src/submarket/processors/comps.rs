// SPDX-License-Identifier: MIT

//! Comparable listing selection
//!
//! A listing is a comp when its bedroom and bathroom counts are both within
//! one of the subject's, or when its living area is within 80%..=120% of the
//! subject's. Either test alone is enough. A missing value fails the test
//! that needs it.

use super::table::number;
use crate::submarket::state::Record;

const ROOM_TOLERANCE: f64 = 1.0;
const SIZE_LOWER: f64 = 0.80;
const SIZE_UPPER: f64 = 1.20;

/// The subject attributes the comp rule compares against
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SubjectProfile {
    pub bedrooms: Option<f64>,
    pub bathrooms: Option<f64>,
    pub square_footage: Option<f64>,
}

impl SubjectProfile {
    /// Read from a raw or normalized subject record; both use these column names
    pub fn from_record(record: &Record) -> Self {
        Self {
            bedrooms: number(record, "bedrooms"),
            bathrooms: number(record, "bathrooms"),
            square_footage: number(record, "squareFootage"),
        }
    }

    fn rooms_match(&self, listing: &Record) -> bool {
        let within = |subject: Option<f64>, column: &str| match (subject, number(listing, column)) {
            (Some(s), Some(l)) => (l - s).abs() <= ROOM_TOLERANCE,
            _ => false,
        };
        within(self.bedrooms, "bedrooms") && within(self.bathrooms, "bathrooms")
    }

    fn size_matches(&self, listing: &Record) -> bool {
        match (self.square_footage, number(listing, "squareFootage")) {
            (Some(subject), Some(size)) => {
                size >= subject * SIZE_LOWER && size <= subject * SIZE_UPPER
            }
            _ => false,
        }
    }

    pub fn is_comp(&self, listing: &Record) -> bool {
        self.rooms_match(listing) || self.size_matches(listing)
    }
}

/// Listings that qualify as comps, in their original order
pub fn select_comps(subject: &SubjectProfile, listings: &[Record]) -> Vec<Record> {
    listings
        .iter()
        .filter(|listing| subject.is_comp(listing))
        .cloned()
        .collect()
}
