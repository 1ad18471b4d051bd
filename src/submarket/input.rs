// SPDX-License-Identifier: MIT

//! Report requests and boundary validation

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::adk::error::ValidationError;
use crate::submarket::state::{keys, ReportState, StateUpdate};

/// `Street Address, City, ST 12345`
static ADDRESS_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.+?),\s*([\w\s]+),\s*([A-Z]{2})\s*(\d{5})$").expect("address pattern compiles")
});

/// Property types accepted by the listing provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyType {
    #[serde(rename = "Single Family")]
    SingleFamily,
    Condo,
    Townhouse,
    Manufactured,
    #[serde(rename = "Multi-Family")]
    MultiFamily,
    Apartment,
    Land,
}

impl PropertyType {
    pub const ALL: [PropertyType; 7] = [
        PropertyType::SingleFamily,
        PropertyType::Condo,
        PropertyType::Townhouse,
        PropertyType::Manufactured,
        PropertyType::MultiFamily,
        PropertyType::Apartment,
        PropertyType::Land,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyType::SingleFamily => "Single Family",
            PropertyType::Condo => "Condo",
            PropertyType::Townhouse => "Townhouse",
            PropertyType::Manufactured => "Manufactured",
            PropertyType::MultiFamily => "Multi-Family",
            PropertyType::Apartment => "Apartment",
            PropertyType::Land => "Land",
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PropertyType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        PropertyType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ValidationError::UnknownPropertyType(trimmed.to_string()))
    }
}

/// A validated request for one report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRequest {
    pub address: String,
    pub property_type: PropertyType,
}

impl ReportRequest {
    pub fn new(address: &str, property_type: PropertyType) -> Result<Self, ValidationError> {
        Ok(Self {
            address: validate_address(address)?,
            property_type,
        })
    }

    /// Validate raw form/CLI/batch input
    pub fn parse(address: &str, property_type: &str) -> Result<Self, ValidationError> {
        if property_type.trim().is_empty() {
            return Err(ValidationError::MissingField("Property Type".to_string()));
        }
        let property_type = property_type.parse()?;
        Self::new(address, property_type)
    }

    /// The state a report run starts from
    pub fn initial_state(&self) -> ReportState {
        let mut state = ReportState::empty();
        state.merge(
            StateUpdate::new()
                .with(keys::ADDRESS, self.address.clone())
                .with(keys::PROPERTY_TYPE, self.property_type.as_str()),
        );
        state
    }
}

/// Trim and check the address against the `Street, City, ST ZIP5` pattern
pub fn validate_address(address: &str) -> Result<String, ValidationError> {
    let trimmed = address.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingField("Address".to_string()));
    }
    if !ADDRESS_PATTERN.is_match(trimmed) {
        return Err(ValidationError::MalformedAddress(trimmed.to_string()));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_addresses() {
        for address in [
            "123 Main St, Austin, TX 78701",
            "5500 Grand Lake Dr, San Antonio, TX 78244",
            "  1 Infinite Loop,Cupertino,CA95014 ",
        ] {
            assert!(validate_address(address).is_ok(), "{address}");
        }
        assert_eq!(
            validate_address(" 123 Main St, Austin, TX 78701 ").unwrap(),
            "123 Main St, Austin, TX 78701"
        );
    }

    #[test]
    fn test_invalid_addresses() {
        assert_eq!(
            validate_address("   "),
            Err(ValidationError::MissingField("Address".to_string()))
        );
        for address in [
            "123 Main St Austin TX 78701",
            "123 Main St, Austin, Texas 78701",
            "123 Main St, Austin, tx 78701",
            "123 Main St, Austin, TX 7870",
            "123 Main St, Austin, TX 78701-1234",
        ] {
            assert!(
                matches!(
                    validate_address(address),
                    Err(ValidationError::MalformedAddress(_))
                ),
                "{address}"
            );
        }
    }

    #[test]
    fn test_property_type_round_trip_names() {
        for t in PropertyType::ALL {
            assert_eq!(t.as_str().parse::<PropertyType>().unwrap(), t);
            assert_eq!(serde_json::to_value(t).unwrap(), t.as_str());
        }
        let condo: PropertyType = "condo".parse().unwrap();
        assert_eq!(condo, PropertyType::Condo);
        assert!(matches!(
            "Castle".parse::<PropertyType>(),
            Err(ValidationError::UnknownPropertyType(_))
        ));
    }

    #[test]
    fn test_parse_requires_property_type() {
        assert_eq!(
            ReportRequest::parse("123 Main St, Austin, TX 78701", ""),
            Err(ValidationError::MissingField("Property Type".to_string()))
        );
    }

    #[test]
    fn test_initial_state() {
        let request =
            ReportRequest::parse("123 Main St, Austin, TX 78701", "Single Family").unwrap();
        let state = request.initial_state();
        assert_eq!(
            state.text(keys::ADDRESS).unwrap(),
            "123 Main St, Austin, TX 78701"
        );
        assert_eq!(state.text(keys::PROPERTY_TYPE).unwrap(), "Single Family");
        assert_eq!(state.keys().count(), 2);
    }
}
