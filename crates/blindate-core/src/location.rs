//! # Meeting Locations
//!
//! A `Location` is a free-text venue (name + address) with optional
//! coordinates. Two votes agree only when [`Location::same_place`] holds:
//! exact, case-sensitive equality of name and address. No fuzzy or
//! geographic matching is performed; a near miss goes to negotiation.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::validation;

const MAX_NAME_CHARS: usize = 200;
const MAX_ADDRESS_CHARS: usize = 500;

/// WGS 84 coordinates of a venue.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Degrees north, `-90.0..=90.0`.
    pub latitude: f64,
    /// Degrees east, `-180.0..=180.0`.
    pub longitude: f64,
}

impl Coordinates {
    /// Validate and build a coordinate pair.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, ValidationError> {
        if !latitude.is_finite() || !longitude.is_finite() {
            return Err(ValidationError::new("coordinates", "must be finite numbers"));
        }
        validation::in_range("coordinates.latitude", latitude, -90.0, 90.0)?;
        validation::in_range("coordinates.longitude", longitude, -180.0, 180.0)?;
        Ok(Self {
            latitude,
            longitude,
        })
    }
}

/// A proposed or confirmed meeting place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Venue name, e.g. "Cafe X".
    pub name: String,
    /// Street address, e.g. "12 Main St". May be empty for well-known venues.
    pub address: String,
    /// Optional map position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
}

impl Location {
    /// Build a location without coordinates.
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            coordinates: None,
        }
    }

    /// Attach coordinates.
    pub fn with_coordinates(mut self, coordinates: Coordinates) -> Self {
        self.coordinates = Some(coordinates);
        self
    }

    /// Check the fields a stored location must satisfy.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validation::non_blank("location.name", &self.name)?;
        validation::max_chars("location.name", &self.name, MAX_NAME_CHARS)?;
        validation::max_chars("location.address", &self.address, MAX_ADDRESS_CHARS)?;
        if let Some(c) = &self.coordinates {
            Coordinates::new(c.latitude, c.longitude)?;
        }
        Ok(())
    }

    /// Exact agreement on name and address. Coordinates are ignored.
    pub fn same_place(&self, other: &Location) -> bool {
        self.name == other.name && self.address == other.address
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.address.is_empty() {
            f.write_str(&self.name)
        } else {
            write!(f, "{}, {}", self.name, self.address)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_place_is_exact() {
        let a = Location::new("Cafe Z", "1 Elm St");
        assert!(a.same_place(&Location::new("Cafe Z", "1 Elm St")));
        assert!(!a.same_place(&Location::new("cafe z", "1 Elm St")));
        assert!(!a.same_place(&Location::new("Cafe Z", "1 Elm St.")));
    }

    #[test]
    fn same_place_ignores_coordinates() {
        let a = Location::new("Cafe Z", "1 Elm St")
            .with_coordinates(Coordinates::new(40.0, -73.0).unwrap());
        let b = Location::new("Cafe Z", "1 Elm St");
        assert!(a.same_place(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn validate_requires_name() {
        assert!(Location::new("  ", "1 Elm St").validate().is_err());
        assert!(Location::new("Park", "").validate().is_ok());
    }

    #[test]
    fn coordinates_reject_out_of_range() {
        assert!(Coordinates::new(91.0, 0.0).is_err());
        assert!(Coordinates::new(0.0, -181.0).is_err());
        assert!(Coordinates::new(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn display_omits_empty_address() {
        assert_eq!(Location::new("Central Park", "").to_string(), "Central Park");
        assert_eq!(Location::new("Cafe X", "12 Main St").to_string(), "Cafe X, 12 Main St");
    }
}
