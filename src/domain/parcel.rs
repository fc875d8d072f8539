//! Parcel domain entities
//!
//! Identifier newtypes for the assessor's key space and the records that flow
//! from the detail endpoint into the `Parcel` fact table.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::address::{AddressParts, parse_address};
use crate::domain::errors::CrawlError;

/// 8-digit key sent to the discovery endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SearchKey(u32);

impl SearchKey {
    pub const MIN: Self = Self(0);
    pub const MAX: Self = Self(99_999_999);

    /// Returns `None` for values that do not fit in 8 digits.
    pub const fn new(value: u32) -> Option<Self> {
        if value <= Self::MAX.0 {
            Some(Self(value))
        } else {
            None
        }
    }

    pub const fn value(self) -> u32 {
        self.0
    }

    /// Zero-padded 8-digit search term, e.g. `00001234`.
    pub fn search_term(self) -> String {
        format!("{:08}", self.0)
    }
}

impl TryFrom<u32> for SearchKey {
    type Error = CrawlError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(CrawlError::InvalidSearchKey(value))
    }
}

impl fmt::Display for SearchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08}", self.0)
    }
}

/// 9-digit assessor parcel number; primary key of the `Parcel` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Apn(u32);

impl Apn {
    pub const MAX: Self = Self(999_999_999);

    pub const fn new(value: u32) -> Option<Self> {
        if value <= Self::MAX.0 {
            Some(Self(value))
        } else {
            None
        }
    }

    pub const fn value(self) -> u32 {
        self.0
    }

    /// Identifier built from a search key and one extra digit.
    ///
    /// Callers guarantee `value <= 999_999_999`; a search key is at most eight
    /// digits, so appending or prepending one digit always fits.
    pub(crate) const fn from_candidate(value: u32) -> Self {
        debug_assert!(value <= Self::MAX.0, "candidate exceeds nine digits");
        Self(value)
    }

    /// Zero-padded 9-digit value used by the detail endpoint.
    pub fn query_value(self) -> String {
        format!("{:09}", self.0)
    }

    /// Parses a digit-only string as returned by the discovery endpoint.
    ///
    /// Anything that is empty, contains a non-ASCII-digit, or exceeds nine
    /// digits of magnitude is rejected.
    pub fn parse_digits(raw: &str) -> Option<Self> {
        if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        raw.parse::<u32>().ok().and_then(Self::new)
    }
}

impl fmt::Display for Apn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:09}", self.0)
    }
}

/// Detail fields exactly as the remote source hands them over.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawParcelRecord {
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    pub class_code: Option<String>,
    pub district: Option<String>,
    pub address: Option<String>,
}

/// Normalized parcel detail, ready to be written through the dimension store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParcelDetail {
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    pub property_type: Option<String>,
    pub city: Option<String>,
    pub unit: Option<String>,
    pub address_number: Option<String>,
    pub street: Option<String>,
}

impl ParcelDetail {
    pub fn from_raw(raw: &RawParcelRecord) -> Self {
        let AddressParts {
            unit,
            address_number,
            street,
        } = parse_address(raw.address.as_deref());

        Self {
            longitude: raw.longitude,
            latitude: raw.latitude,
            property_type: non_blank(raw.class_code.as_deref()),
            city: raw.district.as_deref().and_then(city_from_district),
            unit,
            address_number,
            street,
        }
    }
}

/// City name from a district label such as `"R1 RIVERSIDE"`.
///
/// The leading token is a district code; a label with nothing after it has no city.
pub fn city_from_district(district: &str) -> Option<String> {
    let trimmed = district.trim_start();
    let (_, rest) = trimmed.split_once(char::is_whitespace)?;
    non_blank(Some(rest))
}

pub(crate) fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// A row of the `Parcel` table read back with its dimension names resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredParcel {
    pub id: Apn,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    pub address_number: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub property_type: Option<String>,
    pub unit: Option<String>,
}

impl StoredParcel {
    /// `true` when only the identifier is set.
    pub fn is_placeholder(&self) -> bool {
        self.longitude.is_none()
            && self.latitude.is_none()
            && self.address_number.is_none()
            && self.street.is_none()
            && self.city.is_none()
            && self.property_type.is_none()
            && self.unit.is_none()
    }
}
