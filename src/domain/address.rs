//! Situs address splitting
//!
//! The assessor publishes the situs address as one free-text field such as
//! `"123 MAIN ST UNIT 4"`. Only that one pattern is recognised: an optional
//! unit suffix, an optional leading house number, and the street.

use serde::{Deserialize, Serialize};

use crate::domain::parcel::non_blank;

/// Unit markers in priority order. The first marker present wins even if a
/// later marker occurs earlier in the string.
pub const UNIT_MARKERS: [&str; 2] = [" UNIT ", " APT "];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressParts {
    pub unit: Option<String>,
    pub address_number: Option<String>,
    pub street: Option<String>,
}

/// Splits a raw address into unit, house number and street.
///
/// Never fails: anything that does not fit the pattern ends up in `street`
/// or as `None`.
pub fn parse_address(raw: Option<&str>) -> AddressParts {
    let Some(raw) = raw else {
        return AddressParts::default();
    };

    let (working, unit) = split_unit(raw);
    let unit = non_blank(unit);
    let working = working.trim();

    if working.is_empty() {
        return AddressParts {
            unit,
            ..AddressParts::default()
        };
    }

    let (address_number, street) = match working.split_once(char::is_whitespace) {
        Some((token, rest)) if is_all_digits(token) => (Some(token.to_string()), non_blank(Some(rest))),
        Some(_) => (None, Some(working.to_string())),
        // Single token: a bare number has no street, anything else is the street.
        None if is_all_digits(working) => (Some(working.to_string()), None),
        None => (None, Some(working.to_string())),
    };

    AddressParts {
        unit,
        address_number,
        street,
    }
}

fn split_unit(address: &str) -> (&str, Option<&str>) {
    UNIT_MARKERS
        .iter()
        .find_map(|marker| address.split_once(marker))
        .map_or((address, None), |(before, after)| (before, Some(after)))
}

fn is_all_digits(token: &str) -> bool {
    !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit())
}
