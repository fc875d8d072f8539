//! Candidate generation over the search key space
//!
//! Every 8-digit search key stands for 20 possible 9-digit parcel numbers:
//! the key with one extra digit appended, and the key with one extra digit
//! prepended.

use crate::domain::parcel::{Apn, SearchKey};

pub const CANDIDATES_PER_KEY: usize = 20;

const PREPEND_SCALE: u32 = 100_000_000;

/// The 20 candidate parcel numbers for `key`.
///
/// Order is fixed: appended digits 0-9, then prepended digits 0-9. For the
/// ten repdigit keys (`d * 11_111_111`) one value appears in both halves.
pub fn candidates_for(key: SearchKey) -> [Apn; CANDIDATES_PER_KEY] {
    let k = key.value();
    std::array::from_fn(|i| {
        let digit = (i % 10) as u32;
        let value = if i < 10 {
            k * 10 + digit
        } else {
            digit * PREPEND_SCALE + k
        };
        Apn::from_candidate(value)
    })
}

/// Lazy, strictly increasing sequence of search keys.
///
/// Restartable from any key; the end bound is inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchKeyRange {
    next: u32,
    end: u32,
    exhausted: bool,
}

impl SearchKeyRange {
    pub const fn new(start: SearchKey, end: SearchKey) -> Self {
        Self {
            next: start.value(),
            end: end.value(),
            exhausted: start.value() > end.value(),
        }
    }

    /// The whole key space, `00000000` through `99999999`.
    pub const fn full() -> Self {
        Self::new(SearchKey::MIN, SearchKey::MAX)
    }

    /// From `start` to the end of the key space.
    pub const fn starting_at(start: SearchKey) -> Self {
        Self::new(start, SearchKey::MAX)
    }

    pub const fn is_empty(&self) -> bool {
        self.exhausted
    }
}

impl Iterator for SearchKeyRange {
    type Item = SearchKey;

    fn next(&mut self) -> Option<SearchKey> {
        if self.exhausted {
            return None;
        }
        let current = self.next;
        if current >= self.end {
            self.exhausted = true;
        } else {
            self.next = current + 1;
        }
        SearchKey::new(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = if self.exhausted {
            0
        } else {
            (self.end - self.next) as usize + 1
        };
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for SearchKeyRange {}
