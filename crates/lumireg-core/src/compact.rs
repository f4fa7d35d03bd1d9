//! Range compaction: dense per-slice values → minimal contiguous ranges.
//!
//! A [`Range`] is a maximal contiguous run of slice numbers whose
//! whitelist-restricted attribute values are deep-equal. Ranges are
//! 1-indexed and inclusive on both ends; by construction they partition
//! `[1, len]` with no gaps or overlaps, and no two adjacent ranges carry
//! equal values.

use crate::document::Document;
use crate::model::SliceNumber;
use crate::whitelist::Whitelist;
use serde::{Deserialize, Serialize};

/// One maximal run of slices sharing identical whitelisted values.
///
/// Serializes in the flattened wire form `{start, end, ...values}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Range {
    /// First slice number covered, inclusive.
    pub start: SliceNumber,
    /// Last slice number covered, inclusive.
    pub end: SliceNumber,
    /// The (whitelist-restricted) attribute values shared by every slice
    /// in the range.
    #[serde(flatten)]
    pub values: Document,
}

impl Range {
    /// Number of slices covered. Always at least 1.
    #[must_use]
    pub const fn slice_count(&self) -> SliceNumber {
        self.end - self.start + 1
    }

    /// `true` if `slice` falls inside the range.
    #[must_use]
    pub const fn contains(&self, slice: SliceNumber) -> bool {
        self.start <= slice && slice <= self.end
    }
}

/// Compress a dense 1-indexed sequence of per-slice values into minimal
/// contiguous ranges of identical whitelisted values.
///
/// A new range boundary is introduced exactly when the restricted value at
/// a slice is not deep-equal to the value carried by the currently open
/// range. The empty sequence compresses to no ranges at all.
#[must_use]
pub fn compact(slices: &[Document], whitelist: &Whitelist) -> Vec<Range> {
    let mut ranges: Vec<Range> = Vec::new();
    for (number, doc) in (1..).zip(slices.iter()) {
        let values = whitelist.restrict(doc);
        match ranges.last_mut() {
            Some(open) if open.values == values => open.end = number,
            _ => ranges.push(Range {
                start: number,
                end: number,
                values,
            }),
        }
    }
    ranges
}
