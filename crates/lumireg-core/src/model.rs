//! Shared identifiers and the source vocabulary.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Accelerator-assigned run number. Supplied by the monitoring feed, never
/// generated locally.
pub type RunNumber = u32;

/// 1-indexed lumisection number within a run.
pub type SliceNumber = u32;

/// Store-global event version. Strictly increasing, allocated by the event
/// log; holes are legal (rolled-back operations skip their version).
pub type Version = i64;

/// Who produced an attribute update for a lumisection.
///
/// The two sources carry independent attribute vocabularies and are
/// reconstructed separately: the automated feed writes machine state, human
/// reviewers write per-component quality verdicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    /// Automated monitoring feed.
    Feed,
    /// Human reviewer input.
    Reviewer,
}

/// Error returned when parsing an unknown source string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownSource {
    /// The unrecognised input string.
    pub raw: String,
}

impl fmt::Display for UnknownSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown source '{}': expected one of feed, reviewer",
            self.raw
        )
    }
}

impl std::error::Error for UnknownSource {}

impl Source {
    /// Both known sources.
    pub const ALL: [Self; 2] = [Self::Feed, Self::Reviewer];

    /// Canonical lowercase string form used in storage and CLI flags.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Feed => "feed",
            Self::Reviewer => "reviewer",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = UnknownSource;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "feed" => Ok(Self::Feed),
            "reviewer" => Ok(Self::Reviewer),
            _ => Err(UnknownSource { raw: s.to_string() }),
        }
    }
}

impl Serialize for Source {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Source {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(serde::de::Error::custom)
    }
}
