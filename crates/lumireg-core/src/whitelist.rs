//! Attribute whitelists for range comparison.
//!
//! Range compaction and differential updates never compare full documents
//! unless asked to: each comparison first restricts both sides to a
//! configured set of attribute keys. The configured form `["*"]` is the
//! sentinel for "all attributes".

use crate::document::Document;
use std::collections::BTreeSet;

/// Which top-level attribute keys participate in document comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Whitelist {
    /// Compare full documents.
    All,
    /// Restrict both sides of every comparison to exactly these keys.
    Keys(BTreeSet<String>),
}

impl Whitelist {
    /// Build a whitelist from its configured list form.
    ///
    /// A list whose first entry is `"*"` is the "all attributes" sentinel;
    /// anything else selects exactly the listed keys.
    #[must_use]
    pub fn from_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = BTreeSet::new();
        for (i, key) in keys.into_iter().enumerate() {
            if i == 0 && key.as_ref() == "*" {
                return Self::All;
            }
            set.insert(key.as_ref().to_string());
        }
        Self::Keys(set)
    }

    /// Restrict a document to the whitelisted keys.
    ///
    /// `All` returns the document unchanged. Keys absent from the document
    /// simply do not appear in the restriction — both the stored and the
    /// incoming side of a comparison are restricted the same way, so absent
    /// keys never produce spurious differences.
    #[must_use]
    pub fn restrict(&self, document: &Document) -> Document {
        match self {
            Self::All => document.clone(),
            Self::Keys(keys) => document
                .iter()
                .filter(|(key, _)| keys.contains(*key))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        }
    }

    /// `true` when two documents are deep-equal after restriction.
    #[must_use]
    pub fn eq_restricted(&self, a: &Document, b: &Document) -> bool {
        match self {
            Self::All => a == b,
            Self::Keys(_) => self.restrict(a) == self.restrict(b),
        }
    }
}
