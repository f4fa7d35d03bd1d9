//! Whitelist configuration.
//!
//! Which attribute keys participate in range comparison is static
//! configuration, not something the ledger computes: one named whitelist
//! for feed-sourced attributes, one for reviewer-sourced attributes, and
//! the `["*"]` sentinel for the sign-off path that compares everything.

use crate::model::Source;
use crate::whitelist::Whitelist;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Ledger configuration loaded from `lumireg.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Per-source comparison whitelists.
    #[serde(default)]
    pub whitelists: WhitelistConfig,
}

/// The two named whitelists, in their configured list form.
///
/// A list whose first entry is `"*"` selects all attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhitelistConfig {
    /// Keys compared for automated-feed updates.
    #[serde(default = "default_feed_keys")]
    pub feed: Vec<String>,
    /// Keys compared for reviewer updates.
    #[serde(default = "default_reviewer_keys")]
    pub reviewer: Vec<String>,
}

impl Default for WhitelistConfig {
    fn default() -> Self {
        Self {
            feed: default_feed_keys(),
            reviewer: default_reviewer_keys(),
        }
    }
}

fn default_feed_keys() -> Vec<String> {
    [
        "beam1_present",
        "beam1_stable",
        "beam2_present",
        "beam2_stable",
        "beams_stable",
        "cms_active",
        "physics_declared",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

fn default_reviewer_keys() -> Vec<String> {
    [
        "castor", "cms", "csc", "ctpps", "dt", "ecal", "es", "hcal", "hlt", "l1t", "l1tcalo",
        "l1tmu", "lumi", "pixel", "rpc", "strip",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

impl LedgerConfig {
    /// Load configuration from `path`, falling back to defaults when the
    /// file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using default whitelists");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        toml::from_str::<Self>(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// The comparison whitelist for updates from the given source.
    #[must_use]
    pub fn whitelist_for(&self, source: Source) -> Whitelist {
        match source {
            Source::Feed => Whitelist::from_keys(&self.whitelists.feed),
            Source::Reviewer => Whitelist::from_keys(&self.whitelists.reviewer),
        }
    }
}
