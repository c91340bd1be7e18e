//! TOML run profiles.
//!
//! A profile holds any subset of the `run` options:
//!
//! ```toml
//! device = "/dev/sdb"
//! record_size = "4K"
//! total_size = "10M"
//! record_range = "4K:64K:4K"
//! random = true
//! format = "batch"
//! seed = 7
//! ```
//!
//! Sizes may be integers or unit-suffixed strings.

use crate::output::OutputFormat;
use anyhow::Context;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// A size given either as plain bytes or with a unit suffix.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum SizeValue {
    /// Plain byte count.
    Bytes(u64),
    /// Unit-suffixed string such as `"10M"`.
    Text(String),
}

impl fmt::Display for SizeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes(bytes) => write!(f, "{bytes}"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

/// Options loaded from a profile file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunProfile {
    /// Block device to test.
    pub device: Option<PathBuf>,
    /// Starting offset.
    pub start: Option<SizeValue>,
    /// Bytes per discard request.
    pub record_size: Option<SizeValue>,
    /// Bytes discarded per step.
    pub total_size: Option<SizeValue>,
    /// Record size sweep, `start:end:step`.
    pub record_range: Option<String>,
    /// Randomized block selection.
    #[serde(default)]
    pub random: bool,
    /// Skip prepare and replay.
    #[serde(default)]
    pub discard_again: bool,
    /// Output format.
    pub format: Option<OutputFormat>,
    /// Seed for randomized block selection.
    pub seed: Option<u64>,
}

impl RunProfile {
    /// Load a profile from `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read profile {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("invalid profile {}", path.display()))
    }

    /// Parse a profile from TOML text.
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }
}
