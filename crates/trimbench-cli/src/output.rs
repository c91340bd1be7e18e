//! Output formatting for CLI.

use clap::ValueEnum;
use serde::Deserialize;
use trimbench_core::report::ReportStyle;

/// Output format selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Progress banners and a results block per step.
    #[default]
    Human,
    /// One space-separated line per step (for scripting).
    Batch,
    /// One JSON object per step.
    Json,
}

impl From<OutputFormat> for ReportStyle {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Human => Self::Human,
            OutputFormat::Batch => Self::Batch,
            OutputFormat::Json => Self::Json,
        }
    }
}
