//! Record-size sweeps.

use crate::units::parse_size;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Inclusive range of record sizes, `start:end:step`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RecordRange {
    /// First record size.
    pub start: u64,
    /// Last record size (inclusive bound).
    pub end: u64,
    /// Increment between iterations.
    pub step: u64,
}

impl RecordRange {
    /// Create a validated range.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] unless `step > 0`, `start <= end` and
    /// `start + step <= end`.
    pub fn new(start: u64, end: u64, step: u64) -> Result<Self> {
        let sane = step > 0
            && start > 0
            && start <= end
            && start.checked_add(step).is_some_and(|next| next <= end);
        if !sane {
            return Err(Error::Config(format!(
                "insane record range: {start}:{end}:{step}"
            )));
        }
        Ok(Self { start, end, step })
    }
}

impl FromStr for RecordRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(':').collect();
        let [start, end, step] = parts.as_slice() else {
            return Err(Error::Config(format!(
                "record range must be start:end:step, got {s:?}"
            )));
        };
        Self::new(parse_size(start)?, parse_size(end)?, parse_size(step)?)
    }
}

impl TryFrom<String> for RecordRange {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<RecordRange> for String {
    fn from(range: RecordRange) -> Self {
        range.to_string()
    }
}

impl fmt::Display for RecordRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.start, self.end, self.step)
    }
}

/// The sequence of record sizes a run covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepPlan {
    /// One step at a fixed record size.
    Single(u64),
    /// One step per record size in the range.
    Range(RecordRange),
}

impl SweepPlan {
    /// Plan for an optional range, falling back to a single record size.
    #[must_use]
    pub fn new(record_size: u64, range: Option<RecordRange>) -> Self {
        range.map_or(Self::Single(record_size), Self::Range)
    }

    /// Number of iterations.
    #[must_use]
    pub fn repeat(&self) -> u64 {
        match self {
            Self::Single(_) => 1,
            Self::Range(r) => (r.end - r.start) / r.step + 1,
        }
    }

    /// Record size for iteration `i` (zero-based).
    #[must_use]
    pub fn record_size(&self, i: u64) -> u64 {
        match self {
            Self::Single(size) => *size,
            Self::Range(r) => r.start + r.step * i,
        }
    }

    /// All record sizes in order.
    pub fn record_sizes(&self) -> impl Iterator<Item = u64> + '_ {
        (0..self.repeat()).map(|i| self.record_size(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_range() {
        let r: RecordRange = "4k:64k:4k".parse().unwrap();
        assert_eq!(r, RecordRange::new(4096, 65536, 4096).unwrap());
    }

    #[test]
    fn test_parse_range_bad_shape() {
        assert!("4k:64k".parse::<RecordRange>().is_err());
        assert!("4k:64k:4k:1".parse::<RecordRange>().is_err());
        assert!("4k::4k".parse::<RecordRange>().is_err());
    }

    #[test]
    fn test_range_sanity() {
        assert!(RecordRange::new(8192, 4096, 4096).is_err());
        assert!(RecordRange::new(4096, 6144, 4096).is_err());
        assert!(RecordRange::new(4096, 8192, 0).is_err());
        assert!(RecordRange::new(4096, 8192, 4096).is_ok());
    }

    #[test]
    fn test_sweep_three_iterations() {
        let plan = SweepPlan::new(4096, Some("4096:12288:4096".parse().unwrap()));
        assert_eq!(plan.repeat(), 3);
        assert_eq!(plan.record_sizes().collect::<Vec<_>>(), vec![4096, 8192, 12288]);
    }

    #[test]
    fn test_sweep_uneven_end() {
        let plan = SweepPlan::new(4096, Some(RecordRange::new(4096, 14000, 4096).unwrap()));
        assert_eq!(plan.repeat(), 3);
        assert_eq!(plan.record_size(2), 12288);
    }

    #[test]
    fn test_single_plan() {
        let plan = SweepPlan::new(8192, None);
        assert_eq!(plan.repeat(), 1);
        assert_eq!(plan.record_sizes().collect::<Vec<_>>(), vec![8192]);
    }

    #[test]
    fn test_range_display_roundtrip() {
        let r = RecordRange::new(512, 4096, 512).unwrap();
        assert_eq!(r.to_string().parse::<RecordRange>().unwrap(), r);
    }
}
