//! Ledger of discarded extents.
//!
//! During a randomized run every block handed to the device is recorded
//! here, in units of the current record size. The ledger keeps its extents
//! sorted by start and fully merged: no two extents overlap or touch. That
//! gives the replay stage the minimal list of regions to rewrite, and lets
//! the range selector find the extent around a block with a binary search.
//!
//! Storage is a sorted `Vec<Extent>`. Lookups are `O(log n)`; inserts shift
//! the tail, which for the few thousand extents a benchmark step produces is
//! cheaper than a node-per-extent tree. Growth goes through
//! [`Vec::try_reserve`] so an allocation failure surfaces as
//! [`Error::Resource`] instead of aborting the process.

use crate::{Error, Result};
use serde::Serialize;
use std::fmt;

/// A run of contiguous discarded units, `[start, start + length)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Extent {
    /// First unit of the run.
    pub start: u64,
    /// Number of units in the run.
    pub length: u64,
}

impl Extent {
    /// Create an extent.
    #[must_use]
    pub const fn new(start: u64, length: u64) -> Self {
        Self { start, length }
    }

    /// One past the last unit.
    #[must_use]
    pub const fn end(&self) -> u64 {
        self.start + self.length
    }

    /// Whether `point` lies inside the extent.
    #[must_use]
    pub const fn contains(&self, point: u64) -> bool {
        point >= self.start && point < self.end()
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}({})", self.start, self.end(), self.length)
    }
}

/// Ordered, merged set of discarded extents.
#[derive(Debug, Clone, Default)]
pub struct ExtentLedger {
    extents: Vec<Extent>,
}

impl ExtentLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of extents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.extents.len()
    }

    /// Whether the ledger holds no extents.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.extents.is_empty()
    }

    /// Total units covered by all extents.
    #[must_use]
    pub fn covered_units(&self) -> u64 {
        self.extents.iter().map(|e| e.length).sum()
    }

    /// Drop every extent, keeping the allocation for the next iteration.
    pub fn clear(&mut self) {
        self.extents.clear();
    }

    /// Extents in ascending order of start.
    pub fn iter(&self) -> impl Iterator<Item = &Extent> + '_ {
        self.extents.iter()
    }

    /// The lowest extent, if any.
    #[must_use]
    pub fn first(&self) -> Option<Extent> {
        self.extents.first().copied()
    }

    /// Index of the first extent starting strictly after `point`.
    fn upper_bound(&self, point: u64) -> usize {
        self.extents.partition_point(|e| e.start <= point)
    }

    /// The extent containing `point`, if any.
    #[must_use]
    pub fn contains(&self, point: u64) -> Option<Extent> {
        let idx = self.upper_bound(point);
        let candidate = self.extents[..idx].last()?;
        candidate.contains(point).then_some(*candidate)
    }

    /// Record `[start, start + length)` as discarded.
    ///
    /// The new range absorbs every extent it overlaps or touches, so
    /// inserting a range that is already covered changes nothing. Returns
    /// the extent that now holds the range.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] for a zero-length or overflowing range,
    /// [`Error::Resource`] if the ledger cannot grow.
    pub fn insert(&mut self, start: u64, length: u64) -> Result<Extent> {
        if length == 0 {
            return Err(Error::Config(format!("empty extent at unit {start}")));
        }
        let end = start
            .checked_add(length)
            .ok_or_else(|| Error::Config(format!("extent {start}+{length} overflows")))?;

        let mut lo = self.upper_bound(start);
        if lo > 0 && self.extents[lo - 1].end() >= start {
            lo -= 1;
        }
        // Everything starting at or before `end` touches the new range.
        let hi = self.upper_bound(end);

        let merged = if lo == hi {
            self.extents.try_reserve(1)?;
            let extent = Extent::new(start, length);
            self.extents.insert(lo, extent);
            extent
        } else {
            let merged_start = start.min(self.extents[lo].start);
            let merged_end = end.max(self.extents[hi - 1].end());
            let extent = Extent::new(merged_start, merged_end - merged_start);
            self.extents[lo] = extent;
            self.extents.drain(lo + 1..hi);
            extent
        };

        debug_assert!(
            self.check_invariants().is_ok(),
            "ledger invariant broken after inserting {start}+{length}"
        );
        Ok(merged)
    }

    /// Grow `extent` by `by` units at its right edge, merging with the next
    /// extent if they now touch. Returns the grown extent.
    ///
    /// # Errors
    ///
    /// [`Error::InvariantViolation`] if `extent` is not an extent of this
    /// ledger; otherwise as [`insert`](Self::insert).
    pub fn extend_right(&mut self, extent: &Extent, by: u64) -> Result<Extent> {
        let known = self
            .extents
            .binary_search_by_key(&extent.start, |e| e.start)
            .map(|idx| self.extents[idx] == *extent)
            .unwrap_or(false);
        if !known {
            return Err(Error::InvariantViolation(format!(
                "cannot extend unknown extent {extent}"
            )));
        }
        self.insert(extent.end(), by)
    }

    /// First unit below `limit` not covered by any extent.
    #[must_use]
    pub fn first_gap(&self, limit: u64) -> Option<u64> {
        let gap = match self.extents.first() {
            Some(first) if first.start == 0 => first.end(),
            _ => 0,
        };
        (gap < limit).then_some(gap)
    }

    /// Verify every extent is non-empty and strictly separated from the next.
    ///
    /// # Errors
    ///
    /// [`Error::InvariantViolation`] describing the first offending pair.
    pub fn check_invariants(&self) -> Result<()> {
        if let Some(empty) = self.extents.iter().find(|e| e.length == 0) {
            return Err(Error::InvariantViolation(format!("empty extent {empty}")));
        }
        for pair in self.extents.windows(2) {
            let (prev, cur) = (pair[0], pair[1]);
            if prev.end() >= cur.start {
                return Err(Error::InvariantViolation(format!(
                    "prev {prev} not separated from cur {cur}"
                )));
            }
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn from_raw(extents: Vec<Extent>) -> Self {
        Self { extents }
    }
}

impl<'a> IntoIterator for &'a ExtentLedger {
    type Item = &'a Extent;
    type IntoIter = std::slice::Iter<'a, Extent>;

    fn into_iter(self) -> Self::IntoIter {
        self.extents.iter()
    }
}
