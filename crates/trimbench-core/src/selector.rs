//! Picks the next block to discard in randomized mode.
//!
//! A random unit is drawn. If the ledger has not seen it, it becomes a new
//! one-unit extent. If it falls inside a known extent, that extent is walked
//! forward one unit instead, so a region once entered is eventually covered
//! completely. When the walk hits the end of the device the search restarts
//! at the lowest uncovered unit, which is where a rescan from the start of
//! the ledger would land.

use crate::config::RunConfig;
use crate::ledger::ExtentLedger;
use crate::{Error, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::warn;

/// Widest range a single draw covers. Devices with more units than this
/// are only partially reachable by the initial draw.
pub const MAX_DRAW_SPAN: u64 = 1 << 32;

/// Random block selector backed by the ledger.
#[derive(Debug, Clone)]
pub struct RangeSelector<R = StdRng> {
    rng: R,
    span: u64,
    warned: bool,
}

impl RangeSelector<StdRng> {
    /// Selector seeded from `seed`, or from OS entropy when `None`.
    #[must_use]
    pub fn seeded(seed: Option<u64>) -> Self {
        let rng = seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        Self::new(rng)
    }
}

impl<R: Rng> RangeSelector<R> {
    /// Selector drawing from `rng`.
    pub fn new(rng: R) -> Self {
        Self {
            rng,
            span: MAX_DRAW_SPAN,
            warned: false,
        }
    }

    /// Limit the draw span.
    #[must_use]
    pub fn with_span(mut self, span: u64) -> Self {
        self.span = span.max(1);
        self
    }

    /// Choose the next block index (in record-size units) and record it in
    /// `ledger`.
    ///
    /// # Errors
    ///
    /// [`Error::Exhausted`] when every addressable unit is already in the
    /// ledger, [`Error::Resource`] if the ledger cannot grow.
    pub fn next_block(&mut self, ledger: &mut ExtentLedger, config: &RunConfig) -> Result<u64> {
        let units = config.units();
        if units == 0 {
            return Err(Error::Exhausted { units });
        }

        let candidate = self.draw(units);
        if let Some(block) = claim(ledger, candidate, units)? {
            return Ok(block);
        }

        let gap = ledger
            .first_gap(units)
            .ok_or(Error::Exhausted { units })?;
        claim(ledger, gap, units)?.ok_or(Error::Exhausted { units })
    }

    fn draw(&mut self, units: u64) -> u64 {
        let mut upper = units;
        if upper > self.span {
            if !self.warned {
                warn!(
                    units,
                    span = self.span,
                    "device too large for random draw, whole device will not be reached directly"
                );
                self.warned = true;
            }
            upper = self.span;
        }
        self.rng.gen_range(0..upper)
    }
}

/// Take `block` if it is free, or the unit just past its extent if that is
/// still on the device. `None` means the extent already runs to the end.
fn claim(ledger: &mut ExtentLedger, block: u64, units: u64) -> Result<Option<u64>> {
    match ledger.contains(block) {
        None => {
            ledger.insert(block, 1)?;
            Ok(Some(block))
        }
        Some(extent) if extent.end() < units => {
            ledger.extend_right(&extent, 1)?;
            Ok(Some(extent.end()))
        }
        Some(_) => Ok(None),
    }
}
