//! Per-step run parameters.

use crate::device::Geometry;
use crate::{Error, Result};
use serde::Serialize;

/// Default size of one discard request.
pub const DEFAULT_RECORD_SIZE: u64 = 4096;

/// Default amount of data discarded per step.
pub const DEFAULT_TOTAL_SIZE: u64 = 10 * 1024 * 1024;

/// Mode switches for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunFlags {
    /// Pick discard targets at random instead of walking forward.
    pub randomized: bool,
    /// Skip prepare and replay, so every discard hits already discarded
    /// blocks.
    pub discard_again: bool,
}

/// Parameters of one test step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunConfig {
    /// Byte offset of the first discard (always 0 in randomized mode).
    pub start: u64,
    /// Bytes per discard request.
    pub record_size: u64,
    /// Bytes to discard in the step.
    pub total_size: u64,
    /// Device size in bytes.
    pub device_size: u64,
    /// Device sector size in bytes.
    pub sector_size: u64,
    /// Mode switches.
    pub flags: RunFlags,
}

impl RunConfig {
    /// Build a configuration for a device of the given geometry.
    ///
    /// Randomized runs always start at offset 0.
    #[must_use]
    pub fn new(
        start: u64,
        record_size: u64,
        total_size: u64,
        geometry: Geometry,
        flags: RunFlags,
    ) -> Self {
        let start = if flags.randomized {
            if start != 0 {
                tracing::warn!(start, "starting offset ignored in randomized mode");
            }
            0
        } else {
            start
        };
        Self {
            start,
            record_size,
            total_size,
            device_size: geometry.size,
            sector_size: geometry.sector_size,
            flags,
        }
    }

    /// Check alignment and bounds against the device.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first violated constraint.
    pub fn validate(&self) -> Result<()> {
        if self.sector_size == 0 {
            return Err(Error::Config("device reports a zero sector size".into()));
        }
        if self.record_size == 0 || self.total_size < self.record_size {
            return Err(Error::Config(format!(
                "insane boundaries: record size = {}, total size = {}",
                self.record_size, self.total_size
            )));
        }
        if self.total_size % self.sector_size != 0 {
            return Err(Error::Config(
                "total size must be aligned to the sector size".into(),
            ));
        }
        if self.record_size % self.sector_size != 0 {
            return Err(Error::Config(
                "record size must be aligned to the sector size".into(),
            ));
        }
        if self.start % self.sector_size != 0 {
            return Err(Error::Config(
                "starting point must be aligned to the sector size".into(),
            ));
        }
        match self.start.checked_add(self.total_size) {
            Some(end) if end <= self.device_size => Ok(()),
            _ => Err(Error::Config(format!(
                "boundaries {}+{} do not fit in the device ({} bytes)",
                self.start, self.total_size, self.device_size
            ))),
        }
    }

    /// One past the last byte the step may discard.
    #[must_use]
    pub fn end(&self) -> u64 {
        self.start + self.total_size
    }

    /// Addressable record-size units on the device. A trailing partial unit
    /// counts; discards there are clipped to the device end.
    #[must_use]
    pub fn units(&self) -> u64 {
        self.device_size.div_ceil(self.record_size)
    }

    /// Derive the configuration for one sweep iteration.
    ///
    /// `total` is rounded half-up to a multiple of `record_size`, then
    /// clamped so the step stays inside the device.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the derived step is invalid.
    pub fn for_record_size(&self, record_size: u64) -> Result<Self> {
        if record_size == 0 {
            return Err(Error::Config("record size must be positive".into()));
        }
        let rounded = round_to_multiple(self.total_size, record_size);
        let room = self.device_size.saturating_sub(self.start);
        let step = Self {
            record_size,
            total_size: rounded.min(room),
            ..*self
        };
        step.validate()?;
        Ok(step)
    }
}

/// Round `value` to the nearest multiple of `unit`, halves rounding up.
#[must_use]
pub fn round_to_multiple(value: u64, unit: u64) -> u64 {
    let (wide_value, wide_unit) = (u128::from(value), u128::from(unit));
    let rounded = (2 * wide_value + wide_unit) / (2 * wide_unit) * wide_unit;
    u64::try_from(rounded).unwrap_or(value - value % unit)
}
