//! Overwriting discarded regions with fresh data.
//!
//! Before a step measures anything, the blocks it will discard must hold
//! real data, otherwise the device may short-circuit the request. A first
//! pass writes the whole target region; in randomized mode later passes
//! replay only the extents the ledger recorded.

use crate::config::RunConfig;
use crate::device::DiscardDevice;
use crate::entropy::EntropyBuffer;
use crate::error::DeviceOp;
use crate::ledger::{Extent, ExtentLedger};
use crate::{Error, Result};
use tracing::debug;

/// Write `len` random bytes at `offset`.
///
/// # Errors
///
/// [`Error::Device`] if the write fails.
pub fn write_region<D: DiscardDevice + ?Sized>(
    device: &mut D,
    entropy: &EntropyBuffer,
    offset: u64,
    len: u64,
) -> Result<()> {
    device
        .fill(offset, len, entropy.as_bytes())
        .map_err(|e| Error::device(DeviceOp::Write, offset, len, e))
}

fn sync<D: DiscardDevice + ?Sized>(device: &mut D) -> Result<()> {
    device
        .sync()
        .map_err(|e| Error::device(DeviceOp::Sync, 0, 0, e))
}

/// Overwrite the step's target region: the whole device in randomized
/// mode, `[start, start + total)` otherwise.
///
/// Returns the number of bytes written.
///
/// # Errors
///
/// [`Error::Device`] if a write or the final sync fails.
pub fn prepare_device<D: DiscardDevice + ?Sized>(
    device: &mut D,
    config: &RunConfig,
    entropy: &EntropyBuffer,
) -> Result<u64> {
    let (offset, len) = if config.flags.randomized {
        (0, config.device_size)
    } else {
        (config.start, config.total_size)
    };
    debug!(offset, len, "preparing device");
    write_region(device, entropy, offset, len)?;
    sync(device)?;
    Ok(len)
}

/// Overwrite exactly the extents recorded in `ledger`, lowest first.
///
/// The ledger is checked before anything is written; a corrupted ledger
/// aborts the replay without touching the device. Returns the number of
/// bytes written.
///
/// # Errors
///
/// [`Error::InvariantViolation`] for a corrupted ledger, [`Error::Device`]
/// if a write or the final sync fails.
pub fn replay_ledger<D: DiscardDevice + ?Sized>(
    device: &mut D,
    ledger: &ExtentLedger,
    record_size: u64,
    entropy: &EntropyBuffer,
) -> Result<u64> {
    ledger.check_invariants()?;
    let device_size = device.geometry().size;
    // Extents are sorted, so a bounded last extent bounds them all.
    if let Some(last) = ledger.iter().last() {
        extent_offset(last, record_size, device_size)?;
    }

    let mut written = 0;
    for extent in ledger {
        let offset = extent_offset(extent, record_size, device_size)?;
        let len = extent
            .length
            .saturating_mul(record_size)
            .min(device_size - offset);
        write_region(device, entropy, offset, len)?;
        written += len;
    }
    sync(device)?;

    debug!(extents = ledger.len(), bytes = written, "replayed ledger");
    Ok(written)
}

fn extent_offset(extent: &Extent, record_size: u64, device_size: u64) -> Result<u64> {
    extent
        .start
        .checked_mul(record_size)
        .filter(|&offset| offset < device_size)
        .ok_or_else(|| Error::InvariantViolation(format!("extent {extent} lies beyond the device")))
}
