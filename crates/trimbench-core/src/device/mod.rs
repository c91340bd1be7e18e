//! Device access.
//!
//! The benchmark talks to its target through [`DiscardDevice`], so the
//! driver can run against a real block device ([`BlockDevice`]) or an
//! in-memory [`RecordingDevice`] that logs every request.

mod block;
mod recording;

pub use block::BlockDevice;
pub use recording::{RecordedOp, RecordingDevice};

use serde::Serialize;
use std::io;

/// Size and sector size of a device, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Geometry {
    /// Device size.
    pub size: u64,
    /// Logical sector size.
    pub sector_size: u64,
}

/// Operations the benchmark needs from a device.
pub trait DiscardDevice {
    /// Device geometry, probed when the device was opened.
    fn geometry(&self) -> Geometry;

    /// Discard `[offset, offset + len)` in a single request.
    ///
    /// # Errors
    ///
    /// Fails if the device rejects the range or the request errors.
    fn discard(&mut self, offset: u64, len: u64) -> io::Result<()>;

    /// Write exactly `len` bytes at `offset`, repeating `pattern`.
    ///
    /// # Errors
    ///
    /// Fails on any write error or short write.
    fn fill(&mut self, offset: u64, len: u64, pattern: &[u8]) -> io::Result<()>;

    /// Flush written data to the medium.
    ///
    /// # Errors
    ///
    /// Fails if the flush fails.
    fn sync(&mut self) -> io::Result<()>;
}

impl<D: DiscardDevice + ?Sized> DiscardDevice for &mut D {
    fn geometry(&self) -> Geometry {
        (**self).geometry()
    }

    fn discard(&mut self, offset: u64, len: u64) -> io::Result<()> {
        (**self).discard(offset, len)
    }

    fn fill(&mut self, offset: u64, len: u64, pattern: &[u8]) -> io::Result<()> {
        (**self).fill(offset, len, pattern)
    }

    fn sync(&mut self) -> io::Result<()> {
        (**self).sync()
    }
}

impl<D: DiscardDevice + ?Sized> DiscardDevice for Box<D> {
    fn geometry(&self) -> Geometry {
        (**self).geometry()
    }

    fn discard(&mut self, offset: u64, len: u64) -> io::Result<()> {
        (**self).discard(offset, len)
    }

    fn fill(&mut self, offset: u64, len: u64, pattern: &[u8]) -> io::Result<()> {
        (**self).fill(offset, len, pattern)
    }

    fn sync(&mut self) -> io::Result<()> {
        (**self).sync()
    }
}

/// Reject ranges that do not lie inside a device of `size` bytes.
pub(crate) fn check_range(size: u64, offset: u64, len: u64) -> io::Result<()> {
    match offset.checked_add(len) {
        Some(end) if len > 0 && end <= size => Ok(()),
        _ => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("range {offset}+{len} outside device of {size} bytes"),
        )),
    }
}
