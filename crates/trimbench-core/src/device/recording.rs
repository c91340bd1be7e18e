//! In-memory device that records every request.

use super::{check_range, DiscardDevice, Geometry};
use serde::Serialize;
use std::io;

/// A request seen by a [`RecordingDevice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RecordedOp {
    /// `discard(offset, len)`.
    Discard {
        /// Byte offset.
        offset: u64,
        /// Byte length.
        len: u64,
    },
    /// `fill(offset, len, _)`.
    Fill {
        /// Byte offset.
        offset: u64,
        /// Byte length.
        len: u64,
    },
    /// `sync()`.
    Sync,
}

/// Device stand-in that validates and records requests without touching
/// storage.
///
/// Used by tests and by dry runs. Dry runs keep only the counters.
#[derive(Debug, Clone)]
pub struct RecordingDevice {
    geometry: Geometry,
    log: Option<Vec<RecordedOp>>,
    fail_discard_after: Option<u64>,
    discards: u64,
    discarded_bytes: u64,
    written_bytes: u64,
}

impl RecordingDevice {
    /// Device of the given geometry that logs every request.
    #[must_use]
    pub fn new(geometry: Geometry) -> Self {
        Self {
            geometry,
            log: Some(Vec::new()),
            fail_discard_after: None,
            discards: 0,
            discarded_bytes: 0,
            written_bytes: 0,
        }
    }

    /// Device that only keeps counters, for long dry runs.
    #[must_use]
    pub fn counting(geometry: Geometry) -> Self {
        Self {
            log: None,
            ..Self::new(geometry)
        }
    }

    /// Fail every discard after the first `n` succeed.
    #[must_use]
    pub fn fail_discard_after(mut self, n: u64) -> Self {
        self.fail_discard_after = Some(n);
        self
    }

    /// Every logged request, in order. Empty for counting devices.
    #[must_use]
    pub fn ops(&self) -> &[RecordedOp] {
        self.log.as_deref().unwrap_or_default()
    }

    /// Logged discards as `(offset, len)`.
    #[must_use]
    pub fn discards(&self) -> Vec<(u64, u64)> {
        self.ops()
            .iter()
            .filter_map(|op| match *op {
                RecordedOp::Discard { offset, len } => Some((offset, len)),
                _ => None,
            })
            .collect()
    }

    /// Logged fills as `(offset, len)`.
    #[must_use]
    pub fn fills(&self) -> Vec<(u64, u64)> {
        self.ops()
            .iter()
            .filter_map(|op| match *op {
                RecordedOp::Fill { offset, len } => Some((offset, len)),
                _ => None,
            })
            .collect()
    }

    /// Forget logged requests, keeping counters.
    pub fn clear_log(&mut self) {
        if let Some(log) = self.log.as_mut() {
            log.clear();
        }
    }

    /// Successful discard requests so far.
    #[must_use]
    pub fn discard_count(&self) -> u64 {
        self.discards
    }

    /// Bytes discarded so far.
    #[must_use]
    pub fn discarded_bytes(&self) -> u64 {
        self.discarded_bytes
    }

    /// Bytes written so far.
    #[must_use]
    pub fn written_bytes(&self) -> u64 {
        self.written_bytes
    }

    fn record(&mut self, op: RecordedOp) {
        if let Some(log) = self.log.as_mut() {
            log.push(op);
        }
    }
}

impl DiscardDevice for RecordingDevice {
    fn geometry(&self) -> Geometry {
        self.geometry
    }

    fn discard(&mut self, offset: u64, len: u64) -> io::Result<()> {
        check_range(self.geometry.size, offset, len)?;
        if self.fail_discard_after.is_some_and(|n| self.discards >= n) {
            return Err(io::Error::from_raw_os_error(nix::libc::EIO));
        }
        self.discards += 1;
        self.discarded_bytes += len;
        self.record(RecordedOp::Discard { offset, len });
        Ok(())
    }

    fn fill(&mut self, offset: u64, len: u64, pattern: &[u8]) -> io::Result<()> {
        check_range(self.geometry.size, offset, len)?;
        if pattern.is_empty() {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "empty pattern"));
        }
        self.written_bytes += len;
        self.record(RecordedOp::Fill { offset, len });
        Ok(())
    }

    fn sync(&mut self) -> io::Result<()> {
        self.record(RecordedOp::Sync);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GEOMETRY: Geometry = Geometry {
        size: 1 << 20,
        sector_size: 512,
    };

    #[test]
    fn test_records_in_order() {
        let mut dev = RecordingDevice::new(GEOMETRY);
        dev.fill(0, 8192, &[0xA5; 4096]).unwrap();
        dev.sync().unwrap();
        dev.discard(4096, 4096).unwrap();
        assert_eq!(
            dev.ops(),
            &[
                RecordedOp::Fill {
                    offset: 0,
                    len: 8192
                },
                RecordedOp::Sync,
                RecordedOp::Discard {
                    offset: 4096,
                    len: 4096
                },
            ]
        );
        assert_eq!(dev.discards(), vec![(4096, 4096)]);
        assert_eq!(dev.fills(), vec![(0, 8192)]);
    }

    #[test]
    fn test_rejects_out_of_range() {
        let mut dev = RecordingDevice::new(GEOMETRY);
        assert!(dev.discard(GEOMETRY.size - 512, 1024).is_err());
        assert!(dev.fill(GEOMETRY.size, 512, &[1]).is_err());
        assert!(dev.ops().is_empty());
    }

    #[test]
    fn test_injected_failure() {
        let mut dev = RecordingDevice::new(GEOMETRY).fail_discard_after(2);
        dev.discard(0, 512).unwrap();
        dev.discard(512, 512).unwrap();
        let err = dev.discard(1024, 512).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(nix::libc::EIO));
        assert_eq!(dev.discard_count(), 2);
    }

    #[test]
    fn test_counting_keeps_no_log() {
        let mut dev = RecordingDevice::counting(GEOMETRY);
        dev.discard(0, 4096).unwrap();
        dev.fill(0, 4096, &[7; 16]).unwrap();
        assert!(dev.ops().is_empty());
        assert_eq!(dev.discard_count(), 1);
        assert_eq!(dev.discarded_bytes(), 4096);
        assert_eq!(dev.written_bytes(), 4096);
    }

    #[test]
    fn test_clear_log() {
        let mut dev = RecordingDevice::new(GEOMETRY);
        dev.discard(0, 512).unwrap();
        dev.clear_log();
        assert!(dev.ops().is_empty());
        assert_eq!(dev.discard_count(), 1);
    }
}
