//! Error types for trimbench-core.

use std::collections::TryReserveError;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Device operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceOp {
    /// Discard (BLKDISCARD) of a byte range.
    Discard,
    /// Pattern write over a byte range.
    Write,
    /// Flush of written data.
    Sync,
}

impl fmt::Display for DeviceOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Discard => "discard",
            Self::Write => "write",
            Self::Sync => "sync",
        })
    }
}

/// Broad classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad or misaligned parameters; nothing was done to the device.
    Config,
    /// Open, geometry, discard, write or output failure.
    Device,
    /// The ledger could not grow, or has nothing left to hand out.
    Resource,
    /// Ledger corruption. A defect, never recoverable.
    InvariantViolation,
}

/// Errors that can occur while benchmarking a device.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or inconsistent run parameters.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The target path could not be opened.
    #[error("cannot open {}: {source}", .path.display())]
    Open {
        /// Device path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The target path exists but is not a block device.
    #[error("{} is not a valid block device", .path.display())]
    NotBlockDevice {
        /// Device path.
        path: PathBuf,
    },

    /// Device size or sector size could not be determined.
    #[error("cannot probe device geometry: {0}")]
    Geometry(std::io::Error),

    /// A discard, write or sync call failed.
    #[error("{op} failed at offset {offset} (length {len}): {source}")]
    Device {
        /// Operation that failed.
        op: DeviceOp,
        /// Byte offset of the request.
        offset: u64,
        /// Byte length of the request.
        len: u64,
        /// Underlying error.
        source: std::io::Error,
    },

    /// Results could not be written to the report output.
    #[error("cannot write report: {0}")]
    Report(#[source] std::io::Error),

    /// Random data for the prepare stage could not be gathered.
    #[error("entropy source unavailable: {0}")]
    Entropy(String),

    /// The ledger failed to allocate room for a new extent.
    #[error("ledger allocation failed: {0}")]
    Resource(#[from] TryReserveError),

    /// Every addressable unit is already in the ledger.
    #[error("all {units} addressable units already discarded")]
    Exhausted {
        /// Addressable units on the device.
        units: u64,
    },

    /// The ledger no longer satisfies its ordering invariant.
    #[error("extent ledger corrupted: {0}")]
    InvariantViolation(String),
}

impl Error {
    /// Classify this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Config,
            Self::Open { .. }
            | Self::NotBlockDevice { .. }
            | Self::Geometry(_)
            | Self::Device { .. }
            | Self::Entropy(_)
            | Self::Report(_) => ErrorKind::Device,
            Self::Resource(_) | Self::Exhausted { .. } => ErrorKind::Resource,
            Self::InvariantViolation(_) => ErrorKind::InvariantViolation,
        }
    }

    pub(crate) fn device(op: DeviceOp, offset: u64, len: u64, source: std::io::Error) -> Self {
        Self::Device {
            op,
            offset,
            len,
            source,
        }
    }
}

/// Result type for benchmark operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_config() {
        let err = Error::Config("record size must be aligned to the sector size".to_string());
        assert!(err.to_string().contains("invalid configuration"));
        assert!(err.to_string().contains("sector size"));
    }

    #[test]
    fn test_error_display_device() {
        let err = Error::device(
            DeviceOp::Discard,
            8192,
            4096,
            std::io::Error::from_raw_os_error(95),
        );
        let msg = err.to_string();
        assert!(msg.starts_with("discard failed"));
        assert!(msg.contains("8192"));
        assert!(msg.contains("4096"));
    }

    #[test]
    fn test_error_display_not_block_device() {
        let err = Error::NotBlockDevice {
            path: PathBuf::from("/tmp/file"),
        };
        assert!(err.to_string().contains("/tmp/file"));
    }

    #[test]
    fn test_error_kind_mapping() {
        assert_eq!(Error::Config(String::new()).kind(), ErrorKind::Config);
        assert_eq!(
            Error::Geometry(std::io::Error::from_raw_os_error(25)).kind(),
            ErrorKind::Device
        );
        assert_eq!(Error::Exhausted { units: 4 }.kind(), ErrorKind::Resource);
        assert_eq!(
            Error::InvariantViolation(String::new()).kind(),
            ErrorKind::InvariantViolation
        );
    }

    #[test]
    fn test_resource_from_try_reserve() {
        let mut v: Vec<u64> = Vec::new();
        let reserve = v.try_reserve(usize::MAX).unwrap_err();
        let err: Error = reserve.into();
        assert_eq!(err.kind(), ErrorKind::Resource);
    }

    #[test]
    fn test_error_implements_std_error() {
        fn assert_std_error<T: std::error::Error>() {}
        assert_std_error::<Error>();
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }
}
