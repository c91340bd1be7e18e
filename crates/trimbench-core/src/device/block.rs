//! Linux block device backed by `BLKDISCARD`.

use super::{check_range, DiscardDevice, Geometry};
use crate::{Error, Result};
use nix::libc::c_int;
use nix::{ioctl_read, ioctl_read_bad, ioctl_write_ptr_bad, request_code_none};
use std::fs::{File, OpenOptions};
use std::io;
use std::os::fd::AsRawFd;
use std::os::unix::fs::{FileExt, FileTypeExt};
use std::path::{Path, PathBuf};
use tracing::debug;

// <linux/fs.h>
ioctl_read!(blk_getsize64, 0x12, 114, u64);
ioctl_read_bad!(blk_sszget, request_code_none!(0x12, 104), c_int);
ioctl_write_ptr_bad!(blk_discard, request_code_none!(0x12, 119), [u64; 2]);

/// An open block device.
///
/// The file handle is closed when the value is dropped.
#[derive(Debug)]
pub struct BlockDevice {
    file: File,
    path: PathBuf,
    geometry: Geometry,
}

impl BlockDevice {
    /// Open `path` read-write and probe its geometry.
    ///
    /// # Errors
    ///
    /// [`Error::Open`] if the path cannot be opened,
    /// [`Error::NotBlockDevice`] if it is not a block device, and
    /// [`Error::Geometry`] if the size probes fail.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = open_block_file(&path, true)?;
        let geometry = probe_geometry(&file)?;
        debug!(
            path = %path.display(),
            size = geometry.size,
            sector_size = geometry.sector_size,
            "opened block device"
        );

        Ok(Self {
            file,
            path,
            geometry,
        })
    }

    /// Read the geometry of `path` through a read-only handle.
    ///
    /// Nothing is written and the handle is closed before returning.
    ///
    /// # Errors
    ///
    /// Same as [`BlockDevice::open`].
    pub fn probe(path: impl AsRef<Path>) -> Result<Geometry> {
        let file = open_block_file(path.as_ref(), false)?;
        probe_geometry(&file)
    }

    /// Path the device was opened from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn open_block_file(path: &Path, write: bool) -> Result<File> {
    let open_error = |source| Error::Open {
        path: path.to_path_buf(),
        source,
    };
    let meta = std::fs::metadata(path).map_err(open_error)?;
    if !meta.file_type().is_block_device() {
        return Err(Error::NotBlockDevice {
            path: path.to_path_buf(),
        });
    }
    OpenOptions::new()
        .read(true)
        .write(write)
        .open(path)
        .map_err(open_error)
}

fn probe_geometry(file: &File) -> Result<Geometry> {
    let fd = file.as_raw_fd();

    let mut size: u64 = 0;
    // SAFETY: `fd` stays open for the borrow of `file`; the kernel writes a
    // single u64 through the pointer.
    unsafe { blk_getsize64(fd, &mut size) }.map_err(|e| Error::Geometry(e.into()))?;

    let mut sector: c_int = 0;
    // SAFETY: as above, the kernel writes a single int.
    unsafe { blk_sszget(fd, &mut sector) }.map_err(|e| Error::Geometry(e.into()))?;

    let sector_size = u64::try_from(sector).unwrap_or(0);
    if size == 0 || sector_size == 0 {
        return Err(Error::Geometry(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("device reports size {size}, sector size {sector}"),
        )));
    }
    Ok(Geometry { size, sector_size })
}

impl DiscardDevice for BlockDevice {
    fn geometry(&self) -> Geometry {
        self.geometry
    }

    fn discard(&mut self, offset: u64, len: u64) -> io::Result<()> {
        check_range(self.geometry.size, offset, len)?;
        let range = [offset, len];
        // SAFETY: the kernel reads two u64s from `range`, which outlives the
        // call.
        unsafe { blk_discard(self.file.as_raw_fd(), &range) }?;
        Ok(())
    }

    fn fill(&mut self, offset: u64, len: u64, pattern: &[u8]) -> io::Result<()> {
        check_range(self.geometry.size, offset, len)?;
        if pattern.is_empty() {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "empty pattern"));
        }
        let end = offset + len;
        let mut pos = offset;
        while pos < end {
            let chunk = pattern.len().min(usize::try_from(end - pos).unwrap_or(usize::MAX));
            self.file.write_all_at(&pattern[..chunk], pos)?;
            pos += chunk as u64;
        }
        Ok(())
    }

    fn sync(&mut self) -> io::Result<()> {
        self.file.sync_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_path() {
        let err = BlockDevice::open("/nonexistent/trimbench-device").unwrap_err();
        assert!(matches!(err, Error::Open { .. }));
    }

    #[test]
    fn test_open_regular_file_rejected() {
        let path = std::env::temp_dir().join(format!("trimbench-not-a-bdev-{}", std::process::id()));
        std::fs::write(&path, [0u8; 512]).unwrap();
        let err = BlockDevice::open(&path).unwrap_err();
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(err, Error::NotBlockDevice { .. }));
    }

    #[test]
    fn test_open_char_device_rejected() {
        let err = BlockDevice::open("/dev/null").unwrap_err();
        assert!(matches!(err, Error::NotBlockDevice { .. }));
    }

    #[test]
    fn test_geometry_read_rejects_missing_and_non_block() {
        let err = BlockDevice::probe("/nonexistent/trimbench-device").unwrap_err();
        assert!(matches!(err, Error::Open { .. }));
        let err = BlockDevice::probe("/dev/null").unwrap_err();
        assert!(matches!(err, Error::NotBlockDevice { .. }));
    }

    #[test]
    fn test_geometry_read_needs_no_write_access() {
        // A read-only file fails the block check, not the open.
        let path = std::env::temp_dir().join(format!("trimbench-ro-{}", std::process::id()));
        std::fs::write(&path, [0u8; 512]).unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_readonly(true);
        std::fs::set_permissions(&path, perms).unwrap();
        let err = BlockDevice::probe(&path).unwrap_err();
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(err, Error::NotBlockDevice { .. }));
    }
}
