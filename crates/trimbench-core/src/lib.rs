//! Discard (TRIM) latency and throughput benchmarking for Linux block
//! devices.
//!
//! The crate issues `BLKDISCARD` requests of a fixed record size against a
//! device, either walking forward from a starting offset or at random
//! positions, and reports min/max/avg latency and throughput per step.
//! Randomized runs track what they discarded in an [`ExtentLedger`] so the
//! selector never hits the same block twice and the prepare stage can
//! rewrite exactly those blocks afterwards.
//!
//! # Example
//!
//! ```
//! use trimbench_core::config::{RunConfig, RunFlags};
//! use trimbench_core::device::{DiscardDevice, Geometry, RecordingDevice};
//! use trimbench_core::driver::Driver;
//! use trimbench_core::sweep::SweepPlan;
//!
//! let device = RecordingDevice::counting(Geometry { size: 1 << 20, sector_size: 512 });
//! let config = RunConfig::new(0, 4096, 65536, device.geometry(), RunFlags::default());
//! let mut driver = Driver::new(device, config, SweepPlan::new(4096, None)).unwrap();
//!
//! let summary = driver.run(&mut ()).unwrap();
//! assert_eq!(summary.reports[0].count, 16);
//! ```

#![deny(missing_docs)]
#![deny(clippy::panic)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)]

mod error;

pub mod config;
pub mod device;
pub mod driver;
pub mod entropy;
pub mod ledger;
pub mod prepare;
pub mod report;
pub mod selector;
pub mod stats;
pub mod sweep;
pub mod units;

pub use error::{DeviceOp, Error, ErrorKind, Result};
pub use ledger::{Extent, ExtentLedger};
