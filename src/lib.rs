//! # trimbench
//!
//! Discard (TRIM) latency and throughput benchmark for Linux block devices.
//!
//! This is the workspace root crate that re-exports core functionality.
//! For direct usage, depend on individual sub-crates:
//!
//! - [`trimbench-core`] - Extent ledger, range selector, benchmark driver
//! - [`trimbench-cli`] - CLI tool (`trimbench` binary)

pub use trimbench_core::*;
