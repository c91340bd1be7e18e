//! Graceful stop on SIGINT/SIGTERM.

use anyhow::Context;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Install handlers for SIGINT and SIGTERM.
///
/// The first signal sets the returned flag; the driver finishes the request
/// in flight, skips the report for the interrupted step and cleans up. A
/// second signal exits immediately.
pub fn install_stop_handler() -> anyhow::Result<Arc<AtomicBool>> {
    let stop = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&stop);

    ctrlc::set_handler(move || {
        if flag.swap(true, Ordering::Relaxed) {
            warn!("Received second interrupt, forcing exit");
            std::process::exit(130);
        }
        info!("Received shutdown signal, stopping after the current request");
    })
    .context("failed to set signal handler")?;

    Ok(stop)
}
