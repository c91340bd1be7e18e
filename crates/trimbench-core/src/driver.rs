//! The benchmark state machine.
//!
//! A run walks `Idle -> Discarding -> (Preparing) -> Running -> Reporting
//! -> (Replaying) -> NextRecordSize` once per record size in the sweep and
//! ends in `Done`. The ledger is cleared on every way out of [`Driver::run`].
//!
//! ```no_run
//! use trimbench_core::config::{RunConfig, RunFlags};
//! use trimbench_core::device::{BlockDevice, DiscardDevice};
//! use trimbench_core::driver::Driver;
//! use trimbench_core::report::{ReportStyle, TextSink};
//! use trimbench_core::sweep::SweepPlan;
//!
//! # fn main() -> trimbench_core::Result<()> {
//! let device = BlockDevice::open("/dev/sdz")?;
//! let config = RunConfig::new(0, 4096, 10 << 20, device.geometry(), RunFlags::default());
//! let plan = SweepPlan::new(config.record_size, None);
//! let mut driver = Driver::new(device, config, plan)?;
//! let mut sink = TextSink::new(std::io::stdout(), ReportStyle::Human);
//! let summary = driver.run(&mut sink)?;
//! println!("{} steps", summary.reports.len());
//! # Ok(())
//! # }
//! ```

use crate::config::RunConfig;
use crate::device::DiscardDevice;
use crate::entropy::EntropyBuffer;
use crate::error::DeviceOp;
use crate::ledger::ExtentLedger;
use crate::prepare::{prepare_device, replay_ledger};
use crate::report::{ReportSink, StepReport};
use crate::selector::RangeSelector;
use crate::stats::StepStatistics;
use crate::sweep::SweepPlan;
use crate::{Error, Result};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Where the driver is in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    /// Nothing started yet.
    Idle,
    /// Discarding the whole device once before the first step.
    Discarding,
    /// Writing random data over the step's target region.
    Preparing,
    /// Timing discard requests.
    Running,
    /// Handing a finished step to the report sink.
    Reporting,
    /// Rewriting the extents discarded by a randomized step.
    Replaying,
    /// Moving on to the next record size.
    NextRecordSize,
    /// Run finished, failed or was interrupted.
    Done,
}

/// Everything a finished run produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SweepSummary {
    /// One report per completed step, in sweep order.
    pub reports: Vec<StepReport>,
    /// Whether a stop request cut the run short.
    pub interrupted: bool,
}

struct StepOutcome {
    stats: StepStatistics,
    wall: Duration,
}

/// Drives a discard benchmark over one device.
pub struct Driver<D> {
    device: D,
    base: RunConfig,
    plan: SweepPlan,
    ledger: ExtentLedger,
    selector: RangeSelector,
    entropy: EntropyBuffer,
    stop: Arc<AtomicBool>,
    phase: Phase,
}

impl<D: DiscardDevice> Driver<D> {
    /// Create a driver for `device`.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if `base` was built for a different geometry,
    /// [`Error::Entropy`] if no random data can be gathered.
    pub fn new(device: D, base: RunConfig, plan: SweepPlan) -> Result<Self> {
        let geometry = device.geometry();
        if geometry.size != base.device_size || geometry.sector_size != base.sector_size {
            return Err(Error::Config(format!(
                "configuration is for a {} byte device with {} byte sectors, device has {} and {}",
                base.device_size, base.sector_size, geometry.size, geometry.sector_size
            )));
        }
        Ok(Self {
            device,
            base,
            plan,
            ledger: ExtentLedger::new(),
            selector: RangeSelector::seeded(None),
            entropy: EntropyBuffer::from_os()?,
            stop: Arc::new(AtomicBool::new(false)),
            phase: Phase::Idle,
        })
    }

    /// Seed the random block selector for reproducible runs.
    #[must_use]
    pub fn with_seed(self, seed: u64) -> Self {
        self.with_selector(RangeSelector::seeded(Some(seed)))
    }

    /// Use a specific selector.
    #[must_use]
    pub fn with_selector(mut self, selector: RangeSelector) -> Self {
        self.selector = selector;
        self
    }

    /// Use a specific data pattern for prepare and replay.
    #[must_use]
    pub fn with_entropy(mut self, entropy: EntropyBuffer) -> Self {
        self.entropy = entropy;
        self
    }

    /// Share a stop flag, typically set from a signal handler.
    #[must_use]
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = stop;
        self
    }

    /// Handle to the stop flag.
    pub fn stop_signal(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Extents discarded so far in the current randomized step.
    pub fn ledger(&self) -> &ExtentLedger {
        &self.ledger
    }

    /// The device under test.
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Give the device back.
    pub fn into_device(self) -> D {
        self.device
    }

    /// Run every step of the sweep, reporting each to `sink`.
    ///
    /// A stop request ends the run early with
    /// [`SweepSummary::interrupted`] set; the step in flight is not
    /// reported.
    ///
    /// # Errors
    ///
    /// The first configuration, device, resource or ledger error. Steps
    /// completed before it have already been reported.
    pub fn run<S: ReportSink + ?Sized>(&mut self, sink: &mut S) -> Result<SweepSummary> {
        let result = self.sweep(sink);
        self.ledger.clear();
        self.phase = Phase::Done;
        if let Err(e) = &result {
            warn!(error = %e, "run aborted");
        }
        result
    }

    fn sweep<S: ReportSink + ?Sized>(&mut self, sink: &mut S) -> Result<SweepSummary> {
        let base = self.base;
        base.validate()?;

        self.enter(Phase::Discarding, &base, sink)?;
        self.device
            .discard(0, base.device_size)
            .map_err(|e| Error::device(DeviceOp::Discard, 0, base.device_size, e))?;

        let mut summary = SweepSummary::default();
        for iteration in 0..self.plan.repeat() {
            if self.stopped() {
                summary.interrupted = true;
                break;
            }
            let step = base.for_record_size(self.plan.record_size(iteration))?;
            info!(
                iteration,
                record_size = step.record_size,
                total_size = step.total_size,
                "starting step"
            );

            let randomized = step.flags.randomized;
            if !step.flags.discard_again && (!randomized || iteration == 0) {
                self.enter(Phase::Preparing, &step, sink)?;
                prepare_device(&mut self.device, &step, &self.entropy)?;
            }
            if randomized {
                self.ledger.clear();
            }

            self.enter(Phase::Running, &step, sink)?;
            let Some(outcome) = self.run_step(&step)? else {
                warn!(record_size = step.record_size, "step interrupted, not reported");
                summary.interrupted = true;
                break;
            };

            self.enter(Phase::Reporting, &step, sink)?;
            let report = StepReport::new(&step, &outcome.stats, outcome.wall);
            sink.report(&report).map_err(Error::Report)?;
            summary.reports.push(report);

            if randomized && !step.flags.discard_again {
                self.enter(Phase::Replaying, &step, sink)?;
                replay_ledger(&mut self.device, &self.ledger, step.record_size, &self.entropy)?;
            }
            self.phase = Phase::NextRecordSize;
        }
        Ok(summary)
    }

    /// Discard `step.total_size` bytes, timing each request. `None` if a
    /// stop request arrived first.
    fn run_step(&mut self, step: &RunConfig) -> Result<Option<StepOutcome>> {
        let mut stats = StepStatistics::new();
        let mut cursor = step.start;
        let mut done = 0;

        let started = Instant::now();
        while done < step.total_size {
            if self.stopped() {
                return Ok(None);
            }
            let remaining = step.total_size - done;
            let offset = if step.flags.randomized {
                let block = self.selector.next_block(&mut self.ledger, step)?;
                block * step.record_size
            } else {
                cursor
            };
            let len = step
                .record_size
                .min(remaining)
                .min(step.device_size - offset);

            let t0 = Instant::now();
            self.device
                .discard(offset, len)
                .map_err(|e| Error::device(DeviceOp::Discard, offset, len, e))?;
            stats.record_duration(t0.elapsed());

            cursor += len;
            done += len;
        }
        let wall = started.elapsed();

        debug!(
            count = stats.count,
            sum = stats.sum,
            wall_secs = wall.as_secs_f64(),
            extents = self.ledger.len(),
            "step finished"
        );
        Ok(Some(StepOutcome { stats, wall }))
    }

    fn enter<S: ReportSink + ?Sized>(
        &mut self,
        phase: Phase,
        step: &RunConfig,
        sink: &mut S,
    ) -> Result<()> {
        self.phase = phase;
        sink.phase(phase, step).map_err(Error::Report)
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }
}

impl<D> std::fmt::Debug for Driver<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Driver")
            .field("base", &self.base)
            .field("plan", &self.plan)
            .field("phase", &self.phase)
            .field("extents", &self.ledger.len())
            .finish_non_exhaustive()
    }
}
