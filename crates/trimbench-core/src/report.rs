//! Per-step result records and their text forms.

use crate::config::RunConfig;
use crate::driver::Phase;
use crate::stats::StepStatistics;
use serde::Serialize;
use std::io::{self, Write};
use std::time::Duration;

const MIB: f64 = 1024.0 * 1024.0;

/// Result of one test step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StepReport {
    /// Bytes per discard request.
    pub record_size: u64,
    /// Bytes discarded in the step.
    pub total_size: u64,
    /// Fastest request, seconds.
    pub min: f64,
    /// Slowest request, seconds.
    pub max: f64,
    /// Mean request latency, seconds.
    pub avg: f64,
    /// Sum of request latencies, seconds.
    pub sum: f64,
    /// MiB discarded per second of step wall time.
    pub throughput_mbps: f64,
    /// Number of requests.
    pub count: u64,
    /// Wall time of the whole discard loop, seconds.
    pub wall_secs: f64,
}

impl StepReport {
    /// Build the report for a finished step.
    #[must_use]
    pub fn new(step: &RunConfig, stats: &StepStatistics, wall: Duration) -> Self {
        let wall_secs = wall.as_secs_f64();
        let throughput_mbps = if wall_secs > 0.0 {
            (step.total_size as f64 / MIB) / wall_secs
        } else {
            0.0
        };
        Self {
            record_size: step.record_size,
            total_size: step.total_size,
            min: if stats.is_empty() { 0.0 } else { stats.min },
            max: stats.max,
            avg: stats.avg(),
            sum: stats.sum,
            throughput_mbps,
            count: stats.count,
            wall_secs,
        }
    }

    /// Single-line, space-separated form:
    /// `record_size total_size min max avg sum throughput`.
    #[must_use]
    pub fn batch_line(&self) -> String {
        format!(
            "{} {} {:.6} {:.6} {:.6} {:.6} {:.6}",
            self.record_size,
            self.total_size,
            self.min,
            self.max,
            self.avg,
            self.sum,
            self.throughput_mbps
        )
    }

    /// Multi-line form for people.
    #[must_use]
    pub fn human_block(&self) -> String {
        format!(
            "[+] RESULTS\nmin = {:.6}s\nmax = {:.6}s\navg = {:.6}s\ncount = {}\nsum = {:.6}s\nthroughput = {:.6} MB/s",
            self.min, self.max, self.avg, self.count, self.sum, self.throughput_mbps
        )
    }
}

/// How results are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportStyle {
    /// Phase banners plus a results block per step.
    #[default]
    Human,
    /// One space-separated line per step, nothing else.
    Batch,
    /// One JSON object per step, nothing else.
    Json,
}

/// Receives phase changes and step results from the driver.
pub trait ReportSink {
    /// The driver entered `phase` for `step`.
    ///
    /// # Errors
    ///
    /// Fails if the output cannot be written.
    fn phase(&mut self, phase: Phase, step: &RunConfig) -> io::Result<()> {
        let _ = (phase, step);
        Ok(())
    }

    /// A step finished.
    ///
    /// # Errors
    ///
    /// Fails if the output cannot be written.
    fn report(&mut self, report: &StepReport) -> io::Result<()>;
}

/// Discards everything.
impl ReportSink for () {
    fn report(&mut self, _report: &StepReport) -> io::Result<()> {
        Ok(())
    }
}

/// Writes results to any [`Write`] in a [`ReportStyle`].
#[derive(Debug)]
pub struct TextSink<W> {
    out: W,
    style: ReportStyle,
}

impl<W: Write> TextSink<W> {
    /// Create a sink.
    pub fn new(out: W, style: ReportStyle) -> Self {
        Self { out, style }
    }

    /// Recover the writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ReportSink for TextSink<W> {
    fn phase(&mut self, phase: Phase, step: &RunConfig) -> io::Result<()> {
        if self.style != ReportStyle::Human {
            return Ok(());
        }
        match phase {
            Phase::Discarding => writeln!(self.out, "[+] Discarding device"),
            Phase::Preparing | Phase::Replaying => writeln!(self.out, "[+] Preparing device"),
            Phase::Running => write!(
                self.out,
                "\n[+] Running test\nStart: {}\nRecord size: {}\nTotal size: {}\n\n[+] Testing\n",
                step.start, step.record_size, step.total_size
            ),
            _ => Ok(()),
        }
    }

    fn report(&mut self, report: &StepReport) -> io::Result<()> {
        match self.style {
            ReportStyle::Human => writeln!(self.out, "{}", report.human_block())?,
            ReportStyle::Batch => writeln!(self.out, "{}", report.batch_line())?,
            ReportStyle::Json => {
                serde_json::to_writer(&mut self.out, report)?;
                writeln!(self.out)?;
            }
        }
        self.out.flush()
    }
}
