//! End-to-end runs of the benchmark driver.
//!
//! Most tests use an in-memory device. The block device test needs a
//! scratch device whose contents may be destroyed:
//!
//! Run with: sudo TRIMBENCH_TEST_DEVICE=/dev/loop7 cargo test --test driver_integration -- --nocapture

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use trimbench_core::config::{RunConfig, RunFlags};
use trimbench_core::device::{BlockDevice, DiscardDevice, Geometry, RecordedOp, RecordingDevice};
use trimbench_core::driver::{Driver, Phase};
use trimbench_core::entropy::EntropyBuffer;
use trimbench_core::report::{ReportSink, ReportStyle, StepReport, TextSink};
use trimbench_core::sweep::{RecordRange, SweepPlan};
use trimbench_core::{DeviceOp, Error, ErrorKind};

const MIB: u64 = 1024 * 1024;

fn geometry(size: u64) -> Geometry {
    Geometry {
        size,
        sector_size: 512,
    }
}

fn entropy() -> EntropyBuffer {
    EntropyBuffer::from_rng(&mut StdRng::seed_from_u64(99)).unwrap()
}

fn driver(device: RecordingDevice, config: RunConfig, plan: SweepPlan) -> Driver<RecordingDevice> {
    Driver::new(device, config, plan)
        .unwrap()
        .with_seed(1234)
        .with_entropy(entropy())
}

fn randomized() -> RunFlags {
    RunFlags {
        randomized: true,
        ..RunFlags::default()
    }
}

/// Sets the stop flag once `after` reports have arrived.
struct StopAfter {
    stop: Arc<AtomicBool>,
    after: usize,
    seen: usize,
}

impl ReportSink for StopAfter {
    fn report(&mut self, _report: &StepReport) -> std::io::Result<()> {
        self.seen += 1;
        if self.seen >= self.after {
            self.stop.store(true, Ordering::Relaxed);
        }
        Ok(())
    }
}

/// Raises the stop flag after `after` discards reach the inner device.
struct StopAfterDiscards {
    inner: RecordingDevice,
    stop: Arc<AtomicBool>,
    after: u64,
}

impl DiscardDevice for StopAfterDiscards {
    fn geometry(&self) -> Geometry {
        self.inner.geometry()
    }

    fn discard(&mut self, offset: u64, len: u64) -> std::io::Result<()> {
        self.inner.discard(offset, len)?;
        if self.inner.discard_count() >= self.after {
            self.stop.store(true, Ordering::Relaxed);
        }
        Ok(())
    }

    fn fill(&mut self, offset: u64, len: u64, pattern: &[u8]) -> std::io::Result<()> {
        self.inner.fill(offset, len, pattern)
    }

    fn sync(&mut self) -> std::io::Result<()> {
        self.inner.sync()
    }
}

#[test]
fn test_sequential_default_run() {
    let g = geometry(64 * MIB);
    let cfg = RunConfig::new(0, 4096, 10 * MIB, g, RunFlags::default());
    let mut drv = driver(RecordingDevice::new(g), cfg, SweepPlan::new(4096, None));

    let summary = drv.run(&mut ()).unwrap();
    let report = &summary.reports[0];
    assert_eq!(report.count, 2560);
    assert_eq!(report.total_size, 10 * MIB);
    assert!(report.min <= report.avg && report.avg <= report.max);

    let dev = drv.into_device();
    // Initial whole-device discard plus the timed ones.
    assert_eq!(dev.discard_count(), 2561);
    assert_eq!(dev.discarded_bytes(), 64 * MIB + 10 * MIB);
    assert_eq!(dev.written_bytes(), 10 * MIB);
}

#[test]
fn test_sweep_three_record_sizes() {
    let g = geometry(64 * MIB);
    let cfg = RunConfig::new(0, 4096, 10 * MIB, g, RunFlags::default());
    let range: RecordRange = "4096:12288:4096".parse().unwrap();
    let mut drv = driver(RecordingDevice::counting(g), cfg, SweepPlan::new(4096, Some(range)));

    let summary = drv.run(&mut ()).unwrap();
    let sizes: Vec<u64> = summary.reports.iter().map(|r| r.record_size).collect();
    assert_eq!(sizes, vec![4096, 8192, 12288]);
    assert_eq!(summary.reports[0].total_size, 10 * MIB);
    assert_eq!(summary.reports[1].total_size, 10 * MIB);
    assert_eq!(summary.reports[2].total_size, 10_481_664);
    assert_eq!(summary.reports[2].count, 853);
}

#[test]
fn test_randomized_sweep_prepares_once_and_replays() {
    let g = geometry(4 * MIB);
    let cfg = RunConfig::new(0, 4096, MIB, g, randomized());
    let range = RecordRange::new(4096, 8192, 4096).unwrap();
    let mut drv = driver(RecordingDevice::new(g), cfg, SweepPlan::new(4096, Some(range)));

    let summary = drv.run(&mut ()).unwrap();
    assert_eq!(summary.reports.len(), 2);

    let fills = drv.device().fills();
    let whole_device = fills.iter().filter(|&&(_, len)| len == g.size).count();
    assert_eq!(whole_device, 1);
    let replayed: u64 = fills.iter().skip(1).map(|&(_, len)| len).sum();
    assert_eq!(replayed, 2 * MIB);
}

#[test]
fn test_randomized_never_repeats_a_block() {
    let g = geometry(MIB);
    let cfg = RunConfig::new(0, 4096, MIB, g, randomized());
    let mut drv = driver(RecordingDevice::new(g), cfg, SweepPlan::new(4096, None));
    drv.run(&mut ()).unwrap();

    let mut offsets: Vec<u64> = drv.device().discards().iter().skip(1).map(|d| d.0).collect();
    assert_eq!(offsets.len(), 256);
    offsets.sort_unstable();
    offsets.dedup();
    assert_eq!(offsets.len(), 256);
}

#[test]
fn test_randomized_start_is_ignored() {
    let g = geometry(MIB);
    let cfg = RunConfig::new(8192, 4096, 65536, g, randomized());
    assert_eq!(cfg.start, 0);
}

#[test]
fn test_failure_mid_sweep_keeps_earlier_reports() {
    let g = geometry(MIB);
    let cfg = RunConfig::new(0, 4096, 65536, g, RunFlags::default());
    let range = RecordRange::new(4096, 8192, 4096).unwrap();
    // 1 whole-device discard + 16 for the first step, then fail.
    let dev = RecordingDevice::counting(g).fail_discard_after(17);
    let mut drv = driver(dev, cfg, SweepPlan::new(4096, Some(range)));

    let mut sink = TextSink::new(Vec::new(), ReportStyle::Batch);
    let err = drv.run(&mut sink).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Device);
    assert!(matches!(
        err,
        Error::Device {
            op: DeviceOp::Discard,
            offset: 0,
            len: 8192,
            ..
        }
    ));

    let out = String::from_utf8(sink.into_inner()).unwrap();
    assert_eq!(out.lines().count(), 1);
    assert!(out.starts_with("4096 65536 "));
    assert_eq!(drv.phase(), Phase::Done);
}

#[test]
fn test_stop_request_ends_sweep() {
    let g = geometry(MIB);
    let cfg = RunConfig::new(0, 4096, 65536, g, RunFlags::default());
    let range = RecordRange::new(4096, 16384, 4096).unwrap();
    let stop = Arc::new(AtomicBool::new(false));
    let mut drv = driver(RecordingDevice::counting(g), cfg, SweepPlan::new(4096, Some(range)))
        .with_stop_flag(Arc::clone(&stop));

    let mut sink = StopAfter {
        stop,
        after: 2,
        seen: 0,
    };
    let summary = drv.run(&mut sink).unwrap();
    assert!(summary.interrupted);
    assert_eq!(summary.reports.len(), 2);
    assert!(drv.ledger().is_empty());
}

#[test]
fn test_stop_mid_step_leaves_device_untouched_afterwards() {
    let g = geometry(MIB);
    let cfg = RunConfig::new(0, 4096, 65536, g, randomized());
    let stop = Arc::new(AtomicBool::new(false));
    // Initial whole-device discard plus 4 of the 16 timed ones.
    let dev = StopAfterDiscards {
        inner: RecordingDevice::new(g),
        stop: Arc::clone(&stop),
        after: 5,
    };
    let mut drv = Driver::new(dev, cfg, SweepPlan::new(4096, None))
        .unwrap()
        .with_seed(1234)
        .with_entropy(entropy())
        .with_stop_flag(stop);

    let mut sink = TextSink::new(Vec::new(), ReportStyle::Batch);
    let summary = drv.run(&mut sink).unwrap();
    assert!(summary.interrupted);
    assert!(summary.reports.is_empty());
    assert!(sink.into_inner().is_empty());
    assert!(drv.ledger().is_empty());

    let dev = drv.into_device().inner;
    assert_eq!(dev.discard_count(), 5);
    // The prepare pass is the only write; nothing was replayed.
    assert_eq!(dev.fills(), vec![(0, g.size)]);
    let last_discard = dev
        .ops()
        .iter()
        .rposition(|op| matches!(op, RecordedOp::Discard { .. }))
        .unwrap();
    assert!(dev.ops()[last_discard..]
        .iter()
        .all(|op| !matches!(op, RecordedOp::Fill { .. })));
}

#[test]
fn test_misaligned_start_rejected_before_io() {
    let g = geometry(MIB);
    let cfg = RunConfig::new(1000, 4096, 65536, g, RunFlags::default());
    let mut drv = driver(RecordingDevice::new(g), cfg, SweepPlan::new(4096, None));
    let err = drv.run(&mut ()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
    assert!(drv.device().ops().is_empty());
}

#[test]
fn test_total_larger_than_device_rejected() {
    let g = geometry(MIB);
    let cfg = RunConfig::new(0, 4096, 2 * MIB, g, RunFlags::default());
    let mut drv = driver(RecordingDevice::new(g), cfg, SweepPlan::new(4096, None));
    let err = drv.run(&mut ()).unwrap_err();
    assert!(err.to_string().contains("do not fit"));
}

#[test]
fn test_json_output_per_step() {
    let g = geometry(MIB);
    let cfg = RunConfig::new(0, 4096, 65536, g, RunFlags::default());
    let range = RecordRange::new(4096, 8192, 4096).unwrap();
    let mut drv = driver(RecordingDevice::counting(g), cfg, SweepPlan::new(4096, Some(range)));

    let mut sink = TextSink::new(Vec::new(), ReportStyle::Json);
    drv.run(&mut sink).unwrap();
    let out = String::from_utf8(sink.into_inner()).unwrap();
    let records: Vec<serde_json::Value> = out
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1]["record_size"], 8192);
    assert_eq!(records[1]["count"], 8);
}

/// Runs against a real scratch block device. Destroys its contents.
#[test]
fn test_block_device_run() {
    let Ok(path) = std::env::var("TRIMBENCH_TEST_DEVICE") else {
        eprintln!("Skipping: TRIMBENCH_TEST_DEVICE not set");
        return;
    };
    let device = match BlockDevice::open(&path) {
        Ok(device) => device,
        Err(e) => {
            eprintln!("Skipping: cannot open {path}: {e}");
            return;
        }
    };

    let g = device.geometry();
    println!("{path}: {} bytes, {} byte sectors", g.size, g.sector_size);
    let total = (4 * MIB).min(g.size);
    let cfg = RunConfig::new(0, 4096, total, g, randomized());
    let mut drv = Driver::new(device, cfg, SweepPlan::new(4096, None)).unwrap();

    match drv.run(&mut ()) {
        Ok(summary) => {
            let report = &summary.reports[0];
            println!("{}", report.human_block());
            assert_eq!(report.total_size, total);
        }
        Err(Error::Device { source, .. }) if source.raw_os_error() == Some(95) => {
            eprintln!("Skipping: {path} does not support discard");
        }
        Err(e) => panic!("run failed: {e}"),
    }
}
