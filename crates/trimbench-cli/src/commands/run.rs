//! Run command: the discard benchmark itself.

use crate::output::OutputFormat;
use crate::profile::{RunProfile, SizeValue};
use crate::signal;
use anyhow::{bail, Context};
use clap::Args;
use std::io;
use std::path::PathBuf;
use tracing::{info, warn};
use trimbench_core::config::{RunConfig, RunFlags, DEFAULT_RECORD_SIZE, DEFAULT_TOTAL_SIZE};
use trimbench_core::device::{BlockDevice, DiscardDevice, Geometry, RecordingDevice};
use trimbench_core::driver::Driver;
use trimbench_core::report::TextSink;
use trimbench_core::sweep::{RecordRange, SweepPlan};
use trimbench_core::units::{parse_offset, parse_size};

const DRY_RUN_SECTOR_SIZE: u64 = 512;

/// Arguments for run command.
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Block device to test. All data on it is destroyed.
    #[arg(short, long)]
    pub device: Option<PathBuf>,

    /// Starting offset of the discards [default: 0]
    #[arg(short, long)]
    pub start: Option<String>,

    /// Size of one discard request [default: 4K]
    #[arg(short, long)]
    pub record_size: Option<String>,

    /// Amount of data to discard per step [default: 10M]
    #[arg(short, long)]
    pub total_size: Option<String>,

    /// Sweep record sizes, e.g. 4K:64K:4K
    #[arg(short = 'R', long, value_name = "START:END:STEP")]
    pub record_range: Option<String>,

    /// Discard random blocks instead of walking forward
    #[arg(short = 'x', long)]
    pub random: bool,

    /// Discard blocks that are already discarded (skip prepare)
    #[arg(short = 'z', long)]
    pub discard_again: bool,

    /// Shorthand for --format batch
    #[arg(short, long)]
    pub batch: bool,

    /// Seed for random block selection
    #[arg(long)]
    pub seed: Option<u64>,

    /// Load options from a TOML profile. Flags given here win.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Use an in-memory device instead of issuing any I/O
    #[arg(long)]
    pub dry_run: bool,

    /// Size of the in-memory device when no device is given [default: 1G]
    #[arg(long, value_name = "SIZE", requires = "dry_run")]
    pub dry_run_size: Option<String>,
}

/// Fully resolved run options.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Settings {
    device: Option<PathBuf>,
    start: u64,
    record_size: u64,
    total_size: u64,
    record_range: Option<RecordRange>,
    flags: RunFlags,
    format: OutputFormat,
    seed: Option<u64>,
}

fn size_arg(
    name: &str,
    flag: Option<&str>,
    profile: Option<&SizeValue>,
    default: u64,
    parse: fn(&str) -> trimbench_core::Result<u64>,
) -> anyhow::Result<u64> {
    match (flag, profile) {
        (Some(text), _) => parse(text).with_context(|| format!("bad {name}")),
        (None, Some(value)) => {
            parse(&value.to_string()).with_context(|| format!("bad {name} in profile"))
        }
        (None, None) => Ok(default),
    }
}

impl Settings {
    /// Merge flags over profile over built-in defaults.
    fn resolve(
        args: &RunArgs,
        profile: RunProfile,
        format: Option<OutputFormat>,
    ) -> anyhow::Result<Self> {
        let start = size_arg(
            "starting point",
            args.start.as_deref(),
            profile.start.as_ref(),
            0,
            parse_offset,
        )?;
        let record_size = size_arg(
            "record size",
            args.record_size.as_deref(),
            profile.record_size.as_ref(),
            DEFAULT_RECORD_SIZE,
            parse_size,
        )?;
        let total_size = size_arg(
            "total size",
            args.total_size.as_deref(),
            profile.total_size.as_ref(),
            DEFAULT_TOTAL_SIZE,
            parse_size,
        )?;
        let record_range = args
            .record_range
            .as_deref()
            .or(profile.record_range.as_deref())
            .map(str::parse::<RecordRange>)
            .transpose()
            .context("bad record size range")?;

        let format = if args.batch {
            OutputFormat::Batch
        } else {
            format.or(profile.format).unwrap_or_default()
        };

        Ok(Self {
            device: args.device.clone().or(profile.device),
            start,
            record_size,
            total_size,
            record_range,
            flags: RunFlags {
                randomized: args.random || profile.random,
                discard_again: args.discard_again || profile.discard_again,
            },
            format,
            seed: args.seed.or(profile.seed),
        })
    }
}

fn open_device(args: &RunArgs, settings: &Settings) -> anyhow::Result<Box<dyn DiscardDevice>> {
    if args.dry_run {
        let geometry = match &settings.device {
            Some(path) => BlockDevice::probe(path)?,
            None => Geometry {
                size: parse_size(args.dry_run_size.as_deref().unwrap_or("1G"))
                    .context("bad dry run size")?,
                sector_size: DRY_RUN_SECTOR_SIZE,
            },
        };
        info!(size = geometry.size, "dry run, no I/O is issued");
        return Ok(Box::new(RecordingDevice::counting(geometry)));
    }

    let Some(path) = &settings.device else {
        bail!("you must specify a device (-d)");
    };
    Ok(Box::new(BlockDevice::open(path)?))
}

/// Run the discard benchmark.
pub fn run(args: RunArgs, format: Option<OutputFormat>) -> anyhow::Result<()> {
    let profile = match &args.config {
        Some(path) => RunProfile::load(path)?,
        None => RunProfile::default(),
    };
    let settings = Settings::resolve(&args, profile, format)?;

    let device = open_device(&args, &settings)?;
    let config = RunConfig::new(
        settings.start,
        settings.record_size,
        settings.total_size,
        device.geometry(),
        settings.flags,
    );
    config.validate()?;
    let plan = SweepPlan::new(config.record_size, settings.record_range);

    let stop = signal::install_stop_handler()?;
    let mut driver = Driver::new(device, config, plan)?.with_stop_flag(stop);
    if let Some(seed) = settings.seed {
        driver = driver.with_seed(seed);
    }

    let mut sink = TextSink::new(io::stdout().lock(), settings.format.into());
    let summary = driver.run(&mut sink)?;
    if summary.interrupted {
        warn!(steps = summary.reports.len(), "run interrupted");
    }
    Ok(())
}
