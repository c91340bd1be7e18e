//! Info command: device geometry without touching its data.

use crate::output::OutputFormat;
use anyhow::Context;
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;
use trimbench_core::device::{BlockDevice, Geometry};
use trimbench_core::units::{format_size, parse_size};

/// Arguments for info command.
#[derive(Args)]
pub struct InfoArgs {
    /// Block device to inspect.
    #[arg(short, long)]
    pub device: PathBuf,

    /// Record size used to count addressable units.
    #[arg(short, long, default_value = "4K")]
    pub record_size: String,
}

/// Serializable geometry for JSON output.
#[derive(Debug, Serialize)]
struct DeviceInfo {
    device: String,
    size: u64,
    sector_size: u64,
    record_size: u64,
    units: u64,
}

impl DeviceInfo {
    fn new(device: String, geometry: Geometry, record_size: u64) -> Self {
        Self {
            device,
            size: geometry.size,
            sector_size: geometry.sector_size,
            record_size,
            units: geometry.size.div_ceil(record_size),
        }
    }

    fn render(&self, format: OutputFormat) -> anyhow::Result<String> {
        Ok(match format {
            OutputFormat::Human => format!(
                "Device: {}\nSize: {} ({} bytes)\nSector size: {}\nUnits: {} x {}",
                self.device,
                format_size(self.size),
                self.size,
                self.sector_size,
                self.units,
                format_size(self.record_size)
            ),
            OutputFormat::Batch => format!(
                "{} {} {} {} {}",
                self.device, self.size, self.sector_size, self.record_size, self.units
            ),
            OutputFormat::Json => serde_json::to_string_pretty(self)?,
        })
    }
}

/// Show device geometry.
pub fn info(args: &InfoArgs, format: OutputFormat) -> anyhow::Result<()> {
    let record_size = parse_size(&args.record_size).context("bad record size")?;
    let geometry = BlockDevice::probe(&args.device)?;
    let info = DeviceInfo::new(args.device.display().to_string(), geometry, record_size);
    println!("{}", info.render(format)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DeviceInfo {
        let geometry = Geometry {
            size: 10_240,
            sector_size: 512,
        };
        DeviceInfo::new("/dev/sdz".into(), geometry, 4096)
    }

    #[test]
    fn test_units_include_partial_tail() {
        assert_eq!(sample().units, 3);
    }

    #[test]
    fn test_render_batch() {
        assert_eq!(
            sample().render(OutputFormat::Batch).unwrap(),
            "/dev/sdz 10240 512 4096 3"
        );
    }

    #[test]
    fn test_render_human() {
        let text = sample().render(OutputFormat::Human).unwrap();
        assert!(text.starts_with("Device: /dev/sdz\n"));
        assert!(text.contains("Size: 10.0K (10240 bytes)"));
        assert!(text.ends_with("Units: 3 x 4.0K"));
    }

    #[test]
    fn test_render_json() {
        let text = sample().render(OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["sector_size"], 512);
        assert_eq!(value["units"], 3);
    }

    #[test]
    fn test_info_rejects_regular_file() {
        let args = InfoArgs {
            device: PathBuf::from("Cargo.toml"),
            record_size: "4K".into(),
        };
        let err = info(&args, OutputFormat::Human).unwrap_err();
        assert!(err.to_string().contains("not a valid block device"));
    }
}
