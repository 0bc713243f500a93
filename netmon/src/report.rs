//! CSV rendering of a monitoring snapshot.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use monitor::{HostStats, ReportSink};
use netmon_core::Device;
use time::format_description::well_known::Rfc3339;

/// Writes the latest snapshot to `<dir>/availability-report.csv`, one row per
/// monitored device. Each report overwrites the previous one; the directory
/// is created on first use.
pub struct CsvReportSink {
    dir: PathBuf,
}

impl CsvReportSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        CsvReportSink { dir: dir.into() }
    }
}

impl ReportSink for CsvReportSink {
    fn generate(&self, devices: &[Device], stats: &HashMap<String, HostStats>) -> anyhow::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join("availability-report.csv");
        let mut wtr = csv::Writer::from_writer(fs::File::create(&path)?);
        wtr.write_record([
            "host",
            "address",
            "state",
            "total_checks",
            "failures",
            "availability_percent",
            "mean_response_ms",
            "stability",
            "last_check",
        ])?;
        for d in devices {
            let Some(s) = stats.get(&d.id) else { continue };
            let last_check = s
                .last_check_at()
                .and_then(|t| t.format(&Rfc3339).ok())
                .unwrap_or_default();
            wtr.write_record([
                d.id.as_str(),
                d.address.as_str(),
                d.state.as_str(),
                &s.total_checks().to_string(),
                &s.failures().to_string(),
                &format!("{:.2}", s.availability_percent()),
                &format!("{:.1}", s.mean_response_time()),
                &format!("{:.1}", s.stability()),
                &last_check,
            ])?;
        }
        wtr.flush()?;
        Ok(())
    }
}
