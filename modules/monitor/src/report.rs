//! Handoff point to the external report-generation collaborator.

use std::collections::HashMap;

use netmon_core::Device;

use crate::stats::HostStats;

/// The monitor hands a snapshot to the report sink every this many cycles.
pub const REPORT_EVERY_CYCLES: u64 = 10;

/// External report generator. Receives read-only snapshots of the device
/// list and the per-device statistics; rendering and persistence are the
/// implementer's business, not the monitor's.
pub trait ReportSink: Send + Sync {
    fn generate(&self, devices: &[Device], stats: &HashMap<String, HostStats>) -> anyhow::Result<()>;
}
