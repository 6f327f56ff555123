//! Telemetry report model
//!
//! A [`Report`] is one timestamped sample sent by a host agent. Reports are
//! immutable once created; the hub only ever appends them to storage and reads
//! back the most recent ones.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Mount points an agent is allowed to report on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Mount {
    #[serde(rename = "/")]
    Root,
    #[serde(rename = "/home")]
    Home,
    #[serde(rename = "/var")]
    Var,
    #[serde(rename = "/tmp")]
    Tmp,
    #[serde(rename = "/exports")]
    Exports,
    #[serde(rename = "/exports/home")]
    ExportsHome,
    #[serde(rename = "/incoming")]
    Incoming,
    #[serde(rename = "/working")]
    Working,
}

impl Mount {
    pub const ALL: [Mount; 8] = [
        Mount::Root,
        Mount::Home,
        Mount::Var,
        Mount::Tmp,
        Mount::Exports,
        Mount::ExportsHome,
        Mount::Incoming,
        Mount::Working,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mount::Root => "/",
            Mount::Home => "/home",
            Mount::Var => "/var",
            Mount::Tmp => "/tmp",
            Mount::Exports => "/exports",
            Mount::ExportsHome => "/exports/home",
            Mount::Incoming => "/incoming",
            Mount::Working => "/working",
        }
    }
}

impl fmt::Display for Mount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a path is not on the mount allow-list
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("mount `{0}` is not on the allow-list")]
pub struct UnknownMount(pub String);

impl FromStr for Mount {
    type Err = UnknownMount;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mount::ALL
            .into_iter()
            .find(|mount| mount.as_str() == s)
            .ok_or_else(|| UnknownMount(s.to_string()))
    }
}

/// Utilization of a single mount point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskUsage {
    pub mount: Mount,

    /// Used space in percent (0-100)
    pub used_pct: u8,
}

impl DiskUsage {
    pub fn new(mount: Mount, used_pct: u8) -> Self {
        Self { mount, used_pct }
    }
}

/// One telemetry sample from a host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Seconds since the epoch, as supplied by the agent
    pub timestamp: i64,

    /// Short hostname (domain suffix already stripped by the agent)
    pub hostname: String,

    pub num_cpus: u32,
    pub mem_total_kb: u64,

    pub load_one: f64,
    pub load_five: f64,
    pub load_fifteen: f64,

    /// Swap utilization in percent; 0 when the host has no swap
    pub swap_used_pct: f64,

    // Carried and stored, never evaluated
    pub kernel_version: String,
    pub os_release: String,
    pub uptime: String,

    /// Per-mount utilization in the order the agent reported it
    pub disk_report: Vec<DiskUsage>,
}

impl Report {
    /// Disk report in its wire form, e.g. `/ 50 /home 30`
    pub fn disk_report_string(&self) -> String {
        self.disk_report
            .iter()
            .map(|usage| format!("{} {}", usage.mount, usage.used_pct))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Fleet-wide totals over the most recent report of every host
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetSummary {
    pub hosts: usize,
    pub cores: u64,
    pub mem_total_kb: u64,
}

impl FleetSummary {
    pub fn from_reports<'a>(reports: impl IntoIterator<Item = &'a Report>) -> Self {
        reports
            .into_iter()
            .fold(FleetSummary::default(), |summary, report| FleetSummary {
                hosts: summary.hosts + 1,
                cores: summary.cores + u64::from(report.num_cpus),
                mem_total_kb: summary.mem_total_kb + report.mem_total_kb,
            })
    }
}
