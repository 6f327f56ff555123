//! Alert evaluation
//!
//! [`evaluate`] compares the incoming report of a host with the one before it
//! and decides which alerts fire. It performs no I/O; throttle state and the
//! current time are passed in.
//!
//! ## Rules
//!
//! ```text
//! load:  previous exists && cur > prev && cur > load_abs     && |cur - prev| > load_delta
//! swap:  previous exists && cur > prev && cur > swap_abs_pct && |cur - prev| > swap_delta_pct
//! disk:  used_pct >= disk_pct && (never notified || |now - last| >= disk_report_interval)
//! ```
//!
//! Load and swap compare strictly, disk inclusively. Decreases are never
//! actionable. Disk needs no baseline, so a host's first report can already
//! fire disk alerts.

use serde::{Deserialize, Serialize};

use crate::report::{Mount, Report};
use crate::throttle::{MountTimestamps, is_due};

/// Alert thresholds, fixed at startup
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// `loadThreshold`: absolute one-minute load above which to alert
    pub load_abs: f64,

    /// `loadFirstDThreshold`: minimum load increase between two reports
    pub load_delta: f64,

    /// `swapThreshold`: absolute swap utilization (percent)
    pub swap_abs_pct: f64,

    /// `swapFirstDThreshold`: minimum swap utilization increase (percent points)
    pub swap_delta_pct: f64,

    /// `diskThreshold`: mount utilization (percent) at which to alert
    pub disk_pct: u32,

    /// `diskReportInterval`: minimum seconds between disk alerts for one mount
    pub disk_report_interval_secs: i64,
}

/// Kind of check an alert came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Load,
    Swap,
    Disk,
}

/// A condition worth notifying about
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlertEvent {
    Load {
        hostname: String,
        previous: f64,
        current: f64,
    },
    Swap {
        hostname: String,
        previous: f64,
        current: f64,
    },
    Disk {
        hostname: String,
        mount: Mount,
        used_pct: u8,
    },
}

impl AlertEvent {
    pub fn hostname(&self) -> &str {
        match self {
            AlertEvent::Load { hostname, .. }
            | AlertEvent::Swap { hostname, .. }
            | AlertEvent::Disk { hostname, .. } => hostname,
        }
    }

    pub fn kind(&self) -> AlertKind {
        match self {
            AlertEvent::Load { .. } => AlertKind::Load,
            AlertEvent::Swap { .. } => AlertKind::Swap,
            AlertEvent::Disk { .. } => AlertKind::Disk,
        }
    }
}

/// Rising-edge differential check shared by load and swap
fn rising(previous: f64, current: f64, absolute: f64, delta: f64) -> bool {
    current > previous && current > absolute && (current - previous).abs() > delta
}

/// Evaluate one report against the previous one of the same host
///
/// `last_disk_notify` is the host's throttle snapshot and `now` the current
/// unix time in seconds.
pub fn evaluate(
    previous: Option<&Report>,
    current: &Report,
    thresholds: &Thresholds,
    last_disk_notify: &MountTimestamps,
    now: i64,
) -> Vec<AlertEvent> {
    let mut events = Vec::new();

    if let Some(previous) = previous {
        if rising(
            previous.load_one,
            current.load_one,
            thresholds.load_abs,
            thresholds.load_delta,
        ) {
            events.push(AlertEvent::Load {
                hostname: current.hostname.clone(),
                previous: previous.load_one,
                current: current.load_one,
            });
        }

        if rising(
            previous.swap_used_pct,
            current.swap_used_pct,
            thresholds.swap_abs_pct,
            thresholds.swap_delta_pct,
        ) {
            events.push(AlertEvent::Swap {
                hostname: current.hostname.clone(),
                previous: previous.swap_used_pct,
                current: current.swap_used_pct,
            });
        }
    }

    for usage in &current.disk_report {
        if u32::from(usage.used_pct) < thresholds.disk_pct {
            continue;
        }

        let last = last_disk_notify.get(&usage.mount).copied();
        if is_due(last, now, thresholds.disk_report_interval_secs) {
            events.push(AlertEvent::Disk {
                hostname: current.hostname.clone(),
                mount: usage.mount,
                used_pct: usage.used_pct,
            });
        }
    }

    events
}
