//! Host-health telemetry hub
//!
//! Agents on every monitored machine push periodic reports (load, swap, disk
//! utilization, ...). The hub stores them, compares each report with the one
//! before it and e-mails the operators when a threshold is crossed.
//!
//! ```text
//! TCP / HTTP front end → decode → ensure(host) → previous → append → evaluate → notify*
//! sweep timer → latest(host, 2) ────────────────────────────────────→ evaluate → notify*
//! ```

pub mod actors;
pub mod api;
pub mod codec;
pub mod config;
pub mod evaluator;
pub mod ingest;
pub mod notify;
pub mod pipeline;
pub mod report;
pub mod storage;
pub mod throttle;
pub mod util;

pub use report::{DiskUsage, FleetSummary, Mount, Report};
