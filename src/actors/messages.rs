//! Message types for actor communication

use serde::Serialize;
use tokio::sync::oneshot;

use crate::storage::StorageError;

/// Commands that can be sent to the SweepActor
#[derive(Debug)]
pub enum SweepCommand {
    /// Run a sweep immediately, independent of the timer
    SweepNow {
        respond_to: oneshot::Sender<Result<SweepSummary, StorageError>>,
    },

    /// Stop the actor after the current sweep
    Shutdown,
}

/// Totals of one sweep over all known hosts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepSummary {
    /// Hosts listed by the registry
    pub hosts: usize,

    /// Hosts whose last two reports were evaluated
    pub evaluated: usize,

    /// Hosts with fewer than two stored reports
    pub skipped: usize,

    /// Hosts whose reports could not be read
    pub failed: usize,

    /// Alerts raised over all evaluated hosts
    pub alerts: usize,
}
