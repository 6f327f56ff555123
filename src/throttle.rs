//! Disk notification throttling
//!
//! Disk utilization changes slowly, so a full disk would otherwise produce a
//! notification on every report. [`ThrottleState`] remembers when each
//! `(host, mount)` was last notified about. It is shared by every connection
//! handler and the sweep task, so all access goes through one lock.
//!
//! State lives for the uptime of the process; a restart resets throttling.

use std::collections::HashMap;

use tokio::sync::RwLock;
use tracing::trace;

use crate::report::Mount;

/// Last notification time (unix seconds) per mount of one host
pub type MountTimestamps = HashMap<Mount, i64>;

/// Whether enough time has passed since `last` to notify again
///
/// The distance is absolute, so a clock stepping backwards does not silence
/// a mount until the clock catches up again.
pub fn is_due(last: Option<i64>, now: i64, interval_secs: i64) -> bool {
    last.is_none_or(|last| (now - last).abs() >= interval_secs)
}

/// Synchronized `(host, mount) -> last notified` map
#[derive(Debug, Default)]
pub struct ThrottleState {
    entries: RwLock<HashMap<String, MountTimestamps>>,
}

impl ThrottleState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the entries for one host
    pub async fn snapshot(&self, hostname: &str) -> MountTimestamps {
        self.entries
            .read()
            .await
            .get(hostname)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn last_notified(&self, hostname: &str, mount: Mount) -> Option<i64> {
        self.entries
            .read()
            .await
            .get(hostname)
            .and_then(|mounts| mounts.get(&mount).copied())
    }

    /// Record a notification for `(host, mount)` at `now` if one is due
    ///
    /// Check and update happen under the same write lock, so of several tasks
    /// racing for the same mount only one gets `true` per interval.
    pub async fn claim(&self, hostname: &str, mount: Mount, now: i64, interval_secs: i64) -> bool {
        let mut entries = self.entries.write().await;
        let mounts = entries.entry(hostname.to_string()).or_default();

        if !is_due(mounts.get(&mount).copied(), now, interval_secs) {
            trace!("{hostname}:{mount} throttled");
            return false;
        }

        mounts.insert(mount, now);
        true
    }
}
