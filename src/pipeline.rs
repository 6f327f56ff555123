//! Per-report processing pipeline
//!
//! Every front end drives reports through the same sequence:
//!
//! ```text
//! decode → ensure(host) → previous(host) → append(report) → evaluate → dispatch*
//! ```
//!
//! The periodic sweep reuses the tail of it through [`Pipeline::reevaluate`],
//! reading the two most recent reports from the store instead of appending.
//!
//! `previous` and `append` are separate store calls. Two reports of the same
//! host arriving on different connections at the same moment may both see the
//! same previous report, so one differential can be missed or reported twice.
//! Disk alerts are immune because of the atomic throttle claim in the
//! [`Dispatcher`].

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, instrument};

use crate::codec::{self, DecodeError, Protocol};
use crate::evaluator::{AlertEvent, Thresholds, evaluate};
use crate::notify::{Delivery, Dispatcher};
use crate::report::Report;
use crate::storage::{StorageBackend, StorageError};

/// Source of "now" in unix seconds
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("cannot decode report: {0}")]
    Decode(#[from] DecodeError),

    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] StorageError),
}

/// What happened to one evaluated report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub hostname: String,
    pub alerts: Vec<AlertEvent>,
    pub deliveries: Vec<Delivery>,
}

/// Result of ingesting a fresh report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestOutcome {
    /// The report was the first ever seen from this host
    pub new_host: bool,

    #[serde(flatten)]
    pub evaluation: Evaluation,
}

/// Result of re-running evaluation on stored data
#[derive(Debug, Clone, PartialEq)]
pub enum Reevaluation {
    Evaluated(Evaluation),

    /// The host has fewer than two stored reports (the count is attached)
    InsufficientHistory(usize),
}

/// Shared by every connection handler, the HTTP front end and the sweep
pub struct Pipeline {
    store: Arc<dyn StorageBackend>,
    thresholds: Thresholds,
    dispatcher: Arc<Dispatcher>,
    clock: Arc<dyn Clock>,
}

impl Pipeline {
    pub fn new(store: Arc<dyn StorageBackend>, thresholds: Thresholds, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            store,
            thresholds,
            dispatcher,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &Arc<dyn StorageBackend> {
        &self.store
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Decode one raw report and ingest it
    pub async fn ingest_raw(&self, raw: &str, protocol: Protocol) -> Result<IngestOutcome, PipelineError> {
        let report = codec::decode(raw, protocol)?;
        self.ingest(report).await
    }

    #[instrument(skip_all, fields(hostname = %report.hostname, timestamp = report.timestamp))]
    pub async fn ingest(&self, report: Report) -> Result<IngestOutcome, PipelineError> {
        let new_host = self.store.ensure(&report.hostname).await?;
        let previous = self.store.previous(&report.hostname).await?;
        self.store.append(&report).await?;

        let evaluation = self.evaluate_and_dispatch(previous.as_ref(), &report).await;

        Ok(IngestOutcome { new_host, evaluation })
    }

    /// Evaluate the two most recent stored reports of `hostname`
    #[instrument(skip(self))]
    pub async fn reevaluate(&self, hostname: &str) -> Result<Reevaluation, PipelineError> {
        let latest = self.store.latest(hostname, 2).await?;

        let [current, previous] = latest.as_slice() else {
            debug!("{hostname} has {} stored reports, skipping", latest.len());
            return Ok(Reevaluation::InsufficientHistory(latest.len()));
        };

        let evaluation = self.evaluate_and_dispatch(Some(previous), current).await;
        Ok(Reevaluation::Evaluated(evaluation))
    }

    async fn evaluate_and_dispatch(&self, previous: Option<&Report>, current: &Report) -> Evaluation {
        let now = self.clock.now();
        let throttle = self.dispatcher.throttle().snapshot(&current.hostname).await;

        let alerts = evaluate(previous, current, &self.thresholds, &throttle, now);
        if !alerts.is_empty() {
            debug!("{} alerts for {}", alerts.len(), current.hostname);
        }

        let deliveries = self.dispatcher.dispatch(&alerts, now).await;

        Evaluation {
            hostname: current.hostname.clone(),
            alerts,
            deliveries,
        }
    }
}
