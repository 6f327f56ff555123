//! SweepActor - Periodic re-evaluation of every known host
//!
//! Front ends only evaluate when a report arrives. The sweep runs the same
//! evaluation on a timer against what is already stored, so conditions are
//! re-checked even for hosts that went quiet, and disk alerts repeat once
//! their throttle interval has passed.
//!
//! ## Message Flow
//!
//! ```text
//! Timer tick → list hosts → latest(host, 2) → evaluate → dispatch*
//!     ↑
//!     └─── Commands (SweepNow, Shutdown)
//! ```
//!
//! A store error on one host is logged and the sweep moves on to the next.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, error, info, instrument, warn};

use crate::pipeline::{Pipeline, PipelineError, Reevaluation};
use crate::storage::StorageError;

use super::messages::{SweepCommand, SweepSummary};

pub struct SweepActor {
    pipeline: Arc<Pipeline>,
    period: Duration,
    command_rx: mpsc::Receiver<SweepCommand>,
}

impl SweepActor {
    pub fn new(pipeline: Arc<Pipeline>, period: Duration, command_rx: mpsc::Receiver<SweepCommand>) -> Self {
        Self {
            pipeline,
            period,
            command_rx,
        }
    }

    /// Run until a Shutdown command arrives or every handle is dropped
    ///
    /// The first timed sweep happens one period after start.
    #[instrument(skip(self), fields(period = ?self.period))]
    pub async fn run(mut self) {
        debug!("starting sweep actor");

        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.sweep().await {
                        Ok(summary) => info!(
                            hosts = summary.hosts,
                            evaluated = summary.evaluated,
                            skipped = summary.skipped,
                            failed = summary.failed,
                            alerts = summary.alerts,
                            "sweep complete"
                        ),
                        Err(e) => error!("sweep failed, cannot list hosts: {e}"),
                    }
                }

                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(SweepCommand::SweepNow { respond_to }) => {
                            debug!("received SweepNow command");
                            let result = self.sweep().await;
                            let _ = respond_to.send(result);
                        }
                        Some(SweepCommand::Shutdown) => {
                            debug!("received shutdown command");
                            break;
                        }
                        None => {
                            warn!("command channel closed, shutting down");
                            break;
                        }
                    }
                }
            }
        }

        debug!("sweep actor stopped");
    }

    /// Re-evaluate every host once
    async fn sweep(&self) -> Result<SweepSummary, StorageError> {
        let hosts = self.pipeline.store().list_all().await?;

        let mut summary = SweepSummary {
            hosts: hosts.len(),
            ..SweepSummary::default()
        };

        for host in &hosts {
            match self.pipeline.reevaluate(host).await {
                Ok(Reevaluation::Evaluated(evaluation)) => {
                    summary.evaluated += 1;
                    summary.alerts += evaluation.alerts.len();
                }
                Ok(Reevaluation::InsufficientHistory(_)) => summary.skipped += 1,
                Err(PipelineError::StoreUnavailable(e)) => {
                    error!("cannot read reports of {host}: {e}");
                    summary.failed += 1;
                }
                Err(e) => {
                    error!("cannot evaluate {host}: {e}");
                    summary.failed += 1;
                }
            }
        }

        Ok(summary)
    }
}

/// Handle for controlling a SweepActor
#[derive(Clone)]
pub struct SweepHandle {
    sender: mpsc::Sender<SweepCommand>,
}

impl SweepHandle {
    /// Spawn the actor on the current runtime
    pub fn spawn(pipeline: Arc<Pipeline>, period: Duration) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(8);

        let actor = SweepActor::new(pipeline, period, cmd_rx);
        tokio::spawn(actor.run());

        Self { sender: cmd_tx }
    }

    /// Sweep immediately and wait for the result
    pub async fn sweep_now(&self) -> Result<SweepSummary> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(SweepCommand::SweepNow { respond_to: tx })
            .await
            .context("failed to send SweepNow command")?;

        let summary = rx.await.context("failed to receive sweep result")??;
        Ok(summary)
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(SweepCommand::Shutdown)
            .await
            .context("failed to send Shutdown command")?;

        Ok(())
    }
}
