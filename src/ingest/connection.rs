//! Per-connection line reader
//!
//! A connection carries newline-delimited reports, processed strictly in
//! arrival order. The first undecodable line or store failure ends the
//! connection; other connections are unaffected.

use std::fmt::Display;

use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::{debug, error, instrument, trace, warn};

use crate::codec::Protocol;
use crate::pipeline::{Pipeline, PipelineError};

/// Why a connection handler stopped reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// End of stream
    PeerClosed,

    /// A line could not be decoded
    MalformedReport,

    /// The store failed while processing a report
    StoreUnavailable,

    /// The socket failed or delivered invalid UTF-8
    ReadError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConnectionOutcome {
    /// Reports fully processed before the connection ended
    pub processed: usize,

    /// Alerts raised by those reports
    pub alerts: usize,

    pub reason: CloseReason,
}

/// Read reports from `reader` until the peer closes or a report fails
#[instrument(skip(reader, peer, pipeline), fields(peer = %peer))]
pub async fn handle_connection<R>(
    reader: R,
    peer: impl Display,
    pipeline: &Pipeline,
    protocol: Protocol,
) -> ConnectionOutcome
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    let mut processed = 0;
    let mut alerts = 0;

    let reason = loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break CloseReason::PeerClosed,
            Err(e) => {
                warn!("read error: {e}");
                break CloseReason::ReadError;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        trace!("received: {line}");

        match pipeline.ingest_raw(&line, protocol).await {
            Ok(outcome) => {
                processed += 1;
                alerts += outcome.evaluation.alerts.len();
            }
            Err(PipelineError::Decode(e)) => {
                warn!("closing connection after malformed report: {e}");
                break CloseReason::MalformedReport;
            }
            Err(PipelineError::StoreUnavailable(e)) => {
                error!("closing connection, report store unavailable: {e}");
                break CloseReason::StoreUnavailable;
            }
        }
    };

    debug!("connection closed after {processed} reports ({reason:?})");

    ConnectionOutcome {
        processed,
        alerts,
        reason,
    }
}
