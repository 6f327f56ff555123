//! TCP line-protocol front end
//!
//! Agents connect, write one report per line and disconnect. Every accepted
//! connection gets its own task; all of them share one [`Pipeline`].

pub mod connection;

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::{error, info, instrument};

use crate::codec::Protocol;
use crate::pipeline::Pipeline;

pub use connection::{CloseReason, ConnectionOutcome, handle_connection};

pub struct Listener {
    listener: TcpListener,
    pipeline: Arc<Pipeline>,
    protocol: Protocol,
}

impl Listener {
    pub async fn bind(addr: SocketAddr, pipeline: Arc<Pipeline>, protocol: Protocol) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!("listening for {protocol} reports on {}", listener.local_addr()?);

        Ok(Self {
            listener,
            pipeline,
            protocol,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until the task is dropped
    #[instrument(skip_all)]
    pub async fn run(self) {
        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    // e.g. out of file descriptors; back off instead of spinning
                    error!("failed to accept connection: {e}");
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    continue;
                }
            };

            let pipeline = self.pipeline.clone();
            let protocol = self.protocol;

            tokio::spawn(async move {
                handle_connection(stream, peer, &pipeline, protocol).await;
            });
        }
    }
}
