//! Background actors of the hub
//!
//! Each actor runs as an independent tokio task and is controlled through a
//! cloneable handle that sends commands over an mpsc channel. Request/response
//! commands carry a oneshot sender for the reply.
//!
//! ```text
//!   timer tick ──┐
//!                ▼
//!   SweepHandle ──► SweepActor ──► Pipeline::reevaluate(host) for every host
//!   (SweepNow, Shutdown)
//! ```
//!
//! - **SweepActor**: periodically re-evaluates the two most recent reports of
//!   every known host

pub mod messages;
pub mod sweep;

pub use messages::{SweepCommand, SweepSummary};
pub use sweep::{SweepActor, SweepHandle};
