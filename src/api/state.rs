//! API shared state

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::pipeline::Pipeline;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct ApiState {
    /// Same pipeline the TCP front end drives
    pub pipeline: Arc<Pipeline>,

    pub started_at: DateTime<Utc>,
}

impl ApiState {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self {
            pipeline,
            started_at: Utc::now(),
        }
    }
}
