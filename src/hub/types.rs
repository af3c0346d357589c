use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::frames::StateVector;

/// Lifecycle of one subscriber connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Channel established, no interest registered yet.
    Connecting,
    /// Handshake complete; receives one message per tick.
    Active,
    /// Unsubscribed or failed delivery; closed at the next sweep.
    Draining,
    Closed,
}

/// One propagated state as delivered to a subscriber.
#[derive(Debug, Clone, Serialize)]
pub struct StreamState {
    pub norad_id: u32,
    pub name: String,
    #[serde(flatten)]
    pub state: StateVector,
}

/// One outbound message per subscriber per tick: every state it asked for,
/// keyed by catalog id.
#[derive(Debug, Clone, Serialize)]
pub struct StreamMessage {
    pub kind: &'static str,
    pub at: DateTime<Utc>,
    pub states: HashMap<u32, StreamState>,
}

impl StreamMessage {
    pub fn position_update(at: DateTime<Utc>, states: HashMap<u32, StreamState>) -> Self {
        Self {
            kind: "position_update",
            at,
            states,
        }
    }
}
