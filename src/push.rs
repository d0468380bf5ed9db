//! Push channel message model.
//!
//! DESIGN
//! ======
//! The push server tags every message with a `type` field. Only
//! `screen_update` messages carrying a `performance` block complete a save
//! cycle; liveness pings and every other type are delivered but ignored by
//! the correlator. A message that parses as JSON but lacks the expected
//! fields is dropped at the parse boundary and logged for diagnostics — it
//! never reaches the state machine.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Current time as milliseconds since Unix epoch.
#[must_use]
pub fn now_ms() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}

// =============================================================================
// MESSAGES
// =============================================================================

/// One inbound message from the push channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PushMessage {
    /// A screen was saved and propagated. Completion only when `performance`
    /// is present; a bare `screen_update` is informational.
    ScreenUpdate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        screen_id: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        performance: Option<SavePerformance>,
    },
    /// Liveness probe from the client side (echoed back by the server).
    Ping,
    /// Liveness reply.
    Pong,
    /// Any other tagged message. Delivered so future listeners can act on
    /// it; the correlator ignores it.
    #[serde(other)]
    Unknown,
}

impl PushMessage {
    /// Parse one channel payload. Payloads that are not valid JSON or lack
    /// the fields their `type` requires are rejected (and should be logged
    /// by the caller, not surfaced to the user).
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Parse, applying the malformed-payload policy: log and drop.
    #[must_use]
    pub fn parse_lossy(text: &str) -> Option<Self> {
        match Self::parse(text) {
            Ok(msg) => Some(msg),
            Err(error) => {
                warn!(%error, "malformed push payload dropped");
                None
            }
        }
    }
}

// =============================================================================
// PERFORMANCE BLOCK
// =============================================================================

/// Server-reported timing for one save-and-propagate cycle.
///
/// `save_timestamp` is the client clock echo from the save request;
/// `websocket_sent_at` is a server clock reading, so any derived duration
/// carries clock-skew error — an accepted approximation, kept verbatim.
/// Stage durations are opaque pass-through values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavePerformance {
    pub save_timestamp: i64,
    pub websocket_sent_at: i64,
    #[serde(default)]
    pub db_time: f64,
    #[serde(default)]
    pub backend_time: f64,
}

// =============================================================================
// TESTS
// =============================================================================
