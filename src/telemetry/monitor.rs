//! Save monitor state machine.
//!
//! DESIGN
//! ======
//! `Idle → Saving → AwaitingPush → Complete → Idle`, driven entirely by
//! explicit events carrying local-clock timestamps; the machine itself never
//! reads a clock or schedules anything. At most one timer may be pending at
//! any moment — `Fallback` while a push confirmation is awaited, `Reset`
//! after completion — and every transition returns a [`TimerCmd`] telling
//! the driver to keep, cancel, or replace it.
//!
//! Completion is last-write-wins: a duplicate or out-of-order
//! `screen_update` simply overwrites the current metrics and re-arms the
//! reset. The fallback fires silently — a push that never arrives is not an
//! error the user hears about.

use serde::Serialize;

use crate::push::{PushMessage, SavePerformance};

#[cfg(test)]
#[path = "monitor_test.rs"]
mod tests;

// =============================================================================
// TYPES
// =============================================================================

/// Monitor phase. `Saving` and `AwaitingPush` look identical to the user
/// (spinner plus a locally ticking elapsed counter); the split only records
/// whether the HTTP save has been acknowledged yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorPhase {
    Idle,
    Saving,
    AwaitingPush,
    Complete,
}

/// Frozen latency breakdown for one completed save cycle.
///
/// `websocket_time` compares a server clock reading against the local
/// clock, so it carries clock-skew error and may go negative — an accepted
/// approximation. `client_time` is carried for wire compatibility and is
/// always zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SaveMetrics {
    pub total: i64,
    pub db_time: f64,
    pub backend_time: f64,
    pub websocket_time: i64,
    pub client_time: i64,
}

/// Role of the single pending timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerRole {
    /// Auto-hide while a push confirmation may still arrive.
    Fallback,
    /// Auto-reset back to `Idle` after showing completed metrics.
    Reset,
}

/// What the driver should do with the pending timer after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerCmd {
    /// Leave the pending timer (if any) alone.
    Keep,
    /// Disarm the pending timer.
    Cancel,
    /// Replace the pending timer with a new one.
    Schedule { role: TimerRole, delay_ms: u64 },
}

/// Consistent, copyable view of the monitor for presentation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitorSnapshot {
    pub phase: MonitorPhase,
    pub elapsed_ms: i64,
    pub metrics: Option<SaveMetrics>,
    /// Whether the monitor UI should be shown at all.
    pub visible: bool,
}

impl MonitorSnapshot {
    #[must_use]
    pub fn idle() -> Self {
        Self { phase: MonitorPhase::Idle, elapsed_ms: 0, metrics: None, visible: false }
    }
}

// =============================================================================
// STATE MACHINE
// =============================================================================

/// The save monitor. One per screen-builder session; one save in flight at
/// a time (a new save preempts whatever the previous cycle left behind).
#[derive(Debug)]
pub struct SaveMonitor {
    phase: MonitorPhase,
    expects_push: bool,
    save_started_at: i64,
    elapsed_ms: i64,
    metrics: Option<SaveMetrics>,
    armed: Option<TimerRole>,
    fallback_ms: u64,
    reset_delay_ms: u64,
}

impl SaveMonitor {
    #[must_use]
    pub fn new(fallback_ms: u64, reset_delay_ms: u64) -> Self {
        Self {
            phase: MonitorPhase::Idle,
            expects_push: false,
            save_started_at: 0,
            elapsed_ms: 0,
            metrics: None,
            armed: None,
            fallback_ms,
            reset_delay_ms,
        }
    }

    #[must_use]
    pub fn phase(&self) -> MonitorPhase {
        self.phase
    }

    /// A save request has been issued but not yet confirmed done.
    #[must_use]
    pub fn in_flight(&self) -> bool {
        matches!(self.phase, MonitorPhase::Saving | MonitorPhase::AwaitingPush)
    }

    #[must_use]
    pub fn metrics(&self) -> Option<&SaveMetrics> {
        self.metrics.as_ref()
    }

    /// Which timer the machine currently expects to be armed.
    #[must_use]
    pub fn armed_timer(&self) -> Option<TimerRole> {
        self.armed
    }

    #[must_use]
    pub fn snapshot(&self) -> MonitorSnapshot {
        MonitorSnapshot {
            phase: self.phase,
            elapsed_ms: self.elapsed_ms,
            metrics: self.metrics,
            visible: self.phase != MonitorPhase::Idle,
        }
    }

    // -------------------------------------------------------------------------
    // TRANSITIONS
    // -------------------------------------------------------------------------

    /// A save request goes out at local time `now`. Discards stale metrics
    /// and preempts any pending reset. When a push confirmation is expected
    /// the fallback auto-hide is armed; otherwise the cycle will end at the
    /// HTTP acknowledgment.
    pub fn begin_save(&mut self, now: i64, expects_push: bool) -> TimerCmd {
        self.phase = MonitorPhase::Saving;
        self.expects_push = expects_push;
        self.save_started_at = now;
        self.elapsed_ms = 0;
        self.metrics = None;

        if expects_push {
            self.arm(TimerRole::Fallback, self.fallback_ms)
        } else {
            self.disarm()
        }
    }

    /// The HTTP save resolved successfully.
    pub fn acknowledged(&mut self) -> TimerCmd {
        // A push can land before the HTTP ack; never regress from Complete.
        if self.phase != MonitorPhase::Saving {
            return TimerCmd::Keep;
        }
        if self.expects_push {
            self.phase = MonitorPhase::AwaitingPush;
            TimerCmd::Keep
        } else {
            // Brand-new screen: no follow-up push is ever sent.
            self.reset_to_idle();
            TimerCmd::Cancel
        }
    }

    /// The HTTP save failed. The draft is untouched; the monitor just
    /// stands down.
    pub fn save_failed(&mut self) -> TimerCmd {
        self.reset_to_idle();
        TimerCmd::Cancel
    }

    /// Periodic local-clock tick while a save is in flight.
    pub fn tick(&mut self, now: i64) {
        if self.in_flight() {
            self.elapsed_ms = now - self.save_started_at;
        }
    }

    /// An inbound push-channel message, received at local time
    /// `received_at`. Only `screen_update` messages carrying a
    /// `performance` block complete the cycle; everything else is ignored
    /// without touching the state.
    pub fn on_push(&mut self, msg: &PushMessage, received_at: i64) -> TimerCmd {
        let perf = match msg {
            PushMessage::ScreenUpdate { performance: Some(perf), .. } => perf,
            PushMessage::ScreenUpdate { performance: None, .. } => {
                tracing::debug!("screen_update without performance block ignored");
                return TimerCmd::Keep;
            }
            _ => return TimerCmd::Keep,
        };

        self.metrics = Some(compute_metrics(perf, received_at));
        self.elapsed_ms = self.metrics.map_or(0, |m| m.total);
        self.phase = MonitorPhase::Complete;
        self.arm(TimerRole::Reset, self.reset_delay_ms)
    }

    /// The pending timer fired. Fallback and reset both land in `Idle`; the
    /// fallback path simply never had metrics to show.
    pub fn timer_fired(&mut self) {
        self.reset_to_idle();
    }

    fn arm(&mut self, role: TimerRole, delay_ms: u64) -> TimerCmd {
        self.armed = Some(role);
        TimerCmd::Schedule { role, delay_ms }
    }

    fn disarm(&mut self) -> TimerCmd {
        self.armed = None;
        TimerCmd::Cancel
    }

    fn reset_to_idle(&mut self) {
        self.phase = MonitorPhase::Idle;
        self.elapsed_ms = 0;
        self.metrics = None;
        self.armed = None;
    }
}

/// Derive the stage breakdown from a performance block and the local
/// receive time. `db_time`/`backend_time` pass through verbatim.
fn compute_metrics(perf: &SavePerformance, received_at: i64) -> SaveMetrics {
    SaveMetrics {
        total: received_at - perf.save_timestamp,
        db_time: perf.db_time,
        backend_time: perf.backend_time,
        websocket_time: received_at - perf.websocket_sent_at,
        client_time: 0,
    }
}
