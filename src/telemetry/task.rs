//! Monitor driver — the tokio task that owns the clock.
//!
//! DESIGN
//! ======
//! One task per session runs a `select!` loop over four sources: session
//! commands, the broadcast push subscription, the elapsed ticker (active
//! only while a save is in flight), and the single armed sleep. Every
//! [`TimerCmd`] the state machine returns is reconciled against that one
//! sleep slot, so two timers can never be alive at once.
//!
//! Snapshots go out over a `watch` channel: observers always read one
//! consistent, frozen view and never a half-applied transition.

use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::warn;

use crate::push::{now_ms, PushMessage};
use crate::telemetry::monitor::{MonitorSnapshot, SaveMonitor, TimerCmd};

#[cfg(test)]
#[path = "task_test.rs"]
mod tests;

const DEFAULT_TICK_MS: u64 = 30;
const DEFAULT_RESET_DELAY_MS: u64 = 3000;
const DEFAULT_FALLBACK_MS: u64 = 3000;

// =============================================================================
// CONFIG
// =============================================================================

/// Timing knobs for the monitor task, overridable from environment
/// variables.
#[derive(Debug, Clone, Copy)]
pub struct MonitorConfig {
    /// Elapsed-counter tick period while a save is in flight.
    pub tick_ms: u64,
    /// Delay before a completed monitor auto-resets to idle.
    pub reset_delay_ms: u64,
    /// Auto-hide bound when the push confirmation never arrives.
    pub fallback_ms: u64,
}

impl MonitorConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            tick_ms: env_parse("MONITOR_TICK_MS", DEFAULT_TICK_MS),
            reset_delay_ms: env_parse("MONITOR_RESET_DELAY_MS", DEFAULT_RESET_DELAY_MS),
            fallback_ms: env_parse("MONITOR_FALLBACK_MS", DEFAULT_FALLBACK_MS),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            tick_ms: DEFAULT_TICK_MS,
            reset_delay_ms: DEFAULT_RESET_DELAY_MS,
            fallback_ms: DEFAULT_FALLBACK_MS,
        }
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

// =============================================================================
// COMMANDS AND HANDLE
// =============================================================================

/// Session-side events fed into the monitor task.
#[derive(Debug, Clone, Copy)]
pub enum MonitorCmd {
    /// A save request was just issued.
    BeginSave { expects_push: bool },
    /// The HTTP save resolved successfully.
    Acknowledged,
    /// The HTTP save failed; stand down.
    SaveFailed,
}

/// Handle to a running monitor task. Cheap to clone; dropping every clone
/// closes the command channel and ends the task, disarming any pending
/// timer.
#[derive(Debug, Clone)]
pub struct MonitorHandle {
    cmd_tx: mpsc::Sender<MonitorCmd>,
    snapshot_rx: watch::Receiver<MonitorSnapshot>,
    task: std::sync::Arc<JoinHandle<()>>,
}

impl MonitorHandle {
    pub async fn begin_save(&self, expects_push: bool) {
        let _ = self.cmd_tx.send(MonitorCmd::BeginSave { expects_push }).await;
    }

    pub async fn acknowledged(&self) {
        let _ = self.cmd_tx.send(MonitorCmd::Acknowledged).await;
    }

    pub async fn save_failed(&self) {
        let _ = self.cmd_tx.send(MonitorCmd::SaveFailed).await;
    }

    /// Latest published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> MonitorSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Subscribe to snapshot changes (for a presentation loop).
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<MonitorSnapshot> {
        self.snapshot_rx.clone()
    }

    /// Abort the task outright (session teardown).
    pub fn shutdown(&self) {
        self.task.abort();
    }
}

// =============================================================================
// TASK
// =============================================================================

/// Spawn the monitor task, subscribed to `push_rx`.
#[must_use]
pub fn spawn_monitor_task(
    config: MonitorConfig,
    push_rx: broadcast::Receiver<PushMessage>,
) -> MonitorHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(16);
    let (snapshot_tx, snapshot_rx) = watch::channel(MonitorSnapshot::idle());

    let task = tokio::spawn(monitor_loop(config, cmd_rx, push_rx, snapshot_tx));

    MonitorHandle { cmd_tx, snapshot_rx, task: std::sync::Arc::new(task) }
}

async fn monitor_loop(
    config: MonitorConfig,
    mut cmd_rx: mpsc::Receiver<MonitorCmd>,
    mut push_rx: broadcast::Receiver<PushMessage>,
    snapshot_tx: watch::Sender<MonitorSnapshot>,
) {
    let mut monitor = SaveMonitor::new(config.fallback_ms, config.reset_delay_ms);

    let mut ticker = tokio::time::interval(Duration::from_millis(config.tick_ms.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    // The single addressable pending timer.
    let mut armed: Option<Instant> = None;
    let mut push_open = true;

    loop {
        let deadline = armed;

        tokio::select! {
            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else { break };
                let timer_cmd = match cmd {
                    MonitorCmd::BeginSave { expects_push } => monitor.begin_save(now_ms(), expects_push),
                    MonitorCmd::Acknowledged => monitor.acknowledged(),
                    MonitorCmd::SaveFailed => monitor.save_failed(),
                };
                apply_timer(&mut armed, timer_cmd);
            }

            msg = push_rx.recv(), if push_open => {
                match msg {
                    Ok(msg) => {
                        let timer_cmd = monitor.on_push(&msg, now_ms());
                        apply_timer(&mut armed, timer_cmd);
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "push subscription lagged; completions may be lost");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        push_open = false;
                    }
                }
            }

            _ = ticker.tick(), if monitor.in_flight() => {
                monitor.tick(now_ms());
            }

            () = sleep_until_armed(deadline), if deadline.is_some() => {
                monitor.timer_fired();
                armed = None;
            }
        }

        let _ = snapshot_tx.send(monitor.snapshot());
    }
}

async fn sleep_until_armed(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        // Guarded out by `if deadline.is_some()`.
        None => std::future::pending().await,
    }
}

fn apply_timer(armed: &mut Option<Instant>, cmd: TimerCmd) {
    match cmd {
        TimerCmd::Keep => {}
        TimerCmd::Cancel => *armed = None,
        TimerCmd::Schedule { delay_ms, .. } => {
            *armed = Some(Instant::now() + Duration::from_millis(delay_ms));
        }
    }
}
