//! Save telemetry — latency correlation for the save-and-propagate cycle.
//!
//! ARCHITECTURE
//! ============
//! Split the way the editor is split from the session: `monitor` is the pure
//! state machine (phases, metric math, the single pending timer expressed as
//! reconciliation commands), and `task` is the tokio driver that owns the
//! actual clock — command channel, push subscription, elapsed ticker, and
//! the one armed sleep. Tests exercise the machine with synthetic
//! timestamps and the driver with a paused runtime clock.

pub mod monitor;
pub mod task;
