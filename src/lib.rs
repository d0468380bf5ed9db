//! Screenforge — client-side core of a backend-driven-UI screen builder.
//!
//! ARCHITECTURE
//! ============
//! Two halves, joined by a session:
//! - The component tree editor (`draft` + `editor`) is pure data-structure
//!   logic: an ordered, nested tree of component instances mutated through
//!   five structural operations, no I/O anywhere.
//! - The save telemetry pipeline (`push` + `telemetry` + `transport`) issues
//!   a timestamped save, listens on the push channel for the correlated
//!   completion event, and drives a transient monitor state machine with a
//!   single addressable pending timer.
//!
//! The REST backend and the push server are external collaborators. `api`
//! and `transport` are the only modules that touch the network, both behind
//! trait seams so everything above them is testable in-process.

pub mod api;
pub mod draft;
pub mod editor;
pub mod push;
pub mod session;
pub mod telemetry;
pub mod transport;

pub use draft::{ComponentNode, PaletteEntry, Props, ScreenDraft};
pub use editor::ContainerKinds;
pub use push::{PushMessage, SavePerformance};
pub use session::{BuilderSession, SessionConfig};
pub use telemetry::monitor::{MonitorPhase, SaveMetrics};
pub use telemetry::task::{spawn_monitor_task, MonitorConfig, MonitorHandle};
