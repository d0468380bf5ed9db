//! Smoke binary: edit a throwaway screen against a live backend and print
//! the latency monitor's view of the save cycle.
//!
//! Environment:
//! - `BACKEND_URL` (default `http://localhost:8000`)
//! - `PUSH_URL` (default `ws://localhost:8000/ws/admin`)

use std::sync::Arc;
use std::time::Duration;

use screenforge::api::HttpScreenApi;
use screenforge::session::{BuilderSession, SessionConfig};
use screenforge::telemetry::task::{spawn_monitor_task, MonitorConfig};
use screenforge::transport::{spawn_push_listener, ReconnectPolicy, WsPushTransport};
use screenforge::{MonitorPhase, PaletteEntry};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let backend_url =
        std::env::var("BACKEND_URL").unwrap_or_else(|_| "http://localhost:8000".into());
    let push_url =
        std::env::var("PUSH_URL").unwrap_or_else(|_| "ws://localhost:8000/ws/admin".into());

    let api = Arc::new(HttpScreenApi::new(backend_url).expect("http client"));
    let listener = spawn_push_listener(
        Arc::new(WsPushTransport::new(push_url)),
        ReconnectPolicy::from_env(),
    );
    let monitor = spawn_monitor_task(MonitorConfig::from_env(), listener.subscribe());

    let mut session = BuilderSession::new(api, monitor, SessionConfig::default());

    let palette = match session.palette().await {
        Ok(entries) if !entries.is_empty() => entries,
        Ok(_) | Err(_) => {
            tracing::warn!("component endpoint empty or unreachable; using a local Button entry");
            vec![PaletteEntry {
                name: "Button".into(),
                config: screenforge::draft::ComponentConfig::default(),
            }]
        }
    };

    let id = session.insert_from_palette(&palette[0], None);
    tracing::info!(%id, kind = %palette[0].name, "inserted node");

    // Create, then update so the second save exercises the push round trip.
    for round in 1..=2u32 {
        match session.save().await {
            Ok(()) => tracing::info!(round, screen_id = ?session.draft().id, "save acknowledged"),
            Err(error) => {
                tracing::error!(%error, "save failed");
                return;
            }
        }

        let mut snapshots = session.monitor().subscribe();
        let deadline = tokio::time::sleep(Duration::from_secs(5));
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                () = &mut deadline => break,
                changed = snapshots.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let snapshot = snapshots.borrow().clone();
                    if snapshot.phase == MonitorPhase::Complete {
                        if let Some(metrics) = snapshot.metrics {
                            tracing::info!(
                                total_ms = metrics.total,
                                db_ms = metrics.db_time,
                                backend_ms = metrics.backend_time,
                                websocket_ms = metrics.websocket_time,
                                "save propagated"
                            );
                        }
                        break;
                    }
                    if snapshot.phase == MonitorPhase::Idle && round == 1 {
                        // Creation sends no push; nothing more to wait for.
                        break;
                    }
                }
            }
        }
    }

    listener.shutdown();
}
