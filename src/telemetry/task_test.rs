use std::time::Duration;

use tokio::sync::broadcast;

use super::*;
use crate::push::SavePerformance;
use crate::telemetry::monitor::MonitorPhase;

fn completion(save_timestamp: i64, websocket_sent_at: i64) -> PushMessage {
    PushMessage::ScreenUpdate {
        screen_id: Some(1),
        performance: Some(SavePerformance {
            save_timestamp,
            websocket_sent_at,
            db_time: 12.0,
            backend_time: 8.0,
        }),
    }
}

fn spawn() -> (broadcast::Sender<PushMessage>, MonitorHandle) {
    let (push_tx, push_rx) = broadcast::channel(16);
    let handle = spawn_monitor_task(MonitorConfig::default(), push_rx);
    (push_tx, handle)
}

/// Wait (under the paused clock) until the monitor publishes `phase`.
async fn wait_for_phase(handle: &MonitorHandle, phase: MonitorPhase) -> MonitorSnapshot {
    let mut rx = handle.subscribe();
    tokio::time::timeout(Duration::from_secs(30), async move {
        loop {
            let current = rx.borrow().clone();
            if current.phase == phase {
                return current;
            }
            rx.changed().await.expect("monitor task ended");
        }
    })
    .await
    .expect("phase never reached")
}

/// Let the task drain its queues without advancing the virtual clock.
async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn latency_success_completes_then_auto_resets() {
    let (push_tx, handle) = spawn();

    handle.begin_save(true).await;
    wait_for_phase(&handle, MonitorPhase::Saving).await;
    handle.acknowledged().await;
    wait_for_phase(&handle, MonitorPhase::AwaitingPush).await;

    let t0 = now_ms();
    push_tx.send(completion(t0, t0)).unwrap();

    let snapshot = wait_for_phase(&handle, MonitorPhase::Complete).await;
    let metrics = snapshot.metrics.expect("metrics frozen on completion");
    assert!(metrics.total >= 0);
    assert_eq!(metrics.client_time, 0);
    assert!(snapshot.visible);

    // Auto-reset 3000ms later.
    let snapshot = wait_for_phase(&handle, MonitorPhase::Idle).await;
    assert!(snapshot.metrics.is_none());
    assert!(!snapshot.visible);
}

#[tokio::test(start_paused = true)]
async fn ping_does_not_change_state() {
    let (push_tx, handle) = spawn();

    handle.begin_save(true).await;
    wait_for_phase(&handle, MonitorPhase::Saving).await;

    push_tx.send(PushMessage::Ping).unwrap();
    push_tx.send(PushMessage::Pong).unwrap();
    push_tx.send(PushMessage::Unknown).unwrap();
    settle().await;

    let snapshot = handle.snapshot();
    assert_eq!(snapshot.phase, MonitorPhase::Saving);
    assert!(snapshot.metrics.is_none());
}

#[tokio::test(start_paused = true)]
async fn screen_update_without_performance_is_ignored() {
    let (push_tx, handle) = spawn();

    handle.begin_save(true).await;
    handle.acknowledged().await;
    wait_for_phase(&handle, MonitorPhase::AwaitingPush).await;

    push_tx
        .send(PushMessage::ScreenUpdate { screen_id: Some(1), performance: None })
        .unwrap();
    settle().await;

    assert_eq!(handle.snapshot().phase, MonitorPhase::AwaitingPush);
}

#[tokio::test(start_paused = true)]
async fn fallback_times_out_silently() {
    let (_push_tx, handle) = spawn();

    handle.begin_save(true).await;
    handle.acknowledged().await;
    wait_for_phase(&handle, MonitorPhase::AwaitingPush).await;

    // Record every phase seen on the way back to idle: Complete must never
    // appear when the push is lost.
    let mut rx = handle.subscribe();
    let mut saw_complete = false;
    tokio::time::timeout(Duration::from_secs(30), async {
        loop {
            let phase = rx.borrow().phase;
            if phase == MonitorPhase::Complete {
                saw_complete = true;
            }
            if phase == MonitorPhase::Idle {
                break;
            }
            rx.changed().await.expect("monitor task ended");
        }
    })
    .await
    .expect("fallback never fired");

    assert!(!saw_complete);
    assert!(handle.snapshot().metrics.is_none());
}

#[tokio::test(start_paused = true)]
async fn create_save_goes_idle_at_ack() {
    let (_push_tx, handle) = spawn();

    handle.begin_save(false).await;
    wait_for_phase(&handle, MonitorPhase::Saving).await;
    handle.acknowledged().await;
    let snapshot = wait_for_phase(&handle, MonitorPhase::Idle).await;
    assert!(snapshot.metrics.is_none());
}

#[tokio::test(start_paused = true)]
async fn new_save_preempts_pending_reset() {
    let (push_tx, handle) = spawn();

    handle.begin_save(true).await;
    handle.acknowledged().await;
    wait_for_phase(&handle, MonitorPhase::AwaitingPush).await;
    let t0 = now_ms();
    push_tx.send(completion(t0, t0)).unwrap();
    wait_for_phase(&handle, MonitorPhase::Complete).await;

    // Preempt before the 3000ms reset elapses.
    handle.begin_save(true).await;
    settle().await;
    let snapshot = handle.snapshot();
    assert_eq!(snapshot.phase, MonitorPhase::Saving);
    assert!(snapshot.metrics.is_none(), "stale metrics cleared immediately");
    assert_eq!(snapshot.elapsed_ms, 0);
}

#[tokio::test(start_paused = true)]
async fn save_failure_resets_monitor() {
    let (_push_tx, handle) = spawn();

    handle.begin_save(true).await;
    wait_for_phase(&handle, MonitorPhase::Saving).await;
    handle.save_failed().await;
    let snapshot = wait_for_phase(&handle, MonitorPhase::Idle).await;
    assert!(snapshot.metrics.is_none());
}

#[tokio::test]
async fn elapsed_counter_ticks_in_real_time() {
    let (_push_tx, handle) = spawn();

    handle.begin_save(true).await;
    tokio::time::sleep(Duration::from_millis(120)).await;

    let snapshot = handle.snapshot();
    assert_eq!(snapshot.phase, MonitorPhase::Saving);
    assert!(snapshot.elapsed_ms > 0, "ticker drives elapsed time while saving");
}
