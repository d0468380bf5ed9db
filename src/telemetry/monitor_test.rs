use super::*;

const FALLBACK_MS: u64 = 3000;
const RESET_MS: u64 = 3000;

fn monitor() -> SaveMonitor {
    SaveMonitor::new(FALLBACK_MS, RESET_MS)
}

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

// =============================================================================
// HAPPY PATH
// =============================================================================

#[test]
fn starts_idle_and_invisible() {
    let m = monitor();
    assert_eq!(m.phase(), MonitorPhase::Idle);
    assert!(!m.in_flight());
    assert!(!m.snapshot().visible);
    assert!(m.armed_timer().is_none());
}

#[test]
fn save_ack_push_reset_cycle() {
    let mut m = monitor();

    let cmd = m.begin_save(1_000, true);
    assert_eq!(m.phase(), MonitorPhase::Saving);
    assert_eq!(cmd, TimerCmd::Schedule { role: TimerRole::Fallback, delay_ms: FALLBACK_MS });

    assert_eq!(m.acknowledged(), TimerCmd::Keep);
    assert_eq!(m.phase(), MonitorPhase::AwaitingPush);

    // T0 = 1000 (echoed by the server), S1 = 1040, received at T2 = 1060.
    let cmd = m.on_push(&completion(1_000, 1_040), 1_060);
    assert_eq!(m.phase(), MonitorPhase::Complete);
    assert_eq!(cmd, TimerCmd::Schedule { role: TimerRole::Reset, delay_ms: RESET_MS });

    let metrics = m.metrics().expect("metrics frozen");
    assert_eq!(metrics.total, 60);
    assert_eq!(metrics.websocket_time, 20);
    assert!((metrics.db_time - 12.0).abs() < f64::EPSILON);
    assert!((metrics.backend_time - 8.0).abs() < f64::EPSILON);
    assert_eq!(metrics.client_time, 0);

    m.timer_fired();
    assert_eq!(m.phase(), MonitorPhase::Idle);
    assert!(m.metrics().is_none());
}

#[test]
fn elapsed_ticks_while_in_flight_only() {
    let mut m = monitor();
    m.begin_save(1_000, true);
    m.tick(1_030);
    assert_eq!(m.snapshot().elapsed_ms, 30);
    m.acknowledged();
    m.tick(1_090);
    assert_eq!(m.snapshot().elapsed_ms, 90);

    m.on_push(&completion(1_000, 1_100), 1_120);
    // Elapsed freezes at the measured total once complete.
    assert_eq!(m.snapshot().elapsed_ms, 120);
    m.tick(9_999);
    assert_eq!(m.snapshot().elapsed_ms, 120);
}

// =============================================================================
// CREATE VS UPDATE
// =============================================================================

#[test]
fn save_without_expected_push_ends_at_ack() {
    let mut m = monitor();
    let cmd = m.begin_save(1_000, false);
    assert_eq!(cmd, TimerCmd::Cancel, "no fallback armed for create");

    assert_eq!(m.acknowledged(), TimerCmd::Cancel);
    assert_eq!(m.phase(), MonitorPhase::Idle);
    assert!(m.metrics().is_none());
}

// =============================================================================
// FALLBACK AND FAILURE
// =============================================================================

#[test]
fn fallback_fires_silently_without_metrics() {
    let mut m = monitor();
    m.begin_save(1_000, true);
    m.acknowledged();
    assert_eq!(m.armed_timer(), Some(TimerRole::Fallback));

    m.timer_fired();
    assert_eq!(m.phase(), MonitorPhase::Idle);
    assert!(m.metrics().is_none(), "timeout never surfaces Complete metrics");
}

#[test]
fn save_failure_cancels_timer_and_resets() {
    let mut m = monitor();
    m.begin_save(1_000, true);
    assert_eq!(m.save_failed(), TimerCmd::Cancel);
    assert_eq!(m.phase(), MonitorPhase::Idle);
    assert!(m.armed_timer().is_none());
}

// =============================================================================
// MESSAGE FILTERING
// =============================================================================

#[test]
fn ping_while_awaiting_push_is_ignored() {
    let mut m = monitor();
    m.begin_save(1_000, true);
    m.acknowledged();
    let before = m.snapshot();

    assert_eq!(m.on_push(&PushMessage::Pong, 1_050), TimerCmd::Keep);
    assert_eq!(m.on_push(&PushMessage::Ping, 1_051), TimerCmd::Keep);
    assert_eq!(m.on_push(&PushMessage::Unknown, 1_052), TimerCmd::Keep);
    assert_eq!(m.snapshot(), before);
}

#[test]
fn screen_update_without_performance_is_ignored() {
    let mut m = monitor();
    m.begin_save(1_000, true);
    let before = m.snapshot();

    let msg = PushMessage::ScreenUpdate { screen_id: Some(1), performance: None };
    assert_eq!(m.on_push(&msg, 1_050), TimerCmd::Keep);
    assert_eq!(m.snapshot(), before);
}

// =============================================================================
// PREEMPTION AND DUPLICATES
// =============================================================================

#[test]
fn new_save_preempts_pending_reset() {
    let mut m = monitor();
    m.begin_save(1_000, true);
    m.acknowledged();
    m.on_push(&completion(1_000, 1_040), 1_060);
    assert_eq!(m.armed_timer(), Some(TimerRole::Reset));

    let cmd = m.begin_save(2_000, true);
    assert_eq!(m.phase(), MonitorPhase::Saving);
    assert!(m.metrics().is_none(), "stale metrics discarded");
    assert_eq!(m.snapshot().elapsed_ms, 0);
    assert_eq!(cmd, TimerCmd::Schedule { role: TimerRole::Fallback, delay_ms: FALLBACK_MS });
}

#[test]
fn duplicate_completion_overwrites_metrics() {
    let mut m = monitor();
    m.begin_save(1_000, true);
    m.acknowledged();
    m.on_push(&completion(1_000, 1_040), 1_060);
    assert_eq!(m.metrics().unwrap().total, 60);

    // Late duplicate: last write wins, reset re-armed.
    let cmd = m.on_push(&completion(1_000, 1_090), 1_100);
    assert_eq!(m.metrics().unwrap().total, 100);
    assert_eq!(cmd, TimerCmd::Schedule { role: TimerRole::Reset, delay_ms: RESET_MS });
}

#[test]
fn push_before_ack_completes_and_ack_does_not_regress() {
    let mut m = monitor();
    m.begin_save(1_000, true);

    m.on_push(&completion(1_000, 1_020), 1_030);
    assert_eq!(m.phase(), MonitorPhase::Complete);

    assert_eq!(m.acknowledged(), TimerCmd::Keep);
    assert_eq!(m.phase(), MonitorPhase::Complete);
    assert_eq!(m.armed_timer(), Some(TimerRole::Reset));
}

#[test]
fn websocket_time_may_go_negative_under_clock_skew() {
    let mut m = monitor();
    m.begin_save(1_000, true);
    // Server clock ahead of local clock.
    m.on_push(&completion(1_000, 1_500), 1_200);
    assert_eq!(m.metrics().unwrap().websocket_time, -300);
    assert_eq!(m.metrics().unwrap().total, 200);
}
