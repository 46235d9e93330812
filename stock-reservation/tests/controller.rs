//! Integration tests for the reservation controller
//!
//! Drive the controller against the in-memory reservation service. Timer
//! behavior runs on a paused tokio clock so countdowns and retry delays
//! resolve instantly.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use std::sync::Arc;
use std::time::Duration;
use stock_reservation::mocks::{MockCall, MockReservationClient, RecordingNotifier, mock_environment};
use stock_reservation::reducer::{EXPIRED_MESSAGE, HOLD_TIMERS, RELEASE_RETRY};
use stock_reservation::{
    ConfirmPrompt, NoticeKind, ReleaseMode, ReservationApiError, ReservationConfig,
    ReservationController, ReservationError, ReservationItem, ReservationStatus, ReserveRequest,
};
use storefront_testing::init_test_tracing;
use tokio::time::Instant;

// ============================================================================
// Test Fixtures
// ============================================================================

struct Fixture {
    client: Arc<MockReservationClient>,
    notifier: Arc<RecordingNotifier>,
    controller: Arc<ReservationController>,
}

fn fixture_with(client: MockReservationClient) -> Fixture {
    init_test_tracing();

    let client = Arc::new(client);
    let notifier = Arc::new(RecordingNotifier::new());
    let controller = ReservationController::new(
        mock_environment(Arc::clone(&client), Arc::clone(&notifier)),
        &ReservationConfig::default(),
    );

    Fixture {
        client,
        notifier,
        controller: Arc::new(controller),
    }
}

fn fixture() -> Fixture {
    fixture_with(MockReservationClient::new())
}

fn items() -> Vec<ReservationItem> {
    vec![ReservationItem::new("p1", 2)]
}

fn transport_error() -> ReservationApiError {
    ReservationApiError::Transport("connection reset".to_string())
}

/// Poll `check` until it holds, sleeping between attempts
async fn eventually(mut check: impl FnMut() -> bool) {
    for _ in 0..400 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not met in time");
}

/// Wait until the controller reports `status`
async fn wait_for_status(controller: &ReservationController, status: ReservationStatus) {
    let mut actions = controller.subscribe();
    tokio::time::timeout(Duration::from_secs(30), async {
        while controller.status().await != status {
            actions.recv().await.unwrap();
        }
    })
    .await
    .unwrap_or_else(|_| panic!("controller never reached {status}"));
}

// ============================================================================
// Reserve / Release
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_reserve_then_release_returns_to_idle() {
    let f = fixture();

    let hold = f.controller.reserve(items(), None).await.unwrap();
    assert_eq!(hold.reservation_id, "res-1");
    assert!(f.controller.is_reserved().await);

    assert!(f.controller.release().await);

    let state = f.controller.snapshot().await;
    assert_eq!(state.status, ReservationStatus::Idle);
    assert!(state.reservation_id.is_none());
    assert_eq!(f.controller.store().running_effects(HOLD_TIMERS), 0);
    assert_eq!(
        f.client.calls(),
        vec![
            MockCall::Reserve(ReserveRequest::new(items(), None)),
            MockCall::Release {
                reservation_id: "res-1".to_string(),
                mode: ReleaseMode::Standard,
            },
        ]
    );
}

#[tokio::test]
async fn test_second_reserve_while_pending_is_a_noop() {
    let f = fixture();
    f.client.pause_reserves();

    let first = tokio::spawn({
        let controller = Arc::clone(&f.controller);
        async move { controller.reserve(items(), None).await }
    });
    let client = Arc::clone(&f.client);
    eventually(|| client.reserve_calls().len() == 1).await;

    assert!(f.controller.is_busy().await);
    assert!(f.controller.reserve(items(), None).await.is_none());
    assert!(matches!(
        f.controller.try_reserve(ReserveRequest::new(items(), None)).await,
        Err(ReservationError::AlreadyReserving)
    ));

    f.client.resume_reserves();
    assert!(first.await.unwrap().is_some());
    assert_eq!(f.client.reserve_calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_reserve_while_reserved_releases_old_hold_first() {
    let f = fixture();

    f.controller.reserve(items(), None).await.unwrap();
    let second = f
        .controller
        .reserve(vec![ReservationItem::new("p2", 1)], None)
        .await
        .unwrap();

    assert_eq!(second.reservation_id, "res-2");
    assert_eq!(
        f.client.calls(),
        vec![
            MockCall::Reserve(ReserveRequest::new(items(), None)),
            MockCall::Release {
                reservation_id: "res-1".to_string(),
                mode: ReleaseMode::Standard,
            },
            MockCall::Reserve(ReserveRequest::new(vec![ReservationItem::new("p2", 1)], None)),
        ]
    );
    assert_eq!(f.controller.reservation_id().await.as_deref(), Some("res-2"));
}

#[tokio::test(start_paused = true)]
async fn test_release_when_idle_makes_no_calls() {
    let f = fixture();

    assert!(f.controller.release().await);
    assert!(f.client.calls().is_empty());
    assert_eq!(f.controller.status().await, ReservationStatus::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_not_found_release_counts_as_released() {
    let f = fixture();
    f.client.push_release(Err(ReservationApiError::NotFound {
        message: "Reservation not found".to_string(),
    }));

    f.controller.reserve(items(), None).await.unwrap();
    assert!(f.controller.release().await);

    assert_eq!(f.controller.status().await, ReservationStatus::Idle);
    assert_eq!(f.client.release_calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failing_release_retries_three_times_then_clears() {
    let f = fixture();
    for _ in 0..3 {
        f.client.push_release(Err(transport_error()));
    }

    f.controller.reserve(items(), None).await.unwrap();
    let started = Instant::now();
    let released = f.controller.release().await;
    let elapsed = started.elapsed();

    assert!(!released);
    assert_eq!(f.client.release_calls().len(), 3);
    assert!(elapsed >= Duration::from_secs(2), "attempts too close: {elapsed:?}");
    assert!(elapsed < Duration::from_secs(3), "attempts too far apart: {elapsed:?}");

    let state = f.controller.snapshot().await;
    assert_eq!(state.status, ReservationStatus::Idle);
    assert!(state.reservation_id.is_none());
    assert_eq!(f.controller.store().running_effects(RELEASE_RETRY), 0);
    // Abandoned releases are not shown to the user
    assert!(f.notifier.notices().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_release_recovers_on_second_attempt() {
    let f = fixture();
    f.client.push_release(Err(transport_error()));

    f.controller.reserve(items(), None).await.unwrap();

    assert!(f.controller.release().await);
    assert_eq!(f.client.release_calls().len(), 2);
    assert_eq!(f.controller.status().await, ReservationStatus::Idle);
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_reserve_failure_is_recorded_and_shown() {
    let f = fixture();
    f.client.push_reserve(Err(ReservationApiError::InsufficientStock {
        message: "Only 1 left of p1".to_string(),
        short_items: vec![],
    }));

    assert!(f.controller.reserve(items(), None).await.is_none());

    let state = f.controller.snapshot().await;
    assert_eq!(state.status, ReservationStatus::Failed);
    assert_eq!(state.last_error.as_deref(), Some("Only 1 left of p1"));
    assert!(state.reservation_id.is_none());

    let client = Arc::clone(&f.client);
    let notifier = Arc::clone(&f.notifier);
    eventually(move || !notifier.notices().is_empty()).await;
    let notices = f.notifier.notices();
    assert_eq!(notices[0].kind, NoticeKind::Error);
    assert_eq!(notices[0].message, "Only 1 left of p1");

    // Failed is recoverable
    assert!(f.controller.reserve(items(), None).await.is_some());
    assert_eq!(client.reserve_calls().len(), 2);
    assert!(f.controller.last_error().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_invalid_request_never_reaches_the_service() {
    let f = fixture();

    let result = f
        .controller
        .try_reserve(ReserveRequest::new(vec![ReservationItem::new("p1", 0)], None))
        .await;

    assert!(matches!(result, Err(ReservationError::InvalidRequest(_))));
    assert!(f.client.calls().is_empty());
    assert_eq!(f.controller.status().await, ReservationStatus::Failed);
}

// ============================================================================
// Countdown and expiry
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_countdown_expires_hold_without_network_call() {
    let f = fixture_with(MockReservationClient::with_ttl(5));

    f.controller.reserve(items(), None).await.unwrap();
    assert_eq!(f.controller.remaining_time_display().await, "00:05");

    let started = Instant::now();
    wait_for_status(&f.controller, ReservationStatus::Expired).await;

    assert_eq!(started.elapsed(), Duration::from_secs(5));
    let state = f.controller.snapshot().await;
    assert!(state.reservation_id.is_none());
    assert_eq!(state.remaining_time_display(), "00:00");
    assert!(f.client.release_calls().is_empty());
    assert_eq!(f.controller.store().running_effects(HOLD_TIMERS), 0);

    let notifier = Arc::clone(&f.notifier);
    eventually(move || notifier.notices().iter().any(|n| n.message == EXPIRED_MESSAGE)).await;
}

#[tokio::test(start_paused = true)]
async fn test_countdown_ticks_once_per_second() {
    let f = fixture_with(MockReservationClient::with_ttl(75));

    f.controller.reserve(items(), None).await.unwrap();
    assert_eq!(f.controller.remaining_time_display().await, "01:15");

    let mut actions = f.controller.subscribe();
    for _ in 0..3 {
        actions.recv().await.unwrap();
    }

    assert_eq!(f.controller.remaining_time_display().await, "01:12");
    assert!(f.controller.is_reserved().await);
}

#[tokio::test(start_paused = true)]
async fn test_expiry_during_release_leaves_no_stale_hold() {
    let f = fixture_with(MockReservationClient::with_ttl(2));
    f.client.set_release_latency(Duration::from_secs(3));

    f.controller.reserve(items(), None).await.unwrap();
    assert!(f.controller.release().await);

    let state = f.controller.snapshot().await;
    assert_eq!(state.status, ReservationStatus::Expired);
    assert!(state.reservation_id.is_none());
    assert!(state.release_in_flight.is_none());
    assert_eq!(f.controller.store().running_effects(HOLD_TIMERS), 0);
}

#[tokio::test(start_paused = true)]
async fn test_reserve_after_expiry_starts_fresh_hold() {
    let f = fixture_with(MockReservationClient::with_ttl(1));

    f.controller.reserve(items(), None).await.unwrap();
    wait_for_status(&f.controller, ReservationStatus::Expired).await;

    let hold = f.controller.reserve(items(), None).await.unwrap();
    assert_eq!(hold.reservation_id, "res-2");
    assert!(f.client.release_calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_reserve_during_release_after_expiry_waits_for_release() {
    let f = fixture_with(MockReservationClient::with_ttl(1));
    f.client.set_release_latency(Duration::from_secs(3));

    f.controller.reserve(items(), None).await.unwrap();
    let release = tokio::spawn({
        let controller = Arc::clone(&f.controller);
        async move { controller.release().await }
    });
    wait_for_status(&f.controller, ReservationStatus::Expired).await;

    let state = f.controller.snapshot().await;
    assert!(state.reservation_id.is_none());
    assert_eq!(state.release_in_flight.as_deref(), Some("res-1"));

    let started = Instant::now();
    let hold = f
        .controller
        .reserve(vec![ReservationItem::new("p2", 1)], None)
        .await
        .unwrap();

    assert!(started.elapsed() >= Duration::from_secs(2), "reserve did not wait for the release");
    assert_eq!(hold.reservation_id, "res-2");
    assert!(release.await.unwrap());
    assert_eq!(f.controller.status().await, ReservationStatus::Reserved);
    assert_eq!(
        f.client.calls(),
        vec![
            MockCall::Reserve(ReserveRequest::new(items(), None)),
            MockCall::Release {
                reservation_id: "res-1".to_string(),
                mode: ReleaseMode::Standard,
            },
            MockCall::Reserve(ReserveRequest::new(vec![ReservationItem::new("p2", 1)], None)),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_abandoned_release_still_lets_next_reserve_through() {
    let f = fixture();
    for _ in 0..3 {
        f.client.push_release(Err(transport_error()));
    }

    f.controller.reserve(items(), None).await.unwrap();
    let second = f
        .controller
        .reserve(vec![ReservationItem::new("p2", 1)], None)
        .await
        .unwrap();

    assert_eq!(second.reservation_id, "res-2");
    assert_eq!(f.client.release_calls().len(), 3);
    assert_eq!(f.client.reserve_calls().len(), 2);
    assert_eq!(f.controller.status().await, ReservationStatus::Reserved);
    assert_eq!(f.controller.reservation_id().await.as_deref(), Some("res-2"));
}

// ============================================================================
// Reset / Teardown
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_reserve_then_reset_scenario() {
    let f = fixture();

    let hold = f.controller.reserve(items(), None).await.unwrap();
    assert_eq!(hold.ttl_seconds, 600);

    let state = f.controller.snapshot().await;
    assert_eq!(state.status, ReservationStatus::Reserved);
    assert_eq!(state.ttl_seconds_remaining, 600);
    assert_eq!(state.remaining_time_display(), "10:00");

    f.controller.reset().await;

    let state = f.controller.snapshot().await;
    assert_eq!(state.status, ReservationStatus::Idle);
    assert!(state.reservation_id.is_none());
    assert!(f.client.release_calls().is_empty());
    assert_eq!(f.controller.store().running_effects(HOLD_TIMERS), 0);
}

#[tokio::test]
async fn test_reset_cancels_pending_reserve() {
    let f = fixture();
    f.client.pause_reserves();

    let pending = tokio::spawn({
        let controller = Arc::clone(&f.controller);
        async move { controller.try_reserve(ReserveRequest::new(items(), None)).await }
    });
    let client = Arc::clone(&f.client);
    eventually(|| client.reserve_calls().len() == 1).await;

    f.controller.reset().await;
    assert!(matches!(pending.await.unwrap(), Err(ReservationError::Cancelled)));

    // The late hold is released instead of adopted
    f.client.resume_reserves();
    let client = Arc::clone(&f.client);
    eventually(move || client.release_calls() == vec![("res-1".to_string(), ReleaseMode::KeepAlive)])
        .await;
    assert_eq!(f.controller.status().await, ReservationStatus::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_teardown_clears_timers_synchronously() {
    let f = fixture();
    f.client.set_release_latency(Duration::from_secs(1));

    f.controller.reserve(items(), None).await.unwrap();
    assert_eq!(f.controller.store().running_effects(HOLD_TIMERS), 2);

    f.controller.teardown();

    // Timers are gone before teardown returns; the release is still on its way
    assert_eq!(f.controller.store().running_effects(HOLD_TIMERS), 0);
    assert!(f.client.release_calls().is_empty());

    let client = Arc::clone(&f.client);
    eventually(move || client.release_calls() == vec![("res-1".to_string(), ReleaseMode::KeepAlive)])
        .await;
    assert_eq!(f.controller.status().await, ReservationStatus::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_dropping_controller_releases_hold() {
    let f = fixture();

    f.controller.reserve(items(), None).await.unwrap();
    drop(f.controller);

    let client = Arc::clone(&f.client);
    eventually(move || client.release_calls() == vec![("res-1".to_string(), ReleaseMode::KeepAlive)])
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_teardown_when_idle_sends_nothing() {
    let f = fixture();

    f.controller.teardown();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(f.client.calls().is_empty());
}

// ============================================================================
// Leave confirmation
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_confirm_leave_without_hold_does_not_ask() {
    let f = fixture();

    assert!(f.controller.confirm_leave(ConfirmPrompt::new("Leave checkout?")).await);
    assert!(f.notifier.prompts().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_confirm_leave_declined_keeps_hold() {
    let f = fixture();
    f.notifier.answer_confirms(false);
    f.controller.reserve(items(), None).await.unwrap();

    assert!(!f.controller.confirm_leave(ConfirmPrompt::destructive("Leave checkout?")).await);

    assert!(f.controller.is_reserved().await);
    assert!(f.client.release_calls().is_empty());
    assert_eq!(f.notifier.prompts().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_confirm_leave_confirmed_releases_hold() {
    let f = fixture();
    f.controller.reserve(items(), None).await.unwrap();

    assert!(f.controller.confirm_leave(ConfirmPrompt::destructive("Leave checkout?")).await);

    assert_eq!(f.controller.status().await, ReservationStatus::Idle);
    assert_eq!(f.client.release_calls(), vec![("res-1".to_string(), ReleaseMode::Standard)]);
}

#[tokio::test]
async fn test_confirm_leave_while_reserving_cancels_pending_reserve() {
    let f = fixture();
    f.client.pause_reserves();

    let pending = tokio::spawn({
        let controller = Arc::clone(&f.controller);
        async move { controller.try_reserve(ReserveRequest::new(items(), None)).await }
    });
    let client = Arc::clone(&f.client);
    eventually(|| client.reserve_calls().len() == 1).await;

    assert!(f.controller.confirm_leave(ConfirmPrompt::destructive("Leave checkout?")).await);
    assert_eq!(f.notifier.prompts().len(), 1);
    assert!(matches!(pending.await.unwrap(), Err(ReservationError::Cancelled)));

    // The hold that lands after leaving is released, not adopted
    f.client.resume_reserves();
    let client = Arc::clone(&f.client);
    eventually(move || client.release_calls() == vec![("res-1".to_string(), ReleaseMode::KeepAlive)])
        .await;
    assert_eq!(f.controller.status().await, ReservationStatus::Idle);
    assert!(f.controller.reservation_id().await.is_none());
}
