//! Reservation reducer.
//!
//! One live hold per controller:
//! 1. `Reserve` releases the live hold (if any), then calls the reservation service
//! 2. `HoldPlaced` arms a one-second countdown and an absolute expiry timer
//! 3. `Release` calls the service, retrying with fixed backoff; "not found" counts as released
//! 4. The countdown reaching zero expires the hold locally, without a network call
//! 5. `Reset` and `Teardown` clear everything; teardown also fires a keep-alive release
//!
//! Timers run under [`HOLD_TIMERS`] and retries under [`RELEASE_RETRY`], so both
//! can be cancelled as a group. Timer actions carry the generation they were
//! armed in and are ignored once the generation has moved on.

use std::sync::Arc;
use std::time::Duration;
use storefront_core::{
    SmallVec, async_effect,
    effect::{Effect, EffectId},
    environment::{Clock, SystemClock},
    reducer::Reducer,
    smallvec, timer,
};
use storefront_runtime::{RetryPolicy, Store};

use crate::actions::{ReleaseOutcome, ReservationAction, ReserveOutcome};
use crate::client::{HttpReservationClient, ReservationClient};
use crate::config::ReservationConfig;
use crate::error::{ReservationApiError, ReservationError};
use crate::metrics::ReservationMetrics;
use crate::notifier::{Notice, Notifier, TracingNotifier};
use crate::types::{
    ReleaseMode, ReservationState, ReservationStatus, ReserveRequest, ReserveStockResponse, Ticket,
};

/// Cancellation group of the countdown tick and the expiry timer
pub const HOLD_TIMERS: EffectId = EffectId::new("reservation.hold-timers");

/// Cancellation group of scheduled release retries
pub const RELEASE_RETRY: EffectId = EffectId::new("reservation.release-retry");

/// Countdown resolution
pub const COUNTDOWN_INTERVAL: Duration = Duration::from_secs(1);

/// Shown when a reserve failure carries no message
pub const RESERVE_FAILED_MESSAGE: &str = "Stock reservation failed";

/// Shown when the countdown runs out
pub const EXPIRED_MESSAGE: &str = "Your stock reservation has expired. Please try again.";

type Effects = SmallVec<[Effect<ReservationAction>; 4]>;

/// Store running the reservation reducer
pub type ReservationStore =
    Store<ReservationState, ReservationAction, ReservationEnvironment, ReservationReducer>;

// ============================================================================
// Environment
// ============================================================================

/// Dependencies of the reservation reducer
#[derive(Clone)]
pub struct ReservationEnvironment {
    /// Reservation service
    pub client: Arc<dyn ReservationClient>,
    /// User-facing alerts
    pub notifier: Arc<dyn Notifier>,
    /// Clock for `reserved_at`
    pub clock: Arc<dyn Clock>,
    /// Release retry policy
    pub release_policy: RetryPolicy,
}

impl ReservationEnvironment {
    /// Create an environment
    #[must_use]
    pub fn new(
        client: Arc<dyn ReservationClient>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        release_policy: RetryPolicy,
    ) -> Self {
        Self {
            client,
            notifier,
            clock,
            release_policy,
        }
    }

    /// Production environment: HTTP client, logging notifier, wall clock
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::ClientBuild`] if the HTTP client cannot be built.
    pub fn from_config(config: &ReservationConfig) -> Result<Self, ReservationError> {
        Ok(Self::new(
            Arc::new(HttpReservationClient::from_config(config)?),
            Arc::new(TracingNotifier),
            Arc::new(SystemClock),
            config.release_policy(),
        ))
    }

    /// Replace the notifier
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }
}

impl std::fmt::Debug for ReservationEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReservationEnvironment")
            .field("release_policy", &self.release_policy)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Reducer
// ============================================================================

/// Reducer for one controller's stock reservation
#[derive(Clone, Copy, Debug, Default)]
pub struct ReservationReducer;

impl ReservationReducer {
    /// Create the reducer
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Emit a settlement notice for observers
    fn notify(action: ReservationAction) -> Effect<ReservationAction> {
        async_effect! { Some(action) }
    }

    fn alert(env: &ReservationEnvironment, notice: Notice) -> Effect<ReservationAction> {
        let notifier = Arc::clone(&env.notifier);
        async_effect! {
            notifier.alert(notice);
            None
        }
    }

    fn start_reserve(
        state: &mut ReservationState,
        ticket: Ticket,
        request: ReserveRequest,
        env: &ReservationEnvironment,
    ) -> Effects {
        state.status = ReservationStatus::Reserving;
        state.last_error = None;
        state.in_flight_reserve = Some(ticket);

        tracing::debug!(%ticket, items = request.items.len(), "Requesting stock reservation");

        let client = Arc::clone(&env.client);
        smallvec![async_effect! {
            match client.reserve(request).await {
                Ok(response) => Some(ReservationAction::HoldPlaced { ticket, response }),
                Err(error) => Some(ReservationAction::ReserveFailed { ticket, error }),
            }
        }]
    }

    fn start_release(
        state: &mut ReservationState,
        reservation_id: String,
        mode: ReleaseMode,
        env: &ReservationEnvironment,
    ) -> Effects {
        state.status = ReservationStatus::Releasing;
        state.release_in_flight = Some(reservation_id.clone());

        tracing::debug!(%reservation_id, ?mode, "Releasing reservation");
        smallvec![Self::release_call(env, reservation_id, 1, mode)]
    }

    fn release_call(
        env: &ReservationEnvironment,
        reservation_id: String,
        attempt: u32,
        mode: ReleaseMode,
    ) -> Effect<ReservationAction> {
        let client = Arc::clone(&env.client);
        async_effect! {
            match client.release(reservation_id.clone(), mode).await {
                Ok(()) => Some(ReservationAction::ReleaseSucceeded {
                    reservation_id,
                    already_gone: false,
                }),
                Err(error) if error.is_not_found() => Some(ReservationAction::ReleaseSucceeded {
                    reservation_id,
                    already_gone: true,
                }),
                Err(error) => Some(ReservationAction::ReleaseFailed {
                    reservation_id,
                    attempt,
                    error,
                    mode,
                }),
            }
        }
    }

    /// Unawaited best-effort release; the outcome is only logged
    fn keep_alive_release(env: &ReservationEnvironment, reservation_id: String) -> Effect<ReservationAction> {
        let client = Arc::clone(&env.client);
        async_effect! {
            match client.release(reservation_id.clone(), ReleaseMode::KeepAlive).await {
                Ok(()) => tracing::debug!(%reservation_id, "Keep-alive release sent"),
                Err(error) if error.is_not_found() => {
                    tracing::debug!(%reservation_id, "Keep-alive release: reservation already gone");
                },
                Err(error) => {
                    tracing::warn!(%reservation_id, %error, "Keep-alive release failed, hold lapses at its TTL");
                },
            }
            None
        }
    }

    /// Drop the live hold and invalidate its timers
    fn clear_hold(state: &mut ReservationState) -> Effect<ReservationAction> {
        state.reservation_id = None;
        state.expires_at = None;
        state.reserved_at = None;
        state.ttl_seconds_remaining = 0;
        state.timer_generation = state.timer_generation.wrapping_add(1);
        Effect::Cancel(HOLD_TIMERS)
    }

    fn arm_countdown(generation: u64) -> Effect<ReservationAction> {
        timer! {
            id: HOLD_TIMERS,
            duration: COUNTDOWN_INTERVAL,
            action: ReservationAction::CountdownTick { generation }
        }
    }

    fn expire(state: &mut ReservationState, env: &ReservationEnvironment) -> Effects {
        let expired = state.reservation_id.clone();
        let cancel = Self::clear_hold(state);
        state.status = ReservationStatus::Expired;

        tracing::info!(reservation_id = ?expired, "Reservation expired");
        ReservationMetrics::record_expired();

        smallvec![cancel, Self::alert(env, Notice::warning(EXPIRED_MESSAGE))]
    }

    fn place_hold(
        state: &mut ReservationState,
        ticket: Ticket,
        response: ReserveStockResponse,
        env: &ReservationEnvironment,
    ) -> Effects {
        if state.in_flight_reserve != Some(ticket) {
            tracing::warn!(
                %ticket,
                reservation_id = %response.reservation_id,
                "Hold placed for a superseded request, releasing it"
            );
            return smallvec![Self::keep_alive_release(env, response.reservation_id)];
        }

        state.in_flight_reserve = None;
        state.reservation_id = Some(response.reservation_id.clone());
        state.expires_at = Some(response.expires_at);
        state.reserved_at = Some(env.clock.now());
        state.ttl_seconds_remaining = response.ttl_seconds;
        state.status = ReservationStatus::Reserved;
        state.last_error = None;
        state.timer_generation = state.timer_generation.wrapping_add(1);
        let generation = state.timer_generation;

        tracing::info!(
            reservation_id = %response.reservation_id,
            ttl_seconds = response.ttl_seconds,
            expires_at = %response.expires_at,
            "Stock reserved"
        );
        ReservationMetrics::record_reserved();

        let mut effects: Effects = smallvec![Effect::Cancel(HOLD_TIMERS)];
        if response.ttl_seconds == 0 {
            effects.extend(Self::expire(state, env));
        } else {
            effects.push(Self::arm_countdown(generation));
            effects.push(timer! {
                id: HOLD_TIMERS,
                duration: Duration::from_secs(u64::from(response.ttl_seconds)),
                action: ReservationAction::HoldExpired { generation }
            });
        }

        effects.push(Self::notify(ReservationAction::ReserveSettled {
            ticket,
            outcome: ReserveOutcome::Placed(response),
        }));
        effects
    }

    fn fail_reserve(
        state: &mut ReservationState,
        ticket: Ticket,
        error: ReservationApiError,
        env: &ReservationEnvironment,
    ) -> Effects {
        if state.in_flight_reserve != Some(ticket) {
            tracing::debug!(%ticket, %error, "Ignoring failure of a superseded reserve");
            return SmallVec::new();
        }

        state.in_flight_reserve = None;

        let message = match error.to_string() {
            message if message.trim().is_empty() => RESERVE_FAILED_MESSAGE.to_string(),
            message => message,
        };
        state.status = ReservationStatus::Failed;
        state.last_error = Some(message.clone());

        tracing::warn!(%ticket, error = %message, "Stock reservation failed");
        ReservationMetrics::record_reserve_failed(match &error {
            ReservationApiError::InsufficientStock { .. } => "insufficient_stock",
            ReservationApiError::NotFound { .. } | ReservationApiError::Http { .. } => "http",
            ReservationApiError::Transport(_) => "transport",
            ReservationApiError::Decode(_) => "decode",
        });

        smallvec![
            Self::alert(env, Notice::error(message)),
            Self::notify(ReservationAction::ReserveSettled {
                ticket,
                outcome: ReserveOutcome::Failed(ReservationError::Api(error)),
            }),
        ]
    }

    fn finish_release(
        state: &mut ReservationState,
        reservation_id: String,
        outcome: ReleaseOutcome,
        env: &ReservationEnvironment,
    ) -> Effects {
        state.release_in_flight = None;

        let mut effects: Effects = SmallVec::new();
        if state.reservation_id.as_deref() == Some(reservation_id.as_str()) {
            effects.push(Self::clear_hold(state));
            state.status = ReservationStatus::Idle;
        }

        match &outcome {
            ReleaseOutcome::Released => {
                tracing::info!(%reservation_id, "Reservation released");
                ReservationMetrics::record_released(false);
            },
            ReleaseOutcome::AlreadyGone => {
                tracing::info!(%reservation_id, "Reservation already gone on the server");
                ReservationMetrics::record_released(true);
            },
            ReleaseOutcome::Abandoned { attempts, error } => {
                tracing::warn!(
                    %reservation_id,
                    attempts,
                    %error,
                    "Release abandoned, hold lapses at its TTL"
                );
                ReservationMetrics::record_release_abandoned();
            },
            ReleaseOutcome::Superseded | ReleaseOutcome::NotHeld => {},
        }

        effects.push(Self::notify(ReservationAction::ReleaseSettled {
            reservation_id,
            outcome,
        }));

        if let Some((ticket, request)) = state.queued_reserve.take() {
            effects.extend(Self::start_reserve(state, ticket, request, env));
        }

        effects
    }

    /// Settle every waiter and return to a fresh idle state
    fn reset(state: &mut ReservationState) -> Effects {
        let mut effects: Effects = smallvec![Effect::Cancel(HOLD_TIMERS), Effect::Cancel(RELEASE_RETRY)];

        if let Some(ticket) = state.in_flight_reserve.take() {
            effects.push(Self::notify(ReservationAction::ReserveSettled {
                ticket,
                outcome: ReserveOutcome::Cancelled,
            }));
        }
        if let Some((ticket, _)) = state.queued_reserve.take() {
            effects.push(Self::notify(ReservationAction::ReserveSettled {
                ticket,
                outcome: ReserveOutcome::Cancelled,
            }));
        }
        if let Some(reservation_id) = state.release_in_flight.take() {
            effects.push(Self::notify(ReservationAction::ReleaseSettled {
                reservation_id,
                outcome: ReleaseOutcome::Superseded,
            }));
        }

        *state = ReservationState {
            timer_generation: state.timer_generation.wrapping_add(1),
            ..ReservationState::default()
        };
        effects
    }

    fn is_tracked_release(state: &ReservationState, reservation_id: &str) -> bool {
        state.release_in_flight.as_deref() == Some(reservation_id)
    }

    fn is_live_timer(state: &ReservationState, generation: u64) -> bool {
        generation == state.timer_generation && state.reservation_id.is_some()
    }
}

impl Reducer for ReservationReducer {
    type State = ReservationState;
    type Action = ReservationAction;
    type Environment = ReservationEnvironment;

    #[allow(clippy::too_many_lines)] // One arm per action
    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            // ========== Commands ==========
            ReservationAction::Reserve { ticket, request } => {
                if state.status == ReservationStatus::Reserving
                    || state.in_flight_reserve.is_some()
                    || state.queued_reserve.is_some()
                {
                    tracing::debug!(%ticket, "Reserve skipped, another request is in progress");
                    return smallvec![Self::notify(ReservationAction::ReserveSettled {
                        ticket,
                        outcome: ReserveOutcome::Skipped,
                    })];
                }

                if let Err(error) = request.validate() {
                    let message = error.to_string();
                    tracing::warn!(%ticket, error = %message, "Invalid reservation request");
                    ReservationMetrics::record_reserve_failed("invalid");

                    if state.reservation_id.is_none() {
                        state.status = ReservationStatus::Failed;
                    }
                    state.last_error = Some(message.clone());

                    return smallvec![
                        Self::alert(env, Notice::error(message)),
                        Self::notify(ReservationAction::ReserveSettled {
                            ticket,
                            outcome: ReserveOutcome::Failed(ReservationError::InvalidRequest(error)),
                        }),
                    ];
                }

                if let Some(held) = state.reservation_id.clone() {
                    state.queued_reserve = Some((ticket, request));
                    if Self::is_tracked_release(state, &held) {
                        tracing::debug!(reservation_id = %held, "Reserve queued behind release in flight");
                        return SmallVec::new();
                    }
                    tracing::debug!(reservation_id = %held, "Releasing live hold before reserving again");
                    return Self::start_release(state, held, ReleaseMode::Standard, env);
                }

                if let Some(releasing) = &state.release_in_flight {
                    tracing::debug!(reservation_id = %releasing, "Reserve queued behind release in flight");
                    state.queued_reserve = Some((ticket, request));
                    return SmallVec::new();
                }

                Self::start_reserve(state, ticket, request, env)
            },

            ReservationAction::Release {
                reservation_id,
                mode,
            } => {
                if Self::is_tracked_release(state, &reservation_id) {
                    tracing::debug!(%reservation_id, "Release already in flight");
                    return SmallVec::new();
                }

                if state.reservation_id.as_deref() == Some(reservation_id.as_str()) {
                    return Self::start_release(state, reservation_id, mode, env);
                }

                tracing::debug!(%reservation_id, "Release ignored, reservation not held");
                smallvec![Self::notify(ReservationAction::ReleaseSettled {
                    reservation_id,
                    outcome: ReleaseOutcome::NotHeld,
                })]
            },

            ReservationAction::Reset => {
                tracing::debug!("Reservation state reset");
                Self::reset(state)
            },

            ReservationAction::Teardown => {
                let held = state.reservation_id.clone();
                let mut effects = Self::reset(state);

                if let Some(reservation_id) = held {
                    tracing::info!(%reservation_id, "Teardown with live hold, sending keep-alive release");
                    effects.push(Self::keep_alive_release(env, reservation_id));
                }
                effects
            },

            // ========== Reservation service results ==========
            ReservationAction::HoldPlaced { ticket, response } => {
                Self::place_hold(state, ticket, response, env)
            },

            ReservationAction::ReserveFailed { ticket, error } => {
                Self::fail_reserve(state, ticket, error, env)
            },

            ReservationAction::ReleaseAttempt {
                reservation_id,
                attempt,
                mode,
            } => {
                if !Self::is_tracked_release(state, &reservation_id) {
                    tracing::debug!(%reservation_id, attempt, "Dropping retry of untracked release");
                    return SmallVec::new();
                }

                tracing::debug!(%reservation_id, attempt, "Retrying release");
                smallvec![Self::release_call(env, reservation_id, attempt, mode)]
            },

            ReservationAction::ReleaseSucceeded {
                reservation_id,
                already_gone,
            } => {
                if !Self::is_tracked_release(state, &reservation_id) {
                    tracing::debug!(%reservation_id, "Ignoring settlement of untracked release");
                    return SmallVec::new();
                }

                let outcome = if already_gone {
                    ReleaseOutcome::AlreadyGone
                } else {
                    ReleaseOutcome::Released
                };
                Self::finish_release(state, reservation_id, outcome, env)
            },

            ReservationAction::ReleaseFailed {
                reservation_id,
                attempt,
                error,
                mode,
            } => {
                if !Self::is_tracked_release(state, &reservation_id) {
                    tracing::debug!(%reservation_id, %error, "Ignoring failure of untracked release");
                    return SmallVec::new();
                }

                if env.release_policy.should_retry(attempt) {
                    let delay = env.release_policy.delay_for_attempt(attempt);
                    tracing::warn!(%reservation_id, attempt, %error, ?delay, "Release failed, retrying");
                    ReservationMetrics::record_release_retry();

                    return smallvec![
                        Effect::Delay {
                            duration: delay,
                            action: Box::new(ReservationAction::ReleaseAttempt {
                                reservation_id,
                                attempt: attempt + 1,
                                mode,
                            }),
                        }
                        .cancellable(RELEASE_RETRY)
                    ];
                }

                Self::finish_release(
                    state,
                    reservation_id,
                    ReleaseOutcome::Abandoned {
                        attempts: attempt,
                        error,
                    },
                    env,
                )
            },

            // ========== Timers ==========
            ReservationAction::CountdownTick { generation } => {
                if !Self::is_live_timer(state, generation) {
                    tracing::trace!(generation, "Stale countdown tick");
                    return SmallVec::new();
                }

                state.ttl_seconds_remaining = state.ttl_seconds_remaining.saturating_sub(1);
                if state.ttl_seconds_remaining == 0 {
                    return Self::expire(state, env);
                }

                smallvec![Self::arm_countdown(generation)]
            },

            ReservationAction::HoldExpired { generation } => {
                if !Self::is_live_timer(state, generation) {
                    tracing::trace!(generation, "Stale expiry timer");
                    return SmallVec::new();
                }

                Self::expire(state, env)
            },

            // ========== Settlement notices ==========
            ReservationAction::ReserveSettled { .. } | ReservationAction::ReleaseSettled { .. } => {
                SmallVec::new()
            },
        }
    }
}
