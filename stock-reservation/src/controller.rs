//! Reservation controller facade.
//!
//! [`ReservationController`] owns a [`ReservationStore`] and turns the
//! action-based reducer into imperative async calls: each call sends a command
//! and waits for its settlement notice on the store's action broadcast.

use std::sync::Arc;
use std::time::Duration;
use chrono::{DateTime, Utc};
use storefront_runtime::store::Store;
use tokio::sync::broadcast;

use crate::actions::{ReservationAction, ReserveOutcome};
use crate::config::ReservationConfig;
use crate::error::{ReservationError, Result};
use crate::notifier::{ConfirmPrompt, Notifier};
use crate::reducer::{
    HOLD_TIMERS, RELEASE_RETRY, ReservationEnvironment, ReservationReducer, ReservationStore,
};
use crate::types::{
    DirectPurchaseItem, LineItem, ReleaseMode, ReservationItem, ReservationState,
    ReservationStatus, ReserveRequest, ReserveStockResponse, Ticket,
};

/// Client-side stock reservation controller
///
/// Holds at most one server-side reservation. Dropping the controller runs
/// [`ReservationController::teardown`].
///
/// # Example
///
/// ```no_run
/// use stock_reservation::{ReservationConfig, ReservationController, ReservationItem};
///
/// # async fn checkout() -> Result<(), stock_reservation::ReservationError> {
/// let config = ReservationConfig::from_env();
/// let controller = ReservationController::from_config(&config)?;
///
/// if let Some(hold) = controller.reserve(vec![ReservationItem::new("p1", 2)], None).await {
///     println!("held {} for {}", hold.reservation_id, controller.remaining_time_display().await);
/// }
/// controller.release().await;
/// # Ok(())
/// # }
/// ```
pub struct ReservationController {
    store: ReservationStore,
    notifier: Arc<dyn Notifier>,
    response_timeout: Duration,
}

impl ReservationController {
    /// Create a controller over `environment`
    #[must_use]
    pub fn new(environment: ReservationEnvironment, config: &ReservationConfig) -> Self {
        let notifier = Arc::clone(&environment.notifier);
        Self {
            store: Store::new(ReservationState::new(), ReservationReducer::new(), environment),
            notifier,
            response_timeout: config.response_timeout,
        }
    }

    /// Create a controller talking to the configured storefront API
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::ClientBuild`] if the HTTP client cannot be built.
    pub fn from_config(config: &ReservationConfig) -> Result<Self> {
        Ok(Self::new(ReservationEnvironment::from_config(config)?, config))
    }

    // ========== Reserve ==========

    /// Reserve `items`, releasing the live hold first
    ///
    /// Returns `None` when another reserve is in progress or the reserve
    /// failed; failures are recorded in [`ReservationState::last_error`] and
    /// shown to the user.
    pub async fn reserve(
        &self,
        items: Vec<ReservationItem>,
        direct_purchase_item: Option<DirectPurchaseItem>,
    ) -> Option<ReserveStockResponse> {
        self.settle_reserve(ReserveRequest::new(items, direct_purchase_item))
            .await
    }

    /// Reserve the quantities of cart or order lines
    pub async fn reserve_line_items(
        &self,
        lines: &[LineItem],
        direct_purchase_item: Option<DirectPurchaseItem>,
    ) -> Option<ReserveStockResponse> {
        self.settle_reserve(ReserveRequest::from_line_items(lines, direct_purchase_item))
            .await
    }

    async fn settle_reserve(&self, request: ReserveRequest) -> Option<ReserveStockResponse> {
        match self.try_reserve(request).await {
            Ok(response) => Some(response),
            Err(error) => {
                tracing::debug!(%error, "Reserve returned no hold");
                None
            },
        }
    }

    /// Reserve and report why no hold was placed
    ///
    /// # Errors
    ///
    /// - [`ReservationError::AlreadyReserving`]: another reserve is in progress
    /// - [`ReservationError::InvalidRequest`] / [`ReservationError::Api`]: the request was rejected
    /// - [`ReservationError::Cancelled`]: a reset or teardown superseded the request
    /// - [`ReservationError::Store`]: no settlement within the response timeout
    pub async fn try_reserve(&self, request: ReserveRequest) -> Result<ReserveStockResponse> {
        let ticket = Ticket::new();

        let settled = self
            .store
            .send_and_wait_for(
                ReservationAction::Reserve { ticket, request },
                move |action| {
                    matches!(
                        action,
                        ReservationAction::ReserveSettled { ticket: settled, .. } if *settled == ticket
                    )
                },
                self.response_timeout,
            )
            .await?;

        let ReservationAction::ReserveSettled { outcome, .. } = settled else {
            return Err(ReservationError::Cancelled);
        };

        match outcome {
            ReserveOutcome::Placed(response) => Ok(response),
            ReserveOutcome::Failed(error) => Err(error),
            ReserveOutcome::Skipped => Err(ReservationError::AlreadyReserving),
            ReserveOutcome::Cancelled => Err(ReservationError::Cancelled),
        }
    }

    // ========== Release ==========

    /// Release the live hold
    ///
    /// Returns `true` when nothing was held, when the server released the hold,
    /// or when it no longer had it. Returns `false` only after every retry
    /// failed; local state is cleared either way.
    pub async fn release(&self) -> bool {
        self.release_with(ReleaseMode::Standard).await
    }

    /// Release the live hold using `mode`
    pub async fn release_with(&self, mode: ReleaseMode) -> bool {
        let Some(reservation_id) = self.store.state(|s| s.reservation_id.clone()).await else {
            return true;
        };

        let wanted = reservation_id.clone();
        let settled = self
            .store
            .send_and_wait_for(
                ReservationAction::Release {
                    reservation_id,
                    mode,
                },
                move |action| {
                    matches!(
                        action,
                        ReservationAction::ReleaseSettled { reservation_id, .. } if *reservation_id == wanted
                    )
                },
                self.response_timeout,
            )
            .await;

        match settled {
            Ok(ReservationAction::ReleaseSettled { outcome, .. }) => outcome.is_success(),
            Ok(_) => false,
            Err(error) => {
                tracing::warn!(%error, "Release did not settle");
                false
            },
        }
    }

    /// Ask the user before leaving with a live or pending hold
    ///
    /// Returns `true` when there is nothing to lose or the user confirmed; the
    /// hold is then released and a reserve still in flight is cancelled, so a
    /// hold landing afterwards is released in keep-alive mode. Returns `false`
    /// if the user chose to stay.
    pub async fn confirm_leave(&self, prompt: ConfirmPrompt) -> bool {
        let (held, reserving) = self
            .store
            .state(|s| (s.reservation_id.is_some(), Self::reserve_pending(s)))
            .await;
        if !held && !reserving {
            return true;
        }

        if !self.notifier.confirm(prompt).await {
            return false;
        }

        if held && !self.release().await {
            tracing::warn!("Leaving with a hold that could not be released");
        }
        if self.store.state(Self::reserve_pending).await {
            self.reset().await;
        }
        true
    }

    fn reserve_pending(state: &ReservationState) -> bool {
        state.in_flight_reserve.is_some() || state.queued_reserve.is_some()
    }

    // ========== Lifecycle ==========

    /// Drop all local state without contacting the server
    pub async fn reset(&self) {
        if let Err(error) = self.store.send(ReservationAction::Reset).await {
            tracing::warn!(%error, "Reset rejected");
        }
    }

    /// Owner is going away
    ///
    /// Aborts the countdown and release retries before returning, then clears
    /// local state and fires an unawaited keep-alive release for a held
    /// reservation. Never blocks.
    pub fn teardown(&self) {
        self.store.cancel_now(HOLD_TIMERS);
        self.store.cancel_now(RELEASE_RETRY);

        let pending = self
            .store
            .try_state(ReservationState::has_pending_work)
            .unwrap_or(true);
        if pending && !self.store.spawn_send(ReservationAction::Teardown) {
            tracing::warn!("Teardown outside a runtime, any hold lapses at its TTL");
        }
    }

    // ========== Observation ==========

    /// Copy of the current state
    pub async fn snapshot(&self) -> ReservationState {
        self.store.state(ReservationState::clone).await
    }

    /// Current lifecycle status
    pub async fn status(&self) -> ReservationStatus {
        self.store.state(|s| s.status).await
    }

    /// Id of the live hold
    pub async fn reservation_id(&self) -> Option<String> {
        self.store.state(|s| s.reservation_id.clone()).await
    }

    /// Server-side expiry of the live hold
    pub async fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.store.state(|s| s.expires_at).await
    }

    /// Message of the last reserve failure
    pub async fn last_error(&self) -> Option<String> {
        self.store.state(|s| s.last_error.clone()).await
    }

    /// Whether a hold is live
    pub async fn is_reserved(&self) -> bool {
        self.store.state(ReservationState::is_reserved).await
    }

    /// Whether a reserve or release call is in progress
    pub async fn is_busy(&self) -> bool {
        self.store.state(ReservationState::is_busy).await
    }

    /// Remaining hold time as `MM:SS`
    pub async fn remaining_time_display(&self) -> String {
        self.store.state(ReservationState::remaining_time_display).await
    }

    /// Observe every action produced by effects (results, ticks, notices)
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ReservationAction> {
        self.store.subscribe_actions()
    }

    /// Underlying store
    #[must_use]
    pub const fn store(&self) -> &ReservationStore {
        &self.store
    }
}

impl std::fmt::Debug for ReservationController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReservationController")
            .field("response_timeout", &self.response_timeout)
            .finish_non_exhaustive()
    }
}

impl Drop for ReservationController {
    fn drop(&mut self) {
        self.teardown();
    }
}
