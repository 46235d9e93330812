//! Actions for the reservation reducer.
//!
//! Every input the controller reacts to is one of these: commands from the
//! facade, results of reservation service calls, timer firings, and the
//! settlement notices the facade waits on.

use crate::error::{ReservationApiError, ReservationError};
use crate::types::{ReleaseMode, ReserveRequest, ReserveStockResponse, Ticket};

/// How a reserve command ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReserveOutcome {
    /// The hold was placed
    Placed(ReserveStockResponse),
    /// Validation or the reservation service rejected the request
    Failed(ReservationError),
    /// Another reserve was already in progress; nothing was sent
    Skipped,
    /// A reset or teardown superseded the request before it settled
    Cancelled,
}

/// How a release command ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// The server released the hold
    Released,
    /// The server no longer had the hold
    AlreadyGone,
    /// Every attempt failed; local state was cleared anyway
    Abandoned {
        /// Attempts made
        attempts: u32,
        /// Error of the last attempt
        error: ReservationApiError,
    },
    /// A reset or teardown superseded the release before it settled
    Superseded,
    /// The reservation was not held by this controller
    NotHeld,
}

impl ReleaseOutcome {
    /// Whether the caller should treat the release as done
    ///
    /// Only an abandoned release reports failure.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        !matches!(self, Self::Abandoned { .. })
    }
}

/// Actions for the reservation reducer
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReservationAction {
    // Commands
    /// Place a hold, releasing the live one first
    Reserve {
        /// Correlates the eventual [`ReservationAction::ReserveSettled`]
        ticket: Ticket,
        /// What to hold
        request: ReserveRequest,
    },

    /// Release the hold with this id
    Release {
        /// Hold to release
        reservation_id: String,
        /// Regular or keep-alive request
        mode: ReleaseMode,
    },

    /// Drop all local state without any network call
    Reset,

    /// Owner is going away: clear local state and fire a best-effort
    /// keep-alive release for a held reservation
    Teardown,

    // Reservation service results
    /// Reserve call succeeded
    HoldPlaced {
        /// Ticket of the reserve command
        ticket: Ticket,
        /// Server response
        response: ReserveStockResponse,
    },

    /// Reserve call failed
    ReserveFailed {
        /// Ticket of the reserve command
        ticket: Ticket,
        /// What went wrong
        error: ReservationApiError,
    },

    /// Retry delay elapsed; make the next release attempt
    ReleaseAttempt {
        /// Hold being released
        reservation_id: String,
        /// 1-based attempt number
        attempt: u32,
        /// Request mode
        mode: ReleaseMode,
    },

    /// Release call succeeded, or the server no longer had the hold
    ReleaseSucceeded {
        /// Released hold
        reservation_id: String,
        /// The server answered "not found"
        already_gone: bool,
    },

    /// Release call failed with a retryable error
    ReleaseFailed {
        /// Hold being released
        reservation_id: String,
        /// Attempt that failed
        attempt: u32,
        /// What went wrong
        error: ReservationApiError,
        /// Request mode
        mode: ReleaseMode,
    },

    // Timers
    /// One second of the countdown elapsed
    CountdownTick {
        /// Timer generation the tick was armed in
        generation: u64,
    },

    /// The absolute expiry timer fired
    HoldExpired {
        /// Timer generation the timer was armed in
        generation: u64,
    },

    // Settlement notices
    /// A reserve command settled
    ReserveSettled {
        /// Ticket of the reserve command
        ticket: Ticket,
        /// Result
        outcome: ReserveOutcome,
    },

    /// A release settled
    ReleaseSettled {
        /// Released hold
        reservation_id: String,
        /// Result
        outcome: ReleaseOutcome,
    },
}

impl ReservationAction {
    /// Whether this is a settlement notice (no state change)
    #[must_use]
    pub const fn is_notice(&self) -> bool {
        matches!(self, Self::ReserveSettled { .. } | Self::ReleaseSettled { .. })
    }
}
