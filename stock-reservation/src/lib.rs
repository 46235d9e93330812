//! # Stock Reservation
//!
//! Client-side controller for short-lived, server-backed stock holds taken
//! during checkout.
//!
//! ## Features
//!
//! - **One live hold**: reserving again releases the previous hold first
//! - **Countdown**: a one-second ticker mirrors the server TTL, an absolute timer backs it up
//! - **Bounded release retry**: fixed backoff, "not found" counts as released
//! - **Guaranteed cleanup**: teardown and `Drop` fire a keep-alive release without blocking
//! - **Testable**: the reservation service, notifier and clock are injected
//!
//! ## Architecture
//!
//! The lifecycle is a reducer running in a [`storefront_runtime::Store`]:
//!
//! ```text
//! Command → ReservationReducer → (State, Effects) → Service calls / Timers → Result actions
//! ```
//!
//! [`ReservationController`] wraps the store with async `reserve` / `release`
//! calls that wait for the matching settlement notice.
//!
//! ## Example
//!
//! ```rust,ignore
//! use stock_reservation::*;
//!
//! let controller = ReservationController::from_config(&ReservationConfig::from_env())?;
//!
//! let hold = controller.reserve(vec![ReservationItem::new("p1", 2)], None).await;
//! assert!(controller.is_reserved().await);
//!
//! controller.release().await;
//! ```

// Public modules
pub mod actions;
pub mod client;
pub mod config;
pub mod controller;
pub mod error;
pub mod metrics;
pub mod notifier;
pub mod reducer;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod mocks;

// Re-export main types for convenience
pub use actions::{ReleaseOutcome, ReservationAction, ReserveOutcome};
pub use client::{HttpReservationClient, ReservationClient};
pub use config::ReservationConfig;
pub use controller::ReservationController;
pub use error::{ReservationApiError, ReservationError, Result, ValidationError};
pub use notifier::{ChannelNotifier, ConfirmPrompt, Notice, NoticeKind, Notifier, TracingNotifier};
pub use reducer::{ReservationEnvironment, ReservationReducer, ReservationStore};
pub use types::{
    DirectPurchaseItem, LineItem, ReleaseMode, ReservationItem, ReservationState,
    ReservationStatus, ReserveRequest, ReserveStockResponse, ShortItem,
};
