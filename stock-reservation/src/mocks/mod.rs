//! Mock implementations for testing.
//!
//! In-memory stand-ins for the reservation service and the notifier, plus a
//! helper to build an environment around them.

pub mod client;
pub mod notifier;

pub use client::{MockCall, MockReservationClient, hold_response};
pub use notifier::RecordingNotifier;

use std::sync::Arc;
use std::time::Duration;
use storefront_core::environment::SystemClock;
use storefront_runtime::RetryPolicy;

use crate::reducer::ReservationEnvironment;

/// Environment over the given mocks: wall clock, 3 attempts 1 second apart
#[must_use]
pub fn mock_environment(
    client: Arc<MockReservationClient>,
    notifier: Arc<RecordingNotifier>,
) -> ReservationEnvironment {
    ReservationEnvironment::new(
        client,
        notifier,
        Arc::new(SystemClock),
        RetryPolicy::fixed(3, Duration::from_secs(1)),
    )
}
