//! Reservation metrics.
//!
//! Counters go through the `metrics` facade; install a recorder (for example
//! `storefront_runtime::metrics::PrometheusMetrics`) to export them.

use metrics::{counter, describe_counter};

/// Describe the reservation counters for the installed recorder
pub fn register_metrics() {
    describe_counter!(
        "reservation.reserve.success",
        "Holds placed by the reservation service"
    );
    describe_counter!(
        "reservation.reserve.failure",
        "Reserve calls that failed, labelled by reason"
    );
    describe_counter!(
        "reservation.release.success",
        "Holds released, labelled by whether the server had already dropped them"
    );
    describe_counter!(
        "reservation.release.retry",
        "Release attempts scheduled after a failed attempt"
    );
    describe_counter!(
        "reservation.release.abandoned",
        "Releases given up after exhausting every attempt"
    );
    describe_counter!(
        "reservation.expired",
        "Holds whose local countdown reached zero"
    );
}

/// Reservation metrics recorder
pub struct ReservationMetrics;

impl ReservationMetrics {
    /// Record a placed hold
    pub fn record_reserved() {
        counter!("reservation.reserve.success").increment(1);
    }

    /// Record a failed reserve call
    pub fn record_reserve_failed(reason: &'static str) {
        counter!("reservation.reserve.failure", "reason" => reason).increment(1);
    }

    /// Record a settled release
    pub fn record_released(already_gone: bool) {
        let outcome = if already_gone { "not_found" } else { "released" };
        counter!("reservation.release.success", "outcome" => outcome).increment(1);
    }

    /// Record a scheduled release retry
    pub fn record_release_retry() {
        counter!("reservation.release.retry").increment(1);
    }

    /// Record an abandoned release
    pub fn record_release_abandoned() {
        counter!("reservation.release.abandoned").increment(1);
    }

    /// Record an expired hold
    pub fn record_expired() {
        counter!("reservation.expired").increment(1);
    }
}
