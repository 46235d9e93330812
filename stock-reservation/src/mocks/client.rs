//! Mock reservation service for testing.

use chrono::Utc;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;

use crate::client::{ApiResult, ClientFuture, ReservationClient};
use crate::types::{ReleaseMode, ReserveRequest, ReserveStockResponse};

/// A call received by [`MockReservationClient`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MockCall {
    /// `reserve` was called
    Reserve(ReserveRequest),
    /// `release` was called
    Release {
        /// Requested hold
        reservation_id: String,
        /// Request mode
        mode: ReleaseMode,
    },
}

/// Build a reserve response expiring `ttl_seconds` from now
#[must_use]
pub fn hold_response(reservation_id: impl Into<String>, ttl_seconds: u32) -> ReserveStockResponse {
    ReserveStockResponse {
        reservation_id: reservation_id.into(),
        expires_at: Utc::now() + chrono::Duration::seconds(i64::from(ttl_seconds)),
        ttl_seconds,
    }
}

#[derive(Debug)]
struct Script {
    ttl_seconds: u32,
    next_id: u32,
    reserve_results: VecDeque<ApiResult<ReserveStockResponse>>,
    release_results: VecDeque<ApiResult<()>>,
    release_latency: Option<Duration>,
    calls: Vec<MockCall>,
}

impl Script {
    fn next_reserve(&mut self) -> ApiResult<ReserveStockResponse> {
        if let Some(result) = self.reserve_results.pop_front() {
            return result;
        }
        self.next_id += 1;
        Ok(hold_response(format!("res-{}", self.next_id), self.ttl_seconds))
    }
}

/// Mock reservation service.
///
/// Answers from scripted results first; once the script runs out, reserves
/// succeed with ids `res-1`, `res-2`, ... and releases succeed. Every call is
/// recorded in arrival order.
#[derive(Debug, Clone)]
pub struct MockReservationClient {
    script: Arc<Mutex<Script>>,
    paused: Arc<watch::Sender<bool>>,
}

impl MockReservationClient {
    /// Mock granting 600-second holds
    #[must_use]
    pub fn new() -> Self {
        Self::with_ttl(600)
    }

    /// Mock granting holds of `ttl_seconds`
    #[must_use]
    pub fn with_ttl(ttl_seconds: u32) -> Self {
        Self {
            script: Arc::new(Mutex::new(Script {
                ttl_seconds,
                next_id: 0,
                reserve_results: VecDeque::new(),
                release_results: VecDeque::new(),
                release_latency: None,
                calls: Vec::new(),
            })),
            paused: Arc::new(watch::channel(false).0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue the result of the next unscripted reserve call
    pub fn push_reserve(&self, result: ApiResult<ReserveStockResponse>) {
        self.lock().reserve_results.push_back(result);
    }

    /// Queue the result of the next unscripted release call
    pub fn push_release(&self, result: ApiResult<()>) {
        self.lock().release_results.push_back(result);
    }

    /// Delay every release call by `latency`
    pub fn set_release_latency(&self, latency: Duration) {
        self.lock().release_latency = Some(latency);
    }

    /// Hold reserve calls until [`Self::resume_reserves`]
    pub fn pause_reserves(&self) {
        self.paused.send_replace(true);
    }

    /// Let held and future reserve calls through
    pub fn resume_reserves(&self) {
        self.paused.send_replace(false);
    }

    /// Every call received so far
    #[must_use]
    pub fn calls(&self) -> Vec<MockCall> {
        self.lock().calls.clone()
    }

    /// Reserve requests received so far
    #[must_use]
    pub fn reserve_calls(&self) -> Vec<ReserveRequest> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                MockCall::Reserve(request) => Some(request.clone()),
                MockCall::Release { .. } => None,
            })
            .collect()
    }

    /// Release requests received so far
    #[must_use]
    pub fn release_calls(&self) -> Vec<(String, ReleaseMode)> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                MockCall::Release {
                    reservation_id,
                    mode,
                } => Some((reservation_id.clone(), *mode)),
                MockCall::Reserve(_) => None,
            })
            .collect()
    }
}

impl Default for MockReservationClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ReservationClient for MockReservationClient {
    fn reserve(&self, request: ReserveRequest) -> ClientFuture<'_, ApiResult<ReserveStockResponse>> {
        self.lock().calls.push(MockCall::Reserve(request));
        let mut paused = self.paused.subscribe();

        Box::pin(async move {
            let _ = paused.wait_for(|paused| !*paused).await;
            self.lock().next_reserve()
        })
    }

    fn release(&self, reservation_id: String, mode: ReleaseMode) -> ClientFuture<'_, ApiResult<()>> {
        let latency = {
            let mut script = self.lock();
            script.calls.push(MockCall::Release {
                reservation_id,
                mode,
            });
            script.release_latency
        };

        Box::pin(async move {
            if let Some(latency) = latency {
                tokio::time::sleep(latency).await;
            }
            self.lock().release_results.pop_front().unwrap_or(Ok(()))
        })
    }
}
