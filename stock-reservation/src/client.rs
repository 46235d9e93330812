//! Reservation service client.
//!
//! [`ReservationClient`] is the seam the reducer calls through; the HTTP
//! implementation talks to the storefront API, tests inject a mock.

use reqwest::{Client, Response, header};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::config::ReservationConfig;
use crate::error::{ReservationApiError, ReservationError};
use crate::types::{ApiErrorBody, ReleaseMode, ReserveRequest, ReserveStockResponse};

/// Boxed future returned by [`ReservationClient`] methods
pub type ClientFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Result of a reservation service call
pub type ApiResult<T> = Result<T, ReservationApiError>;

/// Header hinting the server that a release comes from a teardown path
pub const KEEP_ALIVE_RELEASE_HEADER: &str = "X-Keep-Alive-Release";

/// Remote reservation service
pub trait ReservationClient: Send + Sync {
    /// Place a hold on the requested items
    ///
    /// # Errors
    ///
    /// Returns [`ReservationApiError::InsufficientStock`] when stock is short,
    /// or another variant for transport and server failures.
    fn reserve(&self, request: ReserveRequest) -> ClientFuture<'_, ApiResult<ReserveStockResponse>>;

    /// Release a hold
    ///
    /// # Errors
    ///
    /// Returns an error for which [`ReservationApiError::is_not_found`] holds
    /// when the hold no longer exists.
    fn release(&self, reservation_id: String, mode: ReleaseMode) -> ClientFuture<'_, ApiResult<()>>;
}

/// HTTP client for the storefront reservation endpoints
///
/// - `POST {base}/api/stock-reservations` with a [`ReserveRequest`] body
/// - `DELETE {base}/api/stock-reservations/{id}`
#[derive(Clone, Debug)]
pub struct HttpReservationClient {
    client: Client,
    base_url: String,
    keep_alive_timeout: Duration,
}

impl HttpReservationClient {
    /// Create a client for `base_url`
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::ClientBuild`] if the underlying HTTP client
    /// cannot be constructed.
    pub fn new(
        base_url: impl Into<String>,
        request_timeout: Duration,
        keep_alive_timeout: Duration,
    ) -> Result<Self, ReservationError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ReservationError::ClientBuild(e.to_string()))?;

        let base_url: String = base_url.into();
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            keep_alive_timeout,
        })
    }

    /// Create a client from configuration
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::ClientBuild`] if the underlying HTTP client
    /// cannot be constructed.
    pub fn from_config(config: &ReservationConfig) -> Result<Self, ReservationError> {
        Self::new(
            config.api_url.clone(),
            config.request_timeout,
            config.keep_alive_timeout,
        )
    }

    /// Base URL requests are sent to
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn reservations_url(&self) -> String {
        format!("{}/api/stock-reservations", self.base_url)
    }

    /// Place a hold
    ///
    /// # Errors
    ///
    /// Returns errors for network failures, non-2xx responses, or undecodable bodies.
    pub async fn reserve_stock(&self, request: &ReserveRequest) -> ApiResult<ReserveStockResponse> {
        let response = self
            .client
            .post(self.reservations_url())
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        response
            .json::<ReserveStockResponse>()
            .await
            .map_err(|e| ReservationApiError::Decode(e.to_string()))
    }

    /// Release a hold
    ///
    /// Keep-alive mode marks the request for the server and bounds it with the
    /// short keep-alive timeout so teardown never waits on a slow backend.
    ///
    /// # Errors
    ///
    /// Returns errors for network failures or non-2xx responses.
    pub async fn release_reservation(&self, reservation_id: &str, mode: ReleaseMode) -> ApiResult<()> {
        let mut request = self
            .client
            .delete(format!("{}/{reservation_id}", self.reservations_url()));

        if mode == ReleaseMode::KeepAlive {
            request = request
                .header(header::CONNECTION, "keep-alive")
                .header(KEEP_ALIVE_RELEASE_HEADER, "true")
                .timeout(self.keep_alive_timeout);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        Ok(())
    }
}

impl ReservationClient for HttpReservationClient {
    fn reserve(&self, request: ReserveRequest) -> ClientFuture<'_, ApiResult<ReserveStockResponse>> {
        Box::pin(async move { self.reserve_stock(&request).await })
    }

    fn release(&self, reservation_id: String, mode: ReleaseMode) -> ClientFuture<'_, ApiResult<()>> {
        Box::pin(async move { self.release_reservation(&reservation_id, mode).await })
    }
}

/// Read `{message, code, shortItems}` from an error response, tolerating any body
async fn error_from_response(response: Response) -> ReservationApiError {
    let status = response.status().as_u16();
    let body = response.json::<ApiErrorBody>().await.unwrap_or_default();
    ReservationApiError::from_response(status, body)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::types::ReservationItem;
    use serde_json::json;
    use wiremock::matchers::{body_json, header as header_eq, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> HttpReservationClient {
        HttpReservationClient::new(
            server.uri(),
            Duration::from_secs(5),
            Duration::from_millis(500),
        )
        .unwrap()
    }

    fn sample_request() -> ReserveRequest {
        ReserveRequest::new(vec![ReservationItem::new("p1", 2)], None)
    }

    #[tokio::test]
    async fn test_reserve_posts_camel_case_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/stock-reservations"))
            .and(body_json(json!({"items": [{"productId": "p1", "quantity": 2}]})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "reservationId": "r-1",
                "expiresAt": "2025-01-01T00:10:00Z",
                "ttlSeconds": 600
            })))
            .expect(1)
            .mount(&server)
            .await;

        let response = client_for(&server).reserve(sample_request()).await.unwrap();

        assert_eq!(response.reservation_id, "r-1");
        assert_eq!(response.ttl_seconds, 600);
    }

    #[tokio::test]
    async fn test_reserve_short_stock_carries_short_items() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/stock-reservations"))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "message": "Not enough stock",
                "code": "INSUFFICIENT_STOCK",
                "shortItems": [{"productId": "p1", "requested": 2, "available": 1}]
            })))
            .mount(&server)
            .await;

        let error = client_for(&server).reserve(sample_request()).await.unwrap_err();

        match error {
            ReservationApiError::InsufficientStock { message, short_items } => {
                assert_eq!(message, "Not enough stock");
                assert_eq!(short_items[0].available, 1);
            },
            other => panic!("expected insufficient stock, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_error_without_json_body_falls_back_to_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("<html>bad gateway</html>"))
            .mount(&server)
            .await;

        let error = client_for(&server).reserve(sample_request()).await.unwrap_err();
        assert_eq!(error.to_string(), "HTTP 502");
    }

    #[tokio::test]
    async fn test_release_accepts_no_content() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/stock-reservations/r-1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server)
            .release("r-1".to_string(), ReleaseMode::Standard)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_release_missing_reservation_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "message": "Reservation not found",
                "code": "RESERVATION_NOT_FOUND"
            })))
            .mount(&server)
            .await;

        let error = client_for(&server)
            .release("r-gone".to_string(), ReleaseMode::Standard)
            .await
            .unwrap_err();

        assert!(error.is_not_found());
    }

    #[tokio::test]
    async fn test_keep_alive_release_sends_hint_header() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/stock-reservations/r-1"))
            .and(header_eq(KEEP_ALIVE_RELEASE_HEADER, "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server)
            .release("r-1".to_string(), ReleaseMode::KeepAlive)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_keep_alive_release_gives_up_after_short_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let error = client_for(&server)
            .release("r-1".to_string(), ReleaseMode::KeepAlive)
            .await
            .unwrap_err();

        assert!(matches!(error, ReservationApiError::Transport(_)));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transport_error() {
        let client = HttpReservationClient::new(
            "http://127.0.0.1:9",
            Duration::from_millis(500),
            Duration::from_millis(500),
        )
        .unwrap();

        let error = client.reserve(sample_request()).await.unwrap_err();
        assert!(matches!(error, ReservationApiError::Transport(_)));
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let client = HttpReservationClient::new(
            "http://localhost:5000/",
            Duration::from_secs(1),
            Duration::from_secs(1),
        )
        .unwrap();

        assert_eq!(client.reservations_url(), "http://localhost:5000/api/stock-reservations");
    }
}
