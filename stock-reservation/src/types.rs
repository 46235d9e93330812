//! Domain types for stock reservation.
//!
//! Wire types serialize as camelCase JSON to match the storefront API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::ValidationError;

// ============================================================================
// Request types
// ============================================================================

/// One product (or product variant) quantity to hold
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationItem {
    /// Product identifier
    pub product_id: String,
    /// Variant identifier (size, color), if the product has variants
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant_id: Option<String>,
    /// Number of units to hold, must be positive
    pub quantity: u32,
}

impl ReservationItem {
    /// Create an item for a product without variants
    #[must_use]
    pub fn new(product_id: impl Into<String>, quantity: u32) -> Self {
        Self {
            product_id: product_id.into(),
            variant_id: None,
            quantity,
        }
    }

    /// Set the variant to hold
    #[must_use]
    pub fn with_variant(mut self, variant_id: impl Into<String>) -> Self {
        self.variant_id = Some(variant_id.into());
        self
    }
}

/// The single item of a "buy now" purchase that bypasses the cart
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectPurchaseItem {
    /// Product identifier
    pub product_id: String,
    /// Variant identifier, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant_id: Option<String>,
    /// Number of units, must be positive
    pub quantity: u32,
}

impl DirectPurchaseItem {
    /// Create a direct purchase item
    #[must_use]
    pub fn new(product_id: impl Into<String>, variant_id: Option<String>, quantity: u32) -> Self {
        Self {
            product_id: product_id.into(),
            variant_id,
            quantity,
        }
    }
}

/// Product summary shown on an order line
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineProduct {
    /// Product identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Unit price in the smallest currency unit
    pub price: u64,
    /// Image URL
    pub image_url: String,
}

/// Variant summary shown on an order line
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineVariant {
    /// Variant identifier
    pub id: String,
    /// Size label
    pub size: String,
    /// Color label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// An order line as the checkout page displays it (cart entry or direct purchase)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    /// Line identifier
    pub id: String,
    /// Product identifier
    pub product_id: String,
    /// Variant identifier, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant_id: Option<String>,
    /// Quantity on the line
    pub quantity: u32,
    /// Product details
    pub product: LineProduct,
    /// Variant details
    #[serde(default)]
    pub variant: Option<LineVariant>,
}

impl From<&LineItem> for ReservationItem {
    fn from(line: &LineItem) -> Self {
        Self {
            product_id: line.product_id.clone(),
            variant_id: line.variant_id.clone(),
            quantity: line.quantity,
        }
    }
}

/// Body of the reserve call
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReserveRequest {
    /// Items to hold, in cart order
    pub items: Vec<ReservationItem>,
    /// Optional "buy now" item
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direct_purchase_item: Option<DirectPurchaseItem>,
}

impl ReserveRequest {
    /// Create a request
    #[must_use]
    pub const fn new(
        items: Vec<ReservationItem>,
        direct_purchase_item: Option<DirectPurchaseItem>,
    ) -> Self {
        Self {
            items,
            direct_purchase_item,
        }
    }

    /// Build a request from displayed order lines
    #[must_use]
    pub fn from_line_items(
        lines: &[LineItem],
        direct_purchase_item: Option<DirectPurchaseItem>,
    ) -> Self {
        Self::new(lines.iter().map(ReservationItem::from).collect(), direct_purchase_item)
    }

    /// Check the request before it goes on the wire
    ///
    /// # Errors
    ///
    /// - [`ValidationError::NoItems`] if there is nothing to reserve
    /// - [`ValidationError::EmptyProductId`] if an item has a blank product id
    /// - [`ValidationError::ZeroQuantity`] if an item asks for zero units
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.items.is_empty() && self.direct_purchase_item.is_none() {
            return Err(ValidationError::NoItems);
        }

        let lines = self
            .items
            .iter()
            .map(|item| (item.product_id.as_str(), item.quantity))
            .chain(
                self.direct_purchase_item
                    .iter()
                    .map(|item| (item.product_id.as_str(), item.quantity)),
            );

        for (product_id, quantity) in lines {
            if product_id.trim().is_empty() {
                return Err(ValidationError::EmptyProductId);
            }
            if quantity == 0 {
                return Err(ValidationError::ZeroQuantity {
                    product_id: product_id.to_string(),
                });
            }
        }

        Ok(())
    }
}

// ============================================================================
// Response types
// ============================================================================

/// Successful reserve response
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReserveStockResponse {
    /// Opaque handle used to release the hold
    pub reservation_id: String,
    /// Absolute server-side expiry
    pub expires_at: DateTime<Utc>,
    /// Seconds until the server releases the hold on its own
    pub ttl_seconds: u32,
}

/// An item the server could not hold in full
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortItem {
    /// Product identifier
    pub product_id: String,
    /// Variant identifier, if any
    #[serde(default)]
    pub variant_id: Option<String>,
    /// Units requested
    #[serde(default)]
    pub requested: u32,
    /// Units in stock
    #[serde(default)]
    pub available: u32,
}

/// Error payload returned by the storefront API on non-2xx responses
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorBody {
    /// Human-readable message
    #[serde(default)]
    pub message: Option<String>,
    /// Machine-readable code, e.g. `RESERVATION_NOT_FOUND`
    #[serde(default)]
    pub code: Option<String>,
    /// Items that were short when a reserve call failed
    #[serde(default)]
    pub short_items: Vec<ShortItem>,
}

/// How a release call goes out
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ReleaseMode {
    /// Regular request, awaited by the caller
    #[default]
    Standard,
    /// Best-effort request for teardown and page-unload paths
    KeepAlive,
}

// ============================================================================
// Controller state
// ============================================================================

/// Lifecycle of the reservation held by one controller
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    /// Nothing held
    #[default]
    Idle,
    /// Reserve call in flight
    Reserving,
    /// Hold is live and counting down
    Reserved,
    /// Release call in flight
    Releasing,
    /// Countdown reached zero
    Expired,
    /// Last reserve call failed
    Failed,
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Reserving => "reserving",
            Self::Reserved => "reserved",
            Self::Releasing => "releasing",
            Self::Expired => "expired",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Correlates a facade call with the settlement action it waits for
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Ticket(Uuid);

impl Ticket {
    /// Create a fresh ticket
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for Ticket {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reservation state for one checkout session
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReservationState {
    /// Handle of the live hold, set while `Reserved` or `Releasing`
    pub reservation_id: Option<String>,
    /// Current lifecycle status
    pub status: ReservationStatus,
    /// Server-side expiry of the live hold
    pub expires_at: Option<DateTime<Utc>>,
    /// When the live hold was placed, by the environment clock
    pub reserved_at: Option<DateTime<Utc>>,
    /// Local countdown mirror of the server TTL
    pub ttl_seconds_remaining: u32,
    /// Message of the last reserve failure
    pub last_error: Option<String>,
    /// Reservation a release call is currently targeting
    ///
    /// Outlives `reservation_id` when the hold expires mid-release.
    pub release_in_flight: Option<String>,
    /// Ticket of the reserve call in flight
    pub in_flight_reserve: Option<Ticket>,
    /// Reserve request waiting for the previous hold to be released
    pub queued_reserve: Option<(Ticket, ReserveRequest)>,
    /// Bumped whenever timers are armed or cleared
    pub timer_generation: u64,
}

impl ReservationState {
    /// Fresh idle state
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a hold is live
    #[must_use]
    pub fn is_reserved(&self) -> bool {
        self.status == ReservationStatus::Reserved
    }

    /// Whether a network call is in progress
    #[must_use]
    pub fn is_busy(&self) -> bool {
        matches!(
            self.status,
            ReservationStatus::Reserving | ReservationStatus::Releasing
        )
    }

    /// Whether a hold, call, or queued request still needs cleanup
    #[must_use]
    pub const fn has_pending_work(&self) -> bool {
        self.reservation_id.is_some()
            || self.release_in_flight.is_some()
            || self.in_flight_reserve.is_some()
            || self.queued_reserve.is_some()
    }

    /// Remaining hold time as `MM:SS`
    #[must_use]
    pub fn remaining_time_display(&self) -> String {
        format_remaining(self.ttl_seconds_remaining)
    }
}

/// Format a countdown as zero-padded `MM:SS`
///
/// Minutes are floored and not capped, so 6000 seconds renders as `100:00`.
///
/// ```
/// use stock_reservation::types::format_remaining;
///
/// assert_eq!(format_remaining(75), "01:15");
/// assert_eq!(format_remaining(0), "00:00");
/// ```
#[must_use]
pub fn format_remaining(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn line(product_id: &str, variant_id: Option<&str>, quantity: u32) -> LineItem {
        LineItem {
            id: format!("line-{product_id}"),
            product_id: product_id.to_string(),
            variant_id: variant_id.map(str::to_string),
            quantity,
            product: LineProduct {
                id: product_id.to_string(),
                name: "Linen shirt".to_string(),
                price: 39_000,
                image_url: "https://cdn.example.com/p1.jpg".to_string(),
            },
            variant: variant_id.map(|id| LineVariant {
                id: id.to_string(),
                size: "M".to_string(),
                color: None,
            }),
        }
    }

    #[test]
    fn test_format_remaining() {
        assert_eq!(format_remaining(75), "01:15");
        assert_eq!(format_remaining(0), "00:00");
        assert_eq!(format_remaining(600), "10:00");
        assert_eq!(format_remaining(59), "00:59");
    }

    #[test]
    fn test_request_from_line_items_keeps_order_and_variants() {
        let request = ReserveRequest::from_line_items(
            &[line("p1", Some("v1"), 2), line("p2", None, 1)],
            None,
        );

        assert_eq!(
            request.items,
            vec![
                ReservationItem::new("p1", 2).with_variant("v1"),
                ReservationItem::new("p2", 1),
            ]
        );
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_request_serializes_camel_case() {
        let request = ReserveRequest::new(
            vec![ReservationItem::new("p1", 2)],
            Some(DirectPurchaseItem::new("p9", Some("v3".to_string()), 1)),
        );

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "items": [{"productId": "p1", "quantity": 2}],
                "directPurchaseItem": {"productId": "p9", "variantId": "v3", "quantity": 1}
            })
        );
    }

    #[test]
    fn test_response_parses_rfc3339_expiry() {
        let response: ReserveStockResponse = serde_json::from_str(
            r#"{"reservationId":"r-1","expiresAt":"2025-01-01T00:10:00Z","ttlSeconds":600}"#,
        )
        .unwrap();

        assert_eq!(response.reservation_id, "r-1");
        assert_eq!(response.ttl_seconds, 600);
        assert_eq!(response.expires_at.to_rfc3339(), "2025-01-01T00:10:00+00:00");
    }

    #[test]
    fn test_validate_rejects_empty_request() {
        let request = ReserveRequest::new(vec![], None);
        assert_eq!(request.validate(), Err(ValidationError::NoItems));
    }

    #[test]
    fn test_validate_accepts_direct_purchase_only() {
        let request = ReserveRequest::new(vec![], Some(DirectPurchaseItem::new("p1", None, 1)));
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_blank_product_id() {
        let request = ReserveRequest::new(vec![ReservationItem::new("  ", 1)], None);
        assert_eq!(request.validate(), Err(ValidationError::EmptyProductId));
    }

    #[test]
    fn test_derived_values() {
        let state = ReservationState {
            status: ReservationStatus::Releasing,
            ttl_seconds_remaining: 125,
            ..ReservationState::default()
        };

        assert!(state.is_busy());
        assert!(!state.is_reserved());
        assert_eq!(state.remaining_time_display(), "02:05");
    }

    proptest! {
        #[test]
        fn prop_format_remaining_round_trips_seconds(seconds in 0u32..360_000) {
            let display = format_remaining(seconds);
            let (minutes, secs) = display.split_once(':').unwrap();

            prop_assert!(minutes.len() >= 2);
            prop_assert_eq!(secs.len(), 2);
            let total = minutes.parse::<u32>().unwrap() * 60 + secs.parse::<u32>().unwrap();
            prop_assert_eq!(total, seconds);
        }

        #[test]
        fn prop_validate_rejects_any_zero_quantity(
            quantities in proptest::collection::vec(0u32..5, 1..8)
        ) {
            let items = quantities
                .iter()
                .enumerate()
                .map(|(i, q)| ReservationItem::new(format!("p{i}"), *q))
                .collect();
            let request = ReserveRequest::new(items, None);

            prop_assert_eq!(request.validate().is_ok(), quantities.iter().all(|q| *q > 0));
        }
    }
}
