//! Error types for stock reservation.

use storefront_runtime::StoreError;
use thiserror::Error;

use crate::types::{ApiErrorBody, ShortItem};

/// Error code the storefront API uses for a reservation that no longer exists
pub const RESERVATION_NOT_FOUND: &str = "RESERVATION_NOT_FOUND";

/// Error code the storefront API uses when stock is short
pub const INSUFFICIENT_STOCK: &str = "INSUFFICIENT_STOCK";

/// Errors returned by the remote reservation service
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReservationApiError {
    /// Stock is short for one or more items
    #[error("{message}")]
    InsufficientStock {
        /// Server message
        message: String,
        /// Items that could not be held in full
        short_items: Vec<ShortItem>,
    },

    /// The reservation does not exist (released, expired or never created)
    #[error("{message}")]
    NotFound {
        /// Server message
        message: String,
    },

    /// Any other non-2xx response
    #[error("{message}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Server message, or `HTTP {status}` when the body had none
        message: String,
        /// Machine-readable code, if the body had one
        code: Option<String>,
    },

    /// The request never produced a response
    #[error("Request failed: {0}")]
    Transport(String),

    /// A 2xx response body could not be decoded
    #[error("Invalid response: {0}")]
    Decode(String),
}

impl ReservationApiError {
    /// Classify a non-2xx response
    #[must_use]
    pub fn from_response(status: u16, body: ApiErrorBody) -> Self {
        let message = body.message.unwrap_or_else(|| format!("HTTP {status}"));
        let code = body.code;

        if status == 404 || code.as_deref() == Some(RESERVATION_NOT_FOUND) {
            return Self::NotFound { message };
        }

        if !body.short_items.is_empty() || code.as_deref() == Some(INSUFFICIENT_STOCK) {
            return Self::InsufficientStock {
                message,
                short_items: body.short_items,
            };
        }

        Self::Http {
            status,
            message,
            code,
        }
    }

    /// Whether the reservation is already gone on the server
    ///
    /// Besides [`Self::NotFound`], an HTTP error whose message says "not found"
    /// (any case) counts too. Transport errors never do.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Http {
                status,
                message,
                code,
            } => {
                *status == 404
                    || code.as_deref() == Some(RESERVATION_NOT_FOUND)
                    || message.to_lowercase().contains("not found")
            },
            Self::InsufficientStock { .. } | Self::Transport(_) | Self::Decode(_) => false,
        }
    }

    /// Items reported short, if any
    #[must_use]
    pub fn short_items(&self) -> &[ShortItem] {
        match self {
            Self::InsufficientStock { short_items, .. } => short_items,
            _ => &[],
        }
    }
}

impl From<reqwest::Error> for ReservationApiError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::Decode(error.to_string())
        } else {
            Self::Transport(error.to_string())
        }
    }
}

/// A reserve request rejected before any network call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Neither cart items nor a direct purchase item
    #[error("There are no items to reserve")]
    NoItems,

    /// An item has a blank product id
    #[error("An item is missing its product id")]
    EmptyProductId,

    /// An item asks for zero units
    #[error("Quantity for product {product_id} must be at least 1")]
    ZeroQuantity {
        /// Offending product
        product_id: String,
    },
}

/// Errors surfaced by the reservation controller
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReservationError {
    /// The request failed validation
    #[error(transparent)]
    InvalidRequest(#[from] ValidationError),

    /// The reservation service rejected the call
    #[error(transparent)]
    Api(#[from] ReservationApiError),

    /// Another reserve call is already in progress
    #[error("A reservation request is already in progress")]
    AlreadyReserving,

    /// The call was superseded by a reset or teardown before it settled
    #[error("The reservation request was cancelled")]
    Cancelled,

    /// The store runtime failed (shutdown, timeout)
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The HTTP client could not be built
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),
}

/// Result type for controller operations
pub type Result<T> = std::result::Result<T, ReservationError>;
