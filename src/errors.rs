//! Error taxonomy shared by the storefront flows.

use thiserror::Error;

/// Failures the storefront core can produce.
///
/// Everything here is caught at the dispatch boundary: handlers log the
/// error and answer the user with a short apology instead of dying.
#[derive(Debug, Error)]
pub enum ShopError {
    /// The chat transport or an outbound HTTP call failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// Free-text input did not parse as a usable quantity.
    #[error("invalid quantity: {0}")]
    InvalidQuantity(String),

    /// A referenced entity is gone (stale button, deleted product).
    #[error("{0} not found")]
    NotFound(&'static str),

    /// A confirm/update arrived with no matching pending entry.
    #[error("no pending cart entry for this user")]
    NoPendingCartEntry,

    /// Delivery info arrived with no checkout in progress.
    #[error("no checkout in progress for this user")]
    NoPendingCheckout,

    /// Storage-layer failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The payment provider rejected or failed a request.
    #[error("payment error: {0}")]
    Payment(String),
}
