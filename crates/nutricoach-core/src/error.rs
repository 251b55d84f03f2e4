//! Error types for NutriCoach domain operations.

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised while validating domain input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// The challenge type is not part of the catalog.
    #[error("unknown challenge type: {0}")]
    UnknownChallenge(String),

    /// The invoice payload could not be interpreted.
    #[error("invalid payment payload: {0}")]
    InvalidPaymentPayload(String),

    /// A promo code definition is malformed.
    #[error("invalid promocode: {0}")]
    InvalidPromocode(String),

    /// A body measurement is out of range.
    #[error("invalid measurement: {0}")]
    InvalidMeasurement(String),

    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}
