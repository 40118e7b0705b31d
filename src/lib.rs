//! OpenSASE Orders
//!
//! Order workflow service for the OpenSASE storefront.
//!
//! ## Features
//! - Order placement with all-or-nothing inventory reservation
//! - Sequential, human-readable order slugs (`ORD-001`, `ORD-002`, ...)
//! - Order lifecycle: status transitions, cancellation, stock restoration
//! - Delivery records, payment records and refund requests
//! - Order history and best-seller ranking

pub mod api;
pub mod catalog;
pub mod config;
pub mod deliveries;
pub mod domain;
pub mod orders;
pub mod payments;
pub mod publisher;
pub mod refunds;
pub mod store;

#[cfg(test)]
pub mod test_utils;

use thiserror::Error;
use uuid::Uuid;

use crate::domain::aggregates::{OrderError, PaymentError, ProductError, RefundError};
use crate::domain::value_objects::SkuError;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum EcommerceError {
    #[error("{0}")]
    Validation(String),

    #[error("User not found")]
    UserNotFound(Uuid),

    #[error("Product with ID {0} not found")]
    ProductNotFound(Uuid),

    #[error("Order not found")]
    OrderNotFound(Uuid),

    #[error("Delivery not found")]
    DeliveryNotFound(Uuid),

    #[error("Payment not found")]
    PaymentNotFound(String),

    #[error("Refund request not found")]
    RefundNotFound(Uuid),

    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: Uuid,
        requested: u32,
        available: u32,
    },

    #[error("{0}")]
    InvalidStatus(String),

    #[error("Order is already cancelled")]
    AlreadyCancelled,

    #[error("Delivered orders cannot be cancelled")]
    CannotCancelDelivered,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Storage error: {0}")]
    StorageError(String),
}

pub type Result<T> = std::result::Result<T, EcommerceError>;

impl From<sqlx::Error> for EcommerceError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
                Self::Conflict(db.message().to_string())
            }
            _ => Self::Database(err),
        }
    }
}

impl From<validator::ValidationErrors> for EcommerceError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}

impl From<SkuError> for EcommerceError {
    fn from(err: SkuError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<ProductError> for EcommerceError {
    fn from(err: ProductError) -> Self {
        match err {
            ProductError::InsufficientStock {
                product_id,
                requested,
                available,
            } => Self::InsufficientStock {
                product_id,
                requested,
                available,
            },
            other => Self::Validation(other.to_string()),
        }
    }
}

impl From<OrderError> for EcommerceError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::AlreadyCancelled => Self::AlreadyCancelled,
            OrderError::CannotCancelDelivered => Self::CannotCancelDelivered,
            OrderError::InvalidTransition { .. } | OrderError::UnknownStatus(_) => {
                Self::InvalidStatus(err.to_string())
            }
            OrderError::NoItems | OrderError::InvalidQuantity { .. } | OrderError::TotalOutOfRange => {
                Self::Validation(err.to_string())
            }
        }
    }
}

impl From<PaymentError> for EcommerceError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::AlreadySettled { .. } => Self::InvalidStatus(err.to_string()),
            other => Self::Validation(other.to_string()),
        }
    }
}

impl From<RefundError> for EcommerceError {
    fn from(err: RefundError) -> Self {
        match err {
            RefundError::AlreadyDecided(_) => Self::InvalidStatus(err.to_string()),
            RefundError::MissingReason => Self::Validation(err.to_string()),
        }
    }
}
