//! TechShop storefront back office
//!
//! Order, inventory and promotion core for a direct-to-consumer electronics shop.
//!
//! ## Features
//! - Checkout with server-side stock and price re-validation
//! - Order lifecycle with declarative stock restoration and refund flagging
//! - Promo code evaluation and redemption
//! - Purchase-gated product reviews with automatic replies
//! - Customer support chat
//! - Client-side cart, wishlist and compare collections

pub mod api;
pub mod config;
pub mod domain;
pub mod services;
pub mod store;

use thiserror::Error;
use uuid::Uuid;

use crate::domain::aggregates::{OrderStatus, PromoRejection};

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum ShopError {
    #[error("{0}")]
    Validation(String),

    #[error("Cart is empty")]
    EmptyCart,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Authentication required")]
    Unauthenticated,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Product is unavailable: {0}")]
    ProductUnavailable(Uuid),

    #[error("Insufficient stock: {product}")]
    InsufficientStock { product: String },

    #[error(transparent)]
    Promo(#[from] PromoRejection),

    #[error("Cancelled orders cannot change status")]
    OrderAlreadyCancelled,

    #[error("Order cannot be cancelled: it is already {0}")]
    NotCancellable(OrderStatus),

    #[error("Cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("Only customers who bought this product can review it")]
    NotPurchased,

    #[error("You have already reviewed this product")]
    AlreadyReviewed,

    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

/// Error categories, each rendered with one HTTP status family.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Unauthenticated,
    Forbidden,
    Conflict,
    BusinessRule,
    Internal,
}

impl ShopError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) | Self::EmptyCart => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Promo(PromoRejection::NotFound) => ErrorKind::NotFound,
            Self::Unauthenticated => ErrorKind::Unauthenticated,
            Self::Forbidden(_) | Self::NotPurchased => ErrorKind::Forbidden,
            Self::Conflict(_) | Self::AlreadyReviewed | Self::OrderAlreadyCancelled => ErrorKind::Conflict,
            Self::ProductUnavailable(_)
            | Self::InsufficientStock { .. }
            | Self::Promo(_)
            | Self::NotCancellable(_)
            | Self::InvalidTransition { .. } => ErrorKind::BusinessRule,
            Self::Storage(_) | Self::Corrupt(_) => ErrorKind::Internal,
        }
    }

    pub fn forbidden() -> Self {
        Self::Forbidden("Access denied".to_string())
    }
}

impl From<validator::ValidationErrors> for ShopError {
    fn from(e: validator::ValidationErrors) -> Self {
        Self::Validation(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ShopError>;
