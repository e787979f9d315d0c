//! Backend REST API collaborators.
//!
//! # Architecture
//!
//! - The backend is the system of record for carts, products and pricing
//! - Each endpoint has a typed response schema in [`types`]; responses are
//!   normalized once, at this boundary, into core types
//! - Cart endpoints are only ever called for customer principals
//!
//! # Example
//!
//! ```rust,ignore
//! use mercadito_storefront::backend::{BackendClient, RemoteCartService};
//!
//! let client = BackendClient::new(&config.backend)?;
//! let cart = client.fetch_cart(&principal).await?;
//! ```

mod client;
pub mod types;

pub use client::BackendClient;
pub use types::{NamedEntity, RemoteCart, normalize_remote_cart};

use async_trait::async_trait;
use thiserror::Error;

use mercadito_core::{Principal, Product, ProductId};

use crate::cart::Retryable;

/// Errors that can occur when talking to the backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend returned a non-success status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Access token missing, expired or rejected.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The principal is not allowed to use this endpoint.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Response body could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),

    /// Response parsed but did not have the expected shape.
    #[error("unexpected response shape: {0}")]
    UnexpectedShape(String),

    /// Endpoint URL could not be built.
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl Retryable for BackendError {
    /// Transport failures, timeouts, throttling and 5xx responses.
    fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => !e.is_builder() && !e.is_decode(),
            Self::Api { status, .. } => *status == 408 || *status == 429 || *status >= 500,
            Self::Unauthorized(_)
            | Self::Forbidden(_)
            | Self::Parse(_)
            | Self::UnexpectedShape(_)
            | Self::Url(_) => false,
        }
    }
}

/// The backend's per-customer cart.
///
/// Every call requires an authenticated customer principal.
#[async_trait]
pub trait RemoteCartService: Send + Sync {
    /// Fetch the customer's cart.
    async fn fetch_cart(&self, principal: &Principal) -> Result<RemoteCart, BackendError>;

    /// Add units of a product.
    async fn add(
        &self,
        principal: &Principal,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<(), BackendError>;

    /// Remove a product entirely.
    async fn remove(&self, principal: &Principal, product_id: &ProductId)
    -> Result<(), BackendError>;

    /// Set a product's quantity.
    async fn set_quantity(
        &self,
        principal: &Principal,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<(), BackendError>;

    /// Empty the cart.
    async fn clear(&self, principal: &Principal) -> Result<(), BackendError>;
}

/// Read-only catalog data.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Current products, in catalog order.
    async fn products(&self) -> Result<Vec<Product>, BackendError>;

    /// Category names.
    async fn categories(&self) -> Result<Vec<NamedEntity>, BackendError>;

    /// Brand names.
    async fn brands(&self) -> Result<Vec<NamedEntity>, BackendError>;
}
