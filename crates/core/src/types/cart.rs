//! Cart line and cart mode types.

use serde::{Deserialize, Serialize};

use super::id::{ProductId, RemoteLineId};

/// One product's entry in a cart.
///
/// A cart never holds two lines for the same `product_id`, and a line with
/// quantity zero is removed rather than kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    /// Product this line refers to.
    pub product_id: ProductId,
    /// Number of units, always at least 1.
    pub quantity: u32,
    /// Identifier assigned by the remote cart service (remote carts only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_line_id: Option<RemoteLineId>,
}

impl CartLine {
    /// Create a local line without a remote identifier.
    #[must_use]
    pub const fn new(product_id: ProductId, quantity: u32) -> Self {
        Self {
            product_id,
            quantity,
            remote_line_id: None,
        }
    }
}

/// Where the authoritative copy of a cart lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CartMode {
    /// Backed by the remote cart service (authenticated customer).
    Remote,
    /// Backed by durable local storage only.
    Local,
}

impl CartMode {
    /// Get the mode as a lowercase string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::Local => "local",
        }
    }
}

impl std::fmt::Display for CartMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
