//! Catalog product snapshot.

use serde::{Deserialize, Serialize};

use super::id::ProductId;
use super::price::Price;

/// A read-only product as last fetched from the catalog.
///
/// Products are immutable once fetched; a catalog refresh replaces the whole
/// snapshot rather than patching individual entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Opaque backend identifier.
    pub id: ProductId,
    /// Display name, also the key used when matching free text.
    pub name: String,
    /// Unit price.
    pub price: Price,
    /// Optional long-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Category name, when the catalog provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Brand name, when the catalog provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
}

impl Product {
    /// Create a product with only the fields the cart needs.
    #[must_use]
    pub fn new(id: impl Into<ProductId>, name: impl Into<String>, price: Price) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price,
            description: None,
            category: None,
            brand: None,
        }
    }
}
