//! Typed response schemas for backend endpoints.
//!
//! These mirror the JSON the backend sends. Conversion into core types
//! happens in one place per endpoint; shapes that cannot be represented
//! (negative prices, empty ids) are logged and skipped there instead of being
//! defaulted deeper in the cart logic.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use mercadito_core::{CartLine, Price, Product, ProductId, RemoteLineId};

/// `GET cart` response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCart {
    /// One entry per unit (or per unit batch when `quantity` is present).
    pub lines: Vec<RemoteCartLine>,
}

/// One entry of the remote cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCartLine {
    pub line_id: RemoteLineId,
    pub product: ProductDto,
    /// Units represented by this entry; absent means one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
}

/// Product as sent by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDto {
    pub id: ProductId,
    pub name: String,
    pub price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
}

/// Category or brand entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedEntity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
}

/// `POST cart/add` and `PUT cart/quantity` body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct QuantityRequest<'a> {
    pub product_id: &'a ProductId,
    pub quantity: u32,
}

impl ProductDto {
    /// Convert into a core product, rejecting unusable data.
    pub fn into_product(self) -> Result<Product, String> {
        if self.id.is_empty() {
            return Err(format!("product '{}' has an empty id", self.name));
        }
        let price = Price::new(self.price)
            .ok_or_else(|| format!("product {} has a negative price {}", self.id, self.price))?;
        Ok(Product {
            id: self.id,
            name: self.name,
            price,
            description: self.description,
            category: self.category,
            brand: self.brand,
        })
    }
}

/// Normalize a product list, skipping (and logging) invalid entries.
#[must_use]
pub fn normalize_products(products: Vec<ProductDto>) -> Vec<Product> {
    products
        .into_iter()
        .filter_map(|dto| match dto.into_product() {
            Ok(product) => Some(product),
            Err(reason) => {
                warn!(%reason, "Skipping invalid catalog product");
                None
            }
        })
        .collect()
}

/// Flatten a remote cart into `(product, line)` pairs.
///
/// Repeated entries for the same product collapse into a single line whose
/// quantity is the sum of the entries; the first line id seen is kept.
#[must_use]
pub fn normalize_remote_cart(cart: RemoteCart) -> Vec<(Product, CartLine)> {
    let mut entries: Vec<(Product, CartLine)> = Vec::new();

    for line in cart.lines {
        let quantity = line.quantity.unwrap_or(1);
        if quantity == 0 {
            warn!(line_id = %line.line_id, "Skipping remote cart line with zero quantity");
            continue;
        }
        let product = match line.product.into_product() {
            Ok(product) => product,
            Err(reason) => {
                warn!(line_id = %line.line_id, %reason, "Skipping invalid remote cart line");
                continue;
            }
        };

        match entries.iter_mut().find(|(p, _)| p.id == product.id) {
            Some((_, existing)) => {
                existing.quantity = existing.quantity.saturating_add(quantity);
            }
            None => {
                let cart_line = CartLine {
                    product_id: product.id.clone(),
                    quantity,
                    remote_line_id: Some(line.line_id),
                };
                entries.push((product, cart_line));
            }
        }
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_cart_deserialization() {
        let json = r#"{
            "lines": [
                {"lineId": "a", "product": {"id": "1", "name": "Cafe", "price": 10.0, "description": "Tostado"}},
                {"lineId": "b", "product": {"id": "1", "name": "Cafe", "price": 10.0}},
                {"lineId": "c", "product": {"id": "2", "name": "Pan", "price": "2.50"}, "quantity": 3}
            ]
        }"#;

        let cart: RemoteCart = serde_json::from_str(json).expect("deserialize");
        assert_eq!(cart.lines.len(), 3);
        assert_eq!(cart.lines[0].product.description.as_deref(), Some("Tostado"));
        assert_eq!(cart.lines[2].quantity, Some(3));
    }

    #[test]
    fn test_normalize_collapses_units_per_product() {
        let json = r#"{
            "lines": [
                {"lineId": "a", "product": {"id": "1", "name": "Cafe", "price": 10}},
                {"lineId": "b", "product": {"id": "2", "name": "Pan", "price": 2.5}},
                {"lineId": "c", "product": {"id": "1", "name": "Cafe", "price": 10}}
            ]
        }"#;
        let cart: RemoteCart = serde_json::from_str(json).expect("deserialize");

        let entries = normalize_remote_cart(cart);

        assert_eq!(entries.len(), 2);
        let (cafe, cafe_line) = &entries[0];
        assert_eq!(cafe.name, "Cafe");
        assert_eq!(cafe_line.quantity, 2);
        assert_eq!(cafe_line.remote_line_id, Some(RemoteLineId::new("a")));
        assert_eq!(entries[1].1.quantity, 1);
    }

    #[test]
    fn test_normalize_skips_invalid_lines() {
        let json = r#"{
            "lines": [
                {"lineId": "a", "product": {"id": "1", "name": "Cafe", "price": -1}},
                {"lineId": "b", "product": {"id": "", "name": "Nada", "price": 1}},
                {"lineId": "c", "product": {"id": "2", "name": "Pan", "price": 1}, "quantity": 0},
                {"lineId": "d", "product": {"id": "3", "name": "Leche", "price": 1}}
            ]
        }"#;
        let cart: RemoteCart = serde_json::from_str(json).expect("deserialize");

        let entries = normalize_remote_cart(cart);

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0.name, "Leche");
    }

    #[test]
    fn test_normalize_products() {
        let products = vec![
            ProductDto {
                id: ProductId::new("1"),
                name: "Cafe".to_string(),
                price: Decimal::new(1000, 2),
                description: None,
                category: Some("Bebidas".to_string()),
                brand: None,
            },
            ProductDto {
                id: ProductId::new("2"),
                name: "Roto".to_string(),
                price: Decimal::new(-5, 0),
                description: None,
                category: None,
                brand: None,
            },
        ];

        let normalized = normalize_products(products);
        assert_eq!(normalized.len(), 1);
        assert_eq!(normalized[0].category.as_deref(), Some("Bebidas"));
    }
}
