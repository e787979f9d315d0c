//! In-memory cart state.
//!
//! `CartStore` is a plain data structure: every operation is synchronous and
//! total. Callers resolve products before touching the store, so a missing
//! product never surfaces here as an error.

use std::collections::HashMap;

use serde::Serialize;

use mercadito_core::{CartLine, Price, Product, ProductId};

/// The cart's lines plus the last-known product data used for pricing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CartStore {
    lines: Vec<CartLine>,
    products: HashMap<ProductId, Product>,
}

impl CartStore {
    /// Create an empty cart.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a cart from `(product, line)` pairs, merging duplicate products.
    #[must_use]
    pub fn from_entries(entries: impl IntoIterator<Item = (Product, CartLine)>) -> Self {
        let mut store = Self::new();
        store.replace(entries);
        store
    }

    /// All lines, in insertion order.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// The line for a product, if present.
    #[must_use]
    pub fn line(&self, product_id: &ProductId) -> Option<&CartLine> {
        self.lines.iter().find(|l| &l.product_id == product_id)
    }

    /// Quantity held for a product (0 when absent).
    #[must_use]
    pub fn quantity_of(&self, product_id: &ProductId) -> u32 {
        self.line(product_id).map_or(0, |l| l.quantity)
    }

    /// Whether the product has a line in the cart.
    #[must_use]
    pub fn contains(&self, product_id: &ProductId) -> bool {
        self.line(product_id).is_some()
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Last-known product data for a line.
    #[must_use]
    pub fn product(&self, product_id: &ProductId) -> Option<&Product> {
        self.products.get(product_id)
    }

    /// Record product data so later subtotals use its price.
    pub fn remember(&mut self, product: Product) {
        self.products.insert(product.id.clone(), product);
    }

    /// Add units of a product, merging into an existing line.
    pub fn add_line(&mut self, product_id: &ProductId, quantity: u32) {
        if quantity == 0 {
            return;
        }
        match self.lines.iter_mut().find(|l| &l.product_id == product_id) {
            Some(line) => line.quantity = line.quantity.saturating_add(quantity),
            None => self.lines.push(CartLine::new(product_id.clone(), quantity)),
        }
    }

    /// Remove units of a product, dropping the line when none remain.
    pub fn remove_qty(&mut self, product_id: &ProductId, quantity: u32) {
        let remaining = self.quantity_of(product_id).saturating_sub(quantity);
        self.set_qty(product_id, remaining);
    }

    /// Remove a product's line entirely.
    pub fn remove_all(&mut self, product_id: &ProductId) {
        self.lines.retain(|l| &l.product_id != product_id);
    }

    /// Set a product's quantity; zero removes the line.
    pub fn set_qty(&mut self, product_id: &ProductId, quantity: u32) {
        if quantity == 0 {
            self.remove_all(product_id);
            return;
        }
        match self.lines.iter_mut().find(|l| &l.product_id == product_id) {
            Some(line) => line.quantity = quantity,
            None => self.lines.push(CartLine::new(product_id.clone(), quantity)),
        }
    }

    /// Remove every line.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Replace all lines, e.g. after re-fetching the remote cart.
    ///
    /// Entries for the same product are collapsed into one line with the
    /// summed quantity; the first remote line id seen is kept.
    pub fn replace(&mut self, entries: impl IntoIterator<Item = (Product, CartLine)>) {
        self.lines.clear();
        for (product, line) in entries {
            if line.quantity == 0 {
                continue;
            }
            match self
                .lines
                .iter_mut()
                .find(|l| l.product_id == line.product_id)
            {
                Some(existing) => {
                    existing.quantity = existing.quantity.saturating_add(line.quantity);
                    if existing.remote_line_id.is_none() {
                        existing.remote_line_id = line.remote_line_id;
                    }
                }
                None => self.lines.push(line),
            }
            self.remember(product);
        }
    }

    /// Lines paired with their last-known product data.
    pub fn entries(&self) -> impl Iterator<Item = (&CartLine, Option<&Product>)> {
        self.lines
            .iter()
            .map(|line| (line, self.products.get(&line.product_id)))
    }

    /// Total number of units.
    #[must_use]
    pub fn count(&self) -> u32 {
        self.lines
            .iter()
            .fold(0, |acc: u32, l| acc.saturating_add(l.quantity))
    }

    /// Sum of unit price times quantity over all lines.
    ///
    /// Lines whose product was never seen contribute nothing.
    #[must_use]
    pub fn subtotal(&self) -> Price {
        self.entries()
            .filter_map(|(line, product)| product.map(|p| p.price.times(line.quantity)))
            .sum()
    }

    /// Display-ready summary of the cart.
    #[must_use]
    pub fn summary(&self) -> CartSummary {
        CartSummary {
            lines: self
                .entries()
                .map(|(line, product)| {
                    let unit_price = product.map_or(Price::ZERO, |p| p.price);
                    CartSummaryLine {
                        product_id: line.product_id.clone(),
                        name: product.map_or_else(|| line.product_id.to_string(), |p| p.name.clone()),
                        quantity: line.quantity,
                        unit_price,
                        line_total: unit_price.times(line.quantity),
                    }
                })
                .collect(),
            count: self.count(),
            subtotal: self.subtotal(),
        }
    }
}

/// A read-only view of the cart for prompts and display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartSummary {
    pub lines: Vec<CartSummaryLine>,
    pub count: u32,
    pub subtotal: Price,
}

/// One line of a [`CartSummary`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartSummaryLine {
    pub product_id: ProductId,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Price,
    pub line_total: Price,
}

impl CartSummary {
    /// Whether the summarized cart is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use mercadito_core::RemoteLineId;

    use super::*;

    fn cafe() -> Product {
        Product::new("1", "Cafe", Price::from_cents(1000))
    }

    fn store_with_cafe() -> CartStore {
        let mut store = CartStore::new();
        store.remember(cafe());
        store
    }

    #[test]
    fn test_add_merges_into_existing_line() {
        let mut store = store_with_cafe();
        let id = cafe().id;

        store.add_line(&id, 2);
        store.add_line(&id, 3);

        assert_eq!(store.lines().len(), 1);
        assert_eq!(store.quantity_of(&id), 5);
        assert_eq!(store.count(), 5);
    }

    #[test]
    fn test_subtotal_uses_last_known_price() {
        let mut store = store_with_cafe();
        store.add_line(&cafe().id, 5);
        assert_eq!(store.subtotal(), Price::from_cents(5000));

        store.remember(Product::new("1", "Cafe", Price::from_cents(1200)));
        assert_eq!(store.subtotal(), Price::from_cents(6000));
    }

    #[test]
    fn test_remove_qty_drops_line_at_zero() {
        let mut store = store_with_cafe();
        let id = cafe().id;
        store.add_line(&id, 3);

        store.remove_qty(&id, 1);
        assert_eq!(store.quantity_of(&id), 2);

        store.remove_qty(&id, 5);
        assert!(!store.contains(&id));
        assert!(store.is_empty());
    }

    #[test]
    fn test_set_qty_zero_is_remove_all() {
        let mut store = store_with_cafe();
        let id = cafe().id;
        store.add_line(&id, 3);
        store.set_qty(&id, 0);
        assert!(!store.contains(&id));
    }

    #[test]
    fn test_add_zero_is_noop() {
        let mut store = store_with_cafe();
        store.add_line(&cafe().id, 0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_replace_collapses_duplicates() {
        let product = cafe();
        let mut first = CartLine::new(product.id.clone(), 1);
        first.remote_line_id = Some("l-1".into());
        let mut second = CartLine::new(product.id.clone(), 1);
        second.remote_line_id = Some("l-2".into());

        let store = CartStore::from_entries(vec![(product.clone(), first), (product.clone(), second)]);

        assert_eq!(store.lines().len(), 1);
        assert_eq!(store.quantity_of(&product.id), 2);
        assert_eq!(
            store.line(&product.id).and_then(|l| l.remote_line_id.clone()),
            Some(RemoteLineId::new("l-1"))
        );
    }

    #[test]
    fn test_summary() {
        let mut store = store_with_cafe();
        store.add_line(&cafe().id, 2);

        let summary = store.summary();
        assert_eq!(summary.count, 2);
        assert_eq!(summary.subtotal, Price::from_cents(2000));
        assert_eq!(summary.lines[0].name, "Cafe");
        assert_eq!(summary.lines[0].line_total, Price::from_cents(2000));
    }

    #[derive(Debug, Clone)]
    enum Op {
        Add(u32),
        RemoveQty(u32),
        RemoveAll,
        SetQty(u32),
    }

    fn arb_op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u32..20).prop_map(Op::Add),
            (0u32..20).prop_map(Op::RemoveQty),
            Just(Op::RemoveAll),
            (0u32..20).prop_map(Op::SetQty),
        ]
    }

    proptest! {
        /// Replaying any operation sequence on one product matches plain
        /// arithmetic clamped at zero, and zero always means "no line".
        #[test]
        fn prop_quantity_matches_arithmetic_replay(ops in prop::collection::vec(arb_op(), 0..40)) {
            let mut store = store_with_cafe();
            let id = cafe().id;
            let mut expected: i64 = 0;

            for op in ops {
                match op {
                    Op::Add(q) => { store.add_line(&id, q); expected += i64::from(q); }
                    Op::RemoveQty(q) => { store.remove_qty(&id, q); expected = (expected - i64::from(q)).max(0); }
                    Op::RemoveAll => { store.remove_all(&id); expected = 0; }
                    Op::SetQty(q) => { store.set_qty(&id, q); expected = i64::from(q); }
                }

                prop_assert_eq!(i64::from(store.quantity_of(&id)), expected);
                prop_assert_eq!(store.contains(&id), expected > 0);
                prop_assert!(store.lines().iter().all(|l| l.quantity >= 1));
                prop_assert!(store.lines().len() <= 1);
            }
        }

        /// Removing a product twice leaves the same cart as removing it once.
        #[test]
        fn prop_remove_all_is_idempotent(start in 0u32..50) {
            let mut store = store_with_cafe();
            let id = cafe().id;
            store.add_line(&id, start);

            store.remove_all(&id);
            let once = store.clone();
            store.remove_all(&id);

            prop_assert_eq!(once, store);
        }
    }
}
