//! Client-side Cart
//!
//! Lives in the shopper's browser storage; the server only sees it at checkout,
//! where every line is re-validated against live stock and prices.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::aggregates::Product;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    items: Vec<CartItem>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: Uuid,
    pub name: String,
    pub price: i64,
    pub image: String,
    pub quantity: i32,
    /// Stock seen when the item was added; caps the quantity client-side.
    pub stock: i32,
}

/// One line of a checkout request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutLine { pub product_id: Uuid, pub quantity: i32 }

pub const PLACEHOLDER_IMAGE: &str = "/placeholder.jpg";

impl CartItem {
    pub fn line_total(&self) -> i64 { self.price.saturating_mul(i64::from(self.quantity)) }
}

impl Cart {
    pub fn new() -> Self { Self::default() }

    pub fn items(&self) -> &[CartItem] { &self.items }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }
    pub fn total_items(&self) -> i32 { self.items.iter().map(|i| i.quantity).sum() }
    pub fn total_price(&self) -> i64 { self.items.iter().map(CartItem::line_total).fold(0, i64::saturating_add) }

    /// Adds one unit, merging with an existing line and never exceeding stock.
    pub fn add_item(&mut self, product: &Product) {
        if product.stock <= 0 {
            self.remove_item(product.id);
            return;
        }
        if let Some(existing) = self.items.iter_mut().find(|i| i.product_id == product.id) {
            existing.stock = product.stock;
            existing.quantity = (existing.quantity + 1).min(product.stock);
            return;
        }
        let image = product.images.first().map(|i| i.url.clone()).unwrap_or_else(|| PLACEHOLDER_IMAGE.to_string());
        self.items.push(CartItem {
            product_id: product.id, name: product.name.clone(), price: product.price,
            image, quantity: 1, stock: product.stock,
        });
    }

    /// Zero or less removes the line; anything else is capped at the stock snapshot.
    pub fn update_quantity(&mut self, product_id: Uuid, quantity: i32) {
        if quantity <= 0 { self.remove_item(product_id); return; }
        if let Some(item) = self.items.iter_mut().find(|i| i.product_id == product_id) {
            item.quantity = quantity.min(item.stock);
        }
    }

    pub fn remove_item(&mut self, product_id: Uuid) { self.items.retain(|i| i.product_id != product_id); }

    pub fn clear(&mut self) { self.items.clear(); }

    pub fn checkout_lines(&self) -> Vec<CheckoutLine> {
        self.items.iter().filter(|i| i.quantity > 0).map(|i| CheckoutLine { product_id: i.product_id, quantity: i.quantity }).collect()
    }

    pub fn to_json(&self) -> serde_json::Result<String> { serde_json::to_string(self) }

    /// Restores a persisted cart, dropping lines that can no longer be valid.
    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        let mut cart: Cart = serde_json::from_str(raw)?;
        cart.items.retain(|i| i.quantity > 0 && i.price >= 0);
        Ok(cart)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cart_operations() {
        let widget = Product::new("Widget", 10, 2);
        let mut cart = Cart::new();
        cart.add_item(&widget);
        cart.add_item(&widget);
        cart.add_item(&widget);
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.items()[0].quantity, 2); // Capped at stock
        assert_eq!(cart.total_price(), 20);
        assert_eq!(cart.items()[0].image, PLACEHOLDER_IMAGE);
    }

    #[test]
    fn test_update_and_remove() {
        let a = Product::new("A", 100, 10);
        let b = Product::new("B", 50, 1);
        let mut cart = Cart::new();
        cart.add_item(&a);
        cart.add_item(&b);
        cart.update_quantity(a.id, 40);
        assert_eq!(cart.items()[0].quantity, 10);
        cart.update_quantity(b.id, 0);
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.total_items(), 10);
        assert_eq!(cart.checkout_lines(), vec![CheckoutLine { product_id: a.id, quantity: 10 }]);
        cart.clear();
        assert!(cart.is_empty());
    }

    #[test]
    fn test_out_of_stock_not_added() {
        let gone = Product::new("Gone", 100, 0);
        let mut cart = Cart::new();
        cart.add_item(&gone);
        assert!(cart.is_empty());
    }

    #[test]
    fn test_sold_out_readd_drops_line() {
        let mut p = Product::new("Headset", 300, 1);
        let mut cart = Cart::new();
        cart.add_item(&p);
        p.stock = 0;
        cart.add_item(&p);
        assert!(cart.is_empty());
        assert_eq!(cart.total_items(), 0);
    }

    #[test]
    fn test_persisted_form() {
        let p = Product::new("Mouse", 2_490, 4);
        let mut cart = Cart::new();
        cart.add_item(&p);
        let raw = cart.to_json().unwrap();
        assert!(raw.contains("\"productId\""));
        assert_eq!(Cart::from_json(&raw).unwrap(), cart);
        let tampered = raw.replace("\"quantity\":1", "\"quantity\":-3");
        assert!(Cart::from_json(&tampered).unwrap().is_empty());
    }
}
