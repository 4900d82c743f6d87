//! Product Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::value_objects::slugify;
use crate::ShopError;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub price: i64,
    pub old_price: Option<i64>,
    pub stock: i32,
    pub sku: Option<String>,
    pub brand: Option<String>,
    pub is_active: bool,
    pub category_id: Option<Uuid>,
    pub images: Vec<ProductImage>,
    pub specs: Vec<ProductSpec>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductImage { pub url: String, pub alt: Option<String>, pub sort_order: i32 }

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSpec { pub group: String, pub name: String, pub value: String }

impl Product {
    pub fn new(name: impl Into<String>, price: i64, stock: i32) -> Self {
        let name = name.into();
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(), slug: slugify(&name), name, description: String::new(),
            price, old_price: None, stock: stock.max(0), sku: None, brand: None, is_active: true,
            category_id: None, images: vec![], specs: vec![], created_at: now, updated_at: now,
        }
    }

    pub fn is_in_stock(&self) -> bool { self.stock > 0 }

    /// Percentage shown next to a crossed-out old price.
    pub fn discount_percent(&self) -> i64 {
        match self.old_price {
            Some(old) if old > self.price && old > 0 => ((old - self.price) * 100 + old / 2) / old,
            _ => 0,
        }
    }

    /// Checks that `quantity` units of this product can be sold right now.
    pub fn ensure_can_fulfil(&self, quantity: i32) -> Result<(), ShopError> {
        if !self.is_active { return Err(ShopError::ProductUnavailable(self.id)); }
        if self.stock < quantity { return Err(ShopError::InsufficientStock { product: self.name.clone() }); }
        Ok(())
    }

    pub fn take_stock(&mut self, quantity: i32) -> Result<(), ShopError> {
        self.ensure_can_fulfil(quantity)?;
        self.stock -= quantity;
        self.touch();
        Ok(())
    }

    pub fn restore_stock(&mut self, quantity: i32) {
        self.stock = self.stock.saturating_add(quantity.max(0));
        self.touch();
    }

    pub fn deactivate(&mut self) { self.is_active = false; self.touch(); }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_create() {
        let p = Product::new("Pixel 9 Pro", 89_990, 3);
        assert_eq!(p.slug, "pixel-9-pro");
        assert!(p.is_active);
        assert!(p.is_in_stock());
    }

    #[test]
    fn test_stock_moves() {
        let mut p = Product::new("Cable", 990, 5);
        p.take_stock(5).unwrap();
        assert_eq!(p.stock, 0);
        assert!(matches!(p.take_stock(1), Err(ShopError::InsufficientStock { .. })));
        assert_eq!(p.stock, 0);
        p.restore_stock(2);
        assert_eq!(p.stock, 2);
    }

    #[test]
    fn test_inactive_product_cannot_sell() {
        let mut p = Product::new("Old phone", 1000, 10);
        p.deactivate();
        assert!(matches!(p.ensure_can_fulfil(1), Err(ShopError::ProductUnavailable(id)) if id == p.id));
    }

    #[test]
    fn test_discount_percent() {
        let mut p = Product::new("Headphones", 7_500, 1);
        p.old_price = Some(10_000);
        assert_eq!(p.discount_percent(), 25);
        p.old_price = Some(7_000);
        assert_eq!(p.discount_percent(), 0);
    }
}
