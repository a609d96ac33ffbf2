//! Cart Model
//!
//! One cart per user; the cart's record key is the owning user's key.

use super::serde_helpers;
use super::product::Product;
use serde::{Deserialize, Serialize};
use surrealdb::RecordId;

/// One line in a cart
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    #[serde(rename = "productId", with = "serde_helpers::record_id")]
    pub product: RecordId,
    pub quantity: u32,
}

/// Per-user cart document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    #[serde(default, with = "serde_helpers::option_record_id")]
    pub id: Option<RecordId>,
    #[serde(rename = "userId", with = "serde_helpers::record_id")]
    pub user: RecordId,
    #[serde(default)]
    pub items: Vec<CartItem>,
}

impl Cart {
    /// Empty cart for the given user
    pub fn empty(user: RecordId) -> Self {
        Self {
            id: None,
            user,
            items: Vec::new(),
        }
    }

    /// Additive merge: an existing line gains quantity, otherwise append
    pub fn add_item(&mut self, product: RecordId, quantity: u32) {
        match self.items.iter_mut().find(|i| i.product == product) {
            Some(item) => item.quantity += quantity,
            None => self.items.push(CartItem { product, quantity }),
        }
    }

    /// Remove a line; absent lines are a no-op
    pub fn remove_item(&mut self, product: &RecordId) {
        self.items.retain(|i| &i.product != product);
    }
}

/// Cart with product data materialized for the storefront
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    #[serde(with = "serde_helpers::option_record_id")]
    pub id: Option<RecordId>,
    #[serde(rename = "userId", with = "serde_helpers::record_id")]
    pub user: RecordId,
    pub items: Vec<CartItemView>,
}

/// One materialized cart line; `product` is None when the referenced
/// product has been deleted since it was added
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemView {
    #[serde(rename = "productId", with = "serde_helpers::record_id")]
    pub product_id: RecordId,
    pub product: Option<Product>,
    pub quantity: u32,
}
