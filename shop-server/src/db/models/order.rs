//! Order Model
//!
//! Orders are immutable snapshots once created, except for `status` and the
//! `stockApplied` marker.

use super::product::Product;
use super::serde_helpers;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::OrderStatus;
use surrealdb::RecordId;

/// Order ID type
pub type OrderId = RecordId;

/// Quantity snapshot of one ordered product
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    #[serde(rename = "productId", with = "serde_helpers::record_id")]
    pub product: RecordId,
    pub quantity: u32,
}

/// Order document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(default, with = "serde_helpers::option_record_id")]
    pub id: Option<OrderId>,
    #[serde(rename = "userId", with = "serde_helpers::record_id")]
    pub user: RecordId,
    pub items: Vec<OrderItem>,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    /// External payment-session reference (checkout orders only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Set once stock has been decremented for this order; guards against
    /// double application on repeated confirmation
    #[serde(default, deserialize_with = "serde_helpers::bool_false")]
    pub stock_applied: bool,
    #[serde(default)]
    pub created_at: i64,
}

/// Order with product data materialized for listings
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    #[serde(with = "serde_helpers::option_record_id")]
    pub id: Option<OrderId>,
    #[serde(rename = "userId", with = "serde_helpers::record_id")]
    pub user: RecordId,
    pub items: Vec<OrderItemView>,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub created_at: i64,
}

/// One materialized order line; `product` is None when the referenced
/// product has been deleted since the order was placed
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemView {
    #[serde(rename = "productId", with = "serde_helpers::record_id")]
    pub product_id: RecordId,
    pub product: Option<Product>,
    pub quantity: u32,
}
