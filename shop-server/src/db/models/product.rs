//! Product Model

use super::serde_helpers;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use surrealdb::RecordId;

/// Product ID type
pub type ProductId = RecordId;

/// Catalog product
///
/// `stock` is the one shared mutable resource in the system; it is only
/// ever changed through conditional single-statement updates (see the
/// `stock` module).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    #[serde(default, with = "serde_helpers::option_record_id")]
    pub id: Option<ProductId>,
    pub name: String,
    pub price: Decimal,
    pub description: String,
    pub image: String,
    pub category: String,
    pub stock: i64,
}
