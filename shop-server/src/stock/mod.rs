//! Stock Reconciliation
//!
//! Single owner of all `product.stock` mutations. Two entry paths:
//!
//! - [`StockLedger::reserve`]: all-or-nothing, used by direct order
//!   creation. Any failed line compensates the lines already applied and
//!   the whole call fails.
//! - [`StockLedger::settle`]: lenient, used by payment confirmation.
//!   Missing or short lines are logged and skipped; the confirmation
//!   itself never fails on a single line.
//!
//! Every mutation is one conditional statement
//! (`UPDATE … SET stock -= $qty WHERE stock >= $qty`), applied atomically
//! by the storage engine, and calls for the same product are additionally
//! serialized on a per-product lock. Two concurrent orders can never both
//! pass the check and drive stock below zero.

use std::sync::Arc;

use dashmap::DashMap;
use serde::Deserialize;
use surrealdb::{RecordId, Surreal};
use surrealdb::engine::local::Db;
use thiserror::Error;
use tokio::sync::Mutex;

/// One requested stock movement
#[derive(Debug, Clone)]
pub struct StockLine {
    pub product: RecordId,
    pub quantity: u32,
}

/// Stock reconciliation errors
#[derive(Debug, Error)]
pub enum StockError {
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    #[error("Not enough stock for {name}")]
    InsufficientStock { name: String },

    #[error("quantity must be at least 1")]
    InvalidQuantity,

    #[error("Database error: {0}")]
    Database(String),
}

impl From<surrealdb::Error> for StockError {
    fn from(err: surrealdb::Error) -> Self {
        StockError::Database(err.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct StockRow {
    stock: i64,
}

#[derive(Debug, Deserialize)]
struct NameRow {
    name: String,
}

/// Serialized, conditional access to product stock
#[derive(Clone)]
pub struct StockLedger {
    db: Surreal<Db>,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl StockLedger {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            db,
            locks: Arc::new(DashMap::new()),
        }
    }

    /// All-or-nothing reservation for an order
    ///
    /// On failure no net stock change remains: lines applied before the
    /// failing one are compensated before the error is returned.
    pub async fn reserve(&self, lines: &[StockLine]) -> Result<(), StockError> {
        if lines.iter().any(|l| l.quantity == 0) {
            return Err(StockError::InvalidQuantity);
        }

        let mut applied: Vec<&StockLine> = Vec::with_capacity(lines.len());
        for line in lines {
            match self.try_decrement(&line.product, line.quantity).await {
                Ok(true) => applied.push(line),
                Ok(false) => {
                    let err = self.classify_failure(&line.product).await;
                    self.restore(&applied).await;
                    return Err(err);
                }
                Err(e) => {
                    self.restore(&applied).await;
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Lenient settlement for a confirmed payment
    ///
    /// Lines whose product has disappeared or gone short since checkout
    /// are skipped with a warning. Returns the number of lines applied.
    pub async fn settle(&self, lines: &[StockLine]) -> Result<usize, StockError> {
        let mut count = 0;
        for line in lines {
            if line.quantity == 0 {
                continue;
            }
            if self.try_decrement(&line.product, line.quantity).await? {
                count += 1;
            } else {
                match self.classify_failure(&line.product).await {
                    StockError::ProductNotFound(id) => {
                        tracing::warn!(product = %id, "Skipping settlement line: product deleted since checkout");
                    }
                    StockError::InsufficientStock { name } => {
                        tracing::warn!(product = %name, "Skipping settlement line: not enough stock");
                    }
                    e => return Err(e),
                }
            }
        }
        Ok(count)
    }

    /// Conditional decrement of one product. Returns false when the
    /// product is missing or the remaining stock is short.
    async fn try_decrement(&self, product: &RecordId, qty: u32) -> Result<bool, StockError> {
        let lock = self.lock_for(product);
        let _guard = lock.lock().await;

        let rows: Vec<StockRow> = self
            .db
            .query("UPDATE $product SET stock -= $qty WHERE stock >= $qty RETURN AFTER")
            .bind(("product", product.clone()))
            .bind(("qty", i64::from(qty)))
            .await?
            .take(0)?;
        Ok(!rows.is_empty())
    }

    /// Distinguish missing product from short stock after a failed decrement
    async fn classify_failure(&self, product: &RecordId) -> StockError {
        let row: Result<Option<NameRow>, surrealdb::Error> = self.db.select(product.clone()).await;
        match row {
            Ok(Some(row)) => StockError::InsufficientStock { name: row.name },
            Ok(None) => StockError::ProductNotFound(product.to_string()),
            Err(e) => StockError::Database(e.to_string()),
        }
    }

    /// Compensate already-applied lines of a failed reservation
    async fn restore(&self, applied: &[&StockLine]) {
        for line in applied {
            let lock = self.lock_for(&line.product);
            let _guard = lock.lock().await;

            let result = self
                .db
                .query("UPDATE $product SET stock += $qty")
                .bind(("product", line.product.clone()))
                .bind(("qty", i64::from(line.quantity)))
                .await;
            if let Err(e) = result {
                // The failed reservation is reported regardless; a lost
                // compensation is the worse outcome, so it is loud.
                tracing::error!(product = %line.product, error = %e, "Failed to restore stock after aborted reservation");
            }
        }
    }

    fn lock_for(&self, product: &RecordId) -> Arc<Mutex<()>> {
        self.locks
            .entry(product.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
