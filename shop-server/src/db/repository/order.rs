//! Order Repository
//!
//! Owns the order status state machine. Transitions out of `Pending` are
//! compare-and-set updates so a transition is applied at most once no
//! matter how many callers race.

use super::{BaseRepository, RepoError, RepoResult, record_id};
use crate::db::models::{Order, OrderItem};
use chrono::Utc;
use rust_decimal::Decimal;
use shared::OrderStatus;
use surrealdb::{RecordId, Surreal};
use surrealdb::engine::local::Db;

// "order" collides with the ORDER BY keyword in SurrealQL
const ORDER_TABLE: &str = "orders";

#[derive(Clone)]
pub struct OrderRepository {
    base: BaseRepository,
}

impl OrderRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    /// Persist a new order snapshot
    pub async fn create(
        &self,
        user: RecordId,
        items: Vec<OrderItem>,
        total_amount: Decimal,
        session_id: Option<String>,
        stock_applied: bool,
    ) -> RepoResult<Order> {
        let order = Order {
            id: None,
            user,
            items,
            total_amount,
            status: OrderStatus::Pending,
            session_id,
            stock_applied,
            created_at: Utc::now().timestamp(),
        };

        let created: Option<Order> = self.base.db().create(ORDER_TABLE).content(order).await?;
        created.ok_or_else(|| RepoError::Database("Failed to create order".to_string()))
    }

    /// Find order by id
    pub async fn find_by_id(&self, id: &str) -> RepoResult<Option<Order>> {
        let order: Option<Order> = self.base.db().select(record_id(ORDER_TABLE, id)).await?;
        Ok(order)
    }

    /// All orders of one user, newest first
    pub async fn find_by_user(&self, user: &RecordId) -> RepoResult<Vec<Order>> {
        let orders: Vec<Order> = self
            .base
            .db()
            .query("SELECT * FROM orders WHERE userId = $user ORDER BY createdAt DESC")
            .bind(("user", user.to_string()))
            .await?
            .take(0)?;
        Ok(orders)
    }

    /// All orders, newest first (admin)
    pub async fn find_all(&self) -> RepoResult<Vec<Order>> {
        let orders: Vec<Order> = self
            .base
            .db()
            .query("SELECT * FROM orders ORDER BY createdAt DESC")
            .await?
            .take(0)?;
        Ok(orders)
    }

    /// Find the order recorded for an external payment session
    pub async fn find_by_session(&self, session_id: &str) -> RepoResult<Option<Order>> {
        let mut result = self
            .base
            .db()
            .query("SELECT * FROM orders WHERE sessionId = $sid LIMIT 1")
            .bind(("sid", session_id.to_string()))
            .await?;
        let order: Option<Order> = result.take(0)?;
        Ok(order)
    }

    /// Compare-and-set `Pending -> Paid`, marking stock as applied.
    ///
    /// Returns true when this call won the transition; false means the
    /// order had already left `Pending` (duplicate confirmation) and the
    /// caller must not touch stock.
    pub async fn transition_to_paid(&self, id: &RecordId) -> RepoResult<bool> {
        let rows: Vec<Order> = self
            .base
            .db()
            .query(
                "UPDATE $thing SET status = 'Paid', stockApplied = true \
                 WHERE status = 'Pending' RETURN AFTER",
            )
            .bind(("thing", id.clone()))
            .await?
            .take(0)?;
        Ok(!rows.is_empty())
    }

    /// Compare-and-set `Pending -> Cancelled` (admin status endpoint)
    pub async fn transition_to_cancelled(&self, id: &RecordId) -> RepoResult<bool> {
        let rows: Vec<Order> = self
            .base
            .db()
            .query(
                "UPDATE $thing SET status = 'Cancelled' \
                 WHERE status = 'Pending' RETURN AFTER",
            )
            .bind(("thing", id.clone()))
            .await?
            .take(0)?;
        Ok(!rows.is_empty())
    }
}
