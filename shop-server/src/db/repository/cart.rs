//! Cart Repository
//!
//! Cart record key == user record key, so every operation is a direct
//! record access. Carts are uncontended: only the owning user's requests
//! touch them.

use super::{BaseRepository, RepoResult, record_id};
use crate::db::models::Cart;
use surrealdb::{RecordId, Surreal};
use surrealdb::engine::local::Db;

const CART_TABLE: &str = "cart";

#[derive(Clone)]
pub struct CartRepository {
    base: BaseRepository,
}

impl CartRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    fn cart_id(user: &RecordId) -> RecordId {
        RecordId::from_table_key(CART_TABLE, user.key().to_string())
    }

    /// Find the user's cart
    pub async fn find_by_user(&self, user: &RecordId) -> RepoResult<Option<Cart>> {
        let cart: Option<Cart> = self.base.db().select(Self::cart_id(user)).await?;
        Ok(cart)
    }

    /// Return the user's cart, persisting an empty one on first access
    pub async fn get_or_create(&self, user: &RecordId) -> RepoResult<Cart> {
        if let Some(cart) = self.find_by_user(user).await? {
            return Ok(cart);
        }
        self.save(Cart::empty(user.clone())).await
    }

    /// Additive merge of one line into the user's cart
    pub async fn add_item(&self, user: &RecordId, product: RecordId, quantity: u32) -> RepoResult<Cart> {
        let mut cart = self
            .find_by_user(user)
            .await?
            .unwrap_or_else(|| Cart::empty(user.clone()));
        cart.add_item(product, quantity);
        self.save(cart).await
    }

    /// Remove one line from the user's cart; absent lines are a no-op.
    /// A missing cart is treated as the empty cart.
    pub async fn remove_item(&self, user: &RecordId, product: &RecordId) -> RepoResult<Cart> {
        let mut cart = self
            .find_by_user(user)
            .await?
            .unwrap_or_else(|| Cart::empty(user.clone()));
        cart.remove_item(product);
        self.save(cart).await
    }

    /// Drop the user's cart entirely (successful checkout)
    pub async fn delete_for_user(&self, user: &RecordId) -> RepoResult<()> {
        let _: Option<Cart> = self.base.db().delete(Self::cart_id(user)).await?;
        Ok(())
    }

    /// Upsert the cart document under its fixed per-user key
    async fn save(&self, cart: Cart) -> RepoResult<Cart> {
        let thing = Self::cart_id(&cart.user);
        let mut result = self
            .base
            .db()
            .query("UPSERT $thing SET userId = $user, items = $items RETURN AFTER")
            .bind(("thing", thing))
            .bind(("user", cart.user.to_string()))
            .bind(("items", serde_json::to_value(&cart.items).unwrap_or_default()))
            .await?;
        let saved: Vec<Cart> = result.take(0)?;
        saved
            .into_iter()
            .next()
            .ok_or_else(|| super::RepoError::Database("Failed to save cart".to_string()))
    }
}
