//! User Repository

use super::{BaseRepository, RepoError, RepoResult, record_id};
use crate::db::models::User;
use chrono::Utc;
use surrealdb::Surreal;
use surrealdb::engine::local::Db;

const USER_TABLE: &str = "user";

#[derive(Clone)]
pub struct UserRepository {
    base: BaseRepository,
}

impl UserRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    /// Find a user by unique email
    pub async fn find_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let mut result = self
            .base
            .db()
            .query("SELECT * FROM user WHERE email = $email LIMIT 1")
            .bind(("email", email.to_string()))
            .await?;
        let user: Option<User> = result.take(0)?;
        Ok(user)
    }

    /// Find a user by id
    pub async fn find_by_id(&self, id: &str) -> RepoResult<Option<User>> {
        let user: Option<User> = self.base.db().select(record_id(USER_TABLE, id)).await?;
        Ok(user)
    }

    /// Create a user with an already-hashed password
    ///
    /// The password field is skipped by the model's serializer, so this
    /// writes all fields through a bound query instead of `.content()`.
    pub async fn create(
        &self,
        email: String,
        password_hash: String,
        is_admin: bool,
    ) -> RepoResult<User> {
        let mut result = self
            .base
            .db()
            .query(
                "CREATE user SET email = $email, password = $password, \
                 isAdmin = $is_admin, createdAt = $created_at",
            )
            .bind(("email", email.clone()))
            .bind(("password", password_hash))
            .bind(("is_admin", is_admin))
            .bind(("created_at", Utc::now().timestamp()))
            .await?;

        let created: Option<User> = result.take(0)?;
        created.ok_or_else(|| RepoError::Duplicate(format!("User {} already exists", email)))
    }
}
