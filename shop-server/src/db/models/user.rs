//! User Model

use super::serde_helpers;
use serde::{Deserialize, Serialize};
use shared::UserInfo;
use surrealdb::RecordId;

/// User ID type
pub type UserId = RecordId;

/// User account
///
/// The password hash is excluded from serialization; the repository writes
/// it with an explicit bound query, and API responses go through
/// [`UserInfo`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default, with = "serde_helpers::option_record_id")]
    pub id: Option<UserId>,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    #[serde(default, deserialize_with = "serde_helpers::bool_false")]
    pub is_admin: bool,
    #[serde(default)]
    pub created_at: i64,
}

impl User {
    /// Verify password using argon2
    pub fn verify_password(&self, password: &str) -> Result<bool, argon2::password_hash::Error> {
        use argon2::{
            Argon2,
            password_hash::{PasswordHash, PasswordVerifier},
        };

        let parsed_hash = PasswordHash::new(&self.password)?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// Hash password using argon2
    pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
        use argon2::{
            Argon2,
            password_hash::{PasswordHasher, SaltString, rand_core::OsRng},
        };

        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();
        let password_hash = argon2.hash_password(password.as_bytes(), &salt)?;
        Ok(password_hash.to_string())
    }

    /// Public view of the account
    pub fn to_info(&self) -> UserInfo {
        UserInfo {
            id: self.id.as_ref().map(|t| t.to_string()).unwrap_or_default(),
            email: self.email.clone(),
            is_admin: self.is_admin,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_roundtrip() {
        let hash = User::hash_password("hunter2").expect("hash");
        let user = User {
            id: None,
            email: "a@x.com".into(),
            password: hash,
            is_admin: false,
            created_at: 0,
        };
        assert!(user.verify_password("hunter2").unwrap());
        assert!(!user.verify_password("wrong").unwrap());
    }
}
