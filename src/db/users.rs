//! User account operations: registration and credential checks.

use uuid::Uuid;

use super::error::{is_unique_violation, StoreError};
use super::Database;
use crate::auth;

impl Database {
    /// Insert a new user with an already-hashed password, returning its id.
    pub async fn create_user(&self, login: &str, password_hash: &str) -> Result<Uuid, StoreError> {
        let id: Uuid = sqlx::query_scalar(
            "INSERT INTO users (id, login, password_hash) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(Uuid::new_v4())
        .bind(login)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::UserAlreadyExists
            } else {
                StoreError::from(e)
            }
        })?;
        Ok(id)
    }

    /// Check a login/password pair, returning the user id on success.
    pub async fn auth_user(&self, login: &str, password: &str) -> Result<Uuid, StoreError> {
        let row: Option<(Uuid, String)> =
            sqlx::query_as("SELECT id, password_hash FROM users WHERE login = $1")
                .bind(login)
                .fetch_optional(&self.pool)
                .await?;

        let (id, password_hash) = row.ok_or(StoreError::UserNotFound)?;
        if !auth::verify_password(password, &password_hash) {
            return Err(StoreError::InvalidPassword);
        }
        Ok(id)
    }

    /// Whether a user row with this id exists.
    pub async fn user_exists(&self, user_id: Uuid) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }
}
