//! Registration and login: credential rules, store calls, token issuance.

use anyhow::Context;

use super::ServiceError;
use crate::auth::{self, JwtManager};
use crate::db::Database;

pub struct Accounts {
    db: Database,
    jwt: JwtManager,
}

impl Accounts {
    pub fn new(db: Database, jwt: JwtManager) -> Self {
        Accounts { db, jwt }
    }

    /// Create an account and return a signed token for it.
    pub async fn register(&self, login: &str, password: &str) -> Result<String, ServiceError> {
        if !auth::is_valid_login(login) {
            return Err(ServiceError::InvalidLogin);
        }
        if !auth::is_valid_password(password) {
            return Err(ServiceError::WeakPassword);
        }

        let password_hash = auth::hash_password(password).context("failed to hash password")?;
        let user_id = self.db.create_user(login, &password_hash).await?;
        let token = self
            .jwt
            .generate(user_id)
            .context("failed to generate token")?;
        Ok(token)
    }

    /// Check credentials and return a fresh token.
    pub async fn authenticate(&self, login: &str, password: &str) -> Result<String, ServiceError> {
        if !auth::is_valid_login(login) {
            return Err(ServiceError::InvalidLogin);
        }

        let user_id = self.db.auth_user(login, password).await?;
        let token = self
            .jwt
            .generate(user_id)
            .context("failed to generate token")?;
        Ok(token)
    }
}
