//! Bearer-token auth: HS256 JWT issuance/verification and bcrypt password
//! hashing, plus the login/password acceptance rules used at registration.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid token: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
    #[error("invalid user_id claim")]
    InvalidUserId,
    #[error("failed to hash password: {0}")]
    Hash(#[from] bcrypt::BcryptError),
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    user_id: String,
    iat: i64,
    exp: i64,
}

/// Issues and verifies the symmetric HS256 tokens carried by API clients.
#[derive(Clone)]
pub struct JwtManager {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl JwtManager {
    pub fn new(secret: &[u8], ttl: std::time::Duration) -> Self {
        JwtManager {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl: Duration::from_std(ttl).unwrap_or_else(|_| Duration::seconds(3600)),
        }
    }

    /// Sign a token for `user_id`, valid for the configured TTL.
    pub fn generate(&self, user_id: Uuid) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            user_id: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }

    /// Verify signature and expiry, returning the embedded user id.
    pub fn parse(&self, token: &str) -> Result<Uuid, AuthError> {
        let validation = Validation::new(Algorithm::HS256);
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        Uuid::parse_str(&data.claims.user_id).map_err(|_| AuthError::InvalidUserId)
    }
}

/// Hash a password with bcrypt at the default cost.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    Ok(bcrypt::hash(password, bcrypt::DEFAULT_COST)?)
}

/// Check a password against a stored bcrypt hash.
pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

/// Logins are opaque identifiers capped at 31 characters.
pub fn is_valid_login(login: &str) -> bool {
    !login.is_empty() && login.len() < 32
}

/// Passwords must be 8..=25 characters with an upper- and lower-case
/// letter, a digit, and one of `!@#$%?&*`.
pub fn is_valid_password(password: &str) -> bool {
    let len = password.chars().count();
    if !(8..=25).contains(&len) {
        return false;
    }

    let mut has_upper = false;
    let mut has_lower = false;
    let mut has_digit = false;
    let mut has_special = false;
    for c in password.chars() {
        if c.is_uppercase() {
            has_upper = true;
        } else if c.is_lowercase() {
            has_lower = true;
        } else if c.is_ascii_digit() {
            has_digit = true;
        } else if "!@#$%?&*".contains(c) {
            has_special = true;
        }
    }
    has_upper && has_lower && has_digit && has_special
}
