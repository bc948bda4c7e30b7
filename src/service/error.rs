//! User-facing error kinds and the store→service translation.

use thiserror::Error;

use crate::db::StoreError;
use crate::validate::ExpressionError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Expression(#[from] ExpressionError),
    #[error("unknown user id")]
    UnknownUser,
    #[error("unknown expression id")]
    UnknownExpression,
    #[error("unknown task id")]
    UnknownTask,
    #[error("you do not have access to this resource")]
    Forbidden,
    #[error("user with this login already exists")]
    UserAlreadyExists,
    #[error("user with this login does not exist")]
    UserNotFound,
    #[error("login must be 1-31 characters long")]
    InvalidLogin,
    #[error("invalid password")]
    InvalidPassword,
    #[error("password must contain upper and lower case letters, a digit, a special character, and be 8-25 characters long")]
    WeakPassword,
    #[error("database is unavailable")]
    Unavailable,
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UserAlreadyExists => ServiceError::UserAlreadyExists,
            StoreError::UserNotFound => ServiceError::UserNotFound,
            StoreError::InvalidPassword => ServiceError::InvalidPassword,
            StoreError::UnknownUser => ServiceError::UnknownUser,
            StoreError::UnknownExpression => ServiceError::UnknownExpression,
            StoreError::UnknownTask => ServiceError::UnknownTask,
            StoreError::Unavailable => ServiceError::Unavailable,
            other => ServiceError::Internal(anyhow::Error::new(other)),
        }
    }
}
