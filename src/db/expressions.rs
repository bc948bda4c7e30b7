//! Expression lifecycle reads.

use uuid::Uuid;

use super::{Database, StoreError};
use crate::model::Expression;

impl Database {
    /// All expressions owned by `user_id`, oldest first by insertion order.
    /// Fails with `UnknownUser` if the user row does not exist.
    pub async fn get_all_expressions(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<Expression>, StoreError> {
        if !self.user_exists(user_id).await? {
            return Err(StoreError::UnknownUser);
        }

        let rows = sqlx::query_as::<_, Expression>(
            "SELECT id, user_id, expression, status, result
             FROM expressions WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// A single expression by id, regardless of owner. Ownership is
    /// enforced by the scheduler, which needs the row to compare owners.
    pub async fn get_expression_by_id(&self, id: Uuid) -> Result<Expression, StoreError> {
        let row = sqlx::query_as::<_, Expression>(
            "SELECT id, user_id, expression, status, result
             FROM expressions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.ok_or(StoreError::UnknownExpression)
    }
}
