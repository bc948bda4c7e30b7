//! Task queue operations: transactional creation, leasing, result merge,
//! and expiry recovery.
//!
//! ## Lifecycle
//!
//! 1. `create_expression_with_tasks` — expression + all tasks in one
//!    transaction.
//! 2. Dispatch loops call `lease_task` to atomically grab the oldest
//!    eligible task (`FOR UPDATE SKIP LOCKED` keeps N concurrent loops
//!    from double-leasing without any application-level mutex).
//! 3. `submit_result` either substitutes the value into every dependent
//!    task (non-final) or writes the expression result (final); both
//!    branches delete the completed task in the same transaction.
//! 4. `reset_expired_tasks` reclaims leases from crashed or stalled
//!    agents (runs on the scheduler's sweep interval).

use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use super::error::is_foreign_key_violation;
use super::{Database, StoreError};
use crate::model::{expr_status, task_status, Expression, LeasedTask, Operator, Task};

impl Database {
    /// Insert the expression and all of its tasks in a single transaction.
    /// Fails with `UnknownUser` on an owner FK violation.
    pub async fn create_expression_with_tasks(
        &self,
        expression: &Expression,
        tasks: &[Task],
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO expressions (id, user_id, expression, status, result)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(expression.id)
        .bind(expression.user_id)
        .bind(&expression.expression)
        .bind(&expression.status)
        .bind(expression.result)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                StoreError::UnknownUser
            } else {
                StoreError::from(e)
            }
        })?;

        for task in tasks {
            sqlx::query(
                "INSERT INTO tasks
                     (id, expression_id, arg1_value, arg1_task_id,
                      arg2_value, arg2_task_id, operator, final_task, status)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            )
            .bind(task.id)
            .bind(task.expression_id)
            .bind(task.arg1.value)
            .bind(task.arg1.task_id)
            .bind(task.arg2.value)
            .bind(task.arg2.task_id)
            .bind(task.operator.as_str())
            .bind(task.final_task)
            .bind(task_status::PENDING)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Atomically lease the oldest eligible task, or return `None` when the
    /// queue is empty.
    ///
    /// A task is eligible iff it is pending and both operands are literal
    /// (no unresolved back-references). The row lock taken by
    /// `FOR UPDATE SKIP LOCKED` makes the select-then-update race-free
    /// under any number of concurrent dispatch loops; the owning
    /// expression transitions to `in_progress`, and the task's
    /// `operation_time` becomes the lease deadline `now + duration_for(op)`.
    pub async fn lease_task(
        &self,
        duration_for: impl Fn(Operator) -> Duration,
    ) -> Result<Option<LeasedTask>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let row: Option<(Uuid, Uuid, f64, f64, String, bool)> = sqlx::query_as(
            "SELECT id, expression_id, arg1_value, arg2_value, operator, final_task
             FROM tasks
             WHERE status = 'pending'
               AND arg1_task_id IS NULL
               AND arg2_task_id IS NULL
             ORDER BY created_at
             FOR UPDATE SKIP LOCKED
             LIMIT 1",
        )
        .fetch_optional(&mut *tx)
        .await?;

        let Some((id, expression_id, arg1, arg2, operator, final_task)) = row else {
            return Ok(None);
        };

        sqlx::query("UPDATE expressions SET status = $1 WHERE id = $2 AND status <> $1")
            .bind(expr_status::IN_PROGRESS)
            .bind(expression_id)
            .execute(&mut *tx)
            .await?;

        let op = Operator::from_str(&operator).ok_or(StoreError::InvalidTask)?;
        let deadline = Utc::now()
            + chrono::Duration::from_std(duration_for(op)).map_err(|_| StoreError::InvalidTask)?;

        sqlx::query("UPDATE tasks SET status = $1, operation_time = $2 WHERE id = $3")
            .bind(task_status::IN_PROGRESS)
            .bind(deadline)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(Some(LeasedTask {
            id,
            expression_id,
            arg1,
            arg2,
            operator,
            operation_time: deadline,
            final_task,
        }))
    }

    /// Merge a completed task's result, in one transaction.
    ///
    /// Final task: delete the task row, then write the owning expression's
    /// result and mark it done. Non-final: substitute the value into every
    /// task whose `arg1`/`arg2` back-references the completed task
    /// (clearing the reference makes those tasks lease-eligible the moment
    /// this commits — no wake-up signal needed), then delete the source
    /// row. The update must precede the delete: the FK's ON DELETE SET
    /// NULL would otherwise clear the references without substituting.
    pub async fn submit_result(
        &self,
        task_id: Uuid,
        expression_id: Uuid,
        result: f64,
        is_final: bool,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        if is_final {
            let deleted = sqlx::query("DELETE FROM tasks WHERE id = $1")
                .bind(task_id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
            if deleted == 0 {
                return Err(StoreError::UnknownTask);
            }

            let updated = sqlx::query(
                "UPDATE expressions SET result = $1, status = $2 WHERE id = $3",
            )
            .bind(result)
            .bind(expr_status::DONE)
            .bind(expression_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
            if updated == 0 {
                return Err(StoreError::UnknownExpression);
            }
        } else {
            let updated = sqlx::query(
                "UPDATE tasks
                 SET arg1_value   = CASE WHEN arg1_task_id = $1 THEN $2 ELSE arg1_value END,
                     arg1_task_id = CASE WHEN arg1_task_id = $1 THEN NULL ELSE arg1_task_id END,
                     arg2_value   = CASE WHEN arg2_task_id = $1 THEN $2 ELSE arg2_value END,
                     arg2_task_id = CASE WHEN arg2_task_id = $1 THEN NULL ELSE arg2_task_id END
                 WHERE arg1_task_id = $1 OR arg2_task_id = $1",
            )
            .bind(task_id)
            .bind(result)
            .execute(&mut *tx)
            .await?
            .rows_affected();
            if updated == 0 {
                return Err(StoreError::UnknownTaskDependency);
            }

            let deleted = sqlx::query("DELETE FROM tasks WHERE id = $1")
                .bind(task_id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
            if deleted == 0 {
                return Err(StoreError::UnknownTask);
            }
        }

        tx.commit().await?;
        Ok(())
    }

    /// Flip leases whose deadline is more than `delay` in the past back to
    /// pending, returning how many were reclaimed. Idempotent; this is the
    /// only recovery path for crashed or stalled agents.
    pub async fn reset_expired_tasks(&self, delay: Duration) -> Result<u64, StoreError> {
        let cutoff =
            Utc::now() - chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::zero());
        let reset = sqlx::query(
            "UPDATE tasks SET status = 'pending'
             WHERE status <> 'pending' AND operation_time < $1",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(reset)
    }
}
