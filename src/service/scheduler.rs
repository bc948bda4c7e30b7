//! Expression and task policy around the store.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use uuid::Uuid;

use super::ServiceError;
use crate::config::OperationTimes;
use crate::db::{Database, StoreError};
use crate::model::{Expression, LeasedTask};
use crate::planner;
use crate::validate;

/// Policy layer between the transports and the task store. Owns the
/// operator-duration table used to stamp lease deadlines.
pub struct Scheduler {
    db: Database,
    operation_times: OperationTimes,
}

impl Scheduler {
    pub fn new(db: Database, operation_times: OperationTimes) -> Arc<Self> {
        Arc::new(Scheduler {
            db,
            operation_times,
        })
    }

    /// Validate and plan an expression, then persist it with its tasks in
    /// one transaction. Returns the expression id the client polls for.
    pub async fn create_expression_task(
        &self,
        user_id: Uuid,
        expression: &str,
    ) -> Result<Uuid, ServiceError> {
        validate::validate(expression)?;
        let plan = planner::plan(user_id, expression)?;
        let id = plan.expression.id;
        self.db
            .create_expression_with_tasks(&plan.expression, &plan.tasks)
            .await?;
        Ok(id)
    }

    pub async fn get_all_expressions(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<Expression>, ServiceError> {
        Ok(self.db.get_all_expressions(user_id).await?)
    }

    /// Fetch one expression, rejecting callers that do not own it.
    pub async fn get_expression_by_id(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Expression, ServiceError> {
        let expression = self.db.get_expression_by_id(id).await?;
        if expression.user_id != user_id {
            return Err(ServiceError::Forbidden);
        }
        Ok(expression)
    }

    /// Lease the oldest eligible task, stamping its deadline from the
    /// configured per-operator durations.
    pub async fn lease_task(&self) -> Result<Option<LeasedTask>, ServiceError> {
        let times = self.operation_times;
        Ok(self.db.lease_task(|op| times.duration_for(op)).await?)
    }

    /// Record a task outcome reported by an agent.
    pub async fn submit_result(
        &self,
        task_id: Uuid,
        expression_id: Uuid,
        result: f64,
        is_final: bool,
    ) -> Result<(), ServiceError> {
        self.db
            .submit_result(task_id, expression_id, result, is_final)
            .await?;
        Ok(())
    }

    /// Launch the expiry sweep: every `interval`, leases whose deadline is
    /// more than `grace_delay` past are flipped back to pending. An
    /// unavailable database skips the tick quietly (the connection monitor
    /// is already reporting the outage); any other error is logged and the
    /// sweep continues. The task runs until aborted at shutdown.
    pub fn start_expired_task_reset(
        self: &Arc<Self>,
        interval: Duration,
        grace_delay: Duration,
    ) -> tokio::task::JoinHandle<()> {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match scheduler.db.reset_expired_tasks(grace_delay).await {
                    Ok(n) if n > 0 => info!(count = n, "reset expired task leases"),
                    Ok(_) => {}
                    Err(StoreError::Unavailable) => {}
                    Err(e) => warn!(error = %e, "failed to reset expired tasks"),
                }
            }
        })
    }
}
