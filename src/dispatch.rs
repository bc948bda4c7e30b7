//! Dispatch server: the gRPC endpoints agents talk to.
//!
//! `AssignTasks` is server-streaming: each connected agent gets its own
//! loop that leases tasks and pushes them down the stream, sleeping 100 ms
//! between polls when the queue is empty. A disconnect surfaces as a
//! failed send and ends the loop; the lease itself is left for the expiry
//! sweep to reclaim. `SubmitTask` is the unary ingest path.
//!
//! Backpressure is the channel: a slow agent blocks `send`, which stops
//! that loop from leasing further tasks without affecting other agents.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::TimeZone;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::model::LeasedTask;
use crate::rpc::dispatch_server::{Dispatch, DispatchServer};
use crate::rpc::{AssignTasksRequest, SubmitTaskRequest, SubmitTaskResponse, Task as TaskProto};
use crate::service::{Scheduler, ServiceError};

/// How long a dispatch loop sleeps when no task is eligible. Bounds the
/// database poll rate per connected agent.
const IDLE_POLL: Duration = Duration::from_millis(100);

pub struct DispatchService {
    scheduler: Arc<Scheduler>,
}

impl DispatchService {
    pub fn new(scheduler: Arc<Scheduler>) -> Self {
        DispatchService { scheduler }
    }
}

fn task_to_proto(task: &LeasedTask) -> TaskProto {
    TaskProto {
        id: task.id.to_string(),
        expression_id: task.expression_id.to_string(),
        arg1_num: task.arg1,
        arg2_num: task.arg2,
        operator: task.operator.clone(),
        operation_time: Some(prost_types::Timestamp {
            seconds: task.operation_time.timestamp(),
            nanos: task.operation_time.timestamp_subsec_nanos() as i32,
        }),
        final_task: task.final_task,
    }
}

/// Decode a proto timestamp; `None` and out-of-range values become `None`.
pub fn proto_timestamp_to_utc(
    ts: Option<&prost_types::Timestamp>,
) -> Option<chrono::DateTime<chrono::Utc>> {
    let ts = ts?;
    chrono::Utc
        .timestamp_opt(ts.seconds, ts.nanos.max(0) as u32)
        .single()
}

fn lease_error_status(err: &ServiceError) -> Status {
    match err {
        ServiceError::Unavailable => Status::unavailable("server is unavailable"),
        _ => Status::internal("failed to get task"),
    }
}

#[tonic::async_trait]
impl Dispatch for DispatchService {
    type AssignTasksStream = ReceiverStream<Result<TaskProto, Status>>;

    async fn assign_tasks(
        &self,
        _request: Request<AssignTasksRequest>,
    ) -> Result<Response<Self::AssignTasksStream>, Status> {
        let scheduler = Arc::clone(&self.scheduler);
        let (tx, rx) = mpsc::channel(1);

        tokio::spawn(async move {
            loop {
                match scheduler.lease_task().await {
                    Ok(Some(task)) => {
                        debug!(task_id = %task.id, operator = %task.operator, "dispatching task");
                        if tx.send(Ok(task_to_proto(&task))).await.is_err() {
                            // Agent is gone. The lease stays in place; the
                            // expiry sweep will hand the task to someone else.
                            break;
                        }
                    }
                    Ok(None) => {
                        tokio::select! {
                            _ = tx.closed() => break,
                            _ = tokio::time::sleep(IDLE_POLL) => {}
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "lease failed, closing dispatch stream");
                        let _ = tx.send(Err(lease_error_status(&e))).await;
                        break;
                    }
                }
            }
        });

        Ok(Response::new(ReceiverStream::new(rx)))
    }

    async fn submit_task(
        &self,
        request: Request<SubmitTaskRequest>,
    ) -> Result<Response<SubmitTaskResponse>, Status> {
        let request = request.into_inner();
        let task = request
            .task
            .ok_or_else(|| Status::invalid_argument("task required"))?;

        let task_id = Uuid::parse_str(&task.id)
            .map_err(|_| Status::invalid_argument("invalid task id"))?;
        let expression_id = Uuid::parse_str(&task.expression_id)
            .map_err(|_| Status::invalid_argument("invalid expression id"))?;

        match self
            .scheduler
            .submit_result(task_id, expression_id, request.result, task.final_task)
            .await
        {
            Ok(()) => Ok(Response::new(SubmitTaskResponse {})),
            Err(ServiceError::Unavailable) => Err(Status::unavailable("server is unavailable")),
            Err(ServiceError::UnknownTask) => Err(Status::not_found("task id not found")),
            Err(e) => {
                warn!(task_id = %task_id, error = %e, "failed to set task result");
                Err(Status::internal("failed to set result"))
            }
        }
    }
}

/// Serve the dispatch service on `addr` until the process shuts down.
pub async fn serve(scheduler: Arc<Scheduler>, addr: SocketAddr) -> anyhow::Result<()> {
    info!(%addr, "dispatch server listening");
    tonic::transport::Server::builder()
        .add_service(DispatchServer::new(DispatchService::new(scheduler)))
        .serve(addr)
        .await?;
    Ok(())
}

/// Serve on an already-bound listener. Used by integration tests that need
/// an ephemeral port.
pub async fn serve_with_listener(
    scheduler: Arc<Scheduler>,
    listener: tokio::net::TcpListener,
) -> anyhow::Result<()> {
    let incoming = tokio_stream::wrappers::TcpListenerStream::new(listener);
    tonic::transport::Server::builder()
        .add_service(DispatchServer::new(DispatchService::new(scheduler)))
        .serve_with_incoming(incoming)
        .await?;
    Ok(())
}
