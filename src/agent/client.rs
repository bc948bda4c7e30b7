//! Dispatch client: the agent's view of the orchestrator.
//!
//! The endpoint is injected at construction; nothing here reads process
//! globals. Cloning is cheap and shares the underlying channel, which lets
//! a worker hold one clone for the stream and another for submissions.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tonic::transport::{Channel, Endpoint};
use tonic::Status;

use crate::rpc::dispatch_client::DispatchClient as RpcClient;
use crate::rpc::{AssignTasksRequest, SubmitTaskRequest, Task as TaskProto};

/// Timeout for establishing the transport connection.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("could not connect: {0}")]
    Connect(#[from] tonic::transport::Error),
    #[error("stream receive failed: {0}")]
    Stream(#[source] Status),
    #[error("failed to submit task result: {0}")]
    Submit(#[source] Status),
    #[error("failed to start stream: {0}")]
    OpenStream(#[source] Status),
}

#[derive(Clone)]
pub struct DispatchClient {
    inner: RpcClient<Channel>,
}

impl DispatchClient {
    /// Connect to the dispatch server at `host:port`.
    pub async fn connect(host: &str, port: u16) -> Result<Self, AgentError> {
        let endpoint = Endpoint::from_shared(format!("http://{host}:{port}"))
            .map_err(AgentError::Connect)?
            .connect_timeout(CONNECT_TIMEOUT);
        let channel = endpoint.connect().await?;
        Ok(DispatchClient {
            inner: RpcClient::new(channel),
        })
    }

    /// Open the task stream and invoke `handler` on each received task
    /// until the stream ends or fails. A handler error closes the stream
    /// and is returned to the caller.
    pub async fn stream_tasks<F, Fut>(&mut self, mut handler: F) -> Result<(), AgentError>
    where
        F: FnMut(TaskProto) -> Fut,
        Fut: Future<Output = Result<(), AgentError>>,
    {
        let mut stream = self
            .inner
            .assign_tasks(AssignTasksRequest {})
            .await
            .map_err(AgentError::OpenStream)?
            .into_inner();

        loop {
            match stream.message().await {
                Ok(Some(task)) => handler(task).await?,
                Ok(None) => return Ok(()),
                Err(status) => return Err(AgentError::Stream(status)),
            }
        }
    }

    /// Report a computed result for a task.
    pub async fn submit_result(&mut self, task: TaskProto, result: f64) -> Result<(), AgentError> {
        self.inner
            .submit_task(SubmitTaskRequest {
                task: Some(task),
                result,
            })
            .await
            .map_err(AgentError::Submit)?;
        Ok(())
    }
}
