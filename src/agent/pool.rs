//! Worker pool: N independent streaming consumers.
//!
//! Each worker opens its own dispatch stream, computes every task it
//! receives, and reports the outcome. Submission failures are logged and
//! not retried here: the lease expires server-side and another worker
//! recomputes. A broken stream is closed and reopened after a short pause.

use std::time::Duration;

use tracing::{info, warn};

use super::client::DispatchClient;
use super::compute;
use crate::config::AgentConfig;

/// Pause before reconnecting after a connect or stream failure.
const RECONNECT_DELAY: Duration = Duration::from_millis(500);

/// Launch `computing_power` workers and run until the process is stopped.
pub async fn run(config: AgentConfig) -> anyhow::Result<()> {
    info!(
        workers = config.computing_power,
        orchestrator = %config.orchestrator_host,
        port = config.orchestrator_grpc_port,
        "starting agent worker pool"
    );

    let mut handles = Vec::with_capacity(config.computing_power);
    for worker in 0..config.computing_power {
        let host = config.orchestrator_host.clone();
        let port = config.orchestrator_grpc_port;
        handles.push(tokio::spawn(worker_loop(worker, host, port)));
    }

    for handle in handles {
        handle.await?;
    }
    Ok(())
}

async fn worker_loop(worker: usize, host: String, port: u16) {
    loop {
        let mut client = match DispatchClient::connect(&host, port).await {
            Ok(client) => client,
            Err(e) => {
                warn!(worker, error = %e, "failed to connect to orchestrator");
                tokio::time::sleep(RECONNECT_DELAY).await;
                continue;
            }
        };
        info!(worker, "connected to dispatch stream");

        let submit = client.clone();
        let outcome = client
            .stream_tasks(move |task| {
                let mut submit = submit.clone();
                async move {
                    let result = compute::calculate(&task).await;
                    let task_id = task.id.clone();
                    if let Err(e) = submit.submit_result(task, result).await {
                        // Not retried: the lease expires and the task is
                        // recomputed elsewhere.
                        warn!(worker, task_id = %task_id, error = %e, "failed to submit result");
                    }
                    Ok(())
                }
            })
            .await;

        match outcome {
            Ok(()) => info!(worker, "dispatch stream closed, reconnecting"),
            Err(e) => warn!(worker, error = %e, "dispatch stream failed, reconnecting"),
        }
        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}
