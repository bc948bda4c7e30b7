//! Task evaluation.
//!
//! The orchestrator stamps each lease with a completion deadline; the
//! agent sleeps until that moment before replying, which keeps the
//! operation-cost policy entirely on the orchestrator side. The
//! arithmetic itself is total: division by zero and unknown operators
//! yield NaN rather than an error, since validation already rejected such
//! expressions upstream.

use chrono::Utc;

use crate::dispatch::proto_timestamp_to_utc;
use crate::rpc::Task as TaskProto;

/// Evaluate a leased task, honoring its declared completion time.
pub async fn calculate(task: &TaskProto) -> f64 {
    if let Some(deadline) = proto_timestamp_to_utc(task.operation_time.as_ref()) {
        let now = Utc::now();
        if deadline > now {
            if let Ok(wait) = (deadline - now).to_std() {
                tokio::time::sleep(wait).await;
            }
        }
    }

    apply(&task.operator, task.arg1_num, task.arg2_num)
}

fn apply(operator: &str, arg1: f64, arg2: f64) -> f64 {
    match operator {
        "+" => arg1 + arg2,
        "-" => arg1 - arg2,
        "*" => arg1 * arg2,
        "/" => {
            if arg2 != 0.0 {
                arg1 / arg2
            } else {
                f64::NAN
            }
        }
        _ => f64::NAN,
    }
}
