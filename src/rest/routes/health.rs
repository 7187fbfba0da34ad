use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::warn;

use crate::AppContext;

pub async fn health(State(ctx): State<Arc<AppContext>>) -> Json<Value> {
    let uptime = ctx.started_at.elapsed().as_secs();
    // A store failure degrades the status; never report "ok" with a
    // made-up task count.
    let (status, tasks) = match ctx.storage.count_tasks().await {
        Ok(count) => ("ok", json!(count)),
        Err(e) => {
            warn!(err = %e, "health check could not reach the task store");
            ("degraded", Value::Null)
        }
    };
    Json(json!({
        "status": status,
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": uptime,
        "tasks": tasks,
    }))
}
