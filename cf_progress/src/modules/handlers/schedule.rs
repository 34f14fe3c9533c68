use crate::modules::{
    handlers::{error_response, ErrorResponse},
    scheduler::{ScheduleAck, Scheduler, SchedulerState},
};
use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct ScheduleRequest {
    pub schedule: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ScheduleStatus {
    pub schedule: Option<String>,
    pub state: SchedulerState,
    pub next_run: Option<DateTime<Utc>>,
}

/// Installs a new schedule, then starts a cycle without waiting for it.
///
/// A missing or malformed expression is answered with 400 and the previous
/// schedule keeps running.
pub async fn update_schedule(
    Extension(scheduler): Extension<Arc<Scheduler>>,
    body: Result<Json<ScheduleRequest>, JsonRejection>,
) -> Result<Json<ScheduleAck>, ErrorResponse> {
    let Json(body) = body.map_err(|rejection| {
        tracing::error!("Parsing error: {}", rejection);
        error_response(
            StatusCode::BAD_REQUEST,
            format!("invalid request body: [{}]", rejection.body_text()),
        )
    })?;
    let expression = body.schedule.ok_or_else(|| {
        error_response(StatusCode::BAD_REQUEST, "schedule expression is required")
    })?;

    let ack = scheduler
        .install(&expression)
        .await
        .map_err(|e| error_response(StatusCode::BAD_REQUEST, format!("invalid schedule: {}", e)))?;

    tokio::spawn(async move { scheduler.run_now().await });

    Ok(Json(ack))
}

pub async fn get_schedule(Extension(scheduler): Extension<Arc<Scheduler>>) -> Json<ScheduleStatus> {
    Json(ScheduleStatus {
        schedule: scheduler.active_expression().await,
        state: scheduler.state().await,
        next_run: scheduler.next_run().await,
    })
}
