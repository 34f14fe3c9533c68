use crate::modules::{
    handlers::{error_response, ErrorResponse, ValidatedQuery},
    stats::{summarize, ProblemSolvingSummary},
    store::{Store, StoreError},
    sync::SyncOrchestrator,
};
use crate::types::tables::{ContestRecord, Student};
use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::UNIX_EPOCH};
use validator::Validate;

#[derive(Debug, Default, Serialize, Deserialize, Validate, PartialEq, Eq, Clone)]
pub struct WindowParameter {
    #[validate(range(min = 1, max = 3650))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days: Option<i64>,
}

impl WindowParameter {
    fn since(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.days.map(|days| now - Duration::days(days))
    }
}

#[derive(Debug, Deserialize)]
pub struct HandleUpdate {
    pub handle: Option<String>,
}

fn store_error(e: StoreError) -> ErrorResponse {
    match e {
        StoreError::StudentNotFound(_) => error_response(StatusCode::NOT_FOUND, e.to_string()),
        StoreError::HandleTaken(_) => error_response(StatusCode::CONFLICT, e.to_string()),
        StoreError::Database(_) => {
            tracing::error!("request failed cause: {:?}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "unexpected error")
        }
    }
}

async fn existing_student(store: &dyn Store, student_id: i64) -> Result<Student, ErrorResponse> {
    store
        .find_student(student_id)
        .await
        .map_err(store_error)?
        .ok_or_else(|| store_error(StoreError::StudentNotFound(student_id)))
}

pub async fn list_students(
    Extension(store): Extension<Arc<dyn Store>>,
) -> Result<Json<Vec<Student>>, ErrorResponse> {
    let students = store.list_students().await.map_err(store_error)?;
    Ok(Json(students))
}

pub async fn get_student(
    Path(student_id): Path<i64>,
    Extension(store): Extension<Arc<dyn Store>>,
) -> Result<Json<Student>, ErrorResponse> {
    let student = existing_student(store.as_ref(), student_id).await?;
    Ok(Json(student))
}

/// Binds a new handle and returns the student after the follow-up sync.
pub async fn update_handle(
    Path(student_id): Path<i64>,
    Extension(store): Extension<Arc<dyn Store>>,
    Extension(orchestrator): Extension<Arc<SyncOrchestrator>>,
    Json(body): Json<HandleUpdate>,
) -> Result<Json<Student>, ErrorResponse> {
    orchestrator
        .rebind_handle(student_id, body.handle.as_deref())
        .await
        .map_err(store_error)?;

    let student = existing_student(store.as_ref(), student_id).await?;
    Ok(Json(student))
}

pub async fn contest_history(
    Path(student_id): Path<i64>,
    ValidatedQuery(params): ValidatedQuery<WindowParameter>,
    Extension(store): Extension<Arc<dyn Store>>,
) -> Result<Json<Vec<ContestRecord>>, ErrorResponse> {
    existing_student(store.as_ref(), student_id).await?;

    let contests = store
        .contests_since(student_id, params.since(Utc::now()))
        .await
        .map_err(store_error)?;
    Ok(Json(contests))
}

pub async fn problem_solving_data(
    Path(student_id): Path<i64>,
    ValidatedQuery(params): ValidatedQuery<WindowParameter>,
    Extension(store): Extension<Arc<dyn Store>>,
) -> Result<Json<ProblemSolvingSummary>, ErrorResponse> {
    existing_student(store.as_ref(), student_id).await?;

    let now = Utc::now();
    let since = params.since(now);
    let submissions = store
        .accepted_submissions_since(student_id, since)
        .await
        .map_err(store_error)?;

    // without a window the average covers everything since the epoch
    let since = since.unwrap_or_else(|| DateTime::<Utc>::from(UNIX_EPOCH));
    Ok(Json(summarize(&submissions, since, now)))
}
