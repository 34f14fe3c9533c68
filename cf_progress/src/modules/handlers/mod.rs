pub mod schedule;
pub mod student;

use crate::modules::{scheduler::Scheduler, store::Store};
use axum::{
    async_trait,
    extract::{Extension, FromRequestParts},
    http::StatusCode,
    Json,
};
use http::request::Parts;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageResponse {
    pub message: String,
}

pub type ErrorResponse = (StatusCode, Json<MessageResponse>);

pub fn error_response(status: StatusCode, message: impl Into<String>) -> ErrorResponse {
    (
        status,
        Json(MessageResponse {
            message: message.into(),
        }),
    )
}

/// Query string extractor that rejects unparsable or invalid parameters with 400.
pub struct ValidatedQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ValidatedQuery<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ErrorResponse;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let query = parts.uri.query().unwrap_or_default();
        let value: T = serde_urlencoded::from_str(query).map_err(|rejection| {
            tracing::error!("Parsing error: {}", rejection);
            error_response(
                StatusCode::BAD_REQUEST,
                format!("invalid format query string: [{}]", rejection),
            )
        })?;

        value.validate().map_err(|rejection| {
            tracing::error!("Validation error: {}", rejection);
            error_response(
                StatusCode::BAD_REQUEST,
                format!("Validation error: [{}]", rejection).replace('\n', ", "),
            )
        })?;

        Ok(ValidatedQuery(value))
    }
}

pub async fn liveness(Extension(store): Extension<Arc<dyn Store>>) -> StatusCode {
    match store.ping().await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Ready once the database answers and a schedule is installed.
pub async fn readiness(
    Extension(store): Extension<Arc<dyn Store>>,
    Extension(scheduler): Extension<Arc<Scheduler>>,
) -> StatusCode {
    let store_is_ok = store.ping().await.is_ok();
    let scheduler_is_ok = scheduler.active_expression().await.is_some();

    if store_is_ok && scheduler_is_ok {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}
