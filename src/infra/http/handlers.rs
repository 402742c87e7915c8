//! Record handlers, generic over the record type behind each route group.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::error::ErrorReport;
use crate::application::records::RecordService;
use crate::application::repos::{Document, RepoError};
use crate::domain::entities::Record;

use super::error::ApiError;
use super::state::HttpState;

#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub count: u64,
}

pub async fn create<E: Record>(
    State(service): State<RecordService<E>>,
    payload: Result<Json<E::Draft>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(draft) = payload?;
    let record = service.create(draft).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn read<E: Record>(
    State(service): State<RecordService<E>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let record = service.read(&id).await?;
    Ok(Json(record))
}

pub async fn update<E: Record>(
    State(service): State<RecordService<E>>,
    Path(id): Path<String>,
    payload: Result<Json<Document>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(fields) = payload?;
    let outcome = service.update(&id, fields).await?;
    Ok(Json(outcome))
}

pub async fn delete<E: Record>(
    State(service): State<RecordService<E>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = service.delete(&id).await?;
    Ok(Json(outcome))
}

pub async fn list<E: Record>(
    State(service): State<RecordService<E>>,
) -> Result<impl IntoResponse, ApiError> {
    let records = service.list().await?;
    Ok(Json(records))
}

pub async fn count<E: Record>(
    State(service): State<RecordService<E>>,
) -> Result<impl IntoResponse, ApiError> {
    let count = service.count().await?;
    Ok(Json(CountResponse { count }))
}

pub async fn statistics<E: Record>(
    State(service): State<RecordService<E>>,
) -> Result<impl IntoResponse, ApiError> {
    let buckets = service.monthly_statistics().await?;
    Ok(Json(buckets))
}

pub async fn health(State(state): State<HttpState>) -> Response {
    let probe = tokio::time::timeout(state.operation_timeout, state.store.health_check())
        .await
        .unwrap_or(Err(RepoError::Timeout));

    match probe {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}
