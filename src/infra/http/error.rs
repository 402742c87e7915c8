use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::error::ErrorReport;
use crate::application::records::RecordError;
use crate::application::repos::RepoError;

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorMessage,
}

pub mod codes {
    pub const BAD_REQUEST: &str = "bad_request";
    pub const VALIDATION: &str = "validation_failed";
    pub const NOT_FOUND: &str = "not_found";
    pub const STORE_TIMEOUT: &str = "store_timeout";
    pub const STORE: &str = "store_error";
    pub const SERIALIZATION: &str = "serialization_error";
}

#[derive(Debug, Serialize)]
pub struct ApiErrorMessage {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: &'static str,
    hint: Option<String>,
    /// Logged through the error report but never sent to the client.
    detail: Option<String>,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        code: &'static str,
        message: &'static str,
        hint: Option<String>,
    ) -> Self {
        Self {
            status,
            code,
            message,
            hint,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn bad_request(message: &'static str, hint: Option<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, codes::BAD_REQUEST, message, hint)
    }
}

impl From<RecordError> for ApiError {
    fn from(error: RecordError) -> Self {
        match error {
            RecordError::Validation { message } => Self::new(
                StatusCode::BAD_REQUEST,
                codes::VALIDATION,
                "Request validation failed",
                Some(message),
            ),
            RecordError::NotFound { entity } => Self::new(
                StatusCode::NOT_FOUND,
                codes::NOT_FOUND,
                "Record not found",
                Some(format!("{entity} not found")),
            ),
            RecordError::Backend(RepoError::Timeout) => Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                codes::STORE_TIMEOUT,
                "Store deadline exceeded",
                None,
            )
            .with_detail(RepoError::Timeout.to_string()),
            RecordError::Backend(err) => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                codes::STORE,
                "Store operation failed",
                None,
            )
            .with_detail(err.to_string()),
            RecordError::Serialization { message } => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                codes::SERIALIZATION,
                "Record could not be serialized",
                None,
            )
            .with_detail(message),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request("Malformed JSON body", Some(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let report_detail = self
            .detail
            .clone()
            .or_else(|| self.hint.clone())
            .unwrap_or_else(|| self.message.to_string());
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: self.code.to_string(),
                message: self.message.to_string(),
                hint: self.hint,
            },
        };
        let mut response = (self.status, Json(body)).into_response();
        ErrorReport::from_message(
            "infra::http::api",
            self.status,
            format!("{}: {report_detail}", self.code),
        )
        .attach(&mut response);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_errors_map_to_status_classes() {
        let cases = [
            (RecordError::validation("email is required"), StatusCode::BAD_REQUEST),
            (RecordError::NotFound { entity: "order" }, StatusCode::NOT_FOUND),
            (
                RecordError::Backend(RepoError::Timeout),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                RecordError::Backend(RepoError::from_persistence("connection reset")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                RecordError::Serialization {
                    message: "bad".into(),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(ApiError::from(error).status(), status);
        }
    }

    #[test]
    fn backend_detail_stays_out_of_the_body_but_reaches_the_report() {
        let response = ApiError::from(RecordError::Backend(RepoError::from_persistence(
            "password authentication failed",
        )))
        .into_response();
        let report = response
            .extensions()
            .get::<ErrorReport>()
            .expect("report attached");
        assert!(report.messages[0].contains("password authentication failed"));
    }
}
