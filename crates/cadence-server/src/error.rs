use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use cadence_core::error::CoreError;
use thiserror::Error;

use crate::dto::ApiResponse;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Missing or malformed X-User-Id header")]
    Unauthenticated,

    #[error("Invalid admin token")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Core(CoreError::Validation(_) | CoreError::InvalidInput(_)) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Core(CoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Core(CoreError::Conflict(_)) => StatusCode::CONFLICT,
            ApiError::Core(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Unauthenticated | ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match self {
            ApiError::Core(CoreError::Validation(errors)) => {
                ApiResponse::failure("Validation failed", Some(errors.0))
            }
            ApiError::Core(ref e) if status == StatusCode::INTERNAL_SERVER_ERROR => {
                tracing::error!(error = %e, "request failed");
                ApiResponse::failure("Internal server error", None)
            }
            other => ApiResponse::failure(other.to_string(), None),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::validation::ValidationErrors;
    use rstest::rstest;

    #[rstest]
    #[case(ApiError::Core(CoreError::NotFound("x".into())), StatusCode::NOT_FOUND)]
    #[case(ApiError::Core(CoreError::Conflict("x".into())), StatusCode::CONFLICT)]
    #[case(ApiError::Core(CoreError::InvalidInput("x".into())), StatusCode::BAD_REQUEST)]
    #[case(ApiError::Core(CoreError::Validation(ValidationErrors::default())), StatusCode::BAD_REQUEST)]
    #[case(ApiError::Core(CoreError::CorruptRecord { id: uuid::Uuid::nil(), reason: "x".into() }), StatusCode::INTERNAL_SERVER_ERROR)]
    #[case(ApiError::Unauthenticated, StatusCode::UNAUTHORIZED)]
    #[case(ApiError::Forbidden("off".into()), StatusCode::FORBIDDEN)]
    fn maps_errors_to_status(#[case] error: ApiError, #[case] expected: StatusCode) {
        assert_eq!(error.into_response().status(), expected);
    }
}
