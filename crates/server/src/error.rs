use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use lanehaul_db::LifecycleError;

/// HTTP-facing error taxonomy: validation 400, auth 401/403, not-found 404,
/// state conflict 409, everything else 500 with the detail kept server-side.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl From<LifecycleError> for ApiError {
    fn from(value: LifecycleError) -> Self {
        match value {
            LifecycleError::Validation(message) | LifecycleError::InvalidState(message) => {
                Self::BadRequest(message)
            }
            LifecycleError::Forbidden(message) => Self::Forbidden(message),
            LifecycleError::NotFound(message) => Self::NotFound(message),
            LifecycleError::Conflict(message) => Self::Conflict(message),
            LifecycleError::Repository(err) => Self::Internal(err.to_string()),
            LifecycleError::Database(err) => Self::Internal(err.to_string()),
        }
    }
}

impl From<lanehaul_db::RepositoryError> for ApiError {
    fn from(value: lanehaul_db::RepositoryError) -> Self {
        Self::Internal(value.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            Self::Unauthorized(message) => (StatusCode::UNAUTHORIZED, message),
            Self::Forbidden(message) => (StatusCode::FORBIDDEN, message),
            Self::NotFound(message) => (StatusCode::NOT_FOUND, message),
            Self::Conflict(message) => (StatusCode::CONFLICT, message),
            Self::Internal(detail) => {
                error!(
                    event_name = "api.internal_error",
                    error = %detail,
                    "request failed with an internal error"
                );
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An unexpected internal error occurred.".to_string(),
                )
            }
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    use lanehaul_db::LifecycleError;

    use super::ApiError;

    #[test]
    fn lifecycle_errors_map_onto_the_taxonomy() {
        let cases = [
            (LifecycleError::Validation("v".to_string()), StatusCode::BAD_REQUEST),
            (LifecycleError::InvalidState("s".to_string()), StatusCode::BAD_REQUEST),
            (LifecycleError::Forbidden("f".to_string()), StatusCode::FORBIDDEN),
            (LifecycleError::NotFound("n".to_string()), StatusCode::NOT_FOUND),
            (LifecycleError::Conflict("c".to_string()), StatusCode::CONFLICT),
        ];

        for (error, expected) in cases {
            let response = ApiError::from(error).into_response();
            assert_eq!(response.status(), expected);
        }
    }

    #[test]
    fn internal_errors_hide_their_detail() {
        let response =
            ApiError::Internal("database on fire".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
