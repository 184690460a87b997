use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use index::IndexError;
use serde_json::json;
use std::time::Duration;

/// Errors surfaced by the HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("request exceeded deadline of {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<IndexError>() {
            Ok(index_err) => ApiError::Index(index_err),
            Err(other) => ApiError::Internal(other),
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Index(IndexError::InvalidArgument(_)) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Index(IndexError::CollectionNotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Index(IndexError::Unavailable { .. }) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Index(IndexError::Backend { .. }) => StatusCode::BAD_GATEWAY,
            ApiError::Index(IndexError::DimensionMismatch { .. }) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "Request failed");
        } else {
            tracing::warn!(error = %self, status = status.as_u16(), "Request rejected");
        }

        let body = Json(json!({
            "error": format!("{:#}", self),
            "status": status.as_u16(),
        }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ApiError::from(IndexError::InvalidArgument("x".into())), 400),
            (ApiError::from(IndexError::CollectionNotFound("c".into())), 404),
            (ApiError::from(IndexError::unavailable("qdrant", "down")), 503),
            (ApiError::from(IndexError::backend("qdrant", "bad json")), 502),
            (
                ApiError::from(IndexError::DimensionMismatch {
                    expected: 3,
                    actual: 4,
                }),
                500,
            ),
            (ApiError::Timeout(Duration::from_secs(1)), 504),
            (ApiError::BadRequest("empty".into()), 400),
        ];

        for (err, status) in cases {
            assert_eq!(err.status().as_u16(), status, "{err}");
        }
    }

    #[test]
    fn test_anyhow_wrapping_keeps_index_errors() {
        let err = anyhow::Error::from(IndexError::CollectionNotFound("c".into()));
        assert_eq!(ApiError::from(err).status(), StatusCode::NOT_FOUND);

        let other = anyhow::anyhow!("llm exploded");
        assert_eq!(ApiError::from(other).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
