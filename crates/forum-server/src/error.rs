use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use forum_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Validation(_) => StatusCode::BAD_REQUEST,
            ServerError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ServerError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::Conflict(_) => StatusCode::CONFLICT,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show a client. Internal details only go to the log.
    pub fn public_message(&self) -> String {
        match self {
            ServerError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<StoreError> for ServerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(entity) => ServerError::NotFound(format!("{entity} not found")),
            StoreError::Forbidden(msg) => ServerError::Forbidden(msg),
            StoreError::Validation(msg) => ServerError::Validation(msg),
            StoreError::Conflict(msg) => ServerError::Conflict(msg),
            other => ServerError::Internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ServerError {
    fn from(rejection: JsonRejection) -> Self {
        ServerError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ServerError {
    fn from(rejection: QueryRejection) -> Self {
        ServerError::Validation(rejection.body_text())
    }
}

/// Ids are opaque to callers: one that does not parse matches nothing.
impl From<PathRejection> for ServerError {
    fn from(rejection: PathRejection) -> Self {
        match rejection {
            PathRejection::FailedToDeserializePathParams(_) => {
                ServerError::NotFound("resource not found".into())
            }
            other => ServerError::Internal(other.body_text()),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        if let ServerError::Internal(detail) = &self {
            tracing::error!(error = %detail, "request failed");
        }

        let body = serde_json::json!({
            "error": self.public_message(),
        });

        (self.status(), axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_map_one_to_one() {
        let cases = [
            (StoreError::NotFound("thread"), StatusCode::NOT_FOUND),
            (StoreError::Forbidden("no".into()), StatusCode::FORBIDDEN),
            (StoreError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (StoreError::Conflict("dup".into()), StatusCode::CONFLICT),
            (StoreError::Migration("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (store_err, status) in cases {
            assert_eq!(ServerError::from(store_err).status(), status);
        }
    }

    #[test]
    fn test_internal_detail_hidden() {
        let err = ServerError::from(StoreError::Migration("disk on fire".into()));
        assert_eq!(err.public_message(), "Internal server error");
        assert_eq!(
            ServerError::from(StoreError::NotFound("reply")).public_message(),
            "reply not found"
        );
    }
}
