use axum::http::StatusCode;
use axum::response::IntoResponse;

/// Error kinds surfaced to HTTP callers. Cache failures never appear here:
/// the read paths treat them as misses and fall through to the database.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Unknown world, data center, or unmarketable item.
    #[error("not found")]
    NotFound,

    /// Missing or unknown API key.
    #[error("forbidden")]
    Forbidden,

    /// Schema-invalid upload body.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Upstream cancellation or timeout.
    #[error("request cancelled")]
    Cancelled,

    /// Database failure during a read or write. Logged and surfaced; callers
    /// own retry policy.
    #[error("database error")]
    Database(#[from] sqlx::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Cancelled => StatusCode::GATEWAY_TIMEOUT,
            Self::Database(err) => {
                tracing::error!(error = %err, "database error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, self.to_string()).into_response()
    }
}
