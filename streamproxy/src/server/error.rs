use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Errors returned by the proxy endpoints.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("Missing or invalid `url` parameter.")]
    InvalidUrl,
    #[error("Forbidden: Domain not allowed.")]
    ForbiddenDomain,
    #[error("Failed to fetch resource: {reason}")]
    Upstream { status: StatusCode, reason: String },
    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl ProxyError {
    pub fn upstream(status: StatusCode) -> Self {
        Self::Upstream {
            status,
            reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidUrl => StatusCode::BAD_REQUEST,
            Self::ForbiddenDomain => StatusCode::FORBIDDEN,
            Self::Upstream { status, .. } => *status,
            Self::Transport(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let error = match &self {
            Self::Transport(e) => {
                tracing::error!(error = %e, "Proxy error");
                "Internal Server Error".to_string()
            }
            other => other.to_string(),
        };
        (self.status(), Json(ErrorBody { error })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_of(error: ProxyError) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_error_bodies() {
        let (status, body) = body_of(ProxyError::InvalidUrl).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing or invalid `url` parameter.");

        let (status, body) = body_of(ProxyError::ForbiddenDomain).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "Forbidden: Domain not allowed.");

        let (status, body) = body_of(ProxyError::upstream(StatusCode::BAD_GATEWAY)).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "Failed to fetch resource: Bad Gateway");
    }
}
