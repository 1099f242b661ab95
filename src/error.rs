use axum::{
    extract::Request,
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

/// Domain errors. Anything not covered collapses into `Internal`, which is
/// logged server-side and presented to clients as a generic 500.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("validation failed")]
    Validation(Vec<String>),

    #[error("Email already exists")]
    Conflict,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Too many requests")]
    TooManyRequests { retry_after: u64 },

    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict => StatusCode::CONFLICT,
            ApiError::InvalidCredentials | ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short error name for the envelope, mirroring the status text.
    fn name(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "BadRequest",
            ApiError::Conflict => "Conflict",
            ApiError::InvalidCredentials | ApiError::Unauthorized => "Unauthorized",
            ApiError::TooManyRequests { .. } => "TooManyRequests",
            ApiError::Internal(_) => "InternalServerError",
        }
    }

    fn message(&self) -> ErrorMessage {
        match self {
            ApiError::Validation(messages) => ErrorMessage::Many(messages.clone()),
            ApiError::Conflict => ErrorMessage::Single("Email already exists".into()),
            ApiError::InvalidCredentials => ErrorMessage::Single("Invalid credentials".into()),
            ApiError::Unauthorized => ErrorMessage::Single("Unauthorized".into()),
            ApiError::TooManyRequests { .. } => {
                ErrorMessage::Single("Too many requests. Please try again later.".into())
            }
            ApiError::Internal(_) => ErrorMessage::Single("Internal server error".into()),
        }
    }
}

/// `message` is a single string for domain errors and an array for
/// validation failures.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ErrorMessage {
    Single(String),
    Many(Vec<String>),
}

/// Carried through response extensions so the envelope middleware, which
/// knows the request path and id, can render the final body.
#[derive(Debug, Clone)]
struct ErrorParts {
    status: StatusCode,
    message: ErrorMessage,
    error: &'static str,
    retry_after: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    status_code: u16,
    message: ErrorMessage,
    error: String,
    path: String,
    timestamp: String,
    request_id: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(source) = &self {
            tracing::error!(error = %source, "unhandled internal error");
        }
        let parts = ErrorParts {
            status: self.status(),
            message: self.message(),
            error: self.name(),
            retry_after: match self {
                ApiError::TooManyRequests { retry_after } => Some(retry_after),
                _ => None,
            },
        };
        let mut response = parts.status.into_response();
        response.extensions_mut().insert(parts);
        response
    }
}

/// Wraps every route and rewrites error responses into the uniform envelope
/// `{statusCode, message, error, path, timestamp, requestId}`.
pub async fn error_envelope(request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let mut response = next.run(request).await;

    let Some(parts) = response.extensions_mut().remove::<ErrorParts>() else {
        return response;
    };

    let timestamp = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default();
    let body = ErrorBody {
        status_code: parts.status.as_u16(),
        message: parts.message,
        error: parts.error.to_string(),
        path,
        timestamp,
        request_id,
    };

    let mut response = (parts.status, Json(body)).into_response();
    if let Some(secs) = parts.retry_after {
        if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
    }
    response
}
