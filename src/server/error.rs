//! Mapping of [`ServiceError`] onto HTTP responses.

use crate::error::{ErrorClass, ServiceError};
use axum::{
    body::Body,
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{debug, error};

const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// Detail of a 500, kept out of the body unless the server runs in development.
#[derive(Debug, Clone)]
pub struct ErrorDetail(pub String);

impl ErrorClass {
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorClass::Validation | ErrorClass::Conflict => StatusCode::BAD_REQUEST,
            ErrorClass::NotFound => StatusCode::NOT_FOUND,
            ErrorClass::Auth => StatusCode::UNAUTHORIZED,
            ErrorClass::Forbidden => StatusCode::FORBIDDEN,
            ErrorClass::Upstream => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Class of a non-2xx response that was not produced by a [`ServiceError`].
    pub fn from_status(status: StatusCode) -> ErrorClass {
        match status {
            StatusCode::UNAUTHORIZED => ErrorClass::Auth,
            StatusCode::FORBIDDEN => ErrorClass::Forbidden,
            StatusCode::NOT_FOUND => ErrorClass::NotFound,
            status if status.is_server_error() => ErrorClass::Upstream,
            _ => ErrorClass::Validation,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let class = self.class();
        let status = class.status();
        let mut response = if class == ErrorClass::Upstream {
            let detail = self.to_string();
            error!("Request failed: {}", detail);
            let mut response =
                (status, Json(json!({ "message": INTERNAL_ERROR_MESSAGE }))).into_response();
            response.extensions_mut().insert(ErrorDetail(detail));
            response
        } else {
            debug!("Request rejected ({}): {}", class.as_str(), self);
            (status, Json(json!({ "message": self.to_string() }))).into_response()
        };
        response.extensions_mut().insert(class);
        response
    }
}

/// Copies the detail of internal errors into the response body.
pub async fn expose_error_details(request: Request<Body>, next: Next) -> Response {
    let response = next.run(request).await;
    let Some(ErrorDetail(detail)) = response.extensions().get::<ErrorDetail>().cloned() else {
        return response;
    };
    let (mut parts, _) = response.into_parts();
    parts.headers.remove(axum::http::header::CONTENT_LENGTH);
    let body = json!({ "message": INTERNAL_ERROR_MESSAGE, "error": detail });
    let mut response = Json(body).into_response();
    *response.status_mut() = parts.status;
    *response.extensions_mut() = parts.extensions;
    response
}
