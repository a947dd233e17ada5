//! Internal-error detail policy and panic recovery.

use std::any::Any;

use axum::{
    Json,
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::AppState;
use crate::error::{AppError, InternalErrorDetail};
use crate::models::ErrorResponse;

/// Outside hardened mode, internal errors carry their detail in the body.
/// In hardened mode the client only sees the opaque message.
pub async fn error_detail(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let Some(InternalErrorDetail(detail)) = response.extensions_mut().remove::<InternalErrorDetail>()
    else {
        return response;
    };
    if state.config.is_hardened() {
        return response;
    }

    let status = response.status();
    let mut detailed = (
        status,
        Json(ErrorResponse {
            error: "internal_error".into(),
            message: "Internal server error".into(),
            detail: Some(detail),
        }),
    )
        .into_response();
    for (name, value) in response.headers() {
        if *name != axum::http::header::CONTENT_LENGTH && *name != axum::http::header::CONTENT_TYPE {
            detailed.headers_mut().insert(name.clone(), value.clone());
        }
    }
    detailed
}

/// Response for a panicking handler.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unknown panic payload".to_string()
    };
    AppError::Internal(format!("handler panicked: {message}")).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn panic_payloads_become_internal_errors() {
        let response = panic_response(Box::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let detail = response.extensions().get::<InternalErrorDetail>().unwrap();
        assert_eq!(detail.0, "handler panicked: boom");

        let response = panic_response(Box::new(String::from("bang")));
        assert_eq!(
            response.extensions().get::<InternalErrorDetail>().unwrap().0,
            "handler panicked: bang"
        );
    }
}
