use std::any::Any;

use axum::response::{IntoResponse as _, Response};
use tracing::error;

use crate::api::error::PageError;
use crate::api::login::SessionUser;
use crate::api::templates::{AboutTemplate, RulesTemplate, render};

pub async fn about(session_user: SessionUser) -> Result<Response, PageError> {
    render(&AboutTemplate {
        page: session_user.page().await?,
    })
}

pub async fn rules(session_user: SessionUser) -> Result<Response, PageError> {
    render(&RulesTemplate {
        page: session_user.page().await?,
    })
}

pub async fn not_found() -> PageError {
    PageError::NotFound
}

/// Used by `CatchPanicLayer`, the panic itself is already logged by the panic hook.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic payload");
    error!("handler panicked: {message}");
    PageError::Server.into_response()
}
