use askama::Template as _;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use tracing::error;

use crate::api::templates::{ForbiddenTemplate, NotFoundTemplate, PageContext, ServerErrorTemplate};
use crate::app;

pub const CSRF_FAILURE_REASON: &str = "CSRF token missing or incorrect.";

/// Failures a handler answers with one of the error pages.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PageError {
    #[error("page not found")]
    NotFound,
    #[error("forbidden: {}", reason.as_deref().unwrap_or("no reason given"))]
    Forbidden { reason: Option<String> },
    #[error("internal server error")]
    Server,
}

impl PageError {
    pub fn csrf_failure() -> Self {
        Self::Forbidden {
            reason: Some(CSRF_FAILURE_REASON.to_owned()),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            PageError::NotFound => StatusCode::NOT_FOUND,
            PageError::Forbidden { .. } => StatusCode::FORBIDDEN,
            PageError::Server => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        let status = self.status();
        let page = PageContext::default();
        let rendered = match self {
            PageError::NotFound => NotFoundTemplate { page }.render(),
            PageError::Forbidden { reason } => ForbiddenTemplate { page, reason }.render(),
            PageError::Server => ServerErrorTemplate { page }.render(),
        };
        match rendered {
            Ok(html) => (status, Html(html)).into_response(),
            Err(e) => {
                error!("failed to render {status} page {e}");
                status.into_response()
            }
        }
    }
}

impl From<app::Error> for PageError {
    fn from(e: app::Error) -> Self {
        error!("request failed {e}");
        PageError::Server
    }
}

impl From<tower_sessions::session::Error> for PageError {
    fn from(e: tower_sessions::session::Error) -> Self {
        error!("session store error {e}");
        PageError::Server
    }
}

impl From<askama::Error> for PageError {
    fn from(e: askama::Error) -> Self {
        error!("template rendering failed {e}");
        PageError::Server
    }
}
