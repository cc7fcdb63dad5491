//! Session bound CSRF tokens. The token is created on the first rendered page of a
//! session and every POST must echo it back in the `csrf_token` field.

use serde::Deserialize;
use tower_sessions::Session;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::api::error::PageError;

const CSRF_TOKEN_KEY: &str = "csrf_token";

/// Get or create the CSRF token of the session.
pub async fn get_csrf_token(session: &Session) -> Result<String, PageError> {
    if let Some(token) = session.get::<String>(CSRF_TOKEN_KEY).await? {
        return Ok(token);
    }
    debug!("generating new CSRF token");
    let token = Uuid::new_v4().to_string();
    session.insert(CSRF_TOKEN_KEY, &token).await?;
    Ok(token)
}

pub async fn validate_csrf_token(session: &Session, submitted: &str) -> Result<(), PageError> {
    let stored = session.get::<String>(CSRF_TOKEN_KEY).await?;
    if stored.is_some_and(|stored| !submitted.is_empty() && stored == submitted) {
        Ok(())
    } else {
        warn!("rejecting POST with a missing or stale CSRF token");
        Err(PageError::csrf_failure())
    }
}

/// Form data wrapper that carries the CSRF token next to the form fields.
#[derive(Debug, Deserialize)]
pub struct CsrfProtectedForm<T> {
    #[serde(default)]
    pub csrf_token: String,
    #[serde(flatten)]
    pub data: T,
}

impl<T> CsrfProtectedForm<T> {
    /// Unwraps the form fields once the token checks out.
    pub async fn validate(self, session: &Session) -> Result<T, PageError> {
        validate_csrf_token(session, &self.csrf_token).await?;
        Ok(self.data)
    }
}

/// Body of the POST forms that only confirm an action.
#[derive(Debug, Default, Deserialize)]
pub struct CsrfOnlyForm {
    #[serde(default)]
    pub csrf_token: String,
}
