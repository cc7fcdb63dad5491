use axum::extract::{FromRequestParts, Query, State};
use axum::http::request::Parts;
use axum::response::{IntoResponse as _, Redirect, Response};
use axum::Form;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{error, info};

use crate::api::csrf::{CsrfOnlyForm, CsrfProtectedForm, get_csrf_token, validate_csrf_token};
use crate::api::error::PageError;
use crate::api::templates::{
    LoggedOutTemplate, LoginTemplate, PageContext, RegistrationTemplate, render,
};
use crate::api::GlobalServerContext;
use crate::app;
use crate::app::UserId;
use crate::app::forms::{FormErrors, LoginForm, RegistrationForm};
use crate::app::login::authenticate;
use crate::app::user::{User, create_user};

const SESSION_USER_KEY: &str = "user_id";
pub const LOGIN_URL: &str = "/auth/login/";
const BAD_CREDENTIALS: &str =
    "Please enter a correct username and password. Note that both fields may be case-sensitive.";
pub const USERNAME_TAKEN: &str = "A user with that username already exists.";

/// The session of the request and the user logged into it, if any. A user that was
/// deleted or deactivated since logging in counts as anonymous.
pub struct SessionUser {
    pub session: Session,
    pub user: Option<User>,
}

impl FromRequestParts<GlobalServerContext> for SessionUser {
    type Rejection = PageError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &GlobalServerContext,
    ) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|(status, message)| {
                error!(%status, "session unavailable, is the session layer installed? {message}");
                PageError::Server
            })?;
        let user = match session.get::<UserId>(SESSION_USER_KEY).await? {
            Some(id) => state
                .store
                .user_by_id(id)
                .await?
                .filter(|user| user.is_active),
            None => None,
        };
        Ok(Self { session, user })
    }
}

impl SessionUser {
    pub fn id(&self) -> Option<UserId> {
        self.user.as_ref().map(|user| user.id)
    }

    /// Layout context for a page rendered to this user.
    pub async fn page(&self) -> Result<PageContext, PageError> {
        Ok(PageContext {
            viewer: self.user.as_ref().map(|user| user.username.clone()),
            csrf_token: get_csrf_token(&self.session).await?,
        })
    }
}

/// Sends an anonymous user to the login page, remembering where they wanted to go.
pub fn login_redirect(path: &str) -> Response {
    Redirect::to(&format!("{LOGIN_URL}?next={}", urlencoding::encode(path))).into_response()
}

/// Only same-site paths are followed after login.
fn is_local_path(next: &str) -> bool {
    next.starts_with('/') && !next.starts_with("//") && !next.contains('\\')
}

#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

pub async fn login_page(
    session_user: SessionUser,
    Query(query): Query<NextQuery>,
) -> Result<Response, PageError> {
    render(&LoginTemplate {
        page: session_user.page().await?,
        form: LoginForm {
            next: query.next.unwrap_or_default(),
            ..LoginForm::default()
        },
        errors: FormErrors::default(),
    })
}

pub async fn login(
    State(state): State<GlobalServerContext>,
    session_user: SessionUser,
    Form(form): Form<CsrfProtectedForm<LoginForm>>,
) -> Result<Response, PageError> {
    let form = form.validate(&session_user.session).await?;
    let errors = match form.clean() {
        Ok(()) => match authenticate(&*state.store, form.username.trim(), &form.password).await? {
            Some(user) => {
                let session = &session_user.session;
                session.cycle_id().await?;
                session.insert(SESSION_USER_KEY, user.id).await?;
                info!(user = %user.username, "user logged in");
                let next = if is_local_path(&form.next) {
                    form.next.as_str()
                } else {
                    "/"
                };
                return Ok(Redirect::to(next).into_response());
            }
            None => FormErrors::single(app::forms::NON_FIELD, BAD_CREDENTIALS),
        },
        Err(errors) => errors,
    };
    render(&LoginTemplate {
        page: session_user.page().await?,
        form: LoginForm {
            password: String::new(),
            ..form
        },
        errors,
    })
}

pub async fn logout(
    session_user: SessionUser,
    Form(form): Form<CsrfOnlyForm>,
) -> Result<Response, PageError> {
    validate_csrf_token(&session_user.session, &form.csrf_token).await?;
    if let Some(user) = &session_user.user {
        info!(user = %user.username, "user logged out");
    }
    session_user.session.flush().await?;
    render(&LoggedOutTemplate {
        page: PageContext::default(),
    })
}

pub async fn registration_page(session_user: SessionUser) -> Result<Response, PageError> {
    render(&RegistrationTemplate {
        page: session_user.page().await?,
        form: RegistrationForm::default(),
        errors: FormErrors::default(),
    })
}

pub async fn register(
    State(state): State<GlobalServerContext>,
    session_user: SessionUser,
    Form(form): Form<CsrfProtectedForm<RegistrationForm>>,
) -> Result<Response, PageError> {
    let form = form.validate(&session_user.session).await?;
    let errors = match form.clean() {
        Ok((username, password)) => {
            if state.store.user_by_username(&username).await?.is_some() {
                FormErrors::single("username", USERNAME_TAKEN)
            } else {
                match create_user(&*state.store, &username, "", &password, false).await {
                    Ok(user) => {
                        info!(user = %user.username, "registered new user");
                        return Ok(Redirect::to("/").into_response());
                    }
                    Err(app::Error::UsernameTaken(_)) => {
                        FormErrors::single("username", USERNAME_TAKEN)
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }
        Err(errors) => errors,
    };
    render(&RegistrationTemplate {
        page: session_user.page().await?,
        form: RegistrationForm {
            password1: String::new(),
            password2: String::new(),
            ..form
        },
        errors,
    })
}
