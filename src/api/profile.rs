use axum::Form;
use axum::extract::{Path, State};
use axum::http::Uri;
use axum::response::{IntoResponse as _, Redirect, Response};
use chrono::Utc;
use tracing::info;

use crate::api::GlobalServerContext;
use crate::api::csrf::CsrfProtectedForm;
use crate::api::error::PageError;
use crate::api::login::{SessionUser, USERNAME_TAKEN, login_redirect};
use crate::api::post::{PageQuery, profile_url};
use crate::api::templates::{EditProfileTemplate, ProfileTemplate, render};
use crate::app;
use crate::app::forms::{FormErrors, ProfileForm};
use crate::app::query::{PostQuery, posts_page};

/// Everyone sees the published posts of a user, the user also sees their drafts.
pub async fn profile(
    State(state): State<GlobalServerContext>,
    session_user: SessionUser,
    Path(username): Path<String>,
    query: PageQuery,
) -> Result<Response, PageError> {
    let profile = state
        .store
        .user_by_username(&username)
        .await?
        .ok_or(PageError::NotFound)?;
    let is_owner = session_user.id() == Some(profile.id);
    let posts = posts_page(
        &*state.store,
        &PostQuery::all()
            .by_author(profile.id)
            .published_if(!is_owner, Utc::now()),
        query.page.as_deref(),
        state.posts_per_page,
    )
    .await?;
    render(&ProfileTemplate {
        page: session_user.page().await?,
        profile,
        posts,
        is_owner,
    })
}

pub async fn edit_profile_page(
    session_user: SessionUser,
    uri: Uri,
) -> Result<Response, PageError> {
    let Some(user) = &session_user.user else {
        return Ok(login_redirect(uri.path()));
    };
    render(&EditProfileTemplate {
        page: session_user.page().await?,
        form: ProfileForm::from_user(user),
        errors: FormErrors::default(),
    })
}

pub async fn edit_profile(
    State(state): State<GlobalServerContext>,
    session_user: SessionUser,
    uri: Uri,
    Form(form): Form<CsrfProtectedForm<ProfileForm>>,
) -> Result<Response, PageError> {
    let form = form.validate(&session_user.session).await?;
    let Some(user) = &session_user.user else {
        return Ok(login_redirect(uri.path()));
    };
    let errors = match form.clean() {
        Ok(changes) => {
            let taken = changes.username != user.username
                && state
                    .store
                    .user_by_username(&changes.username)
                    .await?
                    .is_some();
            if taken {
                FormErrors::single("username", USERNAME_TAKEN)
            } else {
                match state.store.update_profile(user.id, &changes).await {
                    Ok(updated) => {
                        info!(user = %updated.username, "profile updated");
                        return Ok(Redirect::to(&profile_url(&updated.username)).into_response());
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
    render(&EditProfileTemplate {
        page: session_user.page().await?,
        form,
        errors,
    })
}
