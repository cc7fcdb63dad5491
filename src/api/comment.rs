use axum::Form;
use axum::extract::State;
use axum::http::Uri;
use axum::response::{IntoResponse as _, Redirect, Response};
use tracing::info;

use crate::api::GlobalServerContext;
use crate::api::csrf::{CsrfOnlyForm, CsrfProtectedForm, validate_csrf_token};
use crate::api::error::PageError;
use crate::api::login::{SessionUser, login_redirect};
use crate::api::path::IdPath;
use crate::api::post::detail_url;
use crate::api::templates::{CommentAction, CommentTemplate, render};
use crate::app::comment::Comment;
use crate::app::forms::CommentForm;
use crate::app::user::User;
use crate::app::{CommentId, PostId};

/// Comments can only be reached through their own post and by their author; anything
/// else is a 404.
async fn find_authored_comment(
    state: &GlobalServerContext,
    post_id: PostId,
    comment_id: CommentId,
    user: &User,
) -> Result<Comment, PageError> {
    state
        .store
        .authored_comment(post_id, comment_id, user.id)
        .await?
        .ok_or(PageError::NotFound)
}

pub async fn add_comment_page(
    State(state): State<GlobalServerContext>,
    session_user: SessionUser,
    IdPath(post_id): IdPath<PostId>,
    uri: Uri,
) -> Result<Response, PageError> {
    if session_user.user.is_none() {
        return Ok(login_redirect(uri.path()));
    }
    if state.store.post_by_id(post_id).await?.is_none() {
        return Err(PageError::NotFound);
    }
    render(&CommentTemplate::new(
        session_user.page().await?,
        post_id,
        CommentAction::Add,
    ))
}

pub async fn add_comment(
    State(state): State<GlobalServerContext>,
    session_user: SessionUser,
    IdPath(post_id): IdPath<PostId>,
    uri: Uri,
    Form(form): Form<CsrfProtectedForm<CommentForm>>,
) -> Result<Response, PageError> {
    let form = form.validate(&session_user.session).await?;
    let Some(user) = &session_user.user else {
        return Ok(login_redirect(uri.path()));
    };
    if state.store.post_by_id(post_id).await?.is_none() {
        return Err(PageError::NotFound);
    }
    match form.clean() {
        Ok(text) => {
            let id = state.store.create_comment(post_id, user.id, &text).await?;
            info!(post = %post_id, comment = %id, author = %user.username, "comment added");
            Ok(Redirect::to(&detail_url(post_id)).into_response())
        }
        Err(errors) => render(&CommentTemplate {
            form,
            errors,
            ..CommentTemplate::new(session_user.page().await?, post_id, CommentAction::Add)
        }),
    }
}

pub async fn edit_comment_page(
    State(state): State<GlobalServerContext>,
    session_user: SessionUser,
    IdPath((post_id, comment_id)): IdPath<(PostId, CommentId)>,
    uri: Uri,
) -> Result<Response, PageError> {
    let Some(user) = &session_user.user else {
        return Ok(login_redirect(uri.path()));
    };
    let comment = find_authored_comment(&state, post_id, comment_id, user).await?;
    render(&CommentTemplate {
        form: CommentForm {
            text: comment.text.clone(),
        },
        comment: Some(comment),
        ..CommentTemplate::new(
            session_user.page().await?,
            post_id,
            CommentAction::Edit(comment_id),
        )
    })
}

pub async fn edit_comment(
    State(state): State<GlobalServerContext>,
    session_user: SessionUser,
    IdPath((post_id, comment_id)): IdPath<(PostId, CommentId)>,
    uri: Uri,
    Form(form): Form<CsrfProtectedForm<CommentForm>>,
) -> Result<Response, PageError> {
    let form = form.validate(&session_user.session).await?;
    let Some(user) = &session_user.user else {
        return Ok(login_redirect(uri.path()));
    };
    let comment = find_authored_comment(&state, post_id, comment_id, user).await?;
    match form.clean() {
        Ok(text) => {
            state.store.update_comment(comment.id, &text).await?;
            info!(post = %post_id, comment = %comment.id, "comment edited");
            Ok(Redirect::to(&detail_url(post_id)).into_response())
        }
        Err(errors) => render(&CommentTemplate {
            form,
            errors,
            comment: Some(comment),
            ..CommentTemplate::new(
                session_user.page().await?,
                post_id,
                CommentAction::Edit(comment_id),
            )
        }),
    }
}

/// Asks for confirmation, the POST below does the deleting.
pub async fn delete_comment_page(
    State(state): State<GlobalServerContext>,
    session_user: SessionUser,
    IdPath((post_id, comment_id)): IdPath<(PostId, CommentId)>,
    uri: Uri,
) -> Result<Response, PageError> {
    let Some(user) = &session_user.user else {
        return Ok(login_redirect(uri.path()));
    };
    let comment = find_authored_comment(&state, post_id, comment_id, user).await?;
    render(&CommentTemplate {
        comment: Some(comment),
        ..CommentTemplate::new(
            session_user.page().await?,
            post_id,
            CommentAction::Delete(comment_id),
        )
    })
}

pub async fn delete_comment(
    State(state): State<GlobalServerContext>,
    session_user: SessionUser,
    IdPath((post_id, comment_id)): IdPath<(PostId, CommentId)>,
    uri: Uri,
    Form(form): Form<CsrfOnlyForm>,
) -> Result<Response, PageError> {
    validate_csrf_token(&session_user.session, &form.csrf_token).await?;
    let Some(user) = &session_user.user else {
        return Ok(login_redirect(uri.path()));
    };
    let comment = find_authored_comment(&state, post_id, comment_id, user).await?;
    if state.store.delete_comment(comment.id).await? {
        info!(post = %post_id, comment = %comment.id, "comment deleted");
    }
    Ok(Redirect::to(&detail_url(post_id)).into_response())
}
