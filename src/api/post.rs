use std::collections::HashMap;
use std::convert::Infallible;

use axum::Form;
use axum::extract::multipart::Multipart;
use axum::extract::{FromRequestParts, Path, Query, State};
use axum::http::Uri;
use axum::http::request::Parts;
use axum::response::{IntoResponse as _, Redirect, Response};
use chrono::Utc;
use tracing::{debug, info};

use crate::api::GlobalServerContext;
use crate::api::csrf::{CsrfOnlyForm, validate_csrf_token};
use crate::api::error::PageError;
use crate::api::login::{SessionUser, login_redirect};
use crate::api::path::IdPath;
use crate::api::templates::{
    CategoryTemplate, CommentView, DetailTemplate, IndexTemplate, PostFormTemplate, render,
};
use crate::app::PostId;
use crate::app::category::Category;
use crate::app::forms::{Choice, FormErrors, ImageChange, PostForm};
use crate::app::location::Location;
use crate::app::media::ImageUpload;
use crate::app::query::{PostQuery, posts_page};

/// `?page=` of the paginated listings. Kept raw, the paginator decides what it means.
/// Never rejects: a repeated key counts with its last value and an unreadable query
/// string counts as no page at all.
#[derive(Debug, Default)]
pub struct PageQuery {
    pub page: Option<String>,
}

impl<S: Send + Sync> FromRequestParts<S> for PageQuery {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let page = match Query::<Vec<(String, String)>>::from_request_parts(parts, state).await {
            Ok(Query(pairs)) => pairs
                .into_iter()
                .filter(|(key, _)| key == "page")
                .map(|(_, value)| value)
                .last(),
            Err(rejection) => {
                debug!("ignoring unreadable query string {rejection}");
                None
            }
        };
        Ok(Self { page })
    }
}

pub fn detail_url(id: PostId) -> String {
    format!("/posts/{id}/")
}

pub fn profile_url(username: &str) -> String {
    format!("/profile/{}/", urlencoding::encode(username))
}

pub async fn index(
    State(state): State<GlobalServerContext>,
    session_user: SessionUser,
    query: PageQuery,
) -> Result<Response, PageError> {
    let posts = posts_page(
        &*state.store,
        &PostQuery::all().published(Utc::now()),
        query.page.as_deref(),
        state.posts_per_page,
    )
    .await?;
    render(&IndexTemplate {
        page: session_user.page().await?,
        posts,
    })
}

pub async fn category_posts(
    State(state): State<GlobalServerContext>,
    session_user: SessionUser,
    Path(slug): Path<String>,
    query: PageQuery,
) -> Result<Response, PageError> {
    let category = state
        .store
        .category_by_slug(&slug)
        .await?
        .filter(|category| category.is_published)
        .ok_or(PageError::NotFound)?;
    let posts = posts_page(
        &*state.store,
        &PostQuery::all()
            .in_category(category.id)
            .published(Utc::now()),
        query.page.as_deref(),
        state.posts_per_page,
    )
    .await?;
    render(&CategoryTemplate {
        page: session_user.page().await?,
        category,
        posts,
    })
}

pub async fn post_detail(
    State(state): State<GlobalServerContext>,
    session_user: SessionUser,
    IdPath(id): IdPath<PostId>,
) -> Result<Response, PageError> {
    let post = state
        .store
        .post_by_id(id)
        .await?
        .ok_or(PageError::NotFound)?;
    let viewer = session_user.id();
    let is_author = viewer == Some(post.author.id);
    if !is_author && !post.is_publicly_visible(Utc::now()) {
        debug!(post = %id, "hiding unpublished post");
        return Err(PageError::NotFound);
    }
    let comments = state
        .store
        .comments_for_post(id)
        .await?
        .into_iter()
        .map(|comment| CommentView {
            can_edit: viewer == Some(comment.author.id),
            comment,
        })
        .collect();
    render(&DetailTemplate::new(
        session_user.page().await?,
        post,
        comments,
        is_author,
    ))
}

/// Fields of a submitted post form. Sent as multipart because of the image.
struct PostSubmission {
    csrf_token: String,
    fields: HashMap<String, String>,
    upload: Option<ImageUpload>,
}

impl PostSubmission {
    /// A malformed body is answered with the multipart rejection.
    async fn read(mut multipart: Multipart) -> Result<Self, Response> {
        let mut fields = HashMap::new();
        let mut upload = None;
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| e.into_response())?
        {
            let name = field.name().unwrap_or_default().to_owned();
            if name == "image" {
                let file_name = field.file_name().unwrap_or_default().to_owned();
                let bytes = field.bytes().await.map_err(|e| e.into_response())?;
                if !file_name.is_empty() && !bytes.is_empty() {
                    upload = Some(ImageUpload {
                        file_name,
                        bytes: bytes.to_vec(),
                    });
                }
            } else {
                let value = field.text().await.map_err(|e| e.into_response())?;
                fields.insert(name, value);
            }
        }
        Ok(Self {
            csrf_token: fields.remove("csrf_token").unwrap_or_default(),
            fields,
            upload,
        })
    }
}

async fn render_post_form(
    session_user: &SessionUser,
    form: PostForm,
    errors: FormErrors,
    categories: &[Category],
    locations: &[Location],
    post_id: Option<PostId>,
) -> Result<Response, PageError> {
    render(&PostFormTemplate {
        page: session_user.page().await?,
        form,
        errors,
        categories: Choice::categories(categories),
        locations: Choice::locations(locations),
        post_id,
    })
}

pub async fn create_post_page(
    State(state): State<GlobalServerContext>,
    session_user: SessionUser,
    uri: Uri,
) -> Result<Response, PageError> {
    if session_user.user.is_none() {
        return Ok(login_redirect(uri.path()));
    }
    let categories = state.store.categories().await?;
    let locations = state.store.locations().await?;
    render_post_form(
        &session_user,
        PostForm::default(),
        FormErrors::default(),
        &categories,
        &locations,
        None,
    )
    .await
}

pub async fn create_post(
    State(state): State<GlobalServerContext>,
    session_user: SessionUser,
    uri: Uri,
    multipart: Multipart,
) -> Result<Response, PageError> {
    let submission = match PostSubmission::read(multipart).await {
        Ok(submission) => submission,
        Err(rejection) => return Ok(rejection),
    };
    validate_csrf_token(&session_user.session, &submission.csrf_token).await?;
    let Some(user) = &session_user.user else {
        return Ok(login_redirect(uri.path()));
    };
    let categories = state.store.categories().await?;
    let locations = state.store.locations().await?;
    let form = PostForm::from_fields(&submission.fields, None);
    match form.clean(&categories, &locations, submission.upload) {
        Ok(clean) => {
            let image = match &clean.image {
                ImageChange::Replace(upload) => Some(state.media.save_post_image(upload).await?),
                ImageChange::Keep | ImageChange::Clear => None,
            };
            let id = state
                .store
                .create_post(user.id, &clean.into_draft(image))
                .await?;
            info!(post = %id, author = %user.username, "post created");
            Ok(Redirect::to(&profile_url(&user.username)).into_response())
        }
        Err(errors) => {
            render_post_form(&session_user, form, errors, &categories, &locations, None).await
        }
    }
}

pub async fn edit_post_page(
    State(state): State<GlobalServerContext>,
    session_user: SessionUser,
    IdPath(id): IdPath<PostId>,
    uri: Uri,
) -> Result<Response, PageError> {
    let post = state
        .store
        .post_by_id(id)
        .await?
        .ok_or(PageError::NotFound)?;
    let Some(user) = &session_user.user else {
        return Ok(login_redirect(uri.path()));
    };
    if post.author.id != user.id {
        return Ok(Redirect::to(&detail_url(id)).into_response());
    }
    let categories = state.store.categories().await?;
    let locations = state.store.locations().await?;
    render_post_form(
        &session_user,
        PostForm::from_post(&post),
        FormErrors::default(),
        &categories,
        &locations,
        Some(id),
    )
    .await
}

pub async fn edit_post(
    State(state): State<GlobalServerContext>,
    session_user: SessionUser,
    IdPath(id): IdPath<PostId>,
    uri: Uri,
    multipart: Multipart,
) -> Result<Response, PageError> {
    let submission = match PostSubmission::read(multipart).await {
        Ok(submission) => submission,
        Err(rejection) => return Ok(rejection),
    };
    validate_csrf_token(&session_user.session, &submission.csrf_token).await?;
    let post = state
        .store
        .post_by_id(id)
        .await?
        .ok_or(PageError::NotFound)?;
    let Some(user) = &session_user.user else {
        return Ok(login_redirect(uri.path()));
    };
    if post.author.id != user.id {
        info!(post = %id, user = %user.username, "ignoring edit by someone other than the author");
        return Ok(Redirect::to(&detail_url(id)).into_response());
    }
    let categories = state.store.categories().await?;
    let locations = state.store.locations().await?;
    let form = PostForm::from_fields(&submission.fields, post.image.clone());
    match form.clean(&categories, &locations, submission.upload) {
        Ok(clean) => {
            let image = match &clean.image {
                ImageChange::Keep => post.image.clone(),
                ImageChange::Clear => None,
                ImageChange::Replace(upload) => Some(state.media.save_post_image(upload).await?),
            };
            state
                .store
                .update_post(id, &clean.into_draft(image.clone()))
                .await?;
            if let Some(old) = &post.image {
                if image.as_ref() != Some(old) {
                    state.media.remove(old).await;
                }
            }
            info!(post = %id, "post updated");
            Ok(Redirect::to(&detail_url(id)).into_response())
        }
        Err(errors) => {
            render_post_form(&session_user, form, errors, &categories, &locations, Some(id)).await
        }
    }
}

/// Deleting someone else's post does nothing, the user lands on their profile either way.
pub async fn delete_post(
    State(state): State<GlobalServerContext>,
    session_user: SessionUser,
    IdPath(id): IdPath<PostId>,
    uri: Uri,
    Form(form): Form<CsrfOnlyForm>,
) -> Result<Response, PageError> {
    validate_csrf_token(&session_user.session, &form.csrf_token).await?;
    let Some(user) = &session_user.user else {
        return Ok(login_redirect(uri.path()));
    };
    let post = state
        .store
        .post_by_id(id)
        .await?
        .ok_or(PageError::NotFound)?;
    if post.author.id == user.id {
        if state.store.delete_post(id).await? {
            info!(post = %id, "post deleted");
        }
        if let Some(image) = &post.image {
            state.media.remove(image).await;
        }
    }
    Ok(Redirect::to(&profile_url(&user.username)).into_response())
}
