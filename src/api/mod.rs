use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tower_sessions::cookie::SameSite;
use tower_sessions::{MemoryStore, SessionManagerLayer};
use tracing::{info, warn};

use crate::app;
use crate::app::mail::Mailer;
use crate::app::media::MediaStorage;
use crate::app::memory::MemoryBlogStore;
use crate::app::store::BlogStore;
use crate::blog_config::{BlogConfig, blog_config};
use crate::database::PgBlogStore;

pub mod comment;
pub mod csrf;
pub mod error;
pub mod login;
pub mod mail;
pub mod pages;
pub mod path;
pub mod post;
pub mod profile;
pub mod templates;

pub const SESSION_COOKIE_NAME: &str = "blogicum-session";

pub fn make_router(context: GlobalServerContext, secure_cookies: bool) -> Router {
    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(secure_cookies)
        .with_same_site(SameSite::Lax)
        .with_name(SESSION_COOKIE_NAME)
        .with_http_only(true);
    let media_root = context.media.root().to_owned();
    Router::new()
        // Blog
        .route("/", get(post::index))
        .route("/category/{slug}/", get(post::category_posts))
        .route("/posts/{id}/", get(post::post_detail))
        .route("/profile/{username}/", get(profile::profile))
        .route(
            "/edit_profile/",
            get(profile::edit_profile_page).post(profile::edit_profile),
        )
        .route(
            "/posts/create/",
            get(post::create_post_page).post(post::create_post),
        )
        .route(
            "/posts/{id}/edit/",
            get(post::edit_post_page).post(post::edit_post),
        )
        .route("/posts/{id}/delete/", post(post::delete_post))
        .route(
            "/posts/{id}/comment/",
            get(comment::add_comment_page).post(comment::add_comment),
        )
        .route(
            "/posts/{id}/edit_comment/{comment_id}/",
            get(comment::edit_comment_page).post(comment::edit_comment),
        )
        .route(
            "/posts/{id}/delete_comment/{comment_id}/",
            get(comment::delete_comment_page).post(comment::delete_comment),
        )
        .route("/send_test_email/", get(mail::send_test_email))
        // Pages
        .route("/pages/about/", get(pages::about))
        .route("/pages/rules/", get(pages::rules))
        // Auth
        .route("/auth/login/", get(login::login_page).post(login::login))
        .route("/auth/logout/", post(login::logout))
        .route(
            "/auth/registration/",
            get(login::registration_page).post(login::register),
        )
        .nest_service("/media", ServeDir::new(media_root))
        .fallback(pages::not_found)
        .with_state(context)
        .layer(session_layer)
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(pages::panic_response))
}

#[derive(Clone)]
pub struct GlobalServerContext {
    pub store: Arc<dyn BlogStore>,
    pub mailer: Arc<Mailer>,
    pub media: MediaStorage,
    pub posts_per_page: usize,
}

impl GlobalServerContext {
    pub async fn new() -> Result<Self, app::Error> {
        let config = blog_config().await;
        let store: Arc<dyn BlogStore> = match &config.database_url {
            Some(database_url) => {
                info!("using PostgreSQL storage");
                Arc::new(PgBlogStore::connect(database_url)?)
            }
            None => {
                warn!("no database_url configured, everything is kept in memory and lost on exit");
                Arc::new(MemoryBlogStore::new())
            }
        };
        Ok(Self::with_store(store, &config))
    }

    pub fn with_store(store: Arc<dyn BlogStore>, config: &BlogConfig) -> Self {
        Self {
            store,
            mailer: Arc::new(Mailer::new(
                &config.email_file_path,
                config.default_from_email.clone(),
            )),
            media: MediaStorage::new(&config.media_root),
            posts_per_page: config.posts_per_page,
        }
    }
}
