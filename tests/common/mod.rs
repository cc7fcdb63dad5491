#![allow(dead_code)]

use std::io::Cursor;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode, header};
use blogicum::api::{GlobalServerContext, SESSION_COOKIE_NAME, make_router};
use blogicum::app::category::{Category, NewCategory};
use blogicum::app::location::{Location, NewLocation};
use blogicum::app::memory::MemoryBlogStore;
use blogicum::app::post::PostDraft;
use blogicum::app::store::BlogStore;
use blogicum::app::user::{User, create_user};
use blogicum::app::{CategoryId, PostId};
use blogicum::blog_config::BlogConfig;
use chrono::{DateTime, Duration, Utc};
use tempfile::TempDir;
use tower::ServiceExt as _;

pub const PASSWORD: &str = "correct-horse-battery";
const BOUNDARY: &str = "blogicum-test-boundary";

/// A router over a fresh in-memory store, with media and mail in a temporary directory.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryBlogStore>,
    pub dir: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryBlogStore::new());
        let config = BlogConfig {
            media_root: dir.path().join("media"),
            email_file_path: dir.path().join("sent_emails"),
            ..BlogConfig::default()
        };
        let context = GlobalServerContext::with_store(store.clone(), &config);
        Self {
            router: make_router(context, false),
            store,
            dir,
        }
    }

    pub fn client(&self) -> Client {
        Client {
            router: self.router.clone(),
            cookie: None,
            csrf_token: None,
        }
    }

    pub async fn user(&self, username: &str) -> User {
        create_user(&*self.store, username, "", PASSWORD, false)
            .await
            .unwrap()
    }

    pub async fn category(&self, slug: &str, is_published: bool) -> Category {
        self.store
            .create_category(NewCategory {
                title: format!("Category {slug}"),
                description: format!("About {slug}"),
                slug: slug.to_owned(),
                is_published,
            })
            .await
            .unwrap()
    }

    pub async fn location(&self, name: &str) -> Location {
        self.store
            .create_location(NewLocation {
                name: name.to_owned(),
                is_published: true,
            })
            .await
            .unwrap()
    }

    /// A published post dated an hour ago.
    pub async fn post(&self, author: &User, title: &str, category: Option<CategoryId>) -> PostId {
        self.post_with(author, title, category, true, Utc::now() - Duration::hours(1))
            .await
    }

    pub async fn post_with(
        &self,
        author: &User,
        title: &str,
        category: Option<CategoryId>,
        is_published: bool,
        pub_date: DateTime<Utc>,
    ) -> PostId {
        self.store
            .create_post(
                author.id,
                &PostDraft {
                    title: title.to_owned(),
                    text: format!("Text of {title}"),
                    pub_date,
                    location: None,
                    category,
                    is_published,
                    image: None,
                },
            )
            .await
            .unwrap()
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    pub fn location(&self) -> &str {
        self.headers
            .get(header::LOCATION)
            .map(|v| v.to_str().unwrap())
            .unwrap_or_default()
    }

    #[track_caller]
    pub fn assert_redirect(&self, to: &str) {
        assert!(
            self.status.is_redirection(),
            "expected redirect to {to}, got {} {}",
            self.status,
            self.body
        );
        assert_eq!(self.location(), to);
    }
}

/// A browser: keeps the session cookie and the last CSRF token it was shown.
pub struct Client {
    router: Router,
    cookie: Option<String>,
    csrf_token: Option<String>,
}

impl Client {
    pub async fn send(&mut self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        for set_cookie in response.headers().get_all(header::SET_COOKIE) {
            let set_cookie = set_cookie.to_str().unwrap();
            let pair = set_cookie.split(';').next().unwrap_or_default();
            if let Some(value) = pair.strip_prefix(&format!("{SESSION_COOKIE_NAME}=")) {
                let removed = value.is_empty() || set_cookie.contains("Max-Age=0");
                if removed {
                    self.cookie = None;
                    self.csrf_token = None;
                } else {
                    self.cookie = Some(pair.to_owned());
                }
            }
        }
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = String::from_utf8_lossy(&bytes).into_owned();
        if let Some(token) = find_csrf_token(&body) {
            self.csrf_token = Some(token);
        }
        TestResponse {
            status,
            headers,
            body,
        }
    }

    fn request(&self, method: &str, uri: &str) -> axum::http::request::Builder {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = &self.cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder
    }

    pub async fn get(&mut self, uri: &str) -> TestResponse {
        let request = self.request("GET", uri).body(Body::empty()).unwrap();
        self.send(request).await
    }

    /// Token of the current session, loading a page that shows it when needed.
    pub async fn csrf_token(&mut self) -> String {
        if self.csrf_token.is_none() {
            self.get("/auth/login/").await;
        }
        self.csrf_token.clone().unwrap()
    }

    /// Posts a urlencoded form with the session's CSRF token.
    pub async fn post_form(&mut self, uri: &str, fields: &[(&str, &str)]) -> TestResponse {
        let token = self.csrf_token().await;
        let mut fields = fields.to_vec();
        fields.push(("csrf_token", &token));
        self.post_form_raw(uri, &fields).await
    }

    /// Posts exactly the given fields.
    pub async fn post_form_raw(&mut self, uri: &str, fields: &[(&str, &str)]) -> TestResponse {
        let body = fields
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        let request = self
            .request("POST", uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    /// Posts a multipart form with the session's CSRF token and an optional `image` file.
    pub async fn post_multipart(
        &mut self,
        uri: &str,
        fields: &[(&str, &str)],
        image: Option<(&str, &[u8])>,
    ) -> TestResponse {
        let token = self.csrf_token().await;
        let mut body = Vec::new();
        for (name, value) in fields.iter().chain([("csrf_token", token.as_str())].iter()) {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        if let Some((file_name, bytes)) = image {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        let request = self
            .request("POST", uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    pub async fn login(&mut self, username: &str) {
        self.post_form(
            "/auth/login/",
            &[("username", username), ("password", PASSWORD)],
        )
        .await
        .assert_redirect("/");
    }
}

fn find_csrf_token(body: &str) -> Option<String> {
    const MARKER: &str = "name=\"csrf_token\" value=\"";
    let start = body.find(MARKER)? + MARKER.len();
    let end = body[start..].find('"')?;
    let token = &body[start..start + end];
    (!token.is_empty()).then(|| token.to_owned())
}

/// Fields of a valid post form.
pub fn post_fields<'a>(title: &'a str, category: &'a str) -> Vec<(&'a str, &'a str)> {
    vec![
        ("title", title),
        ("text", "Some text"),
        ("pub_date", "2024-01-01T12:00"),
        ("category", category),
        ("location", ""),
        ("is_published", "on"),
    ]
}

/// A small PNG that decodes.
pub fn png_bytes() -> Vec<u8> {
    let mut bytes = Cursor::new(Vec::new());
    image::RgbImage::new(3, 3)
        .write_to(&mut bytes, image::ImageFormat::Png)
        .unwrap();
    bytes.into_inner()
}
