//! Askama templates. Every page extends `base.html`, which needs the `page` context for the
//! navigation bar and the logout form.

use askama::Template;
use axum::response::{Html, IntoResponse as _, Response};

use crate::api::error::PageError;
use crate::app::category::Category;
use crate::app::comment::Comment;
use crate::app::forms::{
    COMMENT_PLACEHOLDER, Choice, CommentForm, FormErrors, LoginForm, PostForm, ProfileForm,
    RegistrationForm,
};
use crate::app::paginate::Page;
use crate::app::post::Post;
use crate::app::user::User;
use crate::app::{CommentId, PostId};

/// What the layout needs to know about the request.
#[derive(Debug, Clone, Default)]
pub struct PageContext {
    /// Username of the logged in user.
    pub viewer: Option<String>,
    pub csrf_token: String,
}

pub fn render(template: &impl Template) -> Result<Response, PageError> {
    Ok(Html(template.render()?).into_response())
}

#[derive(Template)]
#[template(path = "blog/index.html")]
pub struct IndexTemplate {
    pub page: PageContext,
    pub posts: Page<Post>,
}

#[derive(Template)]
#[template(path = "blog/category.html")]
pub struct CategoryTemplate {
    pub page: PageContext,
    pub category: Category,
    pub posts: Page<Post>,
}

#[derive(Template)]
#[template(path = "blog/profile.html")]
pub struct ProfileTemplate {
    pub page: PageContext,
    pub profile: User,
    pub posts: Page<Post>,
    /// The viewer is looking at their own profile.
    pub is_owner: bool,
}

#[derive(Debug, Clone)]
pub struct CommentView {
    pub comment: Comment,
    pub can_edit: bool,
}

#[derive(Template)]
#[template(path = "blog/detail.html")]
pub struct DetailTemplate {
    pub page: PageContext,
    pub post: Post,
    pub comments: Vec<CommentView>,
    pub is_author: bool,
    pub form: CommentForm,
    pub placeholder: &'static str,
}

impl DetailTemplate {
    pub fn new(page: PageContext, post: Post, comments: Vec<CommentView>, is_author: bool) -> Self {
        Self {
            page,
            post,
            comments,
            is_author,
            form: CommentForm::default(),
            placeholder: COMMENT_PLACEHOLDER,
        }
    }
}

#[derive(Template)]
#[template(path = "blog/user.html")]
pub struct EditProfileTemplate {
    pub page: PageContext,
    pub form: ProfileForm,
    pub errors: FormErrors,
}

#[derive(Template)]
#[template(path = "blog/create.html")]
pub struct PostFormTemplate {
    pub page: PageContext,
    pub form: PostForm,
    pub errors: FormErrors,
    pub categories: Vec<Choice>,
    pub locations: Vec<Choice>,
    /// Set when editing an existing post.
    pub post_id: Option<PostId>,
}

/// The mode `blog/comment.html` renders in.
#[derive(Debug, Clone, PartialEq)]
pub enum CommentAction {
    Add,
    Edit(CommentId),
    Delete(CommentId),
}

#[derive(Template)]
#[template(path = "blog/comment.html")]
pub struct CommentTemplate {
    pub page: PageContext,
    pub post_id: PostId,
    pub action: CommentAction,
    /// The comment being edited or deleted.
    pub comment: Option<Comment>,
    pub form: CommentForm,
    pub errors: FormErrors,
    pub placeholder: &'static str,
}

impl CommentTemplate {
    pub fn new(page: PageContext, post_id: PostId, action: CommentAction) -> Self {
        Self {
            page,
            post_id,
            action,
            comment: None,
            form: CommentForm::default(),
            errors: FormErrors::default(),
            placeholder: COMMENT_PLACEHOLDER,
        }
    }

    pub fn form_action(&self) -> String {
        match &self.action {
            CommentAction::Add => format!("/posts/{}/comment/", self.post_id),
            CommentAction::Edit(id) => format!("/posts/{}/edit_comment/{id}/", self.post_id),
            CommentAction::Delete(id) => format!("/posts/{}/delete_comment/{id}/", self.post_id),
        }
    }

    pub fn is_delete(&self) -> bool {
        matches!(self.action, CommentAction::Delete(_))
    }
}

#[derive(Template)]
#[template(path = "registration/login.html")]
pub struct LoginTemplate {
    pub page: PageContext,
    pub form: LoginForm,
    pub errors: FormErrors,
}

#[derive(Template)]
#[template(path = "registration/registration_form.html")]
pub struct RegistrationTemplate {
    pub page: PageContext,
    pub form: RegistrationForm,
    pub errors: FormErrors,
}

#[derive(Template)]
#[template(path = "registration/logged_out.html")]
pub struct LoggedOutTemplate {
    pub page: PageContext,
}

#[derive(Template)]
#[template(path = "pages/about.html")]
pub struct AboutTemplate {
    pub page: PageContext,
}

#[derive(Template)]
#[template(path = "pages/rules.html")]
pub struct RulesTemplate {
    pub page: PageContext,
}

#[derive(Template)]
#[template(path = "pages/403csrf.html")]
pub struct ForbiddenTemplate {
    pub page: PageContext,
    pub reason: Option<String>,
}

#[derive(Template)]
#[template(path = "pages/404.html")]
pub struct NotFoundTemplate {
    pub page: PageContext,
}

#[derive(Template)]
#[template(path = "pages/500.html")]
pub struct ServerErrorTemplate {
    pub page: PageContext,
}
