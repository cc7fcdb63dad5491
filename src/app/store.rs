use async_trait::async_trait;

use crate::app;
use crate::app::category::{Category, NewCategory};
use crate::app::comment::Comment;
use crate::app::location::{Location, NewLocation};
use crate::app::post::{Post, PostDraft};
use crate::app::query::PostQuery;
use crate::app::user::{NewUser, ProfileChanges, User};
use crate::app::{CategoryId, CommentId, LocationId, PostId, UserId};

/// Persistence used by the handlers. Deleting a location or category detaches its posts,
/// deleting a user removes their posts and comments, deleting a post removes its comments.
#[async_trait]
pub trait BlogStore: Send + Sync {
    async fn create_user(&self, new_user: NewUser) -> Result<User, app::Error>;
    async fn user_by_id(&self, id: UserId) -> Result<Option<User>, app::Error>;
    async fn user_by_username(&self, username: &str) -> Result<Option<User>, app::Error>;
    async fn update_profile(
        &self,
        id: UserId,
        changes: &ProfileChanges,
    ) -> Result<User, app::Error>;
    async fn delete_user(&self, id: UserId) -> Result<bool, app::Error>;

    async fn create_category(&self, new_category: NewCategory) -> Result<Category, app::Error>;
    async fn category_by_slug(&self, slug: &str) -> Result<Option<Category>, app::Error>;
    async fn categories(&self) -> Result<Vec<Category>, app::Error>;
    async fn delete_category(&self, id: CategoryId) -> Result<bool, app::Error>;

    async fn create_location(&self, new_location: NewLocation) -> Result<Location, app::Error>;
    async fn locations(&self) -> Result<Vec<Location>, app::Error>;
    async fn delete_location(&self, id: LocationId) -> Result<bool, app::Error>;

    async fn create_post(&self, author: UserId, draft: &PostDraft) -> Result<PostId, app::Error>;
    async fn post_by_id(&self, id: PostId) -> Result<Option<Post>, app::Error>;
    async fn update_post(&self, id: PostId, draft: &PostDraft) -> Result<(), app::Error>;
    async fn delete_post(&self, id: PostId) -> Result<bool, app::Error>;
    async fn count_posts(&self, query: &PostQuery) -> Result<usize, app::Error>;
    /// One window of the query's results in the default post ordering.
    async fn list_posts(
        &self,
        query: &PostQuery,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Post>, app::Error>;

    async fn create_comment(
        &self,
        post: PostId,
        author: UserId,
        text: &str,
    ) -> Result<CommentId, app::Error>;
    /// Oldest first.
    async fn comments_for_post(&self, post: PostId) -> Result<Vec<Comment>, app::Error>;
    /// Only finds the comment when it belongs to `post` and was written by `author`.
    async fn authored_comment(
        &self,
        post: PostId,
        comment: CommentId,
        author: UserId,
    ) -> Result<Option<Comment>, app::Error>;
    async fn update_comment(&self, id: CommentId, text: &str) -> Result<(), app::Error>;
    async fn delete_comment(&self, id: CommentId) -> Result<bool, app::Error>;
}
