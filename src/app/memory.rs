//! Store that keeps everything in process memory. Backs the server when no database is
//! configured and the test suite.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::app;
use crate::app::category::{Category, CategoryRef, NewCategory};
use crate::app::comment::Comment;
use crate::app::location::{Location, LocationRef, NewLocation};
use crate::app::post::{Post, PostDraft, default_ordering};
use crate::app::query::PostQuery;
use crate::app::store::BlogStore;
use crate::app::user::{NewUser, ProfileChanges, User};
use crate::app::{CategoryId, CommentId, LocationId, PostId, UserId};

#[derive(Debug, Clone)]
struct PostRecord {
    id: PostId,
    title: String,
    text: String,
    pub_date: DateTime<Utc>,
    author: UserId,
    location: Option<LocationId>,
    category: Option<CategoryId>,
    is_published: bool,
    image: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct CommentRecord {
    id: CommentId,
    post: PostId,
    author: UserId,
    text: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Tables {
    next_id: i64,
    users: BTreeMap<UserId, User>,
    categories: BTreeMap<CategoryId, Category>,
    locations: BTreeMap<LocationId, Location>,
    posts: BTreeMap<PostId, PostRecord>,
    comments: BTreeMap<CommentId, CommentRecord>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn hydrate_post(&self, record: &PostRecord) -> Result<Post, app::Error> {
        let author = self
            .users
            .get(&record.author)
            .ok_or(app::Error::Missing("post author"))?;
        Ok(Post {
            id: record.id,
            title: record.title.clone(),
            text: record.text.clone(),
            pub_date: record.pub_date,
            author: author.to_ref(),
            location: record
                .location
                .and_then(|id| self.locations.get(&id))
                .map(LocationRef::from),
            category: record
                .category
                .and_then(|id| self.categories.get(&id))
                .map(CategoryRef::from),
            is_published: record.is_published,
            image: record.image.clone(),
            created_at: record.created_at,
            comment_count: self
                .comments
                .values()
                .filter(|c| c.post == record.id)
                .count() as i64,
        })
    }

    fn hydrate_comment(&self, record: &CommentRecord) -> Result<Comment, app::Error> {
        let author = self
            .users
            .get(&record.author)
            .ok_or(app::Error::Missing("comment author"))?;
        Ok(Comment {
            id: record.id,
            post: record.post,
            author: author.to_ref(),
            text: record.text.clone(),
            created_at: record.created_at,
        })
    }

    fn matching_posts(&self, query: &PostQuery) -> Result<Vec<Post>, app::Error> {
        let mut posts = Vec::new();
        for record in self.posts.values() {
            let post = self.hydrate_post(record)?;
            if query.matches(&post) {
                posts.push(post);
            }
        }
        posts.sort_by(default_ordering);
        Ok(posts)
    }

    fn check_references(&self, draft: &PostDraft) -> Result<(), app::Error> {
        if draft.category.is_some_and(|id| !self.categories.contains_key(&id)) {
            return Err(app::Error::Missing("category"));
        }
        if draft.location.is_some_and(|id| !self.locations.contains_key(&id)) {
            return Err(app::Error::Missing("location"));
        }
        Ok(())
    }

    fn delete_post_cascade(&mut self, id: PostId) -> bool {
        self.comments.retain(|_, c| c.post != id);
        self.posts.remove(&id).is_some()
    }
}

#[derive(Debug, Default)]
pub struct MemoryBlogStore {
    tables: RwLock<Tables>,
}

impl MemoryBlogStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlogStore for MemoryBlogStore {
    async fn create_user(&self, new_user: NewUser) -> Result<User, app::Error> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.username == new_user.username) {
            return Err(app::Error::UsernameTaken(new_user.username));
        }
        let user = User {
            id: UserId(tables.next_id()),
            username: new_user.username,
            email: new_user.email,
            first_name: String::new(),
            last_name: String::new(),
            password_hash: new_user.password_hash,
            is_staff: new_user.is_staff,
            is_superuser: new_user.is_superuser,
            is_active: true,
            date_joined: Utc::now(),
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn user_by_id(&self, id: UserId) -> Result<Option<User>, app::Error> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn user_by_username(&self, username: &str) -> Result<Option<User>, app::Error> {
        Ok(self
            .tables
            .read()
            .await
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn update_profile(
        &self,
        id: UserId,
        changes: &ProfileChanges,
    ) -> Result<User, app::Error> {
        let mut tables = self.tables.write().await;
        if tables
            .users
            .values()
            .any(|u| u.id != id && u.username == changes.username)
        {
            return Err(app::Error::UsernameTaken(changes.username.clone()));
        }
        let user = tables
            .users
            .get_mut(&id)
            .ok_or(app::Error::Missing("user"))?;
        user.first_name.clone_from(&changes.first_name);
        user.last_name.clone_from(&changes.last_name);
        user.username.clone_from(&changes.username);
        user.email.clone_from(&changes.email);
        Ok(user.clone())
    }

    async fn delete_user(&self, id: UserId) -> Result<bool, app::Error> {
        let mut tables = self.tables.write().await;
        let owned: Vec<PostId> = tables
            .posts
            .values()
            .filter(|p| p.author == id)
            .map(|p| p.id)
            .collect();
        for post in owned {
            tables.delete_post_cascade(post);
        }
        tables.comments.retain(|_, c| c.author != id);
        Ok(tables.users.remove(&id).is_some())
    }

    async fn create_category(&self, new_category: NewCategory) -> Result<Category, app::Error> {
        let mut tables = self.tables.write().await;
        if tables
            .categories
            .values()
            .any(|c| c.slug == new_category.slug)
        {
            return Err(app::Error::SlugTaken(new_category.slug));
        }
        let category = Category {
            id: CategoryId(tables.next_id()),
            title: new_category.title,
            description: new_category.description,
            slug: new_category.slug,
            is_published: new_category.is_published,
            created_at: Utc::now(),
        };
        tables.categories.insert(category.id, category.clone());
        Ok(category)
    }

    async fn category_by_slug(&self, slug: &str) -> Result<Option<Category>, app::Error> {
        Ok(self
            .tables
            .read()
            .await
            .categories
            .values()
            .find(|c| c.slug == slug)
            .cloned())
    }

    async fn categories(&self) -> Result<Vec<Category>, app::Error> {
        let mut categories: Vec<_> = self
            .tables
            .read()
            .await
            .categories
            .values()
            .cloned()
            .collect();
        categories.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(categories)
    }

    async fn delete_category(&self, id: CategoryId) -> Result<bool, app::Error> {
        let mut tables = self.tables.write().await;
        for post in tables.posts.values_mut() {
            if post.category == Some(id) {
                post.category = None;
            }
        }
        Ok(tables.categories.remove(&id).is_some())
    }

    async fn create_location(&self, new_location: NewLocation) -> Result<Location, app::Error> {
        let mut tables = self.tables.write().await;
        let location = Location {
            id: LocationId(tables.next_id()),
            name: new_location.name,
            is_published: new_location.is_published,
            created_at: Utc::now(),
        };
        tables.locations.insert(location.id, location.clone());
        Ok(location)
    }

    async fn locations(&self) -> Result<Vec<Location>, app::Error> {
        let mut locations: Vec<_> = self
            .tables
            .read()
            .await
            .locations
            .values()
            .cloned()
            .collect();
        locations.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(locations)
    }

    async fn delete_location(&self, id: LocationId) -> Result<bool, app::Error> {
        let mut tables = self.tables.write().await;
        for post in tables.posts.values_mut() {
            if post.location == Some(id) {
                post.location = None;
            }
        }
        Ok(tables.locations.remove(&id).is_some())
    }

    async fn create_post(&self, author: UserId, draft: &PostDraft) -> Result<PostId, app::Error> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&author) {
            return Err(app::Error::Missing("post author"));
        }
        tables.check_references(draft)?;
        let id = PostId(tables.next_id());
        tables.posts.insert(
            id,
            PostRecord {
                id,
                title: draft.title.clone(),
                text: draft.text.clone(),
                pub_date: draft.pub_date,
                author,
                location: draft.location,
                category: draft.category,
                is_published: draft.is_published,
                image: draft.image.clone(),
                created_at: Utc::now(),
            },
        );
        Ok(id)
    }

    async fn post_by_id(&self, id: PostId) -> Result<Option<Post>, app::Error> {
        let tables = self.tables.read().await;
        tables
            .posts
            .get(&id)
            .map(|record| tables.hydrate_post(record))
            .transpose()
    }

    async fn update_post(&self, id: PostId, draft: &PostDraft) -> Result<(), app::Error> {
        let mut tables = self.tables.write().await;
        tables.check_references(draft)?;
        let record = tables
            .posts
            .get_mut(&id)
            .ok_or(app::Error::Missing("post"))?;
        record.title.clone_from(&draft.title);
        record.text.clone_from(&draft.text);
        record.pub_date = draft.pub_date;
        record.location = draft.location;
        record.category = draft.category;
        record.is_published = draft.is_published;
        record.image.clone_from(&draft.image);
        Ok(())
    }

    async fn delete_post(&self, id: PostId) -> Result<bool, app::Error> {
        Ok(self.tables.write().await.delete_post_cascade(id))
    }

    async fn count_posts(&self, query: &PostQuery) -> Result<usize, app::Error> {
        Ok(self.tables.read().await.matching_posts(query)?.len())
    }

    async fn list_posts(
        &self,
        query: &PostQuery,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Post>, app::Error> {
        Ok(self
            .tables
            .read()
            .await
            .matching_posts(query)?
            .into_iter()
            .skip(offset)
            .take(limit)
            .collect())
    }

    async fn create_comment(
        &self,
        post: PostId,
        author: UserId,
        text: &str,
    ) -> Result<CommentId, app::Error> {
        let mut tables = self.tables.write().await;
        if !tables.posts.contains_key(&post) {
            return Err(app::Error::Missing("post"));
        }
        if !tables.users.contains_key(&author) {
            return Err(app::Error::Missing("comment author"));
        }
        let id = CommentId(tables.next_id());
        tables.comments.insert(
            id,
            CommentRecord {
                id,
                post,
                author,
                text: text.to_owned(),
                created_at: Utc::now(),
            },
        );
        Ok(id)
    }

    async fn comments_for_post(&self, post: PostId) -> Result<Vec<Comment>, app::Error> {
        let tables = self.tables.read().await;
        let mut comments = tables
            .comments
            .values()
            .filter(|c| c.post == post)
            .map(|c| tables.hydrate_comment(c))
            .collect::<Result<Vec<_>, _>>()?;
        comments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(comments)
    }

    async fn authored_comment(
        &self,
        post: PostId,
        comment: CommentId,
        author: UserId,
    ) -> Result<Option<Comment>, app::Error> {
        let tables = self.tables.read().await;
        tables
            .comments
            .get(&comment)
            .filter(|c| c.post == post && c.author == author)
            .map(|c| tables.hydrate_comment(c))
            .transpose()
    }

    async fn update_comment(&self, id: CommentId, text: &str) -> Result<(), app::Error> {
        let mut tables = self.tables.write().await;
        let comment = tables
            .comments
            .get_mut(&id)
            .ok_or(app::Error::Missing("comment"))?;
        comment.text = text.to_owned();
        Ok(())
    }

    async fn delete_comment(&self, id: CommentId) -> Result<bool, app::Error> {
        Ok(self.tables.write().await.comments.remove(&id).is_some())
    }
}
