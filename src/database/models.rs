use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::app::category::{Category, CategoryRef};
use crate::app::comment::Comment;
use crate::app::location::{Location, LocationRef};
use crate::app::post::{Post, PostDraft};
use crate::app::user::{User, UserRef};
use crate::app::{CategoryId, CommentId, LocationId, PostId, UserId};
use crate::database::schema::{auth_user, blog_category, blog_location, blog_post};

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = auth_user)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub is_active: bool,
    pub date_joined: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: UserId(row.id),
            username: row.username,
            email: row.email,
            first_name: row.first_name,
            last_name: row.last_name,
            password_hash: row.password_hash,
            is_staff: row.is_staff,
            is_superuser: row.is_superuser,
            is_active: row.is_active,
            date_joined: row.date_joined,
        }
    }
}

#[derive(Insertable)]
#[diesel(table_name = auth_user)]
pub struct NewUserRow<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub is_staff: bool,
    pub is_superuser: bool,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = blog_category)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CategoryRow {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub slug: String,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: CategoryId(row.id),
            title: row.title,
            description: row.description,
            slug: row.slug,
            is_published: row.is_published,
            created_at: row.created_at,
        }
    }
}

#[derive(Insertable)]
#[diesel(table_name = blog_category)]
pub struct NewCategoryRow<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub slug: &'a str,
    pub is_published: bool,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = blog_location)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct LocationRow {
    pub id: i64,
    pub name: String,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
}

impl From<LocationRow> for Location {
    fn from(row: LocationRow) -> Self {
        Self {
            id: LocationId(row.id),
            name: row.name,
            is_published: row.is_published,
            created_at: row.created_at,
        }
    }
}

#[derive(Insertable)]
#[diesel(table_name = blog_location)]
pub struct NewLocationRow<'a> {
    pub name: &'a str,
    pub is_published: bool,
}

/// Post joined with its author, category and location. Field order follows `post_columns!`.
#[derive(Debug, Clone, Queryable)]
pub struct PostJoinRow {
    pub id: i64,
    pub title: String,
    pub text: String,
    pub pub_date: DateTime<Utc>,
    pub is_published: bool,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub author_id: i64,
    pub author_username: String,
    pub category_id: Option<i64>,
    pub category_title: Option<String>,
    pub category_slug: Option<String>,
    pub category_is_published: Option<bool>,
    pub location_id: Option<i64>,
    pub location_name: Option<String>,
    pub location_is_published: Option<bool>,
}

impl PostJoinRow {
    pub fn into_post(self, comment_count: i64) -> Post {
        let category = match (
            self.category_id,
            self.category_title,
            self.category_slug,
            self.category_is_published,
        ) {
            (Some(id), Some(title), Some(slug), Some(is_published)) => Some(CategoryRef {
                id: CategoryId(id),
                title,
                slug,
                is_published,
            }),
            _ => None,
        };
        let location = match (
            self.location_id,
            self.location_name,
            self.location_is_published,
        ) {
            (Some(id), Some(name), Some(is_published)) => Some(LocationRef {
                id: LocationId(id),
                name,
                is_published,
            }),
            _ => None,
        };
        Post {
            id: PostId(self.id),
            title: self.title,
            text: self.text,
            pub_date: self.pub_date,
            author: UserRef {
                id: UserId(self.author_id),
                username: self.author_username,
            },
            location,
            category,
            is_published: self.is_published,
            image: self.image,
            created_at: self.created_at,
            comment_count,
        }
    }
}

#[derive(Insertable)]
#[diesel(table_name = blog_post)]
pub struct NewPostRow<'a> {
    pub title: &'a str,
    pub text: &'a str,
    pub pub_date: DateTime<Utc>,
    pub author_id: i64,
    pub location_id: Option<i64>,
    pub category_id: Option<i64>,
    pub is_published: bool,
    pub image: Option<&'a str>,
}

impl<'a> NewPostRow<'a> {
    pub fn new(author: UserId, draft: &'a PostDraft) -> Self {
        Self {
            title: &draft.title,
            text: &draft.text,
            pub_date: draft.pub_date,
            author_id: author.0,
            location_id: draft.location.map(|l| l.0),
            category_id: draft.category.map(|c| c.0),
            is_published: draft.is_published,
            image: draft.image.as_deref(),
        }
    }
}

/// Clearing the location, category or image must write NULL.
#[derive(AsChangeset)]
#[diesel(table_name = blog_post, treat_none_as_null = true)]
pub struct PostChangeset<'a> {
    pub title: &'a str,
    pub text: &'a str,
    pub pub_date: DateTime<Utc>,
    pub location_id: Option<i64>,
    pub category_id: Option<i64>,
    pub is_published: bool,
    pub image: Option<&'a str>,
}

impl<'a> From<&'a PostDraft> for PostChangeset<'a> {
    fn from(draft: &'a PostDraft) -> Self {
        Self {
            title: &draft.title,
            text: &draft.text,
            pub_date: draft.pub_date,
            location_id: draft.location.map(|l| l.0),
            category_id: draft.category.map(|c| c.0),
            is_published: draft.is_published,
            image: draft.image.as_deref(),
        }
    }
}

/// Comment joined with its author's username.
#[derive(Debug, Clone, Queryable)]
pub struct CommentJoinRow {
    pub id: i64,
    pub post_id: i64,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub author_id: i64,
    pub author_username: String,
}

impl From<CommentJoinRow> for Comment {
    fn from(row: CommentJoinRow) -> Self {
        Self {
            id: CommentId(row.id),
            post: PostId(row.post_id),
            author: UserRef {
                id: UserId(row.author_id),
                username: row.author_username,
            },
            text: row.text,
            created_at: row.created_at,
        }
    }
}
