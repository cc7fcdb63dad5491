use std::collections::HashMap;

use async_trait::async_trait;
use diesel::result::DatabaseErrorKind;
use diesel::{
    BoolExpressionMethods as _, ExpressionMethods as _, NullableExpressionMethods as _,
    OptionalExtension as _, QueryDsl as _, SelectableHelper as _,
};
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::pooled_connection::deadpool::Pool;
use diesel_async::{AsyncPgConnection, RunQueryDsl as _};

use crate::app;
use crate::app::category::{Category, NewCategory};
use crate::app::comment::Comment;
use crate::app::location::{Location, NewLocation};
use crate::app::post::{Post, PostDraft};
use crate::app::query::PostQuery;
use crate::app::store::BlogStore;
use crate::app::user::{NewUser, ProfileChanges, User};
use crate::app::{CategoryId, CommentId, LocationId, PostId, UserId};
use crate::database::models::{
    CategoryRow, CommentJoinRow, LocationRow, NewCategoryRow, NewLocationRow, NewPostRow,
    NewUserRow, PostChangeset, PostJoinRow, UserRow,
};
use crate::database::schema::{auth_user, blog_category, blog_comment, blog_location, blog_post};

/// Posts with everything a listing shows about them.
macro_rules! post_source {
    () => {
        blog_post::table
            .inner_join(auth_user::table)
            .left_join(blog_category::table)
            .left_join(blog_location::table)
    };
}

/// Column order of `PostJoinRow`.
macro_rules! post_columns {
    () => {
        (
            blog_post::id,
            blog_post::title,
            blog_post::text,
            blog_post::pub_date,
            blog_post::is_published,
            blog_post::image,
            blog_post::created_at,
            auth_user::id,
            auth_user::username,
            blog_category::id.nullable(),
            blog_category::title.nullable(),
            blog_category::slug.nullable(),
            blog_category::is_published.nullable(),
            blog_location::id.nullable(),
            blog_location::name.nullable(),
            blog_location::is_published.nullable(),
        )
    };
}

macro_rules! comment_columns {
    () => {
        (
            blog_comment::id,
            blog_comment::post_id,
            blog_comment::text,
            blog_comment::created_at,
            auth_user::id,
            auth_user::username,
        )
    };
}

/// Applies a `PostQuery` to a boxed query over `post_source!()`.
macro_rules! filter_posts {
    ($query:expr, $post_query:expr) => {{
        let post_query: &PostQuery = $post_query;
        let mut query = $query;
        if let Some(author) = post_query.author {
            query = query.filter(blog_post::author_id.eq(author.0));
        }
        if let Some(category) = post_query.category {
            query = query.filter(blog_post::category_id.eq(category.0));
        }
        if let Some(now) = post_query.visible_at {
            query = query
                .filter(blog_post::is_published.eq(true))
                .filter(blog_post::pub_date.le(now))
                .filter(
                    blog_post::category_id
                        .is_null()
                        .or(blog_category::is_published.eq(true)),
                );
        }
        query
    }};
}

fn username_taken(username: &str) -> impl FnOnce(diesel::result::Error) -> app::Error + '_ {
    move |e| match e {
        diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
            app::Error::UsernameTaken(username.to_owned())
        }
        e => e.into(),
    }
}

fn missing_reference(e: diesel::result::Error) -> app::Error {
    match e {
        diesel::result::Error::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _) => {
            app::Error::Missing("referenced category or location")
        }
        e => e.into(),
    }
}

/// `BlogStore` over PostgreSQL. Cascades and nulling on delete are done by the foreign
/// keys declared in `migrations/`.
#[derive(Clone)]
pub struct PgBlogStore {
    pub connection_pool: Pool<AsyncPgConnection>,
}

impl PgBlogStore {
    pub fn connect(database_url: &str) -> Result<Self, app::Error> {
        let conn_manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url);
        Ok(Self {
            connection_pool: Pool::builder(conn_manager).build()?,
        })
    }

    async fn comment_counts(
        conn: &mut AsyncPgConnection,
        ids: &[i64],
    ) -> Result<HashMap<i64, i64>, app::Error> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let counts = blog_comment::table
            .filter(blog_comment::post_id.eq_any(ids))
            .group_by(blog_comment::post_id)
            .select((blog_comment::post_id, diesel::dsl::count_star()))
            .load::<(i64, i64)>(conn)
            .await?;
        Ok(counts.into_iter().collect())
    }
}

#[async_trait]
impl BlogStore for PgBlogStore {
    async fn create_user(&self, new_user: NewUser) -> Result<User, app::Error> {
        let mut conn = self.connection_pool.get().await?;
        let row = diesel::insert_into(auth_user::table)
            .values(&NewUserRow {
                username: &new_user.username,
                email: &new_user.email,
                password_hash: &new_user.password_hash,
                is_staff: new_user.is_staff,
                is_superuser: new_user.is_superuser,
            })
            .returning(UserRow::as_returning())
            .get_result(&mut *conn)
            .await
            .map_err(username_taken(&new_user.username))?;
        Ok(row.into())
    }

    async fn user_by_id(&self, id: UserId) -> Result<Option<User>, app::Error> {
        let mut conn = self.connection_pool.get().await?;
        let row = auth_user::table
            .find(id.0)
            .select(UserRow::as_select())
            .first(&mut *conn)
            .await
            .optional()?;
        Ok(row.map(User::from))
    }

    async fn user_by_username(&self, username: &str) -> Result<Option<User>, app::Error> {
        let mut conn = self.connection_pool.get().await?;
        let row = auth_user::table
            .filter(auth_user::username.eq(username))
            .select(UserRow::as_select())
            .first(&mut *conn)
            .await
            .optional()?;
        Ok(row.map(User::from))
    }

    async fn update_profile(
        &self,
        id: UserId,
        changes: &ProfileChanges,
    ) -> Result<User, app::Error> {
        let mut conn = self.connection_pool.get().await?;
        let row = diesel::update(auth_user::table.find(id.0))
            .set((
                auth_user::first_name.eq(&changes.first_name),
                auth_user::last_name.eq(&changes.last_name),
                auth_user::username.eq(&changes.username),
                auth_user::email.eq(&changes.email),
            ))
            .returning(UserRow::as_returning())
            .get_result(&mut *conn)
            .await
            .map_err(username_taken(&changes.username))?;
        Ok(row.into())
    }

    async fn delete_user(&self, id: UserId) -> Result<bool, app::Error> {
        let mut conn = self.connection_pool.get().await?;
        let rows_deleted = diesel::delete(auth_user::table.find(id.0))
            .execute(&mut *conn)
            .await?;
        Ok(rows_deleted > 0)
    }

    async fn create_category(&self, new_category: NewCategory) -> Result<Category, app::Error> {
        let mut conn = self.connection_pool.get().await?;
        let row = diesel::insert_into(blog_category::table)
            .values(&NewCategoryRow {
                title: &new_category.title,
                description: &new_category.description,
                slug: &new_category.slug,
                is_published: new_category.is_published,
            })
            .returning(CategoryRow::as_returning())
            .get_result(&mut *conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                    app::Error::SlugTaken(new_category.slug.clone())
                }
                e => e.into(),
            })?;
        Ok(row.into())
    }

    async fn category_by_slug(&self, slug: &str) -> Result<Option<Category>, app::Error> {
        let mut conn = self.connection_pool.get().await?;
        let row = blog_category::table
            .filter(blog_category::slug.eq(slug))
            .select(CategoryRow::as_select())
            .first(&mut *conn)
            .await
            .optional()?;
        Ok(row.map(Category::from))
    }

    async fn categories(&self) -> Result<Vec<Category>, app::Error> {
        let mut conn = self.connection_pool.get().await?;
        let rows = blog_category::table
            .order(blog_category::title.asc())
            .select(CategoryRow::as_select())
            .load(&mut *conn)
            .await?;
        Ok(rows.into_iter().map(Category::from).collect())
    }

    async fn delete_category(&self, id: CategoryId) -> Result<bool, app::Error> {
        let mut conn = self.connection_pool.get().await?;
        let rows_deleted = diesel::delete(blog_category::table.find(id.0))
            .execute(&mut *conn)
            .await?;
        Ok(rows_deleted > 0)
    }

    async fn create_location(&self, new_location: NewLocation) -> Result<Location, app::Error> {
        let mut conn = self.connection_pool.get().await?;
        let row = diesel::insert_into(blog_location::table)
            .values(&NewLocationRow {
                name: &new_location.name,
                is_published: new_location.is_published,
            })
            .returning(LocationRow::as_returning())
            .get_result(&mut *conn)
            .await?;
        Ok(row.into())
    }

    async fn locations(&self) -> Result<Vec<Location>, app::Error> {
        let mut conn = self.connection_pool.get().await?;
        let rows = blog_location::table
            .order(blog_location::name.asc())
            .select(LocationRow::as_select())
            .load(&mut *conn)
            .await?;
        Ok(rows.into_iter().map(Location::from).collect())
    }

    async fn delete_location(&self, id: LocationId) -> Result<bool, app::Error> {
        let mut conn = self.connection_pool.get().await?;
        let rows_deleted = diesel::delete(blog_location::table.find(id.0))
            .execute(&mut *conn)
            .await?;
        Ok(rows_deleted > 0)
    }

    async fn create_post(&self, author: UserId, draft: &PostDraft) -> Result<PostId, app::Error> {
        let mut conn = self.connection_pool.get().await?;
        let id = diesel::insert_into(blog_post::table)
            .values(&NewPostRow::new(author, draft))
            .returning(blog_post::id)
            .get_result::<i64>(&mut *conn)
            .await
            .map_err(missing_reference)?;
        Ok(PostId(id))
    }

    async fn post_by_id(&self, id: PostId) -> Result<Option<Post>, app::Error> {
        let mut conn = self.connection_pool.get().await?;
        let row: Option<PostJoinRow> = post_source!()
            .filter(blog_post::id.eq(id.0))
            .select(post_columns!())
            .first(&mut *conn)
            .await
            .optional()?;
        let Some(row) = row else {
            return Ok(None);
        };
        let comment_count = blog_comment::table
            .filter(blog_comment::post_id.eq(id.0))
            .count()
            .get_result::<i64>(&mut *conn)
            .await?;
        Ok(Some(row.into_post(comment_count)))
    }

    async fn update_post(&self, id: PostId, draft: &PostDraft) -> Result<(), app::Error> {
        let mut conn = self.connection_pool.get().await?;
        let rows_updated = diesel::update(blog_post::table.find(id.0))
            .set(&PostChangeset::from(draft))
            .execute(&mut *conn)
            .await
            .map_err(missing_reference)?;
        if rows_updated == 0 {
            return Err(app::Error::Missing("post"));
        }
        Ok(())
    }

    async fn delete_post(&self, id: PostId) -> Result<bool, app::Error> {
        let mut conn = self.connection_pool.get().await?;
        let rows_deleted = diesel::delete(blog_post::table.find(id.0))
            .execute(&mut *conn)
            .await?;
        Ok(rows_deleted > 0)
    }

    async fn count_posts(&self, query: &PostQuery) -> Result<usize, app::Error> {
        let mut conn = self.connection_pool.get().await?;
        let count: i64 = filter_posts!(
            post_source!()
                .select(diesel::dsl::count_star())
                .into_boxed(),
            query
        )
        .get_result(&mut *conn)
        .await?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    async fn list_posts(
        &self,
        query: &PostQuery,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Post>, app::Error> {
        let mut conn = self.connection_pool.get().await?;
        let rows: Vec<PostJoinRow> =
            filter_posts!(post_source!().select(post_columns!()).into_boxed(), query)
                .order((
                    blog_post::pub_date.desc(),
                    blog_post::title.asc(),
                    blog_post::id.asc(),
                ))
                .offset(i64::try_from(offset).unwrap_or(i64::MAX))
                .limit(i64::try_from(limit).unwrap_or(i64::MAX))
                .load(&mut *conn)
                .await?;
        let ids: Vec<i64> = rows.iter().map(|row| row.id).collect();
        let counts = Self::comment_counts(&mut *conn, &ids).await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let comment_count = counts.get(&row.id).copied().unwrap_or_default();
                row.into_post(comment_count)
            })
            .collect())
    }

    async fn create_comment(
        &self,
        post: PostId,
        author: UserId,
        text: &str,
    ) -> Result<CommentId, app::Error> {
        let mut conn = self.connection_pool.get().await?;
        let id = diesel::insert_into(blog_comment::table)
            .values((
                blog_comment::post_id.eq(post.0),
                blog_comment::author_id.eq(author.0),
                blog_comment::text.eq(text),
            ))
            .returning(blog_comment::id)
            .get_result::<i64>(&mut *conn)
            .await?;
        Ok(CommentId(id))
    }

    async fn comments_for_post(&self, post: PostId) -> Result<Vec<Comment>, app::Error> {
        let mut conn = self.connection_pool.get().await?;
        let rows: Vec<CommentJoinRow> = blog_comment::table
            .inner_join(auth_user::table)
            .filter(blog_comment::post_id.eq(post.0))
            .order((blog_comment::created_at.asc(), blog_comment::id.asc()))
            .select(comment_columns!())
            .load(&mut *conn)
            .await?;
        Ok(rows.into_iter().map(Comment::from).collect())
    }

    async fn authored_comment(
        &self,
        post: PostId,
        comment: CommentId,
        author: UserId,
    ) -> Result<Option<Comment>, app::Error> {
        let mut conn = self.connection_pool.get().await?;
        let row: Option<CommentJoinRow> = blog_comment::table
            .inner_join(auth_user::table)
            .filter(blog_comment::id.eq(comment.0))
            .filter(blog_comment::post_id.eq(post.0))
            .filter(blog_comment::author_id.eq(author.0))
            .select(comment_columns!())
            .first(&mut *conn)
            .await
            .optional()?;
        Ok(row.map(Comment::from))
    }

    async fn update_comment(&self, id: CommentId, text: &str) -> Result<(), app::Error> {
        let mut conn = self.connection_pool.get().await?;
        let rows_updated = diesel::update(blog_comment::table.find(id.0))
            .set(blog_comment::text.eq(text))
            .execute(&mut *conn)
            .await?;
        if rows_updated == 0 {
            return Err(app::Error::Missing("comment"));
        }
        Ok(())
    }

    async fn delete_comment(&self, id: CommentId) -> Result<bool, app::Error> {
        let mut conn = self.connection_pool.get().await?;
        let rows_deleted = diesel::delete(blog_comment::table.find(id.0))
            .execute(&mut *conn)
            .await?;
        Ok(rows_deleted > 0)
    }
}
