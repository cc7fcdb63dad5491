use chrono::{DateTime, Utc};

use crate::app;
use crate::app::paginate::{Page, Paginator};
use crate::app::post::Post;
use crate::app::store::BlogStore;
use crate::app::{CategoryId, UserId};

/// Which posts a listing shows. Results always carry their comment count and come in
/// the default post ordering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostQuery {
    pub author: Option<UserId>,
    pub category: Option<CategoryId>,
    /// Keep only posts publicly visible at this instant.
    pub visible_at: Option<DateTime<Utc>>,
}

impl PostQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_author(mut self, author: UserId) -> Self {
        self.author = Some(author);
        self
    }

    pub fn in_category(mut self, category: CategoryId) -> Self {
        self.category = Some(category);
        self
    }

    pub fn published(mut self, now: DateTime<Utc>) -> Self {
        self.visible_at = Some(now);
        self
    }

    /// Publication filtering is optional so authors can see their own drafts.
    pub fn published_if(self, filter_published: bool, now: DateTime<Utc>) -> Self {
        if filter_published {
            self.published(now)
        } else {
            self
        }
    }

    pub fn matches(&self, post: &Post) -> bool {
        self.author.is_none_or(|a| post.author.id == a)
            && self
                .category
                .is_none_or(|c| post.category.as_ref().is_some_and(|pc| pc.id == c))
            && self.visible_at.is_none_or(|now| post.is_publicly_visible(now))
    }
}

/// Counts the query, then loads only the requested page.
pub async fn posts_page(
    store: &dyn BlogStore,
    query: &PostQuery,
    page_token: Option<&str>,
    per_page: usize,
) -> Result<Page<Post>, app::Error> {
    let count = store.count_posts(query).await?;
    let paginator = Paginator::new(count, per_page);
    let number = paginator.resolve(page_token);
    let range = paginator.bounds(number);
    let items = store.list_posts(query, range.start, range.len()).await?;
    Ok(paginator.page(number, items))
}
