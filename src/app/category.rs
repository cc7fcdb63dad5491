use chrono::{DateTime, Utc};

use crate::app::CategoryId;

/// A thematic section of the blog. Managed by administrators only.
#[derive(Debug, Clone, PartialEq)]
pub struct Category {
    pub id: CategoryId,
    pub title: String,
    pub description: String,
    /// Unique, used in `/category/{slug}/`.
    pub slug: String,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCategory {
    pub title: String,
    pub description: String,
    pub slug: String,
    pub is_published: bool,
}

/// The part of a category a post listing needs.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryRef {
    pub id: CategoryId,
    pub title: String,
    pub slug: String,
    pub is_published: bool,
}

impl From<&Category> for CategoryRef {
    fn from(category: &Category) -> Self {
        Self {
            id: category.id,
            title: category.title.clone(),
            slug: category.slug.clone(),
            is_published: category.is_published,
        }
    }
}
