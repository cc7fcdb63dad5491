use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use crate::app::category::CategoryRef;
use crate::app::location::LocationRef;
use crate::app::user::UserRef;
use crate::app::{CategoryId, LocationId, PostId};

pub const TITLE_MAX_LENGTH: usize = 256;

/// A post with its relations loaded and its comment count annotated.
#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub id: PostId,
    pub title: String,
    pub text: String,
    /// Setting it in the future schedules the post.
    pub pub_date: DateTime<Utc>,
    pub author: UserRef,
    pub location: Option<LocationRef>,
    pub category: Option<CategoryRef>,
    pub is_published: bool,
    /// Path relative to the media root.
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub comment_count: i64,
}

impl Post {
    /// Published, due, and not hidden through its category.
    pub fn is_publicly_visible(&self, now: DateTime<Utc>) -> bool {
        self.is_published
            && self.pub_date <= now
            && self.category.as_ref().is_none_or(|c| c.is_published)
    }

    pub fn excerpt(&self) -> String {
        const EXCERPT_CHARS: usize = 300;
        if self.text.chars().count() <= EXCERPT_CHARS {
            return self.text.clone();
        }
        let mut excerpt: String = self.text.chars().take(EXCERPT_CHARS).collect();
        excerpt.push('…');
        excerpt
    }
}

/// Newest first, then alphabetical.
pub fn default_ordering(a: &Post, b: &Post) -> Ordering {
    b.pub_date
        .cmp(&a.pub_date)
        .then_with(|| a.title.cmp(&b.title))
        .then_with(|| a.id.cmp(&b.id))
}

/// Everything the post form controls. Author and creation time are assigned by the server.
#[derive(Debug, Clone, PartialEq)]
pub struct PostDraft {
    pub title: String,
    pub text: String,
    pub pub_date: DateTime<Utc>,
    pub location: Option<LocationId>,
    pub category: Option<CategoryId>,
    pub is_published: bool,
    pub image: Option<String>,
}

impl PostDraft {
    pub fn from_post(post: &Post) -> Self {
        Self {
            title: post.title.clone(),
            text: post.text.clone(),
            pub_date: post.pub_date,
            location: post.location.as_ref().map(|l| l.id),
            category: post.category.as_ref().map(|c| c.id),
            is_published: post.is_published,
            image: post.image.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::app::UserId;

    fn post(id: i64, title: &str, pub_date: DateTime<Utc>) -> Post {
        Post {
            id: PostId(id),
            title: title.to_owned(),
            text: String::new(),
            pub_date,
            author: UserRef {
                id: UserId(1),
                username: "author".to_owned(),
            },
            location: None,
            category: None,
            is_published: true,
            image: None,
            created_at: pub_date,
            comment_count: 0,
        }
    }

    #[test]
    fn ordering_is_newest_first_then_title() {
        let new = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let old = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        let mut posts = vec![post(1, "B", new), post(2, "A", new), post(3, "C", old)];
        posts.sort_by(default_ordering);
        let titles: Vec<_> = posts.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, ["A", "B", "C"]);
    }

    #[test]
    fn visibility_requires_flag_date_and_category() {
        let now = Utc::now();
        let mut p = post(1, "visible", now - Duration::hours(1));
        assert!(p.is_publicly_visible(now));

        p.pub_date = now + Duration::hours(1);
        assert!(!p.is_publicly_visible(now));
        p.pub_date = now;
        assert!(p.is_publicly_visible(now));

        p.is_published = false;
        assert!(!p.is_publicly_visible(now));
        p.is_published = true;

        p.category = Some(CategoryRef {
            id: CategoryId(1),
            title: "hidden".to_owned(),
            slug: "hidden".to_owned(),
            is_published: false,
        });
        assert!(!p.is_publicly_visible(now));
    }

    #[test]
    fn excerpt_truncates_long_text() {
        let mut p = post(1, "long", Utc::now());
        p.text = "я".repeat(400);
        let excerpt = p.excerpt();
        assert_eq!(excerpt.chars().count(), 301);
        assert!(excerpt.ends_with('…'));
    }
}
