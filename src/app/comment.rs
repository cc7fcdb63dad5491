use chrono::{DateTime, Utc};

use crate::app::user::UserRef;
use crate::app::{CommentId, PostId};

#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub id: CommentId,
    pub post: PostId,
    pub author: UserRef,
    pub text: String,
    pub created_at: DateTime<Utc>,
}
