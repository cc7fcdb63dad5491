use std::fmt;

use serde::{Deserialize, Serialize};

pub mod category;
pub mod comment;
pub mod error;
pub mod forms;
pub mod location;
pub mod login;
pub mod mail;
pub mod media;
pub mod memory;
pub mod paginate;
pub mod post;
pub mod query;
pub mod store;
pub mod user;

pub use error::Error;

macro_rules! id_type {
    ($type_name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Copy, Deserialize, Serialize, Hash)]
        #[serde(transparent)]
        pub struct $type_name(pub i64);

        impl From<i64> for $type_name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $type_name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

id_type!(UserId);

id_type!(CategoryId);

id_type!(LocationId);

id_type!(PostId);

id_type!(CommentId);
