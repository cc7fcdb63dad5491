use chrono::{DateTime, Utc};

use crate::app::UserId;
use crate::app::login::hash_password;
use crate::app::store::BlogStore;
use crate::app;

pub const USERNAME_MAX_LENGTH: usize = 150;

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: UserId,
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

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_owned()
    }

    pub fn to_ref(&self) -> UserRef {
        UserRef {
            id: self.id,
            username: self.username.clone(),
        }
    }
}

/// Author reference attached to posts and comments.
#[derive(Debug, Clone, PartialEq)]
pub struct UserRef {
    pub id: UserId,
    pub username: String,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub is_staff: bool,
    pub is_superuser: bool,
}

/// Fields a user may change about themself.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileChanges {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
}

/// Letters, digits and `@.+-_`, like most auth systems accept.
pub fn is_valid_username(username: &str) -> bool {
    !username.is_empty()
        && username.chars().count() <= USERNAME_MAX_LENGTH
        && username
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
}

pub async fn create_user(
    store: &dyn BlogStore,
    username: &str,
    email: &str,
    password: &str,
    superuser: bool,
) -> Result<User, app::Error> {
    let password_hash = hash_password(password)?;
    store
        .create_user(NewUser {
            username: username.to_owned(),
            email: email.to_owned(),
            password_hash,
            is_staff: superuser,
            is_superuser: superuser,
        })
        .await
}
