use argon2::{
    PasswordHash, PasswordVerifier as _,
    password_hash::{Salt, SaltString},
};
use rand::Rng as _;
use tracing::error;

use crate::CHACHA_RNG;
use crate::app;
use crate::app::store::BlogStore;
use crate::app::user::User;

pub const PASSWORD_MIN_LENGTH: usize = 8;

pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let argon2 = argon2::Argon2::default();
    CHACHA_RNG.with(|rng| {
        let bytes = rng.borrow_mut().random::<[u8; Salt::RECOMMENDED_LENGTH]>();
        SaltString::encode_b64(&bytes)
            .and_then(|salt| PasswordHash::generate(argon2, password, &salt).map(|h| h.to_string()))
    })
}

pub fn check_password(password: &str, entry_password_hash: &str) -> bool {
    let argon2 = argon2::Argon2::default();
    let entry_hash = match argon2::PasswordHash::try_from(entry_password_hash) {
        Ok(v) => v,
        Err(e) => {
            error!("user entry password hash malformed in database {e}");
            return false;
        }
    };
    argon2
        .verify_password(password.as_bytes(), &entry_hash)
        .is_ok()
}

/// Returns the user only for a correct password on an active account.
pub async fn authenticate(
    store: &dyn BlogStore,
    username: &str,
    password: &str,
) -> Result<Option<User>, app::Error> {
    let Some(user) = store.user_by_username(username).await? else {
        return Ok(None);
    };
    if user.is_active && check_password(password, &user.password_hash) {
        Ok(Some(user))
    } else {
        Ok(None)
    }
}
