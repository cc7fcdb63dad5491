//! Blogicum, a server-rendered blog: posts grouped by category and location, author
//! profiles, and comments.

use std::cell::RefCell;

use rand::SeedableRng as _;
use rand_chacha::ChaCha20Rng;

pub mod api;
pub mod app;
pub mod blog_config;
pub mod database;

thread_local! {
    pub static CHACHA_RNG: RefCell<ChaCha20Rng> = RefCell::new(ChaCha20Rng::from_os_rng());
}
