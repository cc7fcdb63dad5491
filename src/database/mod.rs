pub mod models;
pub mod pg_store;
pub mod schema;

pub use pg_store::PgBlogStore;
