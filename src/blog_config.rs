use std::{path::PathBuf, sync::LazyLock};

use serde::Deserialize;
use tokio::sync::RwLock;

#[derive(Clone, Debug, Deserialize)]
pub struct BlogConfig {
    /// Postgres connection string. Without it the server keeps everything in memory.
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default = "default_media_root")]
    pub media_root: PathBuf,
    #[serde(default = "default_email_file_path")]
    pub email_file_path: PathBuf,
    #[serde(default = "default_from_email")]
    pub default_from_email: String,
    #[serde(default = "default_posts_per_page")]
    pub posts_per_page: usize,
    /// Only send the session cookie over HTTPS.
    #[serde(default)]
    pub secure_cookies: bool,
}

pub fn default_media_root() -> PathBuf {
    PathBuf::from("media")
}

pub fn default_email_file_path() -> PathBuf {
    PathBuf::from("sent_emails")
}

pub fn default_from_email() -> String {
    "from@example.com".to_owned()
}

pub fn default_posts_per_page() -> usize {
    10
}

impl Default for BlogConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            media_root: default_media_root(),
            email_file_path: default_email_file_path(),
            default_from_email: default_from_email(),
            posts_per_page: default_posts_per_page(),
            secure_cookies: false,
        }
    }
}

static CONFIG: LazyLock<RwLock<Option<BlogConfig>>> = LazyLock::new(|| RwLock::new(None));

/// Loads or reloads the config. Must be called outside of the tokio runtime.
pub fn load_config() -> Result<(), config::ConfigError> {
    let _ = dotenvy::dotenv();
    let loaded = config::Config::builder()
        .add_source(config::File::new("blogicum.toml", config::FileFormat::Toml).required(false))
        .add_source(config::Environment::with_prefix("BLOGICUM"))
        .build()?
        .try_deserialize::<BlogConfig>()?;
    *CONFIG.blocking_write() = Some(loaded);
    Ok(())
}

/// Fetches the active config. Will panic if `load_config()` was not called at least once prior.
pub async fn blog_config() -> BlogConfig {
    CONFIG
        .read()
        .await
        .as_ref()
        .expect("config was not yet loaded!")
        .clone()
}
