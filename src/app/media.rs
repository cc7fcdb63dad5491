use std::path::{Path, PathBuf};

use tracing::{info, warn};
use uuid::Uuid;

use crate::app;

const POST_IMAGE_DIR: &str = "posts";

/// A file received with the post form.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Files uploaded by users, served back under `/media/`.
#[derive(Debug, Clone)]
pub struct MediaStorage {
    root: PathBuf,
}

impl MediaStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stores the image under a fresh name and returns its path relative to the root.
    pub async fn save_post_image(&self, upload: &ImageUpload) -> Result<String, app::Error> {
        let extension = upload
            .file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_else(|| "bin".to_owned());
        let relative = format!("{POST_IMAGE_DIR}/{}.{extension}", Uuid::new_v4());
        let dir = self.root.join(POST_IMAGE_DIR);
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(self.root.join(&relative), &upload.bytes).await?;
        info!(path = %relative, bytes = upload.bytes.len(), "stored post image");
        Ok(relative)
    }

    /// Best effort, a leftover file is harmless.
    pub async fn remove(&self, relative: &str) {
        if relative.contains("..") {
            warn!(path = relative, "refusing to remove media path outside the root");
            return;
        }
        if let Err(e) = tokio::fs::remove_file(self.root.join(relative)).await {
            warn!(path = relative, "failed to remove media file {e}");
        }
    }
}
