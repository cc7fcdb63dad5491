use std::path::{Path, PathBuf};

use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::{FileTransport, Message, Transport as _};
use tracing::info;

use crate::app;

/// Writes every outgoing message into a directory instead of talking to an SMTP server.
#[derive(Debug, Clone)]
pub struct Mailer {
    transport: FileTransport,
    from: String,
    dir: PathBuf,
}

impl Mailer {
    pub fn new(dir: impl Into<PathBuf>, from: impl Into<String>) -> Self {
        let dir = dir.into();
        Self {
            transport: FileTransport::new(&dir),
            from: from.into(),
            dir,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Blocks while the file is written. Nothing is retried.
    pub fn send(&self, subject: &str, body: &str, to: &[&str]) -> Result<String, app::Error> {
        std::fs::create_dir_all(&self.dir)?;
        let mut builder = Message::builder()
            .from(self.from.parse::<Mailbox>()?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN);
        for recipient in to {
            builder = builder.to(recipient.parse::<Mailbox>()?);
        }
        let message = builder.body(body.to_owned())?;
        let id = self.transport.send(&message)?;
        info!(%id, subject, "email written to {}", self.dir.display());
        Ok(id)
    }
}
