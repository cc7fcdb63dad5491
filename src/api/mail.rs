use axum::extract::State;
use tracing::error;

use crate::api::GlobalServerContext;
use crate::api::error::PageError;

const TEST_RECIPIENT: &str = "to@example.com";

/// Sends a fixed message through the configured transport so an operator can check
/// that mail ends up where it should.
pub async fn send_test_email(
    State(state): State<GlobalServerContext>,
) -> Result<String, PageError> {
    let mailer = state.mailer.clone();
    tokio::task::spawn_blocking(move || {
        mailer.send(
            "Test email",
            "This is an example of a test email.",
            &[TEST_RECIPIENT],
        )
    })
    .await
    .map_err(|e| {
        error!("mail task failed {e}");
        PageError::Server
    })??;
    Ok(format!(
        "Test email sent. Check the {}/ directory.",
        state.mailer.dir().display()
    ))
}
