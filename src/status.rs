//! Publishing build progress back to the pull request.

use tracing::{error, info};

use crate::host::{CommitState, HostApi};
use crate::types::{PrNumber, Sha};

/// Reports build state against commits, optionally falling back to a pull
/// request comment when the status API is unavailable (for example when the
/// token lacks the `repo:status` scope).
pub struct StatusReporter<H> {
    host: H,
    comment_fallback: bool,
}

impl<H: HostApi> StatusReporter<H> {
    pub fn new(host: H, comment_fallback: bool) -> Self {
        StatusReporter {
            host,
            comment_fallback,
        }
    }

    pub async fn publish(
        &self,
        pr: PrNumber,
        sha: &Sha,
        state: CommitState,
        target_url: Option<&str>,
        message: &str,
    ) {
        info!(pr = %pr, commit = %sha.short(), state = %state, message, "publishing commit status");
        let result = self
            .host
            .set_commit_status(sha, state, target_url, message)
            .await;
        let Err(err) = result else { return };
        if !self.comment_fallback {
            error!(pr = %pr, commit = %sha.short(), error = %err, "could not set commit status");
            return;
        }
        info!(pr = %pr, error = %err, "could not set commit status, falling back to a comment");
        if let Err(err) = self.host.post_comment(pr, message).await {
            error!(pr = %pr, error = %err, "could not post fallback comment either");
        }
    }
}
