//! The seam between pull request tracking and whatever actually runs builds.

use std::future::Future;
use tracing::info;

use crate::types::{BuildCause, BuildParameters};

/// A running (or queued) build that can be observed and stopped.
pub trait BuildHandle: Send + Sync + 'static {
    /// Attempts to stop the build. Returns whether cancellation succeeded;
    /// a build that already finished cannot be cancelled.
    fn cancel(&self) -> bool;

    fn is_finished(&self) -> bool;
}

/// Submits builds to an execution backend.
pub trait BuildExecutor: Send + Sync + 'static {
    type Handle: BuildHandle;

    /// Submits a build. Returns `None` when the backend refused the
    /// submission; the caller must treat that as "no build was started".
    fn submit(
        &self,
        cause: BuildCause,
        parameters: BuildParameters,
    ) -> impl Future<Output = Option<Self::Handle>> + Send;
}

/// An executor that only logs what it would have built. Useful for dry runs
/// and for bringing a deployment up before wiring in a real backend.
#[derive(Debug, Clone, Default)]
pub struct LoggingExecutor;

impl LoggingExecutor {
    pub fn new() -> Self {
        LoggingExecutor
    }
}

#[derive(Debug)]
pub struct LoggedBuild {
    cause: BuildCause,
}

impl BuildHandle for LoggedBuild {
    fn cancel(&self) -> bool {
        info!(pr = %self.cause.pull, commit = %self.cause.commit, "would cancel build");
        true
    }

    fn is_finished(&self) -> bool {
        // A logged build is over the moment it is logged.
        true
    }
}

impl BuildExecutor for LoggingExecutor {
    type Handle = LoggedBuild;

    async fn submit(&self, cause: BuildCause, parameters: BuildParameters) -> Option<LoggedBuild> {
        info!(
            pr = %cause.pull,
            commit = %cause.commit,
            sha1 = %parameters.sha1,
            base_branch = %parameters.base_branch,
            "would submit build: {}",
            cause.short_description()
        );
        Some(LoggedBuild { cause })
    }
}
