//! Bookkeeping of builds the coordinator has dispatched and not yet seen end.

use tracing::debug;

use crate::executor::BuildHandle;
use crate::types::{PrNumber, Sha};

/// One dispatched build together with the handle that controls it.
#[derive(Debug)]
pub struct TrackedBuild<H> {
    pub pull: PrNumber,
    pub head_commit: Sha,
    pub merged: bool,
    handle: H,
}

impl<H: BuildHandle> TrackedBuild<H> {
    pub fn new(pull: PrNumber, head_commit: Sha, merged: bool, handle: H) -> Self {
        TrackedBuild {
            pull,
            head_commit,
            merged,
            handle,
        }
    }
}

/// The set of in-flight builds for one repository.
#[derive(Debug, Default)]
pub struct BuildTracker<H> {
    builds: Vec<TrackedBuild<H>>,
}

impl<H: BuildHandle> BuildTracker<H> {
    pub fn new() -> Self {
        BuildTracker { builds: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.builds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.builds.is_empty()
    }

    pub fn is_tracking(&self, pull: PrNumber) -> bool {
        self.builds.iter().any(|b| b.pull == pull)
    }

    pub fn track(&mut self, build: TrackedBuild<H>) {
        debug!(pr = %build.pull, commit = %build.head_commit.short(), "tracking build");
        self.builds.push(build);
    }

    /// Stops the oldest cancellable build for the given pull request and
    /// forgets it. A build that refuses cancellation (already finished, say)
    /// stays tracked until [`reap`](Self::reap) collects it. Returns whether
    /// a build was stopped.
    pub fn cancel_build(&mut self, pull: PrNumber) -> bool {
        let mut i = 0;
        while i < self.builds.len() {
            if self.builds[i].pull == pull && self.builds[i].handle.cancel() {
                let build = self.builds.remove(i);
                debug!(pr = %pull, commit = %build.head_commit.short(), "cancelled superseded build");
                return true;
            }
            i += 1;
        }
        false
    }

    /// Forgets builds that have finished. Returns how many were dropped.
    pub fn reap(&mut self) -> usize {
        let before = self.builds.len();
        self.builds.retain(|b| !b.handle.is_finished());
        before - self.builds.len()
    }
}
