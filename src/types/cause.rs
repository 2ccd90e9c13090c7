//! The description of why a build was started, and the parameters handed to
//! the executor alongside it.

use serde::{Deserialize, Serialize};

use crate::types::{PrNumber, Sha};

/// Why a build was dispatched. Kept with the tracked build so a finished
/// build can be traced back to the commit and pull request it tested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildCause {
    pub commit: Sha,
    pub pull: PrNumber,
    /// When true the build should test the merge of the pull request into
    /// its target branch rather than the head commit alone.
    pub merged: bool,
    pub target_branch: String,
}

impl BuildCause {
    pub fn new(
        commit: Sha,
        pull: PrNumber,
        merged: bool,
        target_branch: impl Into<String>,
    ) -> Self {
        BuildCause {
            commit,
            pull,
            merged,
            target_branch: target_branch.into(),
        }
    }

    /// The ref the executor should check out. Merge builds use GitHub's
    /// synthetic merge ref; otherwise the head commit itself.
    pub fn build_ref(&self) -> String {
        if self.merged {
            format!("origin/pr/{}/merge", self.pull.0)
        } else {
            self.commit.to_string()
        }
    }

    pub fn parameters(&self) -> BuildParameters {
        BuildParameters {
            sha1: self.build_ref(),
            actual_commit: self.commit.clone(),
            base_branch: self.target_branch.clone(),
            pull_id: self.pull,
        }
    }

    pub fn short_description(&self) -> String {
        format!("GitHub pull request {} of commit {}", self.pull, self.commit)
    }
}

/// The named parameters injected into a dispatched build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildParameters {
    /// What to check out: either the head commit or the merge ref.
    pub sha1: String,
    /// Always the head commit, even for merge builds.
    pub actual_commit: Sha,
    pub base_branch: String,
    pub pull_id: PrNumber,
}
