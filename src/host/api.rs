//! The surface of the hosting service that the coordinator relies on.
//!
//! Everything the coordinator learns about a repository comes through
//! [`HostApi`]; tests substitute an in-memory implementation.

use chrono::{DateTime, Utc};
use std::fmt;
use std::future::Future;

use crate::host::HostApiError;
use crate::types::{PrNumber, Sha};

/// A point-in-time view of one pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrSnapshot {
    pub number: PrNumber,
    pub author: String,
    pub head_sha: Sha,
    /// The branch the pull request wants to merge into.
    pub base_ref: String,
    pub updated_at: DateTime<Utc>,
}

/// One comment on a pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentData {
    pub id: u64,
    pub author: String,
    pub body: String,
    pub updated_at: DateTime<Utc>,
}

/// The state reported against a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitState {
    Pending,
    Success,
    Failure,
    Error,
}

impl CommitState {
    pub fn as_api_str(self) -> &'static str {
        match self {
            CommitState::Pending => "pending",
            CommitState::Success => "success",
            CommitState::Failure => "failure",
            CommitState::Error => "error",
        }
    }
}

impl fmt::Display for CommitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_api_str())
    }
}

/// A webhook already registered on the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookInfo {
    pub id: u64,
    pub url: String,
    pub events: Vec<String>,
    pub active: bool,
}

/// Repository-scoped access to the hosting service.
pub trait HostApi: Clone + Send + Sync + 'static {
    fn list_open_pull_requests(
        &self,
    ) -> impl Future<Output = Result<Vec<PrSnapshot>, HostApiError>> + Send;

    fn get_pull_request(
        &self,
        pr: PrNumber,
    ) -> impl Future<Output = Result<PrSnapshot, HostApiError>> + Send;

    /// Comments updated at or after `since`, oldest first.
    fn list_comments_since(
        &self,
        pr: PrNumber,
        since: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<CommentData>, HostApiError>> + Send;

    /// Whether the pull request merges cleanly into its target branch.
    /// An unknown answer (GitHub is still computing it) reads as `false`.
    fn get_mergeable(
        &self,
        pr: PrNumber,
    ) -> impl Future<Output = Result<bool, HostApiError>> + Send;

    fn set_commit_status(
        &self,
        sha: &Sha,
        state: CommitState,
        target_url: Option<&str>,
        description: &str,
    ) -> impl Future<Output = Result<(), HostApiError>> + Send;

    fn post_comment(
        &self,
        pr: PrNumber,
        body: &str,
    ) -> impl Future<Output = Result<(), HostApiError>> + Send;

    fn close_pull_request(
        &self,
        pr: PrNumber,
    ) -> impl Future<Output = Result<(), HostApiError>> + Send;

    fn list_webhooks(&self) -> impl Future<Output = Result<Vec<HookInfo>, HostApiError>> + Send;

    fn register_webhook(
        &self,
        url: &str,
        events: &[&str],
        active: bool,
    ) -> impl Future<Output = Result<(), HostApiError>> + Send;
}
