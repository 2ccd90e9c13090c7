//! Typed webhook events, decoupled from the raw payload shapes.

use chrono::{DateTime, Utc};

use crate::host::PrSnapshot;
use crate::types::{PrNumber, RepoId, Sha};

/// A webhook delivery the bot knows how to act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    PullRequest(PullRequestEvent),
    IssueComment(IssueCommentEvent),
}

impl HostEvent {
    /// The repository the event concerns, used to route it to subscribers.
    pub fn repo(&self) -> &RepoId {
        match self {
            HostEvent::PullRequest(e) => &e.repo,
            HostEvent::IssueComment(e) => &e.repo,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrAction {
    Opened,
    Reopened,
    Synchronize,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestEvent {
    pub repo: RepoId,
    pub action: PrAction,
    pub number: PrNumber,
    pub author: String,
    pub head_sha: Sha,
    pub base_ref: String,
    pub updated_at: DateTime<Utc>,
}

impl PullRequestEvent {
    /// The snapshot carried inside the event payload.
    pub fn snapshot(&self) -> PrSnapshot {
        PrSnapshot {
            number: self.number,
            author: self.author.clone(),
            head_sha: self.head_sha.clone(),
            base_ref: self.base_ref.clone(),
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentAction {
    Created,
    Edited,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueCommentEvent {
    pub repo: RepoId,
    pub action: CommentAction,
    /// `None` when the comment sits on a plain issue rather than a pull
    /// request.
    pub pr_number: Option<PrNumber>,
    pub comment_id: u64,
    pub author: String,
    pub body: String,
    pub updated_at: DateTime<Utc>,
}
