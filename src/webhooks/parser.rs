//! Turns raw webhook payloads into [`HostEvent`]s.
//!
//! Event types and actions the bot does not care about parse to `Ok(None)`;
//! only malformed payloads of a known type are errors.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

use crate::types::{PrNumber, RepoId, Sha};
use crate::webhooks::events::{
    CommentAction, HostEvent, IssueCommentEvent, PrAction, PullRequestEvent,
};

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed {event_type} payload: {source}")]
    Malformed {
        event_type: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Deserialize)]
struct RawAccount {
    login: String,
}

#[derive(Debug, Deserialize)]
struct RawRepository {
    name: String,
    owner: RawAccount,
}

impl RawRepository {
    fn id(&self) -> RepoId {
        RepoId::new(self.owner.login.clone(), self.name.clone())
    }
}

#[derive(Debug, Deserialize)]
struct RawPrPayload {
    action: String,
    pull_request: RawPullRequest,
    repository: RawRepository,
}

#[derive(Debug, Deserialize)]
struct RawPullRequest {
    number: u64,
    user: Option<RawAccount>,
    head: RawHead,
    base: RawBase,
    updated_at: Option<DateTime<Utc>>,
    created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct RawHead {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct RawBase {
    #[serde(rename = "ref")]
    ref_field: String,
}

#[derive(Debug, Deserialize)]
struct RawCommentPayload {
    action: String,
    comment: RawComment,
    issue: RawIssue,
    repository: RawRepository,
}

#[derive(Debug, Deserialize)]
struct RawComment {
    id: u64,
    user: RawAccount,
    body: Option<String>,
    updated_at: Option<DateTime<Utc>>,
    created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct RawIssue {
    number: u64,
    /// Present (as an object) exactly when the issue is a pull request.
    pull_request: Option<serde_json::Value>,
}

/// Parses one webhook delivery. `event_type` is the `X-GitHub-Event` header
/// value; `payload` is the raw request body.
pub fn parse_webhook(event_type: &str, payload: &[u8]) -> Result<Option<HostEvent>, ParseError> {
    match event_type {
        "pull_request" => parse_pull_request(payload),
        "issue_comment" => parse_issue_comment(payload),
        _ => Ok(None),
    }
}

fn malformed(event_type: &'static str) -> impl FnOnce(serde_json::Error) -> ParseError {
    move |source| ParseError::Malformed {
        event_type: event_type.to_string(),
        source,
    }
}

fn parse_pull_request(payload: &[u8]) -> Result<Option<HostEvent>, ParseError> {
    let raw: RawPrPayload =
        serde_json::from_slice(payload).map_err(malformed("pull_request"))?;
    let action = match raw.action.as_str() {
        "opened" => PrAction::Opened,
        "reopened" => PrAction::Reopened,
        "synchronize" => PrAction::Synchronize,
        "closed" => PrAction::Closed,
        _ => return Ok(None),
    };
    let pull = raw.pull_request;
    Ok(Some(HostEvent::PullRequest(PullRequestEvent {
        repo: raw.repository.id(),
        action,
        number: PrNumber(pull.number),
        author: pull.user.map(|u| u.login).unwrap_or_default(),
        head_sha: Sha::new(pull.head.sha),
        base_ref: pull.base.ref_field,
        updated_at: pull.updated_at.or(pull.created_at).unwrap_or_else(Utc::now),
    })))
}

fn parse_issue_comment(payload: &[u8]) -> Result<Option<HostEvent>, ParseError> {
    let raw: RawCommentPayload =
        serde_json::from_slice(payload).map_err(malformed("issue_comment"))?;
    let action = match raw.action.as_str() {
        "created" => CommentAction::Created,
        "edited" => CommentAction::Edited,
        "deleted" => CommentAction::Deleted,
        _ => return Ok(None),
    };
    let pr_number = raw
        .issue
        .pull_request
        .is_some()
        .then_some(PrNumber(raw.issue.number));
    let updated_at = raw
        .comment
        .updated_at
        .or(raw.comment.created_at)
        .unwrap_or_else(Utc::now);
    Ok(Some(HostEvent::IssueComment(IssueCommentEvent {
        repo: raw.repository.id(),
        action,
        pr_number,
        comment_id: raw.comment.id,
        author: raw.comment.user.login,
        body: raw.comment.body.unwrap_or_default(),
        updated_at,
    })))
}
