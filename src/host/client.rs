//! [`HostApi`] implemented against the GitHub REST API via octocrab.

use chrono::{DateTime, Utc};
use octocrab::models::issues::Comment;
use octocrab::models::pulls::PullRequest;
use octocrab::Octocrab;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::host::api::{CommentData, CommitState, HookInfo, HostApi, PrSnapshot};
use crate::host::HostApiError;
use crate::types::{PrNumber, RepoId, Sha};

const PAGE_SIZE: u8 = 100;

/// A GitHub client scoped to a single repository.
#[derive(Clone)]
pub struct OctocrabHost {
    client: Octocrab,
    repo: RepoId,
}

impl OctocrabHost {
    pub fn new(client: Octocrab, repo: RepoId) -> Self {
        OctocrabHost { client, repo }
    }

    pub fn repo(&self) -> &RepoId {
        &self.repo
    }

    fn snapshot_of(&self, pull: &PullRequest) -> PrSnapshot {
        PrSnapshot {
            number: PrNumber(pull.number),
            author: pull
                .user
                .as_ref()
                .map(|u| u.login.clone())
                .unwrap_or_default(),
            head_sha: Sha::new(pull.head.sha.clone()),
            base_ref: pull.base.ref_field.clone(),
            updated_at: pull
                .updated_at
                .or(pull.created_at)
                .unwrap_or_else(Utc::now),
        }
    }
}

fn comment_of(comment: Comment) -> CommentData {
    let updated_at = comment.updated_at.unwrap_or(comment.created_at);
    CommentData {
        id: comment.id.0,
        author: comment.user.login,
        body: comment.body.unwrap_or_default(),
        updated_at,
    }
}

#[derive(Debug, Deserialize)]
struct RawHook {
    id: u64,
    active: bool,
    #[serde(default)]
    events: Vec<String>,
    config: RawHookConfig,
}

#[derive(Debug, Deserialize)]
struct RawHookConfig {
    #[serde(default)]
    url: Option<String>,
}

impl HostApi for OctocrabHost {
    async fn list_open_pull_requests(&self) -> Result<Vec<PrSnapshot>, HostApiError> {
        let mut out = Vec::new();
        let mut page_number: u32 = 1;
        loop {
            let page = self
                .client
                .pulls(&self.repo.owner, &self.repo.name)
                .list()
                .state(octocrab::params::State::Open)
                .per_page(PAGE_SIZE)
                .page(page_number)
                .send()
                .await
                .map_err(HostApiError::from_octocrab)?;
            let has_next = page.next.is_some();
            for pull in &page.items {
                out.push(self.snapshot_of(pull));
            }
            if !has_next {
                break;
            }
            page_number += 1;
        }
        debug!(repo = %self.repo, count = out.len(), "listed open pull requests");
        Ok(out)
    }

    async fn get_pull_request(&self, pr: PrNumber) -> Result<PrSnapshot, HostApiError> {
        let pull = self
            .client
            .pulls(&self.repo.owner, &self.repo.name)
            .get(pr.0)
            .await
            .map_err(HostApiError::from_octocrab)?;
        Ok(self.snapshot_of(&pull))
    }

    async fn list_comments_since(
        &self,
        pr: PrNumber,
        since: DateTime<Utc>,
    ) -> Result<Vec<CommentData>, HostApiError> {
        let mut out = Vec::new();
        let mut page_number: u32 = 1;
        loop {
            let page = self
                .client
                .issues(&self.repo.owner, &self.repo.name)
                .list_comments(pr.0)
                .since(since)
                .per_page(PAGE_SIZE)
                .page(page_number)
                .send()
                .await
                .map_err(HostApiError::from_octocrab)?;
            let has_next = page.next.is_some();
            out.extend(page.items.into_iter().map(comment_of));
            if !has_next {
                break;
            }
            page_number += 1;
        }
        Ok(out)
    }

    async fn get_mergeable(&self, pr: PrNumber) -> Result<bool, HostApiError> {
        let pull = self
            .client
            .pulls(&self.repo.owner, &self.repo.name)
            .get(pr.0)
            .await
            .map_err(HostApiError::from_octocrab)?;
        Ok(pull.mergeable.unwrap_or(false))
    }

    async fn set_commit_status(
        &self,
        sha: &Sha,
        state: CommitState,
        target_url: Option<&str>,
        description: &str,
    ) -> Result<(), HostApiError> {
        let route = format!(
            "/repos/{}/{}/statuses/{}",
            self.repo.owner, self.repo.name, sha
        );
        let body = json!({
            "state": state.as_api_str(),
            "target_url": target_url,
            "description": description,
            "context": "prbuild",
        });
        let _: serde_json::Value = self
            .client
            .post(route, Some(&body))
            .await
            .map_err(HostApiError::from_octocrab)?;
        Ok(())
    }

    async fn post_comment(&self, pr: PrNumber, body: &str) -> Result<(), HostApiError> {
        self.client
            .issues(&self.repo.owner, &self.repo.name)
            .create_comment(pr.0, body)
            .await
            .map_err(HostApiError::from_octocrab)?;
        Ok(())
    }

    async fn close_pull_request(&self, pr: PrNumber) -> Result<(), HostApiError> {
        let route = format!("/repos/{}/{}/pulls/{}", self.repo.owner, self.repo.name, pr.0);
        let _: serde_json::Value = self
            .client
            .patch(route, Some(&json!({ "state": "closed" })))
            .await
            .map_err(HostApiError::from_octocrab)?;
        Ok(())
    }

    async fn list_webhooks(&self) -> Result<Vec<HookInfo>, HostApiError> {
        let route = format!("/repos/{}/{}/hooks", self.repo.owner, self.repo.name);
        let hooks: Vec<RawHook> = self
            .client
            .get(route, None::<&()>)
            .await
            .map_err(HostApiError::from_octocrab)?;
        Ok(hooks
            .into_iter()
            .map(|h| HookInfo {
                id: h.id,
                url: h.config.url.unwrap_or_default(),
                events: h.events,
                active: h.active,
            })
            .collect())
    }

    async fn register_webhook(
        &self,
        url: &str,
        events: &[&str],
        active: bool,
    ) -> Result<(), HostApiError> {
        let route = format!("/repos/{}/{}/hooks", self.repo.owner, self.repo.name);
        let body = json!({
            "name": "web",
            "active": active,
            "events": events,
            "config": {
                "url": url,
                "content_type": "json",
            },
        });
        let _: serde_json::Value = self
            .client
            .post(route, Some(&body))
            .await
            .map_err(HostApiError::from_octocrab)?;
        Ok(())
    }
}
