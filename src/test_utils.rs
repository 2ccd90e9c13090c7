//! In-memory doubles and generators shared across the test modules.

use chrono::{DateTime, Utc};
use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::executor::{BuildExecutor, BuildHandle};
use crate::host::{CommentData, CommitState, HookInfo, HostApi, HostApiError, PrSnapshot};
use crate::types::{BuildCause, BuildParameters, PrNumber, Sha};

pub fn ts(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap()
}

pub fn snapshot(number: u64, author: &str, sha: &str, base: &str, at: DateTime<Utc>) -> PrSnapshot {
    PrSnapshot {
        number: PrNumber(number),
        author: author.to_string(),
        head_sha: Sha::new(sha),
        base_ref: base.to_string(),
        updated_at: at,
    }
}

pub fn comment(id: u64, author: &str, body: &str, at: DateTime<Utc>) -> CommentData {
    CommentData {
        id,
        author: author.to_string(),
        body: body.to_string(),
        updated_at: at,
    }
}

pub fn arb_sha() -> impl Strategy<Value = Sha> {
    "[0-9a-f]{40}".prop_map(Sha::new)
}

pub fn arb_pr_number() -> impl Strategy<Value = PrNumber> {
    (1u64..100_000).prop_map(PrNumber)
}

// ─── Build handles ───

/// A handle whose lifecycle the test drives by hand.
#[derive(Debug, Clone, Default)]
pub struct ManualHandle {
    inner: Arc<ManualHandleInner>,
}

#[derive(Debug, Default)]
struct ManualHandleInner {
    cancelled: AtomicBool,
    finished: AtomicBool,
    refuse_cancel: AtomicBool,
}

impl ManualHandle {
    pub fn new() -> Self {
        ManualHandle::default()
    }

    pub fn was_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    pub fn finish(&self) {
        self.inner.finished.store(true, Ordering::SeqCst);
    }

    pub fn refuse_cancel(&self) {
        self.inner.refuse_cancel.store(true, Ordering::SeqCst);
    }
}

impl BuildHandle for ManualHandle {
    fn cancel(&self) -> bool {
        if self.inner.refuse_cancel.load(Ordering::SeqCst) {
            return false;
        }
        self.inner.cancelled.store(true, Ordering::SeqCst);
        true
    }

    fn is_finished(&self) -> bool {
        self.inner.finished.load(Ordering::SeqCst)
    }
}

// ─── Executor double ───

#[derive(Debug, Clone, Default)]
pub struct MockExecutor {
    inner: Arc<MockExecutorInner>,
}

#[derive(Debug, Default)]
struct MockExecutorInner {
    causes: Mutex<Vec<BuildCause>>,
    parameters: Mutex<Vec<BuildParameters>>,
    handles: Mutex<Vec<ManualHandle>>,
    refuse: AtomicBool,
}

impl MockExecutor {
    pub fn new() -> Self {
        MockExecutor::default()
    }

    pub fn refuse_submissions(&self, refuse: bool) {
        self.inner.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Every cause handed to `submit`, including refused ones.
    pub fn submitted_causes(&self) -> Vec<BuildCause> {
        self.inner.causes.lock().unwrap().clone()
    }

    pub fn submitted_parameters(&self) -> Vec<BuildParameters> {
        self.inner.parameters.lock().unwrap().clone()
    }

    pub fn submission_attempts(&self) -> usize {
        self.inner.causes.lock().unwrap().len()
    }

    /// Handles of the accepted submissions, in order.
    pub fn handles(&self) -> Vec<ManualHandle> {
        self.inner.handles.lock().unwrap().clone()
    }
}

impl BuildExecutor for MockExecutor {
    type Handle = ManualHandle;

    async fn submit(&self, cause: BuildCause, parameters: BuildParameters) -> Option<ManualHandle> {
        self.inner.causes.lock().unwrap().push(cause);
        self.inner.parameters.lock().unwrap().push(parameters);
        if self.inner.refuse.load(Ordering::SeqCst) {
            return None;
        }
        let handle = ManualHandle::new();
        self.inner.handles.lock().unwrap().push(handle.clone());
        Some(handle)
    }
}

// ─── Host double ───

#[derive(Debug, Clone, Default)]
pub struct MockHost {
    inner: Arc<MockHostInner>,
}

#[derive(Debug, Default)]
struct MockHostInner {
    open_prs: Mutex<Vec<PrSnapshot>>,
    comments: Mutex<HashMap<PrNumber, Vec<CommentData>>>,
    mergeable: Mutex<HashMap<PrNumber, bool>>,
    statuses: Mutex<Vec<(Sha, CommitState, String)>>,
    posted_comments: Mutex<Vec<(PrNumber, String)>>,
    hooks: Mutex<Vec<HookInfo>>,
    fail_listing: AtomicBool,
    fail_get_pull: AtomicBool,
    fail_commit_status: AtomicBool,
}

impl MockHost {
    pub fn new() -> Self {
        MockHost::default()
    }

    pub fn set_open_prs(&self, prs: Vec<PrSnapshot>) {
        *self.inner.open_prs.lock().unwrap() = prs;
    }

    pub fn add_comment(&self, pr: PrNumber, comment: CommentData) {
        self.inner
            .comments
            .lock()
            .unwrap()
            .entry(pr)
            .or_default()
            .push(comment);
    }

    pub fn set_mergeable(&self, pr: PrNumber, mergeable: bool) {
        self.inner.mergeable.lock().unwrap().insert(pr, mergeable);
    }

    pub fn fail_listing(&self, fail: bool) {
        self.inner.fail_listing.store(fail, Ordering::SeqCst);
    }

    pub fn fail_get_pull(&self, fail: bool) {
        self.inner.fail_get_pull.store(fail, Ordering::SeqCst);
    }

    pub fn fail_commit_status(&self, fail: bool) {
        self.inner.fail_commit_status.store(fail, Ordering::SeqCst);
    }

    pub fn statuses(&self) -> Vec<(Sha, CommitState, String)> {
        self.inner.statuses.lock().unwrap().clone()
    }

    pub fn posted_comments(&self) -> Vec<(PrNumber, String)> {
        self.inner.posted_comments.lock().unwrap().clone()
    }

    pub fn webhooks(&self) -> Vec<HookInfo> {
        self.inner.hooks.lock().unwrap().clone()
    }
}

impl HostApi for MockHost {
    async fn list_open_pull_requests(&self) -> Result<Vec<PrSnapshot>, HostApiError> {
        if self.inner.fail_listing.load(Ordering::SeqCst) {
            return Err(HostApiError::transient("listing disabled by test"));
        }
        Ok(self.inner.open_prs.lock().unwrap().clone())
    }

    async fn get_pull_request(&self, pr: PrNumber) -> Result<PrSnapshot, HostApiError> {
        if self.inner.fail_get_pull.load(Ordering::SeqCst) {
            return Err(HostApiError::transient("fetch disabled by test"));
        }
        self.inner
            .open_prs
            .lock()
            .unwrap()
            .iter()
            .find(|snapshot| snapshot.number == pr)
            .cloned()
            .ok_or_else(|| HostApiError::permanent(format!("no such pull request: {pr}")))
    }

    async fn list_comments_since(
        &self,
        pr: PrNumber,
        since: DateTime<Utc>,
    ) -> Result<Vec<CommentData>, HostApiError> {
        let mut comments: Vec<CommentData> = self
            .inner
            .comments
            .lock()
            .unwrap()
            .get(&pr)
            .map(|all| {
                all.iter()
                    // The real endpoint's filter is inclusive.
                    .filter(|c| c.updated_at >= since)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        comments.sort_by_key(|c| c.updated_at);
        Ok(comments)
    }

    async fn get_mergeable(&self, pr: PrNumber) -> Result<bool, HostApiError> {
        Ok(self
            .inner
            .mergeable
            .lock()
            .unwrap()
            .get(&pr)
            .copied()
            .unwrap_or(false))
    }

    async fn set_commit_status(
        &self,
        sha: &Sha,
        state: CommitState,
        _target_url: Option<&str>,
        description: &str,
    ) -> Result<(), HostApiError> {
        if self.inner.fail_commit_status.load(Ordering::SeqCst) {
            return Err(HostApiError::permanent("statuses disabled by test"));
        }
        self.inner
            .statuses
            .lock()
            .unwrap()
            .push((sha.clone(), state, description.to_string()));
        Ok(())
    }

    async fn post_comment(&self, pr: PrNumber, body: &str) -> Result<(), HostApiError> {
        self.inner
            .posted_comments
            .lock()
            .unwrap()
            .push((pr, body.to_string()));
        Ok(())
    }

    async fn close_pull_request(&self, pr: PrNumber) -> Result<(), HostApiError> {
        self.inner
            .open_prs
            .lock()
            .unwrap()
            .retain(|snapshot| snapshot.number != pr);
        Ok(())
    }

    async fn list_webhooks(&self) -> Result<Vec<HookInfo>, HostApiError> {
        Ok(self.inner.hooks.lock().unwrap().clone())
    }

    async fn register_webhook(
        &self,
        url: &str,
        events: &[&str],
        active: bool,
    ) -> Result<(), HostApiError> {
        let mut hooks = self.inner.hooks.lock().unwrap();
        let id = hooks.len() as u64 + 1;
        hooks.push(HookInfo {
            id,
            url: url.to_string(),
            events: events.iter().map(|e| e.to_string()).collect(),
            active,
        });
        Ok(())
    }
}
