//! The per-repository reconciliation loop.
//!
//! A [`RepositoryCoordinator`] owns the tracked state of one repository on
//! behalf of one subscribing project. Both trigger paths funnel into the
//! same checking logic: the periodic poll reconciles against the full list
//! of open pull requests, and webhook deliveries apply the same checks to a
//! single pull request. A mutex around the state serialises the two paths,
//! so a webhook arriving mid-poll waits rather than racing.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::config::TriggerConfig;
use crate::executor::BuildExecutor;
use crate::host::{CommitState, HostApi, PrSnapshot};
use crate::persist;
use crate::state::PullRequestState;
use crate::status::StatusReporter;
use crate::tracker::{BuildTracker, TrackedBuild};
use crate::types::{BuildCause, PrNumber, RepoId, SubscriberKey};
use crate::webhooks::{CommentAction, IssueCommentEvent, PrAction, PullRequestEvent};

/// Something that consumes routed webhook events. The webhook server is
/// generic over this so it can be tested without a real coordinator.
pub trait EventSubscriber: Send + Sync + 'static {
    fn on_pull_request(&self, event: &PullRequestEvent) -> impl Future<Output = ()> + Send;
    fn on_issue_comment(&self, event: &IssueCommentEvent) -> impl Future<Output = ()> + Send;
}

struct CoordinatorState<H> {
    pulls: HashMap<PrNumber, PullRequestState>,
    tracker: BuildTracker<H>,
}

pub struct RepositoryCoordinator<H: HostApi, E: BuildExecutor> {
    subscriber: SubscriberKey,
    repo: RepoId,
    config: TriggerConfig,
    host: H,
    executor: E,
    reporter: StatusReporter<H>,
    state_path: Option<PathBuf>,
    inner: Mutex<CoordinatorState<E::Handle>>,
}

impl<H: HostApi, E: BuildExecutor> RepositoryCoordinator<H, E> {
    /// Creates a coordinator, restoring tracked state from `state_path` if a
    /// usable file is there. An unreadable or mismatched file means a fresh
    /// start, not a refusal to start.
    pub fn new(
        subscriber: SubscriberKey,
        repo: RepoId,
        config: TriggerConfig,
        host: H,
        executor: E,
        state_path: Option<PathBuf>,
    ) -> Self {
        let mut pulls = HashMap::new();
        if let Some(path) = &state_path {
            match persist::try_load_state(path) {
                Ok(Some(saved)) if saved.repository == repo => {
                    info!(
                        repo = %repo,
                        subscriber = %subscriber,
                        pulls = saved.pulls.len(),
                        "restored tracked state"
                    );
                    pulls = saved.pulls;
                }
                Ok(Some(saved)) => {
                    warn!(
                        repo = %repo,
                        found = %saved.repository,
                        "state file belongs to a different repository; starting empty"
                    );
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(repo = %repo, error = %err, "could not load state file; starting empty");
                }
            }
        }
        let reporter = StatusReporter::new(host.clone(), config.comment_fallback);
        RepositoryCoordinator {
            subscriber,
            repo,
            config,
            host,
            executor,
            reporter,
            state_path,
            inner: Mutex::new(CoordinatorState {
                pulls,
                tracker: BuildTracker::new(),
            }),
        }
    }

    pub fn repo(&self) -> &RepoId {
        &self.repo
    }

    pub fn subscriber(&self) -> &SubscriberKey {
        &self.subscriber
    }

    pub fn config(&self) -> &TriggerConfig {
        &self.config
    }

    /// The pull requests currently being tracked.
    pub async fn tracked_pulls(&self) -> Vec<PrNumber> {
        let st = self.inner.lock().await;
        let mut pulls: Vec<_> = st.pulls.keys().copied().collect();
        pulls.sort();
        pulls
    }

    /// How many dispatched builds have not been seen to finish yet.
    pub async fn in_flight_builds(&self) -> usize {
        self.inner.lock().await.tracker.len()
    }

    /// One full reconciliation pass: fetch every open pull request, check
    /// each, forget the ones that are gone, and collect finished builds.
    #[instrument(skip(self), fields(repo = %self.repo, subscriber = %self.subscriber))]
    pub async fn poll(&self) {
        let mut st = self.inner.lock().await;
        let snapshots = match self.host.list_open_pull_requests().await {
            Ok(snapshots) => snapshots,
            Err(err) => {
                error!(error = %err, "could not list open pull requests; skipping this pass");
                return;
            }
        };
        debug!(count = snapshots.len(), "reconciling open pull requests");

        let mut open = HashSet::with_capacity(snapshots.len());
        for snapshot in &snapshots {
            open.insert(snapshot.number);
            self.check_pull(&mut st, snapshot).await;
        }

        let before = st.pulls.len();
        st.pulls.retain(|number, _| open.contains(number));
        if st.pulls.len() < before {
            info!(
                dropped = before - st.pulls.len(),
                "stopped tracking pull requests that are no longer open"
            );
        }

        let reaped = st.tracker.reap();
        if reaped > 0 {
            debug!(reaped, "collected finished builds");
        }

        self.save(&st);
    }

    /// Applies a pull_request webhook. Opened and reopened pulls are checked
    /// whether or not we already track them; a synchronize for an untracked
    /// pull is suspicious (we should have seen it open) and is skipped.
    #[instrument(skip(self, event), fields(repo = %self.repo, pr = %event.number, action = ?event.action))]
    pub async fn handle_pull_request(&self, event: &PullRequestEvent) {
        let mut st = self.inner.lock().await;
        match event.action {
            PrAction::Opened | PrAction::Reopened => {
                self.check_pull(&mut st, &event.snapshot()).await;
                self.save(&st);
            }
            PrAction::Synchronize => {
                if st.pulls.contains_key(&event.number) {
                    self.check_pull(&mut st, &event.snapshot()).await;
                    self.save(&st);
                } else {
                    warn!("synchronize for a pull request we never saw open; skipping");
                }
            }
            PrAction::Closed => {
                if st.pulls.remove(&event.number).is_some() {
                    // Any in-flight build is left to finish; reap collects it.
                    info!("pull request closed, dropped its tracked state");
                    self.save(&st);
                } else {
                    debug!("close for an untracked pull request; nothing to do");
                }
            }
        }
    }

    /// Applies an issue_comment webhook. Only newly created comments on
    /// tracked pull requests are considered. A matching trigger phrase
    /// dispatches straight away using a fresh snapshot; if that fetch fails,
    /// the request stays pending and the next poll picks it up.
    #[instrument(skip(self, event), fields(repo = %self.repo, author = %event.author))]
    pub async fn handle_issue_comment(&self, event: &IssueCommentEvent) {
        if event.action != CommentAction::Created {
            debug!(action = ?event.action, "ignoring non-created comment");
            return;
        }
        let Some(number) = event.pr_number else {
            debug!("comment is on a plain issue, not a pull request");
            return;
        };
        let mut st = self.inner.lock().await;
        let pending = {
            let Some(state) = st.pulls.get_mut(&number) else {
                debug!(pr = %number, "comment on an untracked pull request; ignoring");
                return;
            };
            let comment = crate::host::CommentData {
                id: event.comment_id,
                author: event.author.clone(),
                body: event.body.clone(),
                updated_at: event.updated_at,
            };
            if state.observe_comment(&comment, &self.config) {
                info!(pr = %number, "build requested by comment");
            }
            state.pending_build
        };
        if pending {
            match self.host.get_pull_request(number).await {
                Ok(snapshot) => self.check_pull(&mut st, &snapshot).await,
                Err(err) => {
                    error!(pr = %number, error = %err, "could not fetch the pull request; build deferred to the next poll");
                }
            }
        }
        self.save(&st);
    }

    /// Makes sure the repository delivers the events we need to `url`.
    /// Returns whether a hook is in place afterwards; on failure the poll
    /// loop remains the only trigger path.
    pub async fn ensure_webhook(&self, url: &str) -> bool {
        match self.host.list_webhooks().await {
            Ok(hooks) => {
                if hooks.iter().any(|h| h.url == url && h.active) {
                    debug!(repo = %self.repo, url, "webhook already registered");
                    return true;
                }
            }
            Err(err) => {
                warn!(repo = %self.repo, error = %err, "could not list webhooks");
            }
        }
        match self
            .host
            .register_webhook(url, &["pull_request", "issue_comment"], true)
            .await
        {
            Ok(()) => {
                info!(repo = %self.repo, url, "registered webhook");
                true
            }
            Err(err) => {
                error!(repo = %self.repo, error = %err, "could not register webhook; relying on polling alone");
                false
            }
        }
    }

    pub async fn close_pull_request(&self, pr: PrNumber) {
        if let Err(err) = self.host.close_pull_request(pr).await {
            error!(repo = %self.repo, pr = %pr, error = %err, "could not close pull request");
        }
    }

    /// Checks one pull request against its tracked state and dispatches a
    /// build if one is owed.
    async fn check_pull(&self, st: &mut CoordinatorState<E::Handle>, snapshot: &PrSnapshot) {
        let cause = {
            let state = st
                .pulls
                .entry(snapshot.number)
                .or_insert_with(|| PullRequestState::new(snapshot));

            if state.is_updated(snapshot) {
                debug!(pr = %snapshot.number, "pull request has new activity");
                match self
                    .host
                    .list_comments_since(snapshot.number, state.last_updated)
                    .await
                {
                    Ok(comments) => {
                        for comment in comments {
                            // The since filter is inclusive server-side.
                            if comment.updated_at <= state.last_updated {
                                continue;
                            }
                            if state.observe_comment(&comment, &self.config) {
                                info!(
                                    pr = %snapshot.number,
                                    author = %comment.author,
                                    "build requested by comment"
                                );
                            }
                        }
                    }
                    Err(err) => {
                        error!(pr = %snapshot.number, error = %err, "could not fetch comments");
                    }
                }
                state.check_commit(&snapshot.head_sha);
                state.advance_updated(snapshot.updated_at);
            }

            if state.pending_build {
                let mergeable = match self.host.get_mergeable(snapshot.number).await {
                    Ok(mergeable) => mergeable,
                    Err(err) => {
                        error!(pr = %snapshot.number, error = %err, "could not obtain mergeable status");
                        false
                    }
                };
                state.refresh_merge_target(snapshot.base_ref.clone(), mergeable);
                state.pending_build = false;
                Some(BuildCause::new(
                    state.head_commit.clone(),
                    state.id,
                    state.mergeable,
                    state.target_branch.clone(),
                ))
            } else {
                None
            }
        };

        if let Some(cause) = cause {
            self.dispatch(&mut st.tracker, cause).await;
        }
    }

    /// Cancels any superseded build, submits the new one, and publishes a
    /// pending status. If the executor refuses the submission nothing is
    /// published and nothing is tracked; the request is not retried.
    async fn dispatch(&self, tracker: &mut BuildTracker<E::Handle>, cause: BuildCause) {
        let superseded = tracker.cancel_build(cause.pull);
        let parameters = cause.parameters();
        match self.executor.submit(cause.clone(), parameters).await {
            Some(handle) => {
                info!(
                    pr = %cause.pull,
                    commit = %cause.commit.short(),
                    merged = cause.merged,
                    superseded,
                    "build dispatched"
                );
                tracker.track(TrackedBuild::new(
                    cause.pull,
                    cause.commit.clone(),
                    cause.merged,
                    handle,
                ));
                let message = dispatch_message(superseded, cause.merged);
                self.reporter
                    .publish(cause.pull, &cause.commit, CommitState::Pending, None, &message)
                    .await;
            }
            None => {
                error!(
                    pr = %cause.pull,
                    commit = %cause.commit.short(),
                    "executor refused the build; nothing dispatched"
                );
            }
        }
    }

    fn save(&self, st: &CoordinatorState<E::Handle>) {
        if let Some(path) = &self.state_path {
            if let Err(err) = persist::save_state(path, &self.subscriber, &self.repo, &st.pulls) {
                error!(repo = %self.repo, error = %err, "could not persist tracked state");
            }
        }
    }
}

impl<H: HostApi, E: BuildExecutor> EventSubscriber for RepositoryCoordinator<H, E> {
    async fn on_pull_request(&self, event: &PullRequestEvent) {
        self.handle_pull_request(event).await;
    }

    async fn on_issue_comment(&self, event: &IssueCommentEvent) {
        self.handle_issue_comment(event).await;
    }
}

fn dispatch_message(superseded: bool, merged: bool) -> String {
    let trigger = if merged {
        "Merged build triggered."
    } else {
        "Build triggered."
    };
    if superseded {
        format!("Previous build stopped. {trigger}")
    } else {
        trigger.to_string()
    }
}

/// Polls on a fixed interval until the token is cancelled. The first pass
/// runs immediately.
pub async fn run_poll_loop<H: HostApi, E: BuildExecutor>(
    coordinator: Arc<RepositoryCoordinator<H, E>>,
    shutdown: CancellationToken,
) {
    let mut interval = tokio::time::interval(coordinator.config().poll_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!(repo = %coordinator.repo(), "poll loop shutting down");
                break;
            }
            _ = interval.tick() => coordinator.poll().await,
        }
    }
}
