//! Persistent per-pull-request tracking state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use tracing::{debug, info};

use crate::config::TriggerConfig;
use crate::host::{CommentData, PrSnapshot};
use crate::types::{PrNumber, Sha};

/// Everything we remember about one open pull request between passes.
///
/// Two states compare equal when they describe the same pull request number,
/// regardless of the rest of the fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequestState {
    pub id: PrNumber,
    pub author: String,
    pub head_commit: Sha,
    /// High-water mark for comment scanning. Only comments strictly newer
    /// than this are considered on the next pass.
    pub last_updated: DateTime<Utc>,
    pub target_branch: String,
    pub mergeable: bool,
    /// Whether this pull request is allowed to trigger builds at all.
    pub accepted: bool,
    /// Set when something happened that warrants a build; cleared when the
    /// build is dispatched (or the dispatch attempt fails).
    pub pending_build: bool,
}

impl PartialEq for PullRequestState {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for PullRequestState {}

impl Hash for PullRequestState {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PullRequestState {
    /// Starts tracking a freshly seen pull request. It is accepted
    /// immediately and owes a build for its current head.
    pub fn new(snapshot: &PrSnapshot) -> Self {
        info!(
            pr = %snapshot.number,
            author = %snapshot.author,
            commit = %snapshot.head_sha.short(),
            "tracking pull request"
        );
        PullRequestState {
            id: snapshot.number,
            author: snapshot.author.clone(),
            head_commit: snapshot.head_sha.clone(),
            last_updated: snapshot.updated_at,
            target_branch: "master".to_string(),
            mergeable: false,
            accepted: true,
            pending_build: true,
        }
    }

    /// Whether the snapshot shows activity we have not processed yet.
    pub fn is_updated(&self, snapshot: &PrSnapshot) -> bool {
        snapshot.updated_at > self.last_updated || snapshot.head_sha != self.head_commit
    }

    /// Records a (possibly new) head commit. Returns whether the head moved.
    /// A new head on an accepted pull request owes a build; on an unaccepted
    /// one the head is remembered but no build is queued.
    pub fn check_commit(&mut self, sha: &Sha) -> bool {
        if self.head_commit == *sha {
            return false;
        }
        debug!(pr = %self.id, old = %self.head_commit.short(), new = %sha.short(), "new head commit");
        self.head_commit = sha.clone();
        if self.accepted {
            self.pending_build = true;
        }
        true
    }

    /// Applies one comment. The bot's own comments are ignored; a trigger
    /// phrase from anyone else accepts the pull request and queues a build.
    /// Returns whether the comment matched the trigger phrase.
    pub fn observe_comment(&mut self, comment: &CommentData, config: &TriggerConfig) -> bool {
        if config.is_bot(&comment.author) {
            return false;
        }
        if config.is_trigger_phrase(&comment.body) {
            self.accepted = true;
            self.pending_build = true;
            return true;
        }
        false
    }

    /// Moves the comment high-water mark forward. Never moves it back.
    pub fn advance_updated(&mut self, timestamp: DateTime<Utc>) {
        if timestamp > self.last_updated {
            self.last_updated = timestamp;
        }
    }

    /// Refreshes what we know about the merge target just before a build.
    pub fn refresh_merge_target(&mut self, target_branch: impl Into<String>, mergeable: bool) {
        self.target_branch = target_branch.into();
        self.mergeable = mergeable;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_TRIGGER_PHRASE;
    use crate::test_utils::{comment, snapshot, ts};
    use std::time::Duration;

    fn config() -> TriggerConfig {
        TriggerConfig::new(
            "prbuild",
            DEFAULT_TRIGGER_PHRASE,
            false,
            Duration::from_secs(300),
        )
        .unwrap()
    }

    #[test]
    fn a_fresh_state_is_accepted_and_owes_a_build() {
        let state = PullRequestState::new(&snapshot(42, "alice", "aaa", "main", ts(100)));
        assert_eq!(state.id, PrNumber(42));
        assert!(state.accepted);
        assert!(state.pending_build);
        assert!(!state.mergeable);
        assert_eq!(state.target_branch, "master");
        assert_eq!(state.last_updated, ts(100));
    }

    #[test]
    fn is_updated_triggers_on_timestamp_or_head() {
        let snap = snapshot(1, "alice", "aaa", "main", ts(100));
        let state = PullRequestState::new(&snap);
        assert!(!state.is_updated(&snap));
        assert!(state.is_updated(&snapshot(1, "alice", "aaa", "main", ts(101))));
        // Same timestamp but a different head still counts as updated.
        assert!(state.is_updated(&snapshot(1, "alice", "bbb", "main", ts(100))));
    }

    #[test]
    fn a_new_head_on_an_accepted_pull_queues_a_build() {
        let mut state = PullRequestState::new(&snapshot(1, "alice", "aaa", "main", ts(100)));
        state.pending_build = false;
        assert!(state.check_commit(&Sha::new("bbb")));
        assert_eq!(state.head_commit, Sha::new("bbb"));
        assert!(state.pending_build);
    }

    #[test]
    fn a_new_head_on_an_unaccepted_pull_is_remembered_but_not_built() {
        let mut state = PullRequestState::new(&snapshot(1, "alice", "aaa", "main", ts(100)));
        state.accepted = false;
        state.pending_build = false;
        assert!(state.check_commit(&Sha::new("bbb")));
        assert_eq!(state.head_commit, Sha::new("bbb"));
        assert!(!state.pending_build);
    }

    #[test]
    fn an_unchanged_head_does_nothing() {
        let mut state = PullRequestState::new(&snapshot(1, "alice", "aaa", "main", ts(100)));
        state.pending_build = false;
        assert!(!state.check_commit(&Sha::new("aaa")));
        assert!(!state.pending_build);
    }

    #[test]
    fn a_trigger_phrase_accepts_the_pull_request() {
        let mut state = PullRequestState::new(&snapshot(1, "alice", "aaa", "main", ts(100)));
        state.accepted = false;
        state.pending_build = false;
        let matched = state.observe_comment(&comment(1, "reviewer", "ok to test", ts(200)), &config());
        assert!(matched);
        assert!(state.accepted);
        assert!(state.pending_build);
    }

    #[test]
    fn the_bots_own_comments_never_trigger() {
        let mut state = PullRequestState::new(&snapshot(1, "alice", "aaa", "main", ts(100)));
        state.pending_build = false;
        let matched = state.observe_comment(&comment(1, "prbuild", "ok to test", ts(200)), &config());
        assert!(!matched);
        assert!(!state.pending_build);
    }

    #[test]
    fn unrelated_comments_are_ignored() {
        let mut state = PullRequestState::new(&snapshot(1, "alice", "aaa", "main", ts(100)));
        state.pending_build = false;
        let matched = state.observe_comment(&comment(1, "reviewer", "nice work", ts(200)), &config());
        assert!(!matched);
        assert!(!state.pending_build);
    }

    #[test]
    fn the_high_water_mark_never_regresses() {
        let mut state = PullRequestState::new(&snapshot(1, "alice", "aaa", "main", ts(100)));
        state.advance_updated(ts(50));
        assert_eq!(state.last_updated, ts(100));
        state.advance_updated(ts(150));
        assert_eq!(state.last_updated, ts(150));
    }

    #[test]
    fn equality_is_by_pull_request_number() {
        let a = PullRequestState::new(&snapshot(1, "alice", "aaa", "main", ts(100)));
        let mut b = PullRequestState::new(&snapshot(1, "bob", "bbb", "dev", ts(999)));
        b.accepted = false;
        assert_eq!(a, b);
        let c = PullRequestState::new(&snapshot(2, "alice", "aaa", "main", ts(100)));
        assert_ne!(a, c);
    }

    #[test]
    fn state_round_trips_through_json() {
        let state = PullRequestState::new(&snapshot(9, "alice", "aaa", "main", ts(100)));
        let json = serde_json::to_string(&state).unwrap();
        let back: PullRequestState = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, state.id);
        assert_eq!(back.head_commit, state.head_commit);
        assert_eq!(back.last_updated, state.last_updated);
        assert_eq!(back.accepted, state.accepted);
        assert_eq!(back.pending_build, state.pending_build);
    }
}
