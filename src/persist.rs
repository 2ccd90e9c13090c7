//! Durable storage of the tracked pull request state, so a restart does not
//! re-trigger builds for pull requests that were already handled.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;
use thiserror::Error;

use crate::state::PullRequestState;
use crate::types::{PrNumber, RepoId, SubscriberKey};

/// Bumped whenever the on-disk layout changes incompatibly.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("schema version mismatch: file has {found}, this build expects {expected}")]
    SchemaMismatch { found: u32, expected: u32 },
}

/// The on-disk form of one subscriber's tracked state.
#[derive(Debug, Serialize, Deserialize)]
pub struct PersistedState {
    pub schema_version: u32,
    pub saved_at: DateTime<Utc>,
    pub subscriber: SubscriberKey,
    pub repository: RepoId,
    pub pulls: HashMap<PrNumber, PullRequestState>,
}

/// Atomically writes the state file: the new content lands under a temporary
/// name, is fsynced, and is then renamed over the old file. Readers see
/// either the old state or the new one, never a torn write.
pub fn save_state(
    path: &Path,
    subscriber: &SubscriberKey,
    repository: &RepoId,
    pulls: &HashMap<PrNumber, PullRequestState>,
) -> Result<(), PersistError> {
    let persisted = PersistedState {
        schema_version: SCHEMA_VERSION,
        saved_at: Utc::now(),
        subscriber: subscriber.clone(),
        repository: repository.clone(),
        pulls: pulls.clone(),
    };
    let bytes = serde_json::to_vec_pretty(&persisted)?;

    let tmp = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    if let Some(dir) = path.parent() {
        // The rename itself must survive a crash too.
        File::open(dir)?.sync_all()?;
    }
    Ok(())
}

/// Loads a previously saved state file, verifying the schema version.
pub fn load_state(path: &Path) -> Result<PersistedState, PersistError> {
    let bytes = fs::read(path)?;
    let persisted: PersistedState = serde_json::from_slice(&bytes)?;
    if persisted.schema_version != SCHEMA_VERSION {
        return Err(PersistError::SchemaMismatch {
            found: persisted.schema_version,
            expected: SCHEMA_VERSION,
        });
    }
    Ok(persisted)
}

/// Like [`load_state`], but a missing file is an empty start, not an error.
pub fn try_load_state(path: &Path) -> Result<Option<PersistedState>, PersistError> {
    if !path.exists() {
        return Ok(None);
    }
    load_state(path).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{snapshot, ts};

    fn sample_pulls() -> HashMap<PrNumber, PullRequestState> {
        let mut pulls = HashMap::new();
        let mut state = PullRequestState::new(&snapshot(42, "alice", "aaa", "main", ts(100)));
        state.pending_build = false;
        pulls.insert(state.id, state);
        pulls
    }

    #[test]
    fn state_survives_a_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let subscriber = SubscriberKey::new("ci-project");
        let repo = RepoId::new("octocat", "hello-world");
        let pulls = sample_pulls();

        save_state(&path, &subscriber, &repo, &pulls).unwrap();
        let loaded = load_state(&path).unwrap();

        assert_eq!(loaded.schema_version, SCHEMA_VERSION);
        assert_eq!(loaded.subscriber, subscriber);
        assert_eq!(loaded.repository, repo);
        assert_eq!(loaded.pulls.len(), 1);
        let pull = &loaded.pulls[&PrNumber(42)];
        assert_eq!(pull.author, "alice");
        assert!(!pull.pending_build);
        assert_eq!(pull.last_updated, ts(100));
    }

    #[test]
    fn a_missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = try_load_state(&dir.path().join("absent.json")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn a_future_schema_version_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let subscriber = SubscriberKey::new("ci-project");
        let repo = RepoId::new("octocat", "hello-world");
        save_state(&path, &subscriber, &repo, &sample_pulls()).unwrap();

        let mut value: serde_json::Value =
            serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        value["schema_version"] = serde_json::json!(SCHEMA_VERSION + 1);
        fs::write(&path, serde_json::to_vec(&value).unwrap()).unwrap();

        let err = load_state(&path).unwrap_err();
        assert!(matches!(err, PersistError::SchemaMismatch { .. }));
    }

    #[test]
    fn saving_twice_overwrites_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let subscriber = SubscriberKey::new("ci-project");
        let repo = RepoId::new("octocat", "hello-world");

        save_state(&path, &subscriber, &repo, &sample_pulls()).unwrap();
        save_state(&path, &subscriber, &repo, &HashMap::new()).unwrap();

        let loaded = load_state(&path).unwrap();
        assert!(loaded.pulls.is_empty());
        // No stray temporary file is left behind.
        assert!(!path.with_extension("tmp").exists());
    }
}
