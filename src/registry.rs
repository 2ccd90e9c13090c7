//! Routing table from repository names to the coordinators watching them.
//!
//! Several subscribing projects may watch the same repository, and a project
//! may be reconfigured to watch a different repository. Registering a
//! subscriber first removes any mapping it held elsewhere, so a renamed
//! watch never leaves a stale route behind.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

use crate::types::SubscriberKey;

pub struct RepositoryRegistry<S> {
    inner: Mutex<HashMap<String, HashMap<SubscriberKey, Arc<S>>>>,
}

impl<S> Default for RepositoryRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> RepositoryRegistry<S> {
    pub fn new() -> Self {
        RepositoryRegistry {
            inner: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, HashMap<SubscriberKey, Arc<S>>>> {
        // State stays consistent even if a panic poisoned the lock; every
        // mutation below is a single insert or remove.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Binds a subscriber to a repository, replacing whatever binding the
    /// subscriber had before.
    pub fn register(&self, subscriber: SubscriberKey, repo_name: &str, handler: Arc<S>) {
        let mut map = self.lock();
        for handlers in map.values_mut() {
            handlers.remove(&subscriber);
        }
        map.retain(|_, handlers| !handlers.is_empty());
        map.entry(repo_name.to_string())
            .or_default()
            .insert(subscriber.clone(), handler);
        info!(subscriber = %subscriber, repo = repo_name, "registered subscriber");
    }

    /// Removes a subscriber's binding. Returns whether one existed.
    pub fn unregister(&self, subscriber: &SubscriberKey) -> bool {
        let mut map = self.lock();
        let mut removed = false;
        for handlers in map.values_mut() {
            removed |= handlers.remove(subscriber).is_some();
        }
        map.retain(|_, handlers| !handlers.is_empty());
        if removed {
            debug!(subscriber = %subscriber, "unregistered subscriber");
        }
        removed
    }

    /// Everyone watching the given repository. The lock is released before
    /// the handlers are used, so delivery never blocks registration.
    pub fn lookup(&self, repo_name: &str) -> Vec<Arc<S>> {
        let map = self.lock();
        map.get(repo_name)
            .map(|handlers| handlers.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().values().map(|handlers| handlers.len()).sum()
    }
}
