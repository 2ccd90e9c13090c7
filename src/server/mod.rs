//! The HTTP ingress for webhook deliveries.

pub mod webhook;

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

use crate::coordinator::EventSubscriber;
use crate::registry::RepositoryRegistry;

/// Shared state handed to every request handler.
pub struct AppState<S> {
    inner: Arc<AppStateInner<S>>,
}

struct AppStateInner<S> {
    registry: Arc<RepositoryRegistry<S>>,
    webhook_secret: Vec<u8>,
}

// Derived Clone would demand S: Clone, which subscribers need not be.
impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        AppState {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S> AppState<S> {
    pub fn new(registry: Arc<RepositoryRegistry<S>>, webhook_secret: Vec<u8>) -> Self {
        AppState {
            inner: Arc::new(AppStateInner {
                registry,
                webhook_secret,
            }),
        }
    }

    pub fn registry(&self) -> &RepositoryRegistry<S> {
        &self.inner.registry
    }

    pub fn webhook_secret(&self) -> &[u8] {
        &self.inner.webhook_secret
    }
}

pub fn app<S: EventSubscriber>(state: AppState<S>) -> Router {
    Router::new()
        .route("/webhook", post(webhook::webhook_handler::<S>))
        .route("/health", get(health_handler))
        .with_state(state)
}

async fn health_handler() -> &'static str {
    "OK"
}
