//! prbuild watches the pull requests of a GitHub repository and drives a CI
//! build for each of them.
//!
//! The flow is: a [`coordinator::RepositoryCoordinator`] owns the tracked
//! state of one repository for one subscribing project. It learns about
//! activity either from a periodic poll of the GitHub API or from webhook
//! deliveries routed to it through the [`registry::RepositoryRegistry`].
//! When a pull request needs a build, the coordinator submits a
//! [`types::BuildCause`] to a [`executor::BuildExecutor`] and publishes the
//! outcome as a commit status via the [`status::StatusReporter`].

pub mod config;
pub mod coordinator;
pub mod executor;
pub mod host;
pub mod persist;
pub mod registry;
pub mod server;
pub mod state;
pub mod status;
pub mod tracker;
pub mod types;
pub mod webhooks;

#[cfg(test)]
pub mod test_utils;
