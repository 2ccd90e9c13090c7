use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use prbuild::config::TriggerConfig;
use prbuild::coordinator::{run_poll_loop, RepositoryCoordinator};
use prbuild::executor::LoggingExecutor;
use prbuild::host::OctocrabHost;
use prbuild::registry::RepositoryRegistry;
use prbuild::server::{app, AppState};
use prbuild::types::{RepoId, SubscriberKey};

fn env(name: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| panic!("{name} must be set"))
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("prbuild=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = TriggerConfig::from_env().expect("invalid trigger configuration");
    let token = env("PRBUILD_GITHUB_TOKEN");
    let repo = RepoId::parse(&env("PRBUILD_REPO")).expect("PRBUILD_REPO must look like owner/name");
    let subscriber = SubscriberKey::new(env("PRBUILD_PROJECT"));
    let webhook_secret = env("PRBUILD_WEBHOOK_SECRET");
    let state_path = std::env::var("PRBUILD_STATE_DIR").ok().map(|dir| {
        PathBuf::from(dir).join(format!("{}-{}.json", subscriber.as_str(), repo.name))
    });

    let client = octocrab::Octocrab::builder()
        .personal_token(token)
        .build()
        .expect("could not build the GitHub client");
    let host = OctocrabHost::new(client, repo.clone());

    let coordinator = Arc::new(RepositoryCoordinator::new(
        subscriber.clone(),
        repo.clone(),
        config,
        host,
        LoggingExecutor::new(),
        state_path,
    ));

    if let Ok(url) = std::env::var("PRBUILD_WEBHOOK_URL") {
        coordinator.ensure_webhook(&url).await;
    }

    let registry = Arc::new(RepositoryRegistry::new());
    registry.register(subscriber, &repo.full_name(), coordinator.clone());

    let shutdown = CancellationToken::new();
    let poll_task = tokio::spawn(run_poll_loop(coordinator, shutdown.clone()));

    let state = AppState::new(registry, webhook_secret.into_bytes());
    let addr: SocketAddr = std::env::var("PRBUILD_LISTEN_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:3000".to_string())
        .parse()
        .expect("PRBUILD_LISTEN_ADDR must be a socket address");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("could not bind the listen address");
    info!(%addr, "listening for webhook deliveries");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown requested");
            shutdown.cancel();
        })
        .await
        .expect("server error");

    let _ = poll_task.await;
}
