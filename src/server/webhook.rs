//! The webhook endpoint: verify, parse, route, deliver.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::coordinator::EventSubscriber;
use crate::server::AppState;
use crate::webhooks::{parse_webhook, verify_signature, HostEvent, ParseError};

const HEADER_EVENT: &str = "X-GitHub-Event";
const HEADER_SIGNATURE: &str = "X-Hub-Signature-256";
const HEADER_DELIVERY: &str = "X-GitHub-Delivery";

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("missing or unreadable header: {0}")]
    MissingHeader(&'static str),
    #[error("signature verification failed")]
    InvalidSignature,
    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match &self {
            WebhookError::MissingHeader(_) => StatusCode::BAD_REQUEST,
            WebhookError::InvalidSignature => StatusCode::UNAUTHORIZED,
            WebhookError::Parse(_) => StatusCode::BAD_REQUEST,
        };
        (status, self.to_string()).into_response()
    }
}

fn require_header(headers: &HeaderMap, name: &'static str) -> Result<String, WebhookError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .ok_or(WebhookError::MissingHeader(name))
}

/// Events are delivered to every subscriber of the repository in turn;
/// one slow subscriber delays the rest rather than racing them.
pub async fn webhook_handler<S: EventSubscriber>(
    State(app): State<AppState<S>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, &'static str), WebhookError> {
    let event_type = require_header(&headers, HEADER_EVENT)?;
    let signature = require_header(&headers, HEADER_SIGNATURE)?;
    let delivery = headers
        .get(HEADER_DELIVERY)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("<none>")
        .to_string();

    if !verify_signature(&body, &signature, app.webhook_secret()) {
        warn!(%event_type, %delivery, "rejected webhook with a bad signature");
        return Err(WebhookError::InvalidSignature);
    }

    let Some(event) = parse_webhook(&event_type, &body)? else {
        debug!(%event_type, %delivery, "ignoring webhook we do not handle");
        return Ok((StatusCode::ACCEPTED, "Ignored"));
    };

    let repo_name = event.repo().full_name();
    let subscribers = app.registry().lookup(&repo_name);
    if subscribers.is_empty() {
        debug!(repo = %repo_name, %delivery, "no subscriber for this repository");
        return Ok((StatusCode::ACCEPTED, "No subscribers"));
    }

    info!(
        repo = %repo_name,
        %event_type,
        %delivery,
        subscribers = subscribers.len(),
        "delivering webhook"
    );
    for subscriber in subscribers {
        match &event {
            HostEvent::PullRequest(event) => subscriber.on_pull_request(event).await,
            HostEvent::IssueComment(event) => subscriber.on_issue_comment(event).await,
        }
    }
    Ok((StatusCode::ACCEPTED, "Accepted"))
}
