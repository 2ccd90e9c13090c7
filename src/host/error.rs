//! Error type for calls to the hosting service's API.

use std::fmt;
use thiserror::Error;

/// Whether retrying the same call later could plausibly succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostErrorKind {
    /// Rate limits, 5xx responses, network trouble.
    Transient,
    /// The request itself is wrong (bad auth, missing object, validation).
    Permanent,
}

#[derive(Debug, Error)]
pub struct HostApiError {
    pub kind: HostErrorKind,
    pub status: Option<u16>,
    pub message: String,
    #[source]
    pub source: Option<octocrab::Error>,
}

impl HostApiError {
    pub fn transient(message: impl Into<String>) -> Self {
        HostApiError {
            kind: HostErrorKind::Transient,
            status: None,
            message: message.into(),
            source: None,
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        HostApiError {
            kind: HostErrorKind::Permanent,
            status: None,
            message: message.into(),
            source: None,
        }
    }

    pub fn from_octocrab(err: octocrab::Error) -> Self {
        let (kind, status, message) = match &err {
            octocrab::Error::GitHub { source, .. } => {
                let status = source.status_code.as_u16();
                let kind = if status == 429 || status >= 500 {
                    HostErrorKind::Transient
                } else {
                    HostErrorKind::Permanent
                };
                (kind, Some(status), source.message.clone())
            }
            octocrab::Error::Hyper { .. } | octocrab::Error::Http { .. } => {
                (HostErrorKind::Transient, None, err.to_string())
            }
            other => (HostErrorKind::Permanent, None, other.to_string()),
        };
        HostApiError {
            kind,
            status,
            message,
            source: Some(err),
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind == HostErrorKind::Transient
    }
}

impl fmt::Display for HostApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "host API error ({status}): {}", self.message),
            None => write!(f, "host API error: {}", self.message),
        }
    }
}
