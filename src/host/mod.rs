pub mod api;
pub mod client;
pub mod error;

pub use api::{CommentData, CommitState, HookInfo, HostApi, PrSnapshot};
pub use client::OctocrabHost;
pub use error::{HostApiError, HostErrorKind};
