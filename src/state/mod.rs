pub mod pull;

pub use pull::PullRequestState;
