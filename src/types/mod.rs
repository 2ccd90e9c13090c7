pub mod cause;
pub mod ids;

pub use cause::{BuildCause, BuildParameters};
pub use ids::{PrNumber, RepoId, Sha, SubscriberKey};
