pub mod events;
pub mod parser;
pub mod signature;

pub use events::{CommentAction, HostEvent, IssueCommentEvent, PrAction, PullRequestEvent};
pub use parser::{parse_webhook, ParseError};
pub use signature::verify_signature;
