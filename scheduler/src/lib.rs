//! Event admission and the job plane.
//!
//! C7: webhook classification, debounce, trigger predicates, suppressions,
//! and feedback recording. C8: FIFO queues with capped-concurrency workers
//! and bounded-retry redelivery.

pub mod errors;
pub mod jobs;
pub mod queue;
pub mod triggers;
pub mod webhook;

pub use errors::{SchedulerError, SchedulerResult};
pub use jobs::{AnalyticsJob, CommentReplyJob, IndexJob, Job, ReviewJob};
pub use queue::{spawn_workers, JobQueue, QueueSet, QueuedJob};
pub use triggers::{comment_trigger, CommentTrigger, TriggerConfig};
pub use webhook::{
    CommentInfo, Decision, EventType, ProviderInfo, PullRequestInfo, RepoInfo, UserInfo,
    WebhookEvent, WebhookHandler, MENTION_MARKER,
};
