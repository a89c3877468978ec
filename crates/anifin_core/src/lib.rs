//! Anifin core: IO-free queue state machine, event and log plumbing.
mod episode;
mod events;
mod job;
mod log_book;
mod queue;

pub use episode::EpisodeRef;
pub use events::{EventBus, ListenerId, Listeners, QueueEvent, Topic};
pub use job::{DownloadOptions, Job, MediaFormat, QueueStatus};
pub use log_book::{LogBook, LogEntry, LogLevel, DEFAULT_LOG_CAPACITY};
pub use queue::{NextJob, QueueState};
