//! Publish/subscribe plumbing.
//!
//! `Listeners<T>` is a plain fan-out list; `EventBus` keeps one list per
//! [`Topic`]. Listeners run synchronously on the publishing task, after the
//! list has been snapshotted, so a listener may subscribe or unsubscribe
//! without deadlocking. There is no replay for late subscribers.

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use crate::LogEntry;

/// Closed set of queue topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Topic {
    Queued,
    QueueStart,
    DownloadStart,
    DownloadComplete,
    DownloadError,
    QueueComplete,
    QueueCleared,
    Log,
}

impl Topic {
    pub const ALL: [Topic; 8] = [
        Topic::Queued,
        Topic::QueueStart,
        Topic::DownloadStart,
        Topic::DownloadComplete,
        Topic::DownloadError,
        Topic::QueueComplete,
        Topic::QueueCleared,
        Topic::Log,
    ];

    fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Topic::Queued => "queued",
            Topic::QueueStart => "queueStart",
            Topic::DownloadStart => "downloadStart",
            Topic::DownloadComplete => "downloadComplete",
            Topic::DownloadError => "downloadError",
            Topic::QueueComplete => "queueComplete",
            Topic::QueueCleared => "queueCleared",
            Topic::Log => "log",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum QueueEvent {
    Queued {
        url: String,
        queue_length: usize,
    },
    QueueStart {
        downloader: String,
        queue_length: usize,
    },
    DownloadStart {
        url: String,
        remaining: usize,
    },
    DownloadComplete {
        url: String,
        path: PathBuf,
        remaining: usize,
    },
    DownloadError {
        url: String,
        error: String,
        remaining: usize,
    },
    QueueComplete {
        downloader: String,
    },
    QueueCleared {
        dropped: usize,
    },
    Log {
        downloader: String,
        queue_length: usize,
        entry: LogEntry,
    },
}

impl QueueEvent {
    pub fn topic(&self) -> Topic {
        match self {
            QueueEvent::Queued { .. } => Topic::Queued,
            QueueEvent::QueueStart { .. } => Topic::QueueStart,
            QueueEvent::DownloadStart { .. } => Topic::DownloadStart,
            QueueEvent::DownloadComplete { .. } => Topic::DownloadComplete,
            QueueEvent::DownloadError { .. } => Topic::DownloadError,
            QueueEvent::QueueComplete { .. } => Topic::QueueComplete,
            QueueEvent::QueueCleared { .. } => Topic::QueueCleared,
            QueueEvent::Log { .. } => Topic::Log,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

impl ListenerId {
    fn next() -> Self {
        Self(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

pub struct Listeners<T> {
    entries: Mutex<Vec<(ListenerId, Listener<T>)>>,
}

impl<T> Listeners<T> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn add(&self, listener: impl Fn(&T) + Send + Sync + 'static) -> ListenerId {
        let id = ListenerId::next();
        self.entries.lock().push((id, Arc::new(listener)));
        id
    }

    /// Returns false if `id` was not registered here.
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|(existing, _)| *existing != id);
        entries.len() != before
    }

    pub fn emit(&self, value: &T) {
        let snapshot: Vec<Listener<T>> = self
            .entries
            .lock()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in snapshot {
            listener(value);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for Listeners<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Listeners<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.len())
            .finish()
    }
}

/// Named-topic broadcaster for [`QueueEvent`]s.
#[derive(Debug, Default)]
pub struct EventBus {
    topics: [Listeners<QueueEvent>; Topic::ALL.len()],
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(
        &self,
        topic: Topic,
        listener: impl Fn(&QueueEvent) + Send + Sync + 'static,
    ) -> ListenerId {
        self.topics[topic.index()].add(listener)
    }

    /// Registers the same listener on every topic.
    pub fn subscribe_all(
        &self,
        listener: impl Fn(&QueueEvent) + Send + Sync + 'static,
    ) -> Vec<ListenerId> {
        let shared: Listener<QueueEvent> = Arc::new(listener);
        Topic::ALL
            .iter()
            .map(|topic| {
                let listener = shared.clone();
                self.subscribe(*topic, move |event| listener(event))
            })
            .collect()
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.topics.iter().any(|listeners| listeners.remove(id))
    }

    pub fn publish(&self, event: &QueueEvent) {
        self.topics[event.topic().index()].emit(event);
    }

    pub fn listener_count(&self, topic: Topic) -> usize {
        self.topics[topic.index()].len()
    }
}
