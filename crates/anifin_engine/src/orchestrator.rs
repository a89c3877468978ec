//! Serial job queue in front of the registered downloaders.
//!
//! Jobs run one at a time in submission order. At most one drain is active;
//! the guard lives inside [`QueueState`] and is taken and released under the
//! state lock, so concurrent `drain` calls and enqueues racing a finishing
//! drain cannot start a second worker or strand a job.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};

use anifin_core::{
    DownloadOptions, EventBus, Job, ListenerId, LogEntry, NextJob, QueueEvent, QueueState,
    QueueStatus, Topic,
};
use engine_logging::{engine_debug, engine_error, engine_info, engine_warn};
use futures_util::FutureExt;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::{Downloader, QueueError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// This call ran the drain until the queue was empty.
    Drained { processed: usize },
    /// Another drain was already active; nothing was done.
    AlreadyRunning,
}

/// Log entry tagged with the downloader that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloaderLogEntry {
    pub downloader: String,
    #[serde(flatten)]
    pub entry: LogEntry,
}

#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

/// A registered downloader and its log fan-in subscription.
struct Registered {
    downloader: Arc<dyn Downloader>,
    log_listener: ListenerId,
}

struct Inner {
    state: Mutex<QueueState>,
    downloaders: RwLock<HashMap<String, Registered>>,
    bus: EventBus,
    default_downloader: Option<String>,
    in_flight: Mutex<Option<CancellationToken>>,
}

impl Inner {
    fn publish(&self, event: &QueueEvent) {
        self.bus.publish(event);
    }
}

impl Orchestrator {
    /// Orchestrator that only drains on explicit [`Orchestrator::drain`] calls.
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Orchestrator whose `enqueue` starts a drain for `name` on the current
    /// tokio runtime whenever the queue is idle.
    pub fn with_default_downloader(name: impl Into<String>) -> Self {
        Self::build(Some(name.into()))
    }

    fn build(default_downloader: Option<String>) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(QueueState::new()),
                downloaders: RwLock::new(HashMap::new()),
                bus: EventBus::new(),
                default_downloader,
                in_flight: Mutex::new(None),
            }),
        }
    }

    /// Registers `downloader` under its own name and forwards its log entries
    /// as `log` events. A previous registration under the same name is
    /// replaced and its forwarding removed.
    pub fn register_downloader(&self, downloader: Arc<dyn Downloader>) {
        let name = downloader.name().to_string();
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let source = name.clone();
        let log_listener = downloader.logs().subscribe(move |entry| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let queue_length = inner.state.lock().len();
            inner.publish(&QueueEvent::Log {
                downloader: source.clone(),
                queue_length,
                entry: entry.clone(),
            });
        });
        let replaced = self.inner.downloaders.write().insert(
            name.clone(),
            Registered {
                downloader,
                log_listener,
            },
        );
        if let Some(old) = replaced {
            old.downloader.logs().unsubscribe(old.log_listener);
            engine_info!("replaced downloader {name}");
        } else {
            engine_info!("registered downloader {name}");
        }
    }

    pub fn downloader(&self, name: &str) -> Option<Arc<dyn Downloader>> {
        self.inner
            .downloaders
            .read()
            .get(name)
            .map(|registered| registered.downloader.clone())
    }

    pub fn downloader_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.downloaders.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn subscribe(
        &self,
        topic: Topic,
        listener: impl Fn(&QueueEvent) + Send + Sync + 'static,
    ) -> ListenerId {
        self.inner.bus.subscribe(topic, listener)
    }

    pub fn subscribe_all(
        &self,
        listener: impl Fn(&QueueEvent) + Send + Sync + 'static,
    ) -> Vec<ListenerId> {
        self.inner.bus.subscribe_all(listener)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.inner.bus.unsubscribe(id)
    }

    /// Appends a job and returns the new queue length. With a default
    /// downloader set and the queue idle, the drain is claimed under the same
    /// lock as the append and run on the current tokio runtime.
    pub fn enqueue(&self, url: impl Into<String>, options: DownloadOptions) -> usize {
        let job = Job::new(url, options);
        let autostart = self.autostart_target();
        let (queued, start, queue_length) = {
            let mut state = self.inner.state.lock();
            let queued = state.enqueue(job);
            let start = autostart
                .as_ref()
                .and_then(|(name, _, _)| state.begin_drain(name));
            (queued, start, state.len())
        };
        self.inner.publish(&queued);
        if let (Some(start), Some((name, downloader, handle))) = (start, autostart) {
            self.inner.publish(&start);
            let this = self.clone();
            handle.spawn(async move {
                this.process(&name, downloader).await;
            });
        }
        queue_length
    }

    fn autostart_target(
        &self,
    ) -> Option<(String, Arc<dyn Downloader>, tokio::runtime::Handle)> {
        let name = self.inner.default_downloader.as_ref()?;
        let Some(downloader) = self.downloader(name) else {
            engine_warn!("default downloader {name} is not registered, queue waits");
            return None;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => Some((name.clone(), downloader, handle)),
            Err(_) => {
                engine_warn!("no tokio runtime, queue waits for an explicit drain");
                None
            }
        }
    }

    /// Processes queued jobs with downloader `name` until the queue is empty.
    /// Returns immediately when a drain is already active.
    pub async fn drain(&self, name: &str) -> Result<DrainOutcome, QueueError> {
        let downloader = self
            .downloader(name)
            .ok_or_else(|| QueueError::UnknownDownloader(name.to_string()))?;

        let start = self.inner.state.lock().begin_drain(name);
        let Some(start) = start else {
            engine_debug!("drain for {name} requested while queue is busy");
            return Ok(DrainOutcome::AlreadyRunning);
        };
        self.inner.publish(&start);

        let processed = self.process(name, downloader).await;
        Ok(DrainOutcome::Drained { processed })
    }

    /// Runs an already claimed drain to completion.
    async fn process(&self, name: &str, downloader: Arc<dyn Downloader>) -> usize {
        let mut processed = 0;
        loop {
            let next = self.inner.state.lock().next_job();
            match next {
                NextJob::Run { job, remaining } => {
                    self.run_job(downloader.as_ref(), job, remaining).await;
                    processed += 1;
                }
                NextJob::Finished(event) => {
                    self.inner.publish(&event);
                    break;
                }
                NextJob::Idle => break,
            }
        }
        engine_info!("queue drained by {name}: {processed} jobs");
        processed
    }

    async fn run_job(&self, downloader: &dyn Downloader, job: Job, remaining: usize) {
        let url = job.url().to_string();
        self.inner.publish(&QueueEvent::DownloadStart {
            url: url.clone(),
            remaining,
        });

        let cancel = CancellationToken::new();
        *self.inner.in_flight.lock() = Some(cancel.clone());
        let outcome = AssertUnwindSafe(downloader.download(&url, job.options(), cancel))
            .catch_unwind()
            .await;
        *self.inner.in_flight.lock() = None;

        let remaining = self.inner.state.lock().len();
        let event = match outcome {
            Ok(Ok(path)) => QueueEvent::DownloadComplete {
                url,
                path,
                remaining,
            },
            Ok(Err(err)) => {
                engine_warn!("download of {url} failed: {err}");
                QueueEvent::DownloadError {
                    url,
                    error: err.to_string(),
                    remaining,
                }
            }
            Err(panic) => {
                let error = format!("downloader panicked: {}", panic_message(panic.as_ref()));
                engine_error!("download of {url}: {error}");
                QueueEvent::DownloadError {
                    url,
                    error,
                    remaining,
                }
            }
        };
        self.inner.publish(&event);
    }

    /// Drops all pending jobs; the running one continues. Returns how many
    /// were dropped.
    pub fn clear(&self) -> usize {
        let event = self.inner.state.lock().clear();
        self.inner.publish(&event);
        match event {
            QueueEvent::QueueCleared { dropped } => dropped,
            _ => 0,
        }
    }

    /// Signals the running job to stop. Returns false when nothing runs.
    pub fn cancel_in_flight(&self) -> bool {
        match self.inner.in_flight.lock().as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn status(&self) -> QueueStatus {
        self.inner.state.lock().status()
    }

    pub fn is_running(&self) -> bool {
        self.inner.state.lock().is_processing()
    }

    pub fn queue_len(&self) -> usize {
        self.inner.state.lock().len()
    }

    pub fn pending(&self) -> Vec<Job> {
        self.inner.state.lock().pending()
    }

    /// Log entries of every registered downloader, oldest first.
    pub fn all_logs(&self) -> Vec<DownloaderLogEntry> {
        let mut logs: Vec<DownloaderLogEntry> = self
            .inner
            .downloaders
            .read()
            .iter()
            .flat_map(|(name, registered)| {
                registered
                    .downloader
                    .logs()
                    .entries()
                    .into_iter()
                    .map(|entry| DownloaderLogEntry {
                        downloader: name.clone(),
                        entry,
                    })
            })
            .collect();
        logs.sort_by_key(|log| log.entry.timestamp);
        logs
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("status", &self.status())
            .field("downloaders", &self.downloader_names())
            .field("default_downloader", &self.inner.default_downloader)
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
