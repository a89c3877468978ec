use std::collections::VecDeque;

use crate::{Job, QueueEvent, QueueStatus};

/// Outcome of asking the state for the next job of an active drain.
#[derive(Debug, Clone, PartialEq)]
pub enum NextJob {
    /// Head job, already removed from the pending sequence.
    Run { job: Job, remaining: usize },
    /// The sequence was empty; the drain has been closed.
    Finished(QueueEvent),
    /// No drain is active.
    Idle,
}

/// Pending jobs plus the single-drain guard.
///
/// Processing is represented only by the name of the downloader being
/// drained, so `is_processing()` and `current_downloader().is_some()` cannot
/// disagree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueState {
    pending: VecDeque<Job>,
    current: Option<String>,
}

impl QueueState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_processing(&self) -> bool {
        self.current.is_some()
    }

    pub fn current_downloader(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn pending(&self) -> Vec<Job> {
        self.pending.iter().cloned().collect()
    }

    /// Appends at the tail.
    pub fn enqueue(&mut self, job: Job) -> QueueEvent {
        let url = job.url().to_string();
        self.pending.push_back(job);
        QueueEvent::Queued {
            url,
            queue_length: self.pending.len(),
        }
    }

    /// Opens a drain for `downloader`. Returns `None` when one is already
    /// active.
    pub fn begin_drain(&mut self, downloader: &str) -> Option<QueueEvent> {
        if self.current.is_some() {
            return None;
        }
        self.current = Some(downloader.to_string());
        Some(QueueEvent::QueueStart {
            downloader: downloader.to_string(),
            queue_length: self.pending.len(),
        })
    }

    /// Pops the head job, or closes the drain when nothing is left. Both
    /// happen under one borrow so a job enqueued concurrently is either
    /// popped by this drain or sees the queue idle.
    pub fn next_job(&mut self) -> NextJob {
        if self.current.is_none() {
            return NextJob::Idle;
        }
        match self.pending.pop_front() {
            Some(job) => NextJob::Run {
                job,
                remaining: self.pending.len(),
            },
            None => {
                let downloader = self.current.take().unwrap_or_default();
                NextJob::Finished(QueueEvent::QueueComplete { downloader })
            }
        }
    }

    /// Drops every pending job. A job already handed out by `next_job` is not
    /// affected.
    pub fn clear(&mut self) -> QueueEvent {
        let dropped = self.pending.len();
        self.pending.clear();
        QueueEvent::QueueCleared { dropped }
    }

    pub fn status(&self) -> QueueStatus {
        QueueStatus {
            is_processing: self.is_processing(),
            current_downloader: self.current.clone(),
            queue_length: self.pending.len(),
            queue: self.pending(),
        }
    }
}
