use anifin_core::{DownloadOptions, Job, NextJob, QueueEvent, QueueState};
use pretty_assertions::assert_eq;

fn init_logging() {
    engine_logging::initialize_for_tests();
}

fn job(url: &str) -> Job {
    Job::new(url, DownloadOptions::default())
}

fn run_url(next: NextJob) -> String {
    match next {
        NextJob::Run { job, .. } => job.url().to_string(),
        other => panic!("expected a job, got {other:?}"),
    }
}

#[test]
fn enqueue_reports_growing_queue_length() {
    init_logging();
    let mut state = QueueState::new();

    assert_eq!(
        state.enqueue(job("https://a")),
        QueueEvent::Queued {
            url: "https://a".into(),
            queue_length: 1
        }
    );
    assert_eq!(
        state.enqueue(job("https://b")),
        QueueEvent::Queued {
            url: "https://b".into(),
            queue_length: 2
        }
    );
    assert!(!state.is_processing());
}

#[test]
fn drain_pops_in_fifo_order_then_closes() {
    let mut state = QueueState::new();
    for url in ["1", "2", "3"] {
        state.enqueue(job(url));
    }

    let start = state.begin_drain("aniworld").expect("drain opens");
    assert_eq!(
        start,
        QueueEvent::QueueStart {
            downloader: "aniworld".into(),
            queue_length: 3
        }
    );
    assert!(state.is_processing());
    assert_eq!(state.current_downloader(), Some("aniworld"));

    let order: Vec<String> = (0..3).map(|_| run_url(state.next_job())).collect();
    assert_eq!(order, vec!["1", "2", "3"]);

    assert_eq!(
        state.next_job(),
        NextJob::Finished(QueueEvent::QueueComplete {
            downloader: "aniworld".into()
        })
    );
    assert!(!state.is_processing());
    assert_eq!(state.current_downloader(), None);
    assert_eq!(state.next_job(), NextJob::Idle);
}

#[test]
fn second_begin_is_rejected_while_active() {
    let mut state = QueueState::new();
    assert!(state.begin_drain("aniworld").is_some());
    assert!(state.begin_drain("aniworld").is_none());
    assert!(state.begin_drain("other").is_none());
    assert_eq!(state.current_downloader(), Some("aniworld"));
}

#[test]
fn remaining_counts_jobs_behind_the_popped_one() {
    let mut state = QueueState::new();
    state.enqueue(job("1"));
    state.enqueue(job("2"));
    state.begin_drain("aniworld");

    match state.next_job() {
        NextJob::Run { job, remaining } => {
            assert_eq!(job.url(), "1");
            assert_eq!(remaining, 1);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn enqueue_during_drain_is_picked_up_by_same_drain() {
    let mut state = QueueState::new();
    state.enqueue(job("1"));
    state.begin_drain("aniworld");
    assert_eq!(run_url(state.next_job()), "1");

    state.enqueue(job("late"));
    assert_eq!(run_url(state.next_job()), "late");
    assert!(matches!(state.next_job(), NextJob::Finished(_)));
}

#[test]
fn clear_drops_pending_but_keeps_active_drain() {
    let mut state = QueueState::new();
    for url in ["1", "2", "3", "4"] {
        state.enqueue(job(url));
    }
    state.begin_drain("aniworld");
    assert_eq!(run_url(state.next_job()), "1");

    assert_eq!(state.clear(), QueueEvent::QueueCleared { dropped: 3 });
    assert_eq!(state.len(), 0);
    assert!(state.is_processing());
    assert!(matches!(state.next_job(), NextJob::Finished(_)));
}

#[test]
fn status_snapshot_reflects_state() {
    let mut state = QueueState::new();
    state.enqueue(Job::new(
        "https://site/anime/stream/my-show/staffel-1/episode-1",
        DownloadOptions::default().with_language("German Sub"),
    ));

    let status = state.status();
    assert!(!status.is_processing);
    assert_eq!(status.current_downloader, None);
    assert_eq!(status.queue_length, 1);
    assert_eq!(
        status.queue[0].options().language.as_deref(),
        Some("German Sub")
    );
}
