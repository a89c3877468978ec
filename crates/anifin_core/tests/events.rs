use std::sync::{Arc, Mutex};

use anifin_core::{EventBus, LogBook, LogLevel, QueueEvent, Topic};

fn collecting_bus() -> (EventBus, Arc<Mutex<Vec<QueueEvent>>>) {
    let bus = EventBus::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    (bus, seen)
}

#[test]
fn listeners_only_receive_their_topic() {
    let (bus, seen) = collecting_bus();
    let sink = seen.clone();
    bus.subscribe(Topic::QueueCleared, move |event| {
        sink.lock().unwrap().push(event.clone())
    });

    bus.publish(&QueueEvent::Queued {
        url: "u".into(),
        queue_length: 1,
    });
    bus.publish(&QueueEvent::QueueCleared { dropped: 2 });

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].topic(), Topic::QueueCleared);
}

#[test]
fn multiple_listeners_and_removal() {
    let bus = EventBus::new();
    let count = Arc::new(Mutex::new(0));

    let c1 = count.clone();
    let first = bus.subscribe(Topic::Queued, move |_| *c1.lock().unwrap() += 1);
    let c2 = count.clone();
    bus.subscribe(Topic::Queued, move |_| *c2.lock().unwrap() += 10);
    assert_eq!(bus.listener_count(Topic::Queued), 2);

    let event = QueueEvent::Queued {
        url: "u".into(),
        queue_length: 1,
    };
    bus.publish(&event);
    assert!(bus.unsubscribe(first));
    assert!(!bus.unsubscribe(first));
    bus.publish(&event);

    assert_eq!(*count.lock().unwrap(), 21);
}

#[test]
fn late_subscriber_sees_no_replay() {
    let (bus, seen) = collecting_bus();
    bus.publish(&QueueEvent::QueueCleared { dropped: 0 });

    let sink = seen.clone();
    bus.subscribe_all(move |event| sink.lock().unwrap().push(event.clone()));
    assert!(seen.lock().unwrap().is_empty());

    bus.publish(&QueueEvent::QueueComplete {
        downloader: "aniworld".into(),
    });
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[test]
fn events_serialize_with_camel_case_names() {
    let event = QueueEvent::DownloadError {
        url: "u".into(),
        error: "boom".into(),
        remaining: 2,
    };
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["event"], "downloadError");
    assert_eq!(json["remaining"], 2);

    let event = QueueEvent::Queued {
        url: "u".into(),
        queue_length: 4,
    };
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["queueLength"], 4);
    assert_eq!(Topic::QueueStart.to_string(), "queueStart");
}

#[test]
fn log_book_drops_oldest_past_capacity() {
    let book = LogBook::with_capacity(3);
    for i in 0..5 {
        book.push(LogLevel::Info, format!("line {i}"));
    }
    let messages: Vec<String> = book.entries().into_iter().map(|e| e.message).collect();
    assert_eq!(messages, vec!["line 2", "line 3", "line 4"]);
    assert_eq!(book.capacity(), 3);
}

#[test]
fn log_book_notifies_subscribers_and_clears() {
    let book = LogBook::new();
    let levels = Arc::new(Mutex::new(Vec::new()));
    let sink = levels.clone();
    let id = book.subscribe(move |entry| sink.lock().unwrap().push(entry.level));

    book.push(LogLevel::Success, "done");
    book.push(LogLevel::Error, "failed");
    assert!(book.unsubscribe(id));
    book.push(LogLevel::Warning, "unseen");

    assert_eq!(
        *levels.lock().unwrap(),
        vec![LogLevel::Success, LogLevel::Error]
    );
    assert_eq!(book.len(), 3);
    book.clear();
    assert!(book.is_empty());
}
