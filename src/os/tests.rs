//! Tests for the OS integration layer

use super::*;
use crate::core::event::{channel, EventSender};
use std::time::Duration;

fn two_displays() -> StaticDisplayDirectory {
    StaticDisplayDirectory::new(vec![
        DisplayMetadata::new(DisplayId(1), "External").with_refresh_hz(144.0),
        DisplayMetadata::new(DisplayId(2), "Built-in")
            .with_refresh_hz(60.0)
            .primary(),
    ])
}

#[test]
fn test_select_target_prefers_known_display() {
    let directory = two_displays();
    assert_eq!(select_target(&directory), DisplayId(2));

    directory.set_known_target(Some(DisplayId(1)));
    assert_eq!(select_target(&directory), DisplayId(1));

    directory.set_known_target(None);
    assert_eq!(select_target(&directory), DisplayId(2));
}

#[test]
fn test_default_target_without_primary_uses_first() {
    let directory = StaticDisplayDirectory::new(vec![
        DisplayMetadata::new(DisplayId(4), "A"),
        DisplayMetadata::new(DisplayId(5), "B"),
    ]);
    assert_eq!(directory.system_default_target(), DisplayId(4));

    let empty = StaticDisplayDirectory::new(Vec::new());
    assert_eq!(empty.system_default_target(), DisplayId::MAIN);
}

#[test]
fn test_metadata_lookup() {
    let directory = two_displays();
    let meta = directory.metadata_for(DisplayId(1)).unwrap();
    assert_eq!(meta.name, "External");
    assert_eq!(meta.refresh_hz, Some(144.0));
    assert!(directory.metadata_for(DisplayId(9)).is_none());
    assert_eq!(directory.ids(), vec![DisplayId(1), DisplayId(2)]);
}

#[tokio::test]
async fn test_software_source_ticks_into_queue() {
    let (tx, mut rx) = channel();
    let mut source = SoftwareTickSource::new(Duration::from_millis(5), vec![DisplayId::MAIN]);

    source
        .create_and_start(TickSink::new(EventSender::new(&tx), 3))
        .unwrap();
    assert!(source.is_active());

    let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("tick within two seconds")
        .unwrap();
    assert!(matches!(event, Event::Tick { cycle: 3, .. }));

    source.stop();
    assert!(!source.is_active());
    // Stopping twice is harmless
    source.stop();
}

#[tokio::test]
async fn test_stop_does_not_wait_out_the_interval() {
    let (tx, _rx) = channel();
    let mut source = SoftwareTickSource::new(Duration::from_millis(1500), vec![DisplayId::MAIN]);
    source
        .create_and_start(TickSink::new(EventSender::new(&tx), 1))
        .unwrap();
    std::thread::sleep(Duration::from_millis(20));

    let started = std::time::Instant::now();
    source.stop();
    assert!(
        started.elapsed() < Duration::from_millis(250),
        "stop took {:?}",
        started.elapsed()
    );
    assert!(!source.is_active());

    // A restart right after a prompt stop still ticks on the new cycle
    let (tx2, mut rx2) = channel();
    let mut fast = SoftwareTickSource::new(Duration::from_millis(5), vec![DisplayId::MAIN]);
    fast.create_and_start(TickSink::new(EventSender::new(&tx2), 1)).unwrap();
    fast.stop();
    fast.create_and_start(TickSink::new(EventSender::new(&tx2), 2)).unwrap();
    let event = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match rx2.recv().await {
                Some(Event::Tick { cycle: 2, .. }) => break true,
                Some(_) => continue,
                None => break false,
            }
        }
    })
    .await
    .unwrap();
    assert!(event);
    fast.stop();
}

#[tokio::test]
async fn test_software_source_injected_failures() {
    let (tx, _rx) = channel();
    let mut source =
        SoftwareTickSource::new(Duration::from_millis(5), vec![DisplayId::MAIN]).with_start_failures(2);

    for _ in 0..2 {
        let err = source
            .create_and_start(TickSink::new(EventSender::new(&tx), 1))
            .unwrap_err();
        assert!(matches!(err, TickSourceError::CreateFailed { .. }));
        assert!(!source.is_active());
    }

    source
        .create_and_start(TickSink::new(EventSender::new(&tx), 1))
        .unwrap();
    assert!(source.is_active());
}

#[tokio::test]
async fn test_software_source_set_target() {
    let (tx, _rx) = channel();
    let mut source = SoftwareTickSource::new(Duration::from_millis(5), vec![DisplayId(1)]);

    assert_eq!(source.set_target(DisplayId(1)), Err(TickSourceError::NotRunning));

    source
        .create_and_start(TickSink::new(EventSender::new(&tx), 1))
        .unwrap();
    source.set_target(DisplayId(1)).unwrap();
    assert_eq!(source.target(), Some(DisplayId(1)));

    let err = source.set_target(DisplayId(8)).unwrap_err();
    assert!(matches!(err, TickSourceError::SetTargetFailed { display: DisplayId(8), .. }));
    assert_eq!(source.target(), Some(DisplayId(1)));
}

#[test]
fn test_source_thread_exits_when_owner_gone() {
    let (tx, rx) = channel();
    let mut source = SoftwareTickSource::new(Duration::from_millis(2), vec![DisplayId::MAIN]);
    source
        .create_and_start(TickSink::new(EventSender::new(&tx), 1))
        .unwrap();

    drop(rx);
    drop(tx);

    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    while source.is_active() && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert!(!source.is_active());
}

#[test]
fn test_display_metadata_serde() {
    let json = r#"{ "id": 3, "name": "Studio Display", "refresh_hz": 60.0 }"#;
    let meta: DisplayMetadata = serde_json::from_str(json).unwrap();
    assert_eq!(meta.id, DisplayId(3));
    assert!(!meta.is_primary);
    assert_eq!(DisplayId(3).to_string(), "3");
}
