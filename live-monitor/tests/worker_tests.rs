//! Monitor worker behaviour against fake pages and a fake transport.

mod common;

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use common::{FakeInspector, FakeTransport, PageScript, deps, source, wait_until};
use live_monitor::domain::MonitorState;
use live_monitor::monitor::StatusTable;
use live_monitor::scheduler::Supervisor;

const STREAM: &str = "https://cdn.example.com/live/stream-room.flv?token=abc";
const OTHER_STREAM: &str = "https://cdn.example.com/live/stream-other.flv";

/// Assert that `id` recorded `OTHER_STREAM` exactly once and saw no failure.
fn assert_clean_recording(status: &StatusTable, transport: &FakeTransport, id: &str) {
    let entry = status.get(id).unwrap();
    assert_eq!(entry.state, MonitorState::Watching);
    assert_eq!(entry.recordings_completed, 1);
    assert_eq!(entry.recordings_failed, 0);
    assert!(entry.recording.is_none());
    assert!(entry.last_error.is_none());
    assert_eq!(transport.calls_for(OTHER_STREAM), 1);
}

#[tokio::test]
async fn test_empty_page_keeps_watching() {
    let temp = tempfile::tempdir().unwrap();
    let inspector = FakeInspector::new();
    let transport = FakeTransport::new();
    let deps = deps(temp.path(), &inspector, &transport);
    let status = deps.status.clone();
    let supervisor = Supervisor::new(deps, CancellationToken::new());

    let room = source("https://live.example.com/room");
    assert!(supervisor.spawn_source(room.clone()));

    assert!(wait_until(|| status.get(room.id()).is_some_and(|s| s.cycles >= 5)).await);
    let entry = status.get(room.id()).unwrap();
    assert_eq!(entry.state, MonitorState::Watching);
    assert!(entry.recording.is_none());
    assert!(entry.last_error.is_none());
    assert!(transport.calls().is_empty());

    supervisor.shutdown(Duration::from_secs(5)).await;
}

#[tokio::test]
async fn test_fixed_stream_recorded_once() {
    let temp = tempfile::tempdir().unwrap();
    let inspector = FakeInspector::new();
    let transport = FakeTransport::new();
    let deps = deps(temp.path(), &inspector, &transport);
    let status = deps.status.clone();
    let dedup = deps.dedup.clone();
    let supervisor = Supervisor::new(deps, CancellationToken::new());

    let room = source("https://live.example.com/room123?from=list");
    inspector.script(room.id(), PageScript::Stream(STREAM.to_string()));
    supervisor.spawn_source(room.clone());

    assert!(wait_until(|| status.get(room.id()).is_some_and(|s| s.cycles >= 10)).await);

    assert_eq!(transport.calls_for(STREAM), 1);
    assert!(dedup.has(STREAM));

    let entry = status.get(room.id()).unwrap();
    assert_eq!(entry.state, MonitorState::Watching);
    assert_eq!(entry.recordings_completed, 1);
    assert!(entry.recording.is_none());

    let call = &transport.calls()[0];
    let name = call.destination.file_name().unwrap().to_str().unwrap();
    assert!(name.starts_with("stream_room123_"), "unexpected name {name}");
    assert!(name.ends_with(".flv"));
    assert!(call.destination.starts_with(temp.path()));
    assert!(
        call.headers
            .iter()
            .any(|(k, v)| k == "Referer" && v == "https://live.example.com/room123?from=list")
    );
    assert_eq!(std::fs::read(&call.destination).unwrap(), FakeTransport::PAYLOAD);

    supervisor.shutdown(Duration::from_secs(5)).await;
}

#[tokio::test]
async fn test_failed_recording_is_not_retried() {
    let temp = tempfile::tempdir().unwrap();
    let inspector = FakeInspector::new();
    let transport = FakeTransport::new();
    transport.fail_url(STREAM);
    let deps = deps(temp.path(), &inspector, &transport);
    let status = deps.status.clone();
    let supervisor = Supervisor::new(deps, CancellationToken::new());

    let room = source("https://live.example.com/room");
    inspector.script(room.id(), PageScript::Stream(STREAM.to_string()));
    supervisor.spawn_source(room.clone());

    assert!(wait_until(|| status.get(room.id()).is_some_and(|s| s.cycles >= 8)).await);

    assert_eq!(transport.calls_for(STREAM), 1);
    let entry = status.get(room.id()).unwrap();
    assert_eq!(entry.state, MonitorState::Watching);
    assert_eq!(entry.recordings_failed, 1);
    assert_eq!(entry.recordings_completed, 0);
    assert!(entry.recording.is_none());
    assert!(entry.last_error.unwrap().message.contains("connection reset"));

    supervisor.shutdown(Duration::from_secs(5)).await;
}

#[tokio::test]
async fn test_same_stream_on_two_pages_recorded_once() {
    let temp = tempfile::tempdir().unwrap();
    let inspector = FakeInspector::new();
    let transport = FakeTransport::new();
    let deps = deps(temp.path(), &inspector, &transport);
    let status = deps.status.clone();
    let supervisor = Supervisor::new(deps, CancellationToken::new());

    let a = source("https://live.example.com/a");
    let b = source("https://mirror.example.com/b");
    inspector.script(a.id(), PageScript::Stream(STREAM.to_string()));
    inspector.script(b.id(), PageScript::Stream(STREAM.to_string()));
    supervisor.spawn_source(a.clone());
    supervisor.spawn_source(b.clone());

    assert!(
        wait_until(|| [&a, &b]
            .iter()
            .all(|s| status.get(s.id()).is_some_and(|e| e.cycles >= 5)))
        .await
    );

    assert_eq!(transport.calls_for(STREAM), 1);
    let completed: u64 = [&a, &b]
        .iter()
        .map(|s| status.get(s.id()).unwrap().recordings_completed)
        .sum();
    assert_eq!(completed, 1);

    supervisor.shutdown(Duration::from_secs(5)).await;
}

#[tokio::test]
async fn test_failing_source_does_not_affect_others() {
    let temp = tempfile::tempdir().unwrap();
    let inspector = FakeInspector::new();
    let transport = FakeTransport::new();
    let deps = deps(temp.path(), &inspector, &transport);
    let status = deps.status.clone();
    let supervisor = Supervisor::new(deps, CancellationToken::new());

    let broken = source("https://live.example.com/broken");
    let healthy = source("https://live.example.com/healthy");
    inspector.script(broken.id(), PageScript::SampleError);
    inspector.script(healthy.id(), PageScript::Stream(STREAM.to_string()));
    supervisor.spawn_source(broken.clone());
    supervisor.spawn_source(healthy.clone());

    assert!(
        wait_until(|| status
            .get(healthy.id())
            .is_some_and(|s| s.recordings_completed == 1))
        .await
    );
    assert!(wait_until(|| inspector.samples(broken.id()) >= 3).await);

    let healthy_entry = status.get(healthy.id()).unwrap();
    assert!(healthy_entry.last_error.is_none());

    let broken_entry = status.get(broken.id()).unwrap();
    assert!(broken_entry.last_error.unwrap().message.contains("timed out"));
    assert!(matches!(
        broken_entry.state,
        MonitorState::Error | MonitorState::Watching
    ));
    // Sample errors keep the session.
    assert_eq!(inspector.opened(broken.id()), 1);

    supervisor.shutdown(Duration::from_secs(5)).await;
}

#[tokio::test]
async fn test_session_open_failure_retries() {
    let temp = tempfile::tempdir().unwrap();
    let inspector = FakeInspector::new();
    let transport = FakeTransport::new();
    let deps = deps(temp.path(), &inspector, &transport);
    let status = deps.status.clone();
    let supervisor = Supervisor::new(deps, CancellationToken::new());

    let room = source("https://live.example.com/room");
    inspector.fail_opens(room.id(), 3);
    supervisor.spawn_source(room.clone());

    assert!(wait_until(|| status.state_of(room.id()) == Some(MonitorState::Watching)).await);
    assert_eq!(inspector.opened(room.id()), 4);
    assert!(
        status
            .get(room.id())
            .unwrap()
            .last_error
            .unwrap()
            .message
            .contains("did not load")
    );

    supervisor.shutdown(Duration::from_secs(5)).await;
}

#[tokio::test]
async fn test_lost_session_is_reopened() {
    let temp = tempfile::tempdir().unwrap();
    let inspector = FakeInspector::new();
    let transport = FakeTransport::new();
    let deps = deps(temp.path(), &inspector, &transport);
    let status = deps.status.clone();
    let supervisor = Supervisor::new(deps, CancellationToken::new());

    let room = source("https://live.example.com/room");
    inspector.script(room.id(), PageScript::SessionLost);
    supervisor.spawn_source(room.clone());

    assert!(wait_until(|| inspector.opened(room.id()) == 2).await);
    assert!(wait_until(|| status.state_of(room.id()) == Some(MonitorState::Watching)).await);

    supervisor.shutdown(Duration::from_secs(5)).await;
}

#[tokio::test]
async fn test_crashed_worker_is_restarted() {
    let temp = tempfile::tempdir().unwrap();
    let inspector = FakeInspector::new();
    let transport = FakeTransport::new();
    let deps = deps(temp.path(), &inspector, &transport);
    let status = deps.status.clone();
    let supervisor = Supervisor::new(deps, CancellationToken::new());

    let room = source("https://live.example.com/room");
    inspector.script(room.id(), PageScript::Panic);
    supervisor.spawn_source(room.clone());

    let mut restarted = 0;
    assert!(
        wait_until(|| {
            restarted += supervisor.restart_crashed();
            restarted == 1
        })
        .await
    );
    assert!(supervisor.is_running(room.id()));

    assert!(wait_until(|| status.state_of(room.id()) == Some(MonitorState::Watching)).await);
    let entry = status.get(room.id()).unwrap();
    assert!(entry.last_error.unwrap().message.contains("inspector blew up"));
    assert_eq!(inspector.opened(room.id()), 2);

    supervisor.shutdown(Duration::from_secs(5)).await;
}

#[tokio::test]
async fn test_shutdown_terminates_workers_mid_recording() {
    let temp = tempfile::tempdir().unwrap();
    let inspector = FakeInspector::new();
    let transport = FakeTransport::new();
    transport.hold_transfers();
    let deps = deps(temp.path(), &inspector, &transport);
    let status = deps.status.clone();
    let supervisor = Supervisor::new(deps, CancellationToken::new());

    let recording = source("https://live.example.com/recording");
    let idle = source("https://live.example.com/idle");
    inspector.script(recording.id(), PageScript::Stream(STREAM.to_string()));
    supervisor.spawn_source(recording.clone());
    supervisor.spawn_source(idle.clone());

    assert!(
        wait_until(|| status
            .get(recording.id())
            .is_some_and(|s| s.recording.is_some()))
        .await
    );
    assert_eq!(status.state_of(recording.id()), Some(MonitorState::Recording));

    let report = supervisor.shutdown(Duration::from_secs(5)).await;
    assert_eq!(report.stopped, 2);
    assert_eq!(report.crashed, 0);
    assert!(!report.timed_out);

    for s in [&recording, &idle] {
        let entry = status.get(s.id()).unwrap();
        assert_eq!(entry.state, MonitorState::Terminated);
        assert!(entry.recording.is_none());
        assert_eq!(entry.recordings_failed, 0);
    }
    assert_eq!(supervisor.worker_count(), 0);
}

#[tokio::test]
async fn test_session_failures_do_not_affect_others() {
    let temp = tempfile::tempdir().unwrap();
    let inspector = FakeInspector::new();
    let transport = FakeTransport::new();
    let deps = deps(temp.path(), &inspector, &transport);
    let status = deps.status.clone();
    let supervisor = Supervisor::new(deps, CancellationToken::new());

    let broken = source("https://live.example.com/broken");
    let healthy = source("https://live.example.com/healthy");
    inspector.fail_opens(broken.id(), usize::MAX);
    inspector.script(healthy.id(), PageScript::Stream(OTHER_STREAM.to_string()));
    supervisor.spawn_source(broken.clone());
    supervisor.spawn_source(healthy.clone());

    assert!(wait_until(|| inspector.opened(broken.id()) >= 5).await);
    assert!(wait_until(|| status.get(healthy.id()).is_some_and(|s| s.cycles >= 5)).await);

    let broken_entry = status.get(broken.id()).unwrap();
    assert_eq!(broken_entry.cycles, 0);
    assert!(broken_entry.last_error.unwrap().message.contains("did not load"));
    assert!(matches!(
        broken_entry.state,
        MonitorState::Error | MonitorState::Initializing
    ));

    assert_eq!(inspector.opened(healthy.id()), 1);
    assert_clean_recording(&status, &transport, healthy.id());

    supervisor.shutdown(Duration::from_secs(5)).await;
}

#[tokio::test]
async fn test_transport_failure_does_not_affect_others() {
    let temp = tempfile::tempdir().unwrap();
    let inspector = FakeInspector::new();
    let transport = FakeTransport::new();
    transport.fail_url(STREAM);
    let deps = deps(temp.path(), &inspector, &transport);
    let status = deps.status.clone();
    let supervisor = Supervisor::new(deps, CancellationToken::new());

    let broken = source("https://live.example.com/broken");
    let healthy = source("https://live.example.com/healthy");
    inspector.script(broken.id(), PageScript::Stream(STREAM.to_string()));
    inspector.script(healthy.id(), PageScript::Stream(OTHER_STREAM.to_string()));
    supervisor.spawn_source(broken.clone());
    supervisor.spawn_source(healthy.clone());

    assert!(
        wait_until(|| [&broken, &healthy]
            .iter()
            .all(|s| status.get(s.id()).is_some_and(|e| e.cycles >= 5)))
        .await
    );

    let broken_entry = status.get(broken.id()).unwrap();
    assert_eq!(broken_entry.recordings_failed, 1);
    assert!(broken_entry.last_error.unwrap().message.contains("connection reset"));
    assert_eq!(transport.calls_for(STREAM), 1);

    assert_clean_recording(&status, &transport, healthy.id());

    supervisor.shutdown(Duration::from_secs(5)).await;
}

#[tokio::test]
async fn test_stream_recorded_once_download_dir_recovers() {
    let temp = tempfile::tempdir().unwrap();
    let blocker = temp.path().join("blocker");
    std::fs::write(&blocker, b"not a directory").unwrap();

    let inspector = FakeInspector::new();
    let transport = FakeTransport::new();
    let deps = deps(&blocker.join("downloads"), &inspector, &transport);
    let status = deps.status.clone();
    let dedup = deps.dedup.clone();
    let supervisor = Supervisor::new(deps, CancellationToken::new());

    let room = source("https://live.example.com/room");
    inspector.script(room.id(), PageScript::Stream(STREAM.to_string()));
    supervisor.spawn_source(room.clone());

    assert!(wait_until(|| status.get(room.id()).is_some_and(|s| s.recordings_failed >= 2)).await);
    assert!(transport.calls().is_empty());
    assert!(!dedup.has(STREAM));
    let entry = status.get(room.id()).unwrap();
    assert!(entry.recording.is_none());
    assert!(entry.last_error.unwrap().message.contains("download directory"));

    std::fs::remove_file(&blocker).unwrap();

    assert!(wait_until(|| status.get(room.id()).is_some_and(|s| s.recordings_completed == 1)).await);
    assert_eq!(transport.calls_for(STREAM), 1);
    assert!(dedup.has(STREAM));
    assert!(blocker.join("downloads").is_dir());

    supervisor.shutdown(Duration::from_secs(5)).await;
}
