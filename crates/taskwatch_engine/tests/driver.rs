use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use pretty_assertions::assert_eq;
use taskwatch_core::{
    ChannelSettings, ConnectionState, ProgressSource, TaskCompletion, TaskMount,
    TaskProgressView, TaskSeed, TaskStatus,
};
use taskwatch_engine::{EngineEvent, EngineHandle, EngineSettings};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

const WAIT: Duration = Duration::from_secs(5);

fn mount(channel_url: String, seed: TaskSeed) -> TaskMount {
    TaskMount {
        channel_url,
        task_id: "T1".into(),
        user_id: "u1".into(),
        seed,
    }
}

fn processing_at(progress: f64) -> TaskSeed {
    TaskSeed {
        progress: Some(progress),
        status: Some(TaskStatus::Processing),
    }
}

fn fast_settings() -> EngineSettings {
    EngineSettings {
        channel: ChannelSettings {
            reconnect_interval: Duration::from_millis(50),
            max_reconnect_attempts: 5,
            heartbeat_interval: Duration::from_secs(30),
            simulation_interval: Duration::from_secs(30),
        },
        connect_timeout: Duration::from_secs(2),
    }
}

async fn listen() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    (listener, url)
}

async fn accept(listener: &TcpListener) -> WebSocketStream<TcpStream> {
    let (tcp, _) = listener.accept().await.unwrap();
    tokio_tungstenite::accept_async(tcp).await.unwrap()
}

async fn next_text(ws: &mut WebSocketStream<TcpStream>) -> Option<String> {
    while let Some(frame) = tokio::time::timeout(WAIT, ws.next()).await.ok()? {
        match frame.ok()? {
            Message::Text(text) => return Some(text.as_str().to_owned()),
            Message::Close(_) => return None,
            _ => {}
        }
    }
    None
}

async fn send_text(ws: &mut WebSocketStream<TcpStream>, text: &str) {
    ws.send(Message::Text(text.to_owned().into())).await.unwrap();
}

async fn wait_for<T>(
    events: &mut UnboundedReceiver<EngineEvent>,
    mut pick: impl FnMut(EngineEvent) -> Option<T>,
) -> T {
    tokio::time::timeout(WAIT, async {
        while let Some(event) = events.recv().await {
            if let Some(found) = pick(event) {
                return found;
            }
        }
        panic!("event stream ended");
    })
    .await
    .expect("timed out waiting for event")
}

async fn wait_for_view(
    events: &mut UnboundedReceiver<EngineEvent>,
    accept: impl Fn(&TaskProgressView) -> bool,
) -> TaskProgressView {
    wait_for(events, |event| match event {
        EngineEvent::View(view) if accept(&view) => Some(view),
        _ => None,
    })
    .await
}

#[tokio::test]
async fn live_updates_drive_progress_to_completion() {
    taskwatch_logging::initialize_for_tests();
    let (listener, url) = listen().await;
    let (handle, mut events) =
        EngineHandle::spawn_with_channel(mount(url, processing_at(10.0)), fast_settings())
            .unwrap();

    let mut ws = accept(&listener).await;
    assert_eq!(
        next_text(&mut ws).await.as_deref(),
        Some(r#"{"type":"subscribe_task","task_id":"T1"}"#)
    );

    send_text(
        &mut ws,
        r#"{"type":"task_progress_update","task_id":"T1","progress":40,"status":"processing","message":"rendering"}"#,
    )
    .await;
    let view = wait_for_view(&mut events, |view| view.progress == 40.0).await;
    assert_eq!(view.source, ProgressSource::Live);
    assert_eq!(view.message.as_deref(), Some("rendering"));
    assert!(view.connected);

    send_text(&mut ws, r#"{"type":"task_completed","task_id":"T1"}"#).await;
    let completion = wait_for(&mut events, |event| match event {
        EngineEvent::Completed(completion) => Some(completion),
        _ => None,
    })
    .await;
    assert_eq!(
        completion,
        TaskCompletion {
            task_id: "T1".into(),
            progress: 100.0,
        }
    );

    handle.shutdown();
    let last = handle.join().await.expect("final view");
    assert_eq!(last.status, TaskStatus::Completed);
    assert_eq!(last.percent(), 100);
}

#[tokio::test]
async fn failure_reports_error_once() {
    taskwatch_logging::initialize_for_tests();
    let (listener, url) = listen().await;
    let (handle, mut events) =
        EngineHandle::spawn_with_channel(mount(url, processing_at(30.0)), fast_settings())
            .unwrap();

    let mut ws = accept(&listener).await;
    next_text(&mut ws).await;
    send_text(
        &mut ws,
        r#"{"type":"task_failed","task_id":"T1","error":"out of credits"}"#,
    )
    .await;
    send_text(
        &mut ws,
        r#"{"type":"task_failed","task_id":"T1","error":"again"}"#,
    )
    .await;

    let (task_id, error) = wait_for(&mut events, |event| match event {
        EngineEvent::Failed { task_id, error } => Some((task_id, error)),
        _ => None,
    })
    .await;
    assert_eq!(task_id, "T1");
    assert_eq!(error, "out of credits");

    handle.shutdown();
    let mut failures = 0;
    while let Some(event) = events.recv().await {
        if matches!(event, EngineEvent::Failed { .. }) {
            failures += 1;
        }
    }
    assert_eq!(failures, 0);
    let last = handle.join().await.expect("final view");
    assert_eq!(last.status, TaskStatus::Failed);
    assert_eq!(last.error.as_deref(), Some("out of credits"));
}

#[tokio::test]
async fn malformed_and_unknown_frames_are_ignored() {
    taskwatch_logging::initialize_for_tests();
    let (listener, url) = listen().await;
    let (handle, mut events) =
        EngineHandle::spawn_with_channel(mount(url, processing_at(5.0)), fast_settings())
            .unwrap();

    let mut ws = accept(&listener).await;
    next_text(&mut ws).await;
    send_text(&mut ws, "not json at all").await;
    send_text(&mut ws, r#"{"type":"pong"}"#).await;
    send_text(
        &mut ws,
        r#"{"type":"task_progress_update","task_id":"OTHER","progress":90,"status":"processing"}"#,
    )
    .await;
    send_text(
        &mut ws,
        r#"{"type":"task_progress_update","task_id":"T1","progress":55,"status":"processing"}"#,
    )
    .await;

    let view = wait_for_view(&mut events, |view| view.source == ProgressSource::Live).await;
    assert_eq!(view.progress, 55.0);
    assert!(view.connected);

    handle.shutdown();
    handle.join().await;
}

#[tokio::test]
async fn reconnects_after_server_drop_and_resubscribes() {
    taskwatch_logging::initialize_for_tests();
    let (listener, url) = listen().await;
    let (handle, mut events) =
        EngineHandle::spawn_with_channel(mount(url, processing_at(10.0)), fast_settings())
            .unwrap();

    let mut first = accept(&listener).await;
    next_text(&mut first).await;
    first.close(None).await.unwrap();
    drop(first);

    let dropped =
        wait_for_view(&mut events, |view| view.connection == ConnectionState::ClosedPendingRetry)
            .await;
    assert_eq!(dropped.reconnect_attempts, 1);

    let mut second = accept(&listener).await;
    assert_eq!(
        next_text(&mut second).await.as_deref(),
        Some(r#"{"type":"subscribe_task","task_id":"T1"}"#)
    );
    let reopened = wait_for_view(&mut events, |view| view.connected).await;
    assert_eq!(reopened.reconnect_attempts, 0);
    assert_eq!(reopened.connection_error, None);

    send_text(
        &mut second,
        r#"{"type":"task_progress_update","task_id":"T1","progress":70,"status":"processing"}"#,
    )
    .await;
    wait_for_view(&mut events, |view| view.progress == 70.0).await;

    handle.shutdown();
    handle.join().await;
}

#[tokio::test]
async fn shutdown_unsubscribes_and_closes() {
    taskwatch_logging::initialize_for_tests();
    let (listener, url) = listen().await;
    let (handle, mut events) =
        EngineHandle::spawn_with_channel(mount(url, processing_at(10.0)), fast_settings())
            .unwrap();

    let mut ws = accept(&listener).await;
    next_text(&mut ws).await;
    wait_for_view(&mut events, |view| view.connected).await;

    handle.shutdown();
    assert_eq!(
        next_text(&mut ws).await.as_deref(),
        Some(r#"{"type":"unsubscribe_task","task_id":"T1"}"#)
    );
    assert_eq!(next_text(&mut ws).await, None);

    let last = handle.join().await.expect("final view");
    assert!(!last.connected);
}

#[tokio::test]
async fn unreachable_server_falls_back_to_simulated_ramp() {
    taskwatch_logging::initialize_for_tests();
    let url = {
        let (listener, url) = listen().await;
        drop(listener);
        url
    };
    let settings = EngineSettings {
        channel: ChannelSettings {
            reconnect_interval: Duration::from_millis(20),
            max_reconnect_attempts: 0,
            heartbeat_interval: Duration::from_secs(30),
            simulation_interval: Duration::from_millis(20),
        },
        connect_timeout: Duration::from_secs(1),
    };
    let (handle, mut events) =
        EngineHandle::spawn_with_channel(mount(url, processing_at(20.0)), settings).unwrap();

    let view = wait_for_view(&mut events, |view| {
        view.source == ProgressSource::Simulated && view.progress > 20.0
    })
    .await;
    assert!(!view.connected);
    assert!(view.progress <= 25.0);
    assert_eq!(view.status, TaskStatus::Processing);

    let settled =
        wait_for_view(&mut events, |view| view.connection == ConnectionState::Disconnected).await;
    assert!(settled.progress < 100.0);

    handle.shutdown();
    let last = handle.join().await.expect("final view");
    assert!(last.progress < 100.0);
}
