use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use taskwatch_core::{Session, TaskSeed, TaskStatus};
use taskwatch_engine::{ApiClient, ApiError, ApiSettings, VideoTaskRequest};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> ApiClient {
    ApiClient::new(&ApiSettings {
        base_url: server.uri(),
        ..ApiSettings::default()
    })
    .expect("client")
}

#[tokio::test]
async fn login_stores_token_on_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/login"))
        .and(body_json(json!({"email": "a@example.com", "password": "pw"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok-1",
            "token_type": "bearer"
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let mut session = Session::anonymous();
    let token = client
        .login(&mut session, "a@example.com", "pw")
        .await
        .expect("login ok");

    assert_eq!(token.token_type.as_deref(), Some("bearer"));
    assert_eq!(token.user, None);
    assert_eq!(session.token(), Some("tok-1"));
}

#[tokio::test]
async fn create_video_task_sends_defaults_with_bearer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/videos/generate"))
        .and(header("authorization", "Bearer tok-1"))
        .and(body_json(json!({
            "character_id": "char-9",
            "script": "hello there",
            "duration": 30,
            "style": "realistic",
            "quality": "standard"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "T1",
            "status": "pending",
            "progress": 0,
            "estimated_time": 180,
            "created_at": "2026-10-19T10:00:00Z"
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let session = Session::with_token("tok-1");
    let task = client
        .create_video_task(&session, &VideoTaskRequest::new("char-9", "hello there"))
        .await
        .expect("task created");

    assert_eq!(task.id, "T1");
    assert_eq!(task.estimated_time, Some(180));
    assert_eq!(
        task.seed(),
        TaskSeed {
            progress: Some(0.0),
            status: Some(TaskStatus::Pending),
        }
    );
}

#[tokio::test]
async fn get_video_task_returns_last_known_state() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/videos/tasks/T7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "T7",
            "status": "processing",
            "progress": 64
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let task = client
        .get_video_task(&Session::with_token("tok"), "T7")
        .await
        .expect("task fetched");

    assert_eq!(task.progress, 64.0);
    assert_eq!(task.created_at, None);
    assert_eq!(task.seed().status, Some(TaskStatus::Processing));
}

#[tokio::test]
async fn anonymous_session_is_rejected_before_sending() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client
        .current_user(&Session::anonymous())
        .await
        .unwrap_err();
    assert_eq!(err, ApiError::NotAuthenticated);
}

#[tokio::test]
async fn unauthorized_carries_server_detail() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/auth/me"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"detail": "token expired"})),
        )
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client
        .current_user(&Session::with_token("old"))
        .await
        .unwrap_err();
    assert_eq!(err, ApiError::Unauthorized("token expired".into()));
}

#[tokio::test]
async fn http_status_falls_back_to_message_field() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/videos/tasks/T9"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "no such task"})))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client
        .get_video_task(&Session::with_token("tok"), "T9")
        .await
        .unwrap_err();
    assert_eq!(
        err,
        ApiError::HttpStatus {
            status: 404,
            detail: "no such task".into(),
        }
    );
}

#[tokio::test]
async fn slow_response_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/videos/tasks/T1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(250))
                .set_body_json(json!({"id": "T1", "status": "processing", "progress": 1})),
        )
        .mount(&server)
        .await;

    let client = ApiClient::new(&ApiSettings {
        base_url: server.uri(),
        request_timeout: Duration::from_millis(50),
        ..ApiSettings::default()
    })
    .expect("client");
    let err = client
        .get_video_task(&Session::with_token("tok"), "T1")
        .await
        .unwrap_err();
    assert_eq!(err, ApiError::Timeout);
}
