use gif_tools_client::clients::{BackendClient, TaskBackend};
use gif_tools_client::config::Config;
use gif_tools_client::error::{AppError, ApiError};
use gif_tools_client::models::{JobRequest, SourceMedia, ToolKind};
use mockito::Matcher;
use serde_json::{json, Map};

fn client_for(server: &mockito::ServerGuard, proxy: bool) -> BackendClient {
    let config = Config {
        api_base_url: server.url(),
        download_via_proxy: proxy,
        ..Default::default()
    };
    BackendClient::new(&config).unwrap()
}

#[tokio::test]
async fn url_jobs_post_json_with_url_field() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/reverse")
        .match_header("content-type", "application/json")
        .match_body(Matcher::PartialJson(json!({
            "url": "https://media.example.com/cat.gif",
            "speed": 2
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"task_id":"abc"}"#)
        .expect(1)
        .create_async()
        .await;

    let client = client_for(&server, false);
    let mut params = Map::new();
    params.insert("speed".to_string(), json!(2));
    let request = JobRequest::from_source(
        ToolKind::Reverse,
        &SourceMedia::parse("https://media.example.com/cat.gif"),
        &params,
    );

    let response = client.start_job(&request).await.unwrap();
    assert_eq!(response.task_id, "abc");
    mock.assert_async().await;
}

#[tokio::test]
async fn file_jobs_post_multipart() {
    let dir = tempfile::tempdir().unwrap();
    let gif = dir.path().join("cat.gif");
    std::fs::write(&gif, b"GIF89a-fake").unwrap();

    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/resize")
        .match_header(
            "content-type",
            Matcher::Regex("^multipart/form-data".to_string()),
        )
        .match_body(Matcher::Regex("GIF89a-fake".to_string()))
        .with_status(200)
        .with_body(r#"{"task_id":"t-42"}"#)
        .create_async()
        .await;

    let client = client_for(&server, false);
    let mut params = Map::new();
    params.insert("width".to_string(), json!(64));
    let request = JobRequest::from_source(ToolKind::Resize, &SourceMedia::File(gif), &params);

    let response = client.start_job(&request).await.unwrap();
    assert_eq!(response.task_id, "t-42");
    mock.assert_async().await;
}

#[tokio::test]
async fn error_body_is_surfaced_as_backend_message() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/api/add-text")
        .with_status(400)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error":"font_size must be between 8 and 96"}"#)
        .create_async()
        .await;

    let client = client_for(&server, false);
    let request = JobRequest::from_source(
        ToolKind::AddText,
        &SourceMedia::parse("https://media.example.com/cat.gif"),
        &Map::new(),
    );

    let err = client.start_job(&request).await.unwrap_err();
    match &err {
        AppError::Api(ApiError::BadResponse { status, message, .. }) => {
            assert_eq!(*status, 400);
            assert_eq!(
                message.as_deref(),
                Some("font_size must be between 8 and 96")
            );
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(
        err.backend_message().as_deref(),
        Some("font_size must be between 8 and 96")
    );
}

#[tokio::test]
async fn non_json_error_body_falls_back_to_text() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/api/task-status/abc")
        .with_status(502)
        .with_body("Bad Gateway")
        .create_async()
        .await;

    let client = client_for(&server, false);
    let err = client.task_status("abc").await.unwrap_err();
    assert_eq!(err.backend_message().as_deref(), Some("Bad Gateway"));
}

#[tokio::test]
async fn task_status_accepts_both_vocabularies() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/api/task-status/one")
        .with_status(200)
        .with_body(r#"{"state":"SUCCESS","result":"key123"}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/api/task-status/two")
        .with_status(200)
        .with_body(r#"{"status":"Task completed!","result":["a.gif","a.mp4"]}"#)
        .create_async()
        .await;

    let client = client_for(&server, false);

    let one = client.task_status("one").await.unwrap();
    assert_eq!(one.state.as_deref(), Some("SUCCESS"));
    assert_eq!(one.result, Some(json!("key123")));
    assert!(one.status.is_none());

    let two = client.task_status("two").await.unwrap();
    assert_eq!(two.status.as_deref(), Some("Task completed!"));
    assert_eq!(two.result, Some(json!(["a.gif", "a.mp4"])));
}

#[tokio::test]
async fn download_uses_proxy_flag_when_configured() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/api/download/key123")
        .match_query(Matcher::UrlEncoded("proxy".into(), "true".into()))
        .with_status(200)
        .with_body(vec![0u8; 10])
        .create_async()
        .await;

    let client = client_for(&server, true);
    let bytes = client.download("key123").await.unwrap();
    assert_eq!(bytes.len(), 10);
    mock.assert_async().await;

    let url = client.download_url("key123");
    assert!(url.starts_with(&server.url()));
    assert!(url.ends_with("/api/download/key123?proxy=true"));
}

#[tokio::test]
async fn download_url_without_proxy() {
    let server = mockito::Server::new_async().await;
    let client = client_for(&server, false);
    assert_eq!(
        client.download_url("key123"),
        format!("{}/api/download/key123", server.url())
    );
}

#[tokio::test]
async fn keys_and_task_ids_are_percent_encoded() {
    let mut server = mockito::Server::new_async().await;
    let download = server
        .mock("GET", "/api/download/a%23b%20c.gif")
        .match_query(Matcher::UrlEncoded("proxy".into(), "true".into()))
        .with_status(200)
        .with_body(b"gif")
        .expect(1)
        .create_async()
        .await;
    let status = server
        .mock("GET", "/api/task-status/id%2F1%3Fx")
        .with_status(200)
        .with_body(r#"{"state":"PENDING"}"#)
        .expect(1)
        .create_async()
        .await;

    let client = client_for(&server, true);
    assert_eq!(client.download("a#b c.gif").await.unwrap(), b"gif");
    assert_eq!(
        client.download_url("a#b c.gif"),
        format!("{}/api/download/a%23b%20c.gif?proxy=true", server.url())
    );

    let pending = client.task_status("id/1?x").await.unwrap();
    assert_eq!(pending.state.as_deref(), Some("PENDING"));

    download.assert_async().await;
    status.assert_async().await;
}
