//! Ollama chat client against a mock HTTP server.

use invoice2json::pipeline::encode::EncodedImage;
use invoice2json::prompts::{EXTRACTION_PROMPT, SYSTEM_PROMPT};
use invoice2json::{ClientError, OllamaClient, VisionModel};
use mockito::Matcher;
use serde_json::json;
use std::time::Duration;

fn image() -> EncodedImage {
    EncodedImage::from_jpeg(&[0xFF, 0xD8, 0xFF])
}

fn client(server: &mockito::ServerGuard) -> OllamaClient {
    OllamaClient::new(
        format!("{}/api/chat", server.url()),
        "llama3.2-vision",
        Some(Duration::from_secs(5)),
    )
    .unwrap()
}

#[tokio::test]
async fn returns_message_content() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/chat")
        .match_body(Matcher::PartialJson(json!({
            "model": "llama3.2-vision",
            "stream": false,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": EXTRACTION_PROMPT, "images": ["/9j/"]}
            ]
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "model": "llama3.2-vision",
                "created_at": "2024-01-31T10:00:00Z",
                "message": {"role": "assistant", "content": "{\"invoice_id\": \"12345\"}"},
                "done": true
            })
            .to_string(),
        )
        .create_async()
        .await;

    let text = client(&server).query(&image()).await.unwrap();

    assert_eq!(text, r#"{"invoice_id": "12345"}"#);
    mock.assert_async().await;
}

#[tokio::test]
async fn non_success_status_is_reported_with_body() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/api/chat")
        .with_status(500)
        .with_body("model runner crashed")
        .create_async()
        .await;

    let err = client(&server).query(&image()).await.unwrap_err();

    match err {
        ClientError::Status { status, ref body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "model runner crashed");
        }
        other => panic!("expected Status, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_content_keeps_the_response_body() {
    let mut server = mockito::Server::new_async().await;
    let body = json!({"error": "model 'llama3.2-vision' not found, try pulling it first"});
    server
        .mock("POST", "/api/chat")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
        .create_async()
        .await;

    let err = client(&server).query(&image()).await.unwrap_err();

    match err {
        ClientError::UnexpectedShape { body: kept } => assert_eq!(kept, body),
        other => panic!("expected UnexpectedShape, got {other:?}"),
    }
}

#[tokio::test]
async fn non_json_body_is_a_transport_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/api/chat")
        .with_status(200)
        .with_body("<html>proxy error</html>")
        .create_async()
        .await;

    let err = client(&server).query(&image()).await.unwrap_err();
    assert!(matches!(err, ClientError::Transport(_)), "got {err:?}");
}

#[tokio::test]
async fn unreachable_endpoint_is_a_transport_error() {
    let c = OllamaClient::new("http://127.0.0.1:9/api/chat", "m", Some(Duration::from_secs(2)))
        .unwrap();
    let err = c.query(&image()).await.unwrap_err();
    assert!(matches!(err, ClientError::Transport(_)));
}
