use serde_json::json;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use trello_mcp_server::trello::AttachmentOptions;
use trello_mcp_server::{Credentials, TrelloClient, TrelloError};
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0xff];

fn client_for(server: &MockServer) -> TrelloClient {
    TrelloClient::new_with_base_url(
        Credentials::new("test-key", "test-token", None),
        format!("{}/1", server.uri()),
        Duration::from_secs(5),
    )
    .unwrap()
}

async fn mount_metadata(server: &MockServer, metadata: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/1/cards/c1/attachments/a1"))
        .and(query_param("key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(metadata))
        .mount(server)
        .await;
}

/// A public URL is fetched once, without credentials
#[tokio::test]
async fn test_download_without_credentials_when_allowed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/files/logo.png"))
        .and(query_param_is_missing("key"))
        .and(query_param_is_missing("token"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(PNG_BYTES.to_vec(), "image/png"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let response = client_for(&mock_server)
        .download_attachment(&format!("{}/files/logo.png", mock_server.uri()))
        .await
        .unwrap();

    assert_eq!(response.bytes().await.unwrap().as_ref(), PNG_BYTES);
}

/// 404 is final: no credentialed retry
#[tokio::test]
async fn test_404_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/files/missing.png"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let err = client_for(&mock_server)
        .download_attachment(&format!("{}/files/missing.png", mock_server.uri()))
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(404));
}

/// 401 triggers exactly one retry carrying key and token
#[tokio::test]
async fn test_401_retries_once_with_credentials() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/files/private.png"))
        .and(query_param_is_missing("key"))
        .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/files/private.png"))
        .and(query_param("key", "test-key"))
        .and(query_param("token", "test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(PNG_BYTES.to_vec(), "image/png"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let response = client_for(&mock_server)
        .download_attachment(&format!("{}/files/private.png", mock_server.uri()))
        .await
        .unwrap();

    assert!(response.status().is_success());
}

/// The retry's failure is returned as-is, with no third request
#[tokio::test]
async fn test_failed_retry_is_final() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/files/locked.png"))
        .and(query_param_is_missing("key"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/files/locked.png"))
        .and(query_param("key", "test-key"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .mount(&mock_server)
        .await;

    let err = client_for(&mock_server)
        .download_attachment(&format!("{}/files/locked.png", mock_server.uri()))
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(403));
    assert_eq!(mock_server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_unparsable_url_is_rejected() {
    let mock_server = MockServer::start().await;

    let err = client_for(&mock_server)
        .download_attachment("not a url")
        .await
        .unwrap_err();

    assert!(matches!(err, TrelloError::InvalidUrl(_)));
    assert!(mock_server.received_requests().await.unwrap().is_empty());
}

/// Metadata, fallback download and base64 payload end to end
#[tokio::test]
async fn test_attachment_content_payload() {
    let mock_server = MockServer::start().await;
    let file_url = format!("{}/files/logo.png", mock_server.uri());

    mount_metadata(
        &mock_server,
        json!({
            "id": "a1",
            "name": "logo.png",
            "fileName": "company-logo.png",
            "mimeType": "image/png",
            "url": file_url
        }),
    )
    .await;

    Mock::given(method("GET"))
        .and(path("/files/logo.png"))
        .and(query_param_is_missing("key"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/files/logo.png"))
        .and(query_param("key", "test-key"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(PNG_BYTES.to_vec(), "application/octet-stream"),
        )
        .mount(&mock_server)
        .await;

    let options = AttachmentOptions {
        include_data_uri: true,
        include_metadata: true,
        ..AttachmentOptions::default()
    };
    let payload = client_for(&mock_server)
        .attachment_content("c1", "a1", &options)
        .await
        .unwrap();

    // Metadata MIME type wins over the Content-Type header
    assert_eq!(payload.mime_type, "image/png");
    assert_eq!(payload.file_name, "company-logo.png");
    assert_eq!(payload.url, file_url);
    assert_eq!(payload.bytes, PNG_BYTES.len());
    assert_eq!(payload.decode().unwrap(), PNG_BYTES);
    assert_eq!(
        payload.data_uri.as_deref(),
        Some(format!("data:image/png;base64,{}", payload.base64).as_str())
    );
    assert_eq!(payload.attachment.as_ref().unwrap()["id"], "a1");
}

#[tokio::test]
async fn test_header_mime_type_used_without_metadata_type() {
    let mock_server = MockServer::start().await;

    mount_metadata(
        &mock_server,
        json!({"id": "a1", "url": format!("{}/files/notes", mock_server.uri())}),
    )
    .await;

    Mock::given(method("GET"))
        .and(path("/files/notes"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(b"hello".to_vec(), "text/plain; charset=utf-8"),
        )
        .mount(&mock_server)
        .await;

    let payload = client_for(&mock_server)
        .attachment_content("c1", "a1", &AttachmentOptions::default())
        .await
        .unwrap();

    assert_eq!(payload.mime_type, "text/plain");
    assert_eq!(payload.file_name, "notes");
    assert!(payload.data_uri.is_none());
    assert!(payload.attachment.is_none());
}

#[tokio::test]
async fn test_oversized_attachment_is_refused() {
    let mock_server = MockServer::start().await;

    mount_metadata(
        &mock_server,
        json!({"id": "a1", "url": format!("{}/files/big.bin", mock_server.uri())}),
    )
    .await;

    Mock::given(method("GET"))
        .and(path("/files/big.bin"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 64]))
        .mount(&mock_server)
        .await;

    let options = AttachmentOptions {
        max_bytes: 16,
        ..AttachmentOptions::default()
    };
    let err = client_for(&mock_server)
        .attachment_content("c1", "a1", &options)
        .await
        .unwrap_err();

    assert!(err.is_validation());
    assert!(err.to_string().contains("16 byte limit"));
}

/// Serve one chunked response that sends 1 KiB and then never finishes
async fn spawn_stalling_chunked_upstream() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();

        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                return;
            }
            request.extend_from_slice(&buf[..n]);
        }

        let mut response = b"HTTP/1.1 200 OK\r\n\
Content-Type: application/octet-stream\r\n\
Transfer-Encoding: chunked\r\n\r\n400\r\n"
            .to_vec();
        response.extend_from_slice(&[0u8; 1024]);
        response.extend_from_slice(b"\r\n");
        socket.write_all(&response).await.unwrap();
        socket.flush().await.unwrap();

        // Hold the connection open without sending the terminating chunk
        tokio::time::sleep(Duration::from_secs(30)).await;
    });

    format!("http://{}/files/stream.bin", addr)
}

/// Without Content-Length the limit still applies as chunks arrive
#[tokio::test]
async fn test_chunked_attachment_over_limit_fails_fast() {
    let mock_server = MockServer::start().await;
    let file_url = spawn_stalling_chunked_upstream().await;

    mount_metadata(&mock_server, json!({"id": "a1", "url": file_url})).await;

    let client = TrelloClient::new_with_base_url(
        Credentials::new("test-key", "test-token", None),
        format!("{}/1", mock_server.uri()),
        Duration::from_secs(10),
    )
    .unwrap();
    let options = AttachmentOptions {
        max_bytes: 16,
        ..AttachmentOptions::default()
    };

    let started = Instant::now();
    let err = tokio::time::timeout(
        Duration::from_secs(5),
        client.attachment_content("c1", "a1", &options),
    )
    .await
    .expect("size limit should stop the download before the upstream finishes")
    .unwrap_err();

    assert!(err.is_validation(), "unexpected error: {}", err);
    assert!(err.to_string().contains("16 byte limit"));
    assert!(started.elapsed() < Duration::from_secs(5));
}

/// Link attachments without a url cannot be downloaded
#[tokio::test]
async fn test_metadata_without_url() {
    let mock_server = MockServer::start().await;

    mount_metadata(&mock_server, json!({"id": "a1", "name": "orphan"})).await;

    let err = client_for(&mock_server)
        .fetch_attachment("c1", "a1", None)
        .await
        .unwrap_err();

    assert!(err.is_validation());
    assert_eq!(mock_server.received_requests().await.unwrap().len(), 1);
}
