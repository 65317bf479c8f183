//! HTTP client tests against a canned local server.
//!
//! Each test binds a one-shot TCP listener on 127.0.0.1, answers a single
//! request with a fixed response and hands the raw request back for
//! inspection. No external service is needed.

use cv_adapter::{
    ActionKind, AdaptationBackend, AdaptationRequest, AdapterConfig, CvAdaptError,
    HttpAdaptationClient, PdfSource, SelectedFile,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

// ── Canned server ────────────────────────────────────────────────────────────

struct Canned {
    status: &'static str,
    content_type: &'static str,
    body: Vec<u8>,
}

/// Serve one response; the handle yields the raw request text.
async fn serve_once(canned: Canned) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_request(&mut socket).await;

        let head = format!(
            "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            canned.status,
            canned.content_type,
            canned.body.len()
        );
        socket.write_all(head.as_bytes()).await.unwrap();
        socket.write_all(&canned.body).await.unwrap();
        socket.shutdown().await.ok();
        request
    });
    (base, handle)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed before headers were complete");
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = find(&buf, b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_lowercase();
    let content_length = head
        .lines()
        .find_map(|l| l.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok());
    let chunked = head.contains("transfer-encoding: chunked");

    loop {
        let body = &buf[header_end..];
        let done = match content_length {
            Some(len) => body.len() >= len,
            None if chunked => find(body, b"0\r\n\r\n").is_some(),
            None => true,
        };
        if done {
            break;
        }
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn client_for(base: &str) -> HttpAdaptationClient {
    let config = AdapterConfig::builder()
        .service_url(base)
        .request_timeout_secs(Some(10))
        .build()
        .unwrap();
    HttpAdaptationClient::new(&config).unwrap()
}

fn request(action: ActionKind, instructions: Option<&str>) -> AdaptationRequest {
    AdaptationRequest {
        action,
        file: SelectedFile::new("jane.txt", "text/plain", &b"Jane Doe, engineer"[..]),
        job_url: "https://www.reed.co.uk/jobs/data-engineer/1".into(),
        instructions: instructions.map(str::to_string),
    }
}

fn json(status: &'static str, body: &str) -> Canned {
    Canned {
        status,
        content_type: "application/json",
        body: body.as_bytes().to_vec(),
    }
}

// ── Actions ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn adapt_cv_posts_multipart_and_parses_result() {
    let (base, server) = serve_once(json(
        "200 OK",
        r##"{"adapted_cv":"# Jane Doe","job_description":"ABOUT US","original_cv_length":18,"job_description_length":8}"##,
    ))
    .await;

    let result = client_for(&base)
        .process(&request(ActionKind::AdaptCv, None))
        .await
        .unwrap();
    assert_eq!(result.action, ActionKind::AdaptCv);
    assert_eq!(result.content, "# Jane Doe");
    assert_eq!(result.job_description.as_deref(), Some("ABOUT US"));
    assert_eq!(result.original_cv_length, Some(18));
    assert_eq!(result.job_description_length, Some(8));

    let raw = server.await.unwrap();
    assert!(raw.starts_with("POST /api/adapt-cv HTTP/1.1"), "{raw}");
    assert!(raw.to_lowercase().contains("content-type: multipart/form-data"));
    assert!(raw.contains(r#"name="cv_file"; filename="jane.txt""#));
    assert!(raw.contains("Jane Doe, engineer"));
    assert!(raw.contains(r#"name="job_url""#));
    assert!(raw.contains("https://www.reed.co.uk/jobs/data-engineer/1"));
    assert!(!raw.contains("additional_instructions"));
}

#[tokio::test]
async fn general_purpose_sends_instructions() {
    let (base, server) = serve_once(json(
        "200 OK",
        r#"{"processed_content":"Three skills"}"#,
    ))
    .await;

    let result = client_for(&base)
        .process(&request(ActionKind::GeneralPurpose, Some("List three skills")))
        .await
        .unwrap();
    assert_eq!(result.content, "Three skills");
    assert_eq!(result.job_description, None);

    let raw = server.await.unwrap();
    assert!(raw.starts_with("POST /api/general-purpose "));
    assert!(raw.contains(r#"name="additional_instructions""#));
    assert!(raw.contains("List three skills"));
}

#[tokio::test]
async fn validation_errors_are_joined() {
    let (base, _server) = serve_once(json(
        "422 Unprocessable Entity",
        r#"{"detail":[{"loc":["body","job_url"],"msg":"invalid","type":"value_error"}]}"#,
    ))
    .await;

    let err = client_for(&base)
        .process(&request(ActionKind::CoverLetter, None))
        .await
        .unwrap_err();
    assert!(matches!(err, CvAdaptError::Backend { status: 422, .. }));
    assert_eq!(err.to_string(), "body.job_url: invalid");
}

#[tokio::test]
async fn non_json_error_uses_status_text() {
    let (base, _server) = serve_once(Canned {
        status: "500 Internal Server Error",
        content_type: "text/html",
        body: b"<html>boom</html>".to_vec(),
    })
    .await;

    let err = client_for(&base)
        .process(&request(ActionKind::AdaptCv, None))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Internal Server Error");
}

#[tokio::test]
async fn json_error_without_detail_uses_action_fallback() {
    let (base, _server) = serve_once(json("400 Bad Request", r#"{"error":"nope"}"#)).await;

    let err = client_for(&base)
        .process(&request(ActionKind::CoverLetter, None))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Failed to generate cover letter");
}

#[tokio::test]
async fn missing_content_field_is_malformed() {
    let (base, _server) = serve_once(json("200 OK", r#"{"cover_letter":"wrong field"}"#)).await;

    let err = client_for(&base)
        .process(&request(ActionKind::AdaptCv, None))
        .await
        .unwrap_err();
    assert!(matches!(err, CvAdaptError::MalformedResponse { .. }));
}

#[tokio::test]
async fn unreachable_service_is_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let err = client_for(&base)
        .process(&request(ActionKind::AdaptCv, None))
        .await
        .unwrap_err();
    assert!(matches!(err, CvAdaptError::Transport { .. }), "{err:?}");
}

// ── PDF and health ───────────────────────────────────────────────────────────

#[tokio::test]
async fn convert_to_pdf_returns_bytes() {
    let (base, server) = serve_once(Canned {
        status: "200 OK",
        content_type: "application/pdf",
        body: b"%PDF-1.7\n1 0 obj\n%%EOF".to_vec(),
    })
    .await;

    let bytes = client_for(&base)
        .convert_to_pdf(&PdfSource::Html("<h1>Jane</h1>".into()))
        .await
        .unwrap();
    assert!(bytes.starts_with(b"%PDF"));

    let raw = server.await.unwrap();
    assert!(raw.starts_with("POST /api/convert-to-pdf "));
    assert!(raw.contains(r#"name="content""#));
    assert!(raw.contains("<h1>Jane</h1>"));
}

#[tokio::test]
async fn legacy_pdf_payload_uses_markdown_field() {
    let (base, server) = serve_once(Canned {
        status: "200 OK",
        content_type: "application/pdf",
        body: b"%PDF".to_vec(),
    })
    .await;

    client_for(&base)
        .convert_to_pdf(&PdfSource::Markdown("# Jane".into()))
        .await
        .unwrap();
    let raw = server.await.unwrap();
    assert!(raw.contains(r#"name="markdown_content""#));
}

#[tokio::test]
async fn pdf_error_detail_is_surfaced() {
    let (base, _server) = serve_once(json(
        "500 Internal Server Error",
        r#"{"detail":"PDF engine unavailable"}"#,
    ))
    .await;

    let err = client_for(&base)
        .convert_to_pdf(&PdfSource::Html("<p>x</p>".into()))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "PDF engine unavailable");
}

#[tokio::test]
async fn health_probe_reads_status_and_version() {
    let (base, server) = serve_once(json("200 OK", r#"{"status":"healthy","version":"1.4.2"}"#)).await;

    let health = client_for(&base).health().await.unwrap();
    assert!(health.is_healthy());
    assert_eq!(health.version.as_deref(), Some("1.4.2"));

    let raw = server.await.unwrap();
    assert!(raw.starts_with("GET /health "));
}
