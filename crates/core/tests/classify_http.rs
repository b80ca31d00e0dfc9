//! Classify client tests against a local HTTP stub.

use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use subjectify_core::{
    ClassificationService, ClassifyClient, ClassifyConfig, ClassifyError, LookupQuery, MatchType,
};

const SINGLE_WORK: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<classify xmlns="http://classify.oclc.org">
  <response code="2"/>
  <work author="Dickens, Charles" holdings="16000" owi="4242" title="Great expectations"/>
  <recommendations>
    <ddc><mostPopular holdings="9000" nsfa="823.8" sfa="823.8"/></ddc>
    <lcc><mostPopular holdings="8000" sfa="PR4560"/></lcc>
  </recommendations>
</classify>"#;

const NO_INPUT: &str =
    r#"<classify xmlns="http://classify.oclc.org"><response code="100"/></classify>"#;

const INVALID_NUMBER: &str =
    r#"<classify xmlns="http://classify.oclc.org"><response code="101"/></classify>"#;

/// Serve one canned response per connection and record request lines.
async fn serve(responses: Vec<(u16, &'static str)>) -> (String, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&requests);

    tokio::spawn(async move {
        for (status, body) in responses {
            let (mut socket, _) = listener.accept().await.unwrap();

            let mut buf = vec![0u8; 8192];
            let mut read = 0;
            while !buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf[read..]).await.unwrap();
                if n == 0 {
                    break;
                }
                read += n;
            }
            let head = String::from_utf8_lossy(&buf[..read]).to_string();
            let request_line = head.lines().next().unwrap_or_default().to_string();
            seen.lock().unwrap().push(request_line);

            let reason = match status {
                200 => "OK",
                403 => "Forbidden",
                429 => "Too Many Requests",
                503 => "Service Unavailable",
                _ => "Error",
            };
            let response = format!(
                "HTTP/1.1 {} {}\r\nContent-Type: text/xml\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                reason,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        }
    });

    (format!("http://{}/classify2/Classify", addr), requests)
}

fn client(base_url: String) -> ClassifyClient {
    ClassifyClient::new(ClassifyConfig {
        base_url,
        ..Default::default()
    })
    .unwrap()
}

#[tokio::test]
async fn test_isbn_query_single_work() {
    let (url, requests) = serve(vec![(200, SINGLE_WORK)]).await;
    let client = client(url);

    let candidates = client
        .query(&LookupQuery::Isbn("9780140449266".to_string()))
        .await
        .unwrap();

    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].ddc.as_deref(), Some("823.8"));
    // Falls back to sfa when nsfa is missing
    assert_eq!(candidates[0].lcc.as_deref(), Some("PR4560"));
    assert_eq!(candidates[0].match_type, MatchType::Identifier);

    let requests = requests.lock().unwrap();
    assert!(requests[0].starts_with("GET /classify2/Classify?"));
    assert!(requests[0].contains("summary=true"));
    assert!(requests[0].contains("isbn=9780140449266"));
}

#[tokio::test]
async fn test_author_title_query_is_quoted() {
    let (url, requests) = serve(vec![(200, SINGLE_WORK)]).await;
    let client = client(url);

    let candidates = client
        .query(&LookupQuery::AuthorTitle {
            author: "Dickens, Charles".to_string(),
            title: "Great Expectations".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(candidates[0].match_type, MatchType::Heuristic);

    let requests = requests.lock().unwrap();
    assert!(requests[0].contains("author=%22Dickens%2C+Charles%22"));
    assert!(requests[0].contains("title=%22Great+Expectations%22"));
}

#[tokio::test]
async fn test_http_errors_are_classified() {
    let (url, _) = serve(vec![(503, ""), (429, ""), (403, "")]).await;
    let client = client(url);
    let query = LookupQuery::Isbn("9780140449266".to_string());

    let err = client.query(&query).await.unwrap_err();
    assert!(matches!(err, ClassifyError::ServiceError { status: 503, .. }));
    assert!(err.is_retryable());

    let err = client.query(&query).await.unwrap_err();
    assert!(matches!(err, ClassifyError::RateLimitExceeded));
    assert!(err.is_retryable());

    let err = client.query(&query).await.unwrap_err();
    assert!(matches!(err, ClassifyError::Rejected { status: 403, .. }));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_invalid_standard_number() {
    let (url, _) = serve(vec![(200, INVALID_NUMBER)]).await;
    let err = client(url)
        .query(&LookupQuery::Isbn("0000000000".to_string()))
        .await
        .unwrap_err();
    assert!(matches!(err, ClassifyError::InvalidInput(_)));
}

#[tokio::test]
async fn test_probe_accepts_no_input_response() {
    let (url, requests) = serve(vec![(200, NO_INPUT)]).await;
    client(url).probe().await.unwrap();

    let requests = requests.lock().unwrap();
    assert!(!requests[0].contains("isbn="));
}

#[tokio::test]
async fn test_probe_rejects_forbidden() {
    let (url, _) = serve(vec![(403, "")]).await;
    let err = client(url).probe().await.unwrap_err();
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_unreachable_service_is_retryable() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client(format!("http://{}/classify", addr))
        .query(&LookupQuery::Isbn("9780140449266".to_string()))
        .await
        .unwrap_err();
    assert!(matches!(err, ClassifyError::HttpError(_)));
    assert!(err.is_retryable());
}
