use std::time::Duration;

use dash_core::{
    FilterCriterion, FilterSet, PageRequest, QueryStatus, QueryType, ReplyType, StatusFilter,
};
use dash_engine::{ApiSettings, DashboardApi, FailureKind, ReqwestApi};
use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn api_for(server: &MockServer) -> ReqwestApi {
    ReqwestApi::new(ApiSettings {
        base_url: server.uri(),
        ..ApiSettings::default()
    })
    .expect("valid base url")
}

fn query_row(id: u64) -> serde_json::Value {
    json!({
        "id": id,
        "time": 1_700_000_000.5,
        "type": "AAAA",
        "domain": "ads.example.net",
        "client": { "ip": "10.0.0.2", "name": "laptop" },
        "status": "GRAVITY",
        "reply": { "type": "NODATA", "time": 0.0012 },
        "dnssec": "UNKNOWN",
        "upstream": null
    })
}

#[tokio::test]
async fn query_page_sends_cursor_and_filters() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/queries"))
        .and(query_param("cursor", "41"))
        .and(query_param("domain", "example"))
        .and(query_param("status", "blocked"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "queries": [query_row(40), query_row(39)],
            "cursor": 38
        })))
        .expect(1)
        .mount(&server)
        .await;

    let request = PageRequest {
        epoch: 3,
        cursor: Some("41".to_string()),
        filters: FilterSet::new()
            .with(FilterCriterion::DomainSubstring("example".to_string()))
            .with(FilterCriterion::Status(StatusFilter::Blocked)),
    };
    let page = api_for(&server).query_page(&request).await.expect("page");

    assert_eq!(page.cursor.as_deref(), Some("38"));
    assert_eq!(page.items.len(), 2);
    let first = &page.items[0];
    assert_eq!(first.id, 40);
    assert_eq!(first.query_type, QueryType::Aaaa);
    assert_eq!(first.status, QueryStatus::Gravity);
    assert_eq!(first.reply.kind, ReplyType::NoData);
    assert_eq!(first.client.label(), "laptop");
}

#[tokio::test]
async fn missing_or_empty_cursor_means_last_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/queries"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [query_row(1)],
            "cursor": ""
        })))
        .mount(&server)
        .await;

    let page = api_for(&server)
        .query_page(&PageRequest::default())
        .await
        .expect("page");
    assert!(page.is_last());
}

#[tokio::test]
async fn session_id_is_sent_as_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/stats/summary"))
        .and(header("X-FTL-SID", "secret-sid"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "queries": {
                "total": 1200,
                "blocked": 300,
                "percent_blocked": 25.0,
                "unique_domains": 87,
                "forwarded": 700,
                "cached": 200
            },
            "clients": { "active": 4, "total": 9 },
            "gravity": { "domains_being_blocked": 120000 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let api = ReqwestApi::new(ApiSettings {
        base_url: server.uri(),
        session_id: Some("secret-sid".to_string()),
        ..ApiSettings::default()
    })
    .expect("api");
    let summary = api.summary().await.expect("summary");

    assert_eq!(summary.total_queries, 1200);
    assert_eq!(summary.blocked_queries, 300);
    assert_eq!(summary.active_clients, 4);
    assert_eq!(summary.domains_on_blocklist, 120000);
}

#[tokio::test]
async fn log_tail_passes_next_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/logs/dnsmasq"))
        .and(query_param("nextID", "17"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "log": [
                { "timestamp": 1_700_000_001.0, "message": "query[A] example.com", "prio": null }
            ],
            "nextID": 18,
            "pid": 4242
        })))
        .mount(&server)
        .await;

    let batch = api_for(&server).log_tail(Some(17)).await.expect("batch");
    assert_eq!(batch.next_id, 18);
    assert_eq!(batch.pid, Some(4242));
    assert_eq!(batch.lines.len(), 1);
    assert_eq!(batch.lines[0].message, "query[A] example.com");
}

#[tokio::test]
async fn base_url_path_is_kept() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/admin/api/stats/summary"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let api = ReqwestApi::new(ApiSettings {
        base_url: format!("{}/admin", server.uri()),
        ..ApiSettings::default()
    })
    .expect("api");
    let summary = api.summary().await.expect("summary");
    assert_eq!(summary.total_queries, 0);
}

#[tokio::test]
async fn unauthorized_is_classified() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = api_for(&server).summary().await.unwrap_err();
    assert_eq!(err.kind, FailureKind::Unauthorized);
}

#[tokio::test]
async fn server_errors_carry_the_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = api_for(&server).log_tail(None).await.unwrap_err();
    assert_eq!(err.kind, FailureKind::HttpStatus(503));
}

#[tokio::test]
async fn malformed_body_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .mount(&server)
        .await;

    let err = api_for(&server)
        .query_page(&PageRequest::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::Decode);
}

#[tokio::test]
async fn oversized_response_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(256)))
        .mount(&server)
        .await;

    let api = ReqwestApi::new(ApiSettings {
        base_url: server.uri(),
        max_bytes: 64,
        ..ApiSettings::default()
    })
    .expect("api");
    let err = api.summary().await.unwrap_err();
    assert!(matches!(
        err.kind,
        FailureKind::TooLarge { max_bytes: 64, .. }
    ));
}

/// Serves one connection with a chunked body that never ends.
async fn endless_chunked_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept");
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            match socket.read(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(n) => request.extend_from_slice(&buf[..n]),
            }
        }
        let head = "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ntransfer-encoding: chunked\r\n\r\n";
        if socket.write_all(head.as_bytes()).await.is_err() {
            return;
        }
        let mut chunk = b"400\r\n".to_vec();
        chunk.extend_from_slice(&[b' '; 1024]);
        chunk.extend_from_slice(b"\r\n");
        while socket.write_all(&chunk).await.is_ok() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn chunked_oversized_response_is_cut_off_while_streaming() {
    let api = ReqwestApi::new(ApiSettings {
        base_url: endless_chunked_server().await,
        max_bytes: 2048,
        request_timeout: Duration::from_secs(10),
        ..ApiSettings::default()
    })
    .expect("api");

    let err = tokio::time::timeout(Duration::from_secs(5), api.summary())
        .await
        .expect("cap reached before the request timeout")
        .unwrap_err();
    assert!(matches!(
        err.kind,
        FailureKind::TooLarge { max_bytes: 2048, .. }
    ));
}

#[tokio::test]
async fn slow_server_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(250))
                .set_body_json(json!({})),
        )
        .mount(&server)
        .await;

    let api = ReqwestApi::new(ApiSettings {
        base_url: server.uri(),
        request_timeout: Duration::from_millis(50),
        ..ApiSettings::default()
    })
    .expect("api");
    let err = api.summary().await.unwrap_err();
    assert_eq!(err.kind, FailureKind::Timeout);
}

#[test]
fn invalid_base_url_is_rejected() {
    let err = ReqwestApi::new(ApiSettings {
        base_url: "not a url".to_string(),
        ..ApiSettings::default()
    })
    .unwrap_err();
    assert_eq!(err.kind, FailureKind::InvalidUrl);
}
