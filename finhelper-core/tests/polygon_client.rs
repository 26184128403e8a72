//! PolygonClient against a local HTTP stub.
//!
//! The stub accepts one connection per canned response, records the request
//! line, writes the response with `Connection: close`, and moves on.

use chrono::{NaiveDate, TimeZone, Utc};
use finhelper_core::upstream::{MarketDataSource, PolygonClient, PolygonSettings, UpstreamError};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

const HISTORY_OK: &str = r#"{
    "ticker": "AAPL",
    "queryCount": 2,
    "resultsCount": 2,
    "adjusted": true,
    "results": [
        {"v": 1000.0, "vw": 185.1, "o": 184.0, "c": 186.0, "h": 187.0, "l": 183.5, "t": 1704171600000, "n": 50},
        {"v": 1200.0, "vw": 186.2, "o": 186.0, "c": 185.0, "h": 188.0, "l": 184.0, "t": 1704258000000, "n": 61}
    ],
    "status": "OK",
    "request_id": "req-1",
    "count": 2
}"#;

const NEWS_OK: &str = r#"{
    "results": [
        {
            "id": "abc123",
            "publisher": {"name": "Wire", "homepage_url": "https://wire.example"},
            "title": "Apple beats",
            "author": "Staff",
            "published_utc": "2024-01-03T14:30:00Z",
            "article_url": "https://wire.example/abc123",
            "tickers": ["AAPL"],
            "insights": [{"ticker": "AAPL", "sentiment": "positive", "sentiment_reasoning": "beat"}]
        }
    ],
    "status": "OK",
    "request_id": "req-2",
    "count": 1
}"#;

const EMPTY_HISTORY: &str = r#"{
    "ticker": "AAPL", "queryCount": 0, "resultsCount": 0, "adjusted": true,
    "results": [], "status": "OK", "request_id": "req-3", "count": 0
}"#;

struct Stub {
    base_url: String,
    requests: Receiver<String>,
}

fn serve(responses: Vec<(u16, &'static str)>) -> Stub {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        for (status, body) in responses {
            let (mut stream, _) = match listener.accept() {
                Ok(conn) => conn,
                Err(_) => return,
            };
            let head = read_head(&mut stream);
            let request_line = head.lines().next().unwrap_or_default().to_string();
            let _ = tx.send(request_line);

            let reply = format!(
                "HTTP/1.1 {status} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = stream.write_all(reply.as_bytes());
            let _ = stream.flush();
        }
    });

    Stub {
        base_url,
        requests: rx,
    }
}

fn read_head(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut chunk) {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn client(base_url: &str, keys: &[&str], throttle: Duration) -> PolygonClient {
    PolygonClient::new(
        keys.iter().map(|k| k.to_string()).collect(),
        PolygonSettings {
            base_url: base_url.to_string(),
            throttle,
            timeout: Duration::from_secs(5),
        },
    )
    .unwrap()
}

fn jan(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
}

#[test]
fn history_success_decodes_bars() {
    let stub = serve(vec![(200, HISTORY_OK)]);
    let mut polygon = client(&stub.base_url, &["k1"], Duration::ZERO);

    let response = polygon.fetch_history("AAPL", jan(1), jan(7), 0).unwrap();
    let bars = response.results.unwrap();
    assert_eq!(bars.len(), 2);
    assert_eq!(bars[0].close, Some(186.0));
    assert_eq!(bars[1].transactions, Some(61));

    let line = stub.requests.recv().unwrap();
    assert!(
        line.starts_with("GET /v2/aggs/ticker/AAPL/range/1/day/2024-01-01/2024-01-07?"),
        "{line}"
    );
    assert!(line.contains("apiKey=k1"), "{line}");
}

#[test]
fn news_success_decodes_articles() {
    let stub = serve(vec![(200, NEWS_OK)]);
    let mut polygon = client(&stub.base_url, &["k1"], Duration::ZERO);

    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let end = Utc.with_ymd_and_hms(2024, 1, 8, 0, 0, 0).unwrap();
    let response = polygon.fetch_news("AAPL", start, end, 0).unwrap();

    let items = response.results.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id.as_deref(), Some("abc123"));
    assert_eq!(
        items[0].published_utc,
        Some(Utc.with_ymd_and_hms(2024, 1, 3, 14, 30, 0).unwrap())
    );

    let line = stub.requests.recv().unwrap();
    assert!(line.starts_with("GET /v2/reference/news?"), "{line}");
    assert!(line.contains("published_utc.gte=2024-01-01T00%3A00%3A00Z"), "{line}");
}

#[test]
fn server_error_is_transient_transport_failure() {
    let stub = serve(vec![(503, "{}")]);
    let mut polygon = client(&stub.base_url, &["k1"], Duration::ZERO);

    let err = polygon.fetch_history("AAPL", jan(1), jan(7), 0).unwrap_err();
    assert!(matches!(err, UpstreamError::Transport { status: 503 }), "{err:?}");
    assert!(err.is_transient());
}

#[test]
fn forbidden_is_not_transient() {
    let stub = serve(vec![(403, r#"{"status":"NOT_AUTHORIZED"}"#)]);
    let mut polygon = client(&stub.base_url, &["k1"], Duration::ZERO);

    let err = polygon.fetch_history("AAPL", jan(1), jan(7), 0).unwrap_err();
    assert!(matches!(err, UpstreamError::Transport { status: 403 }), "{err:?}");
    assert!(!err.is_transient());
}

#[test]
fn malformed_body_is_decode_error() {
    let stub = serve(vec![(200, "{\"results\": [")]);
    let mut polygon = client(&stub.base_url, &["k1"], Duration::ZERO);

    let err = polygon.fetch_history("AAPL", jan(1), jan(7), 0).unwrap_err();
    assert!(matches!(err, UpstreamError::Decode(_)), "{err:?}");
}

#[test]
fn empty_results_are_reported_as_no_results() {
    let stub = serve(vec![(200, EMPTY_HISTORY)]);
    let mut polygon = client(&stub.base_url, &["k1"], Duration::ZERO);

    let err = polygon.fetch_history("AAPL", jan(1), jan(7), 0).unwrap_err();
    assert!(matches!(err, UpstreamError::NoResults { ref symbol } if symbol == "AAPL"), "{err:?}");
}

#[test]
fn consecutive_calls_rotate_keys() {
    let stub = serve(vec![(200, HISTORY_OK), (200, HISTORY_OK), (200, HISTORY_OK)]);
    let mut polygon = client(&stub.base_url, &["k1", "k2"], Duration::ZERO);

    for _ in 0..3 {
        polygon.fetch_history("AAPL", jan(1), jan(7), 0).unwrap();
    }
    let keys: Vec<String> = stub
        .requests
        .iter()
        .take(3)
        .map(|line| {
            let at = line.find("apiKey=").unwrap() + "apiKey=".len();
            line[at..].split(['&', ' ']).next().unwrap().to_string()
        })
        .collect();
    assert_eq!(keys, vec!["k1", "k2", "k1"]);
}

#[test]
fn throttle_delays_each_request() {
    let stub = serve(vec![(200, HISTORY_OK), (200, HISTORY_OK)]);
    let mut polygon = client(&stub.base_url, &["k1"], Duration::from_millis(100));

    let started = Instant::now();
    polygon.fetch_history("AAPL", jan(1), jan(7), 0).unwrap();
    polygon.fetch_history("AAPL", jan(8), jan(14), 0).unwrap();
    assert!(started.elapsed() >= Duration::from_millis(200));
}

#[test]
fn connection_failure_does_not_leak_the_key() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let mut polygon = client(&format!("http://127.0.0.1:{port}"), &["sekrit-key"], Duration::ZERO);

    let err = polygon.fetch_history("AAPL", jan(1), jan(7), 0).unwrap_err();
    assert!(matches!(err, UpstreamError::Network(_) | UpstreamError::Timeout(_)), "{err:?}");
    assert!(err.is_transient());
    assert!(!err.to_string().contains("sekrit-key"));
}
