//! Full connection cycles over an in-memory duplex stream.
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use uauth::authz::AuthzResolver;
use uauth::router::{ArgKind, HandlerFuture, Router};
use uauth::routes;
use uauth::server::ServerConfig;
use uauth::store::MemStore;
use uauth::{Methods, Response, StatusCode};

fn app() -> Router {
    let mut router = Router::new();

    router
        .register("/users/<arg>", Methods::GET, vec![ArgKind::Int], |caps, _| {
            Box::pin(async move {
                let id = caps[0].as_int().unwrap();
                Some(Response::text(StatusCode::OK, format!("user {id}")))
            }) as HandlerFuture
        })
        .unwrap();

    router
        .register("/echo", Methods::POST, vec![], |_, request| {
            Box::pin(async move {
                Some(Response::bytes(
                    StatusCode::OK,
                    request.header("content-type").unwrap_or("application/octet-stream"),
                    request.body().clone(),
                ))
            }) as HandlerFuture
        })
        .unwrap();

    router
        .register("/report", Methods::GET, vec![], |_, _| {
            Box::pin(async move {
                let source: &[u8] = &[b'r'; 1500];
                Some(Response::stream(StatusCode::OK, "text/plain", source))
            }) as HandlerFuture
        })
        .unwrap();

    router
}

async fn exchange(router: Router, raw: &[u8]) -> Vec<u8> {
    let (mut client, server) = tokio::io::duplex(16 * 1024);
    let worker = tokio::spawn(uauth::conn::serve_connection(
        server,
        None,
        Arc::new(router),
        ServerConfig::default(),
    ));

    client.write_all(raw).await.unwrap();
    let mut out = Vec::new();
    client.read_to_end(&mut out).await.unwrap();
    worker.await.unwrap();
    out
}

// ===== Client-side response reader =====

/// A response re-read from the wire, so assertions are structural rather
/// than substring matches.
struct Reply {
    status: u16,
    reason: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Reply {
    fn parse(raw: &[u8]) -> Reply {
        let head_end = raw
            .windows(4)
            .position(|w| w == b"\r\n\r\n")
            .expect("missing header terminator");
        let head = str::from_utf8(&raw[..head_end]).unwrap();
        let mut lines = head.split("\r\n");

        let status_line = lines.next().unwrap();
        let mut parts = status_line.splitn(3, ' ');
        assert_eq!(parts.next(), Some("HTTP/1.1"));
        let status = parts.next().unwrap().parse().unwrap();
        let reason = parts.next().expect("missing reason phrase").to_owned();

        let headers: Vec<(String, String)> = lines
            .map(|line| {
                let (name, value) = line.split_once(": ").expect("malformed header");
                (name.to_ascii_lowercase(), value.to_owned())
            })
            .collect();

        let reply = Reply { status, reason, headers, body: raw[head_end + 4..].to_vec() };
        // a declared length must frame the delivered body exactly
        if let Some(len) = reply.header("content-length") {
            assert_eq!(reply.body.len(), len.parse::<usize>().unwrap());
        }
        reply
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.as_str())
    }
}

#[tokio::test]
async fn typed_path_argument_cycle() {
    let out = exchange(app(), b"GET /users/42 HTTP/1.1\r\nHost: a\r\n\r\n").await;
    let reply = Reply::parse(&out);
    assert_eq!(reply.status, 200);
    assert_eq!(reply.reason, "OK");
    assert_eq!(reply.header("content-length"), Some("7"));
    assert_eq!(reply.body, b"user 42");
}

#[tokio::test]
async fn longer_path_falls_through_to_404() {
    let out = exchange(app(), b"GET /users/42/extra HTTP/1.1\r\n\r\n").await;
    let reply = Reply::parse(&out);
    assert_eq!(reply.status, 404);
    assert_eq!(reply.reason, "Not Found");
    assert!(reply.body.is_empty());
}

#[tokio::test]
async fn non_numeric_argument_is_404() {
    let out = exchange(app(), b"GET /users/alice HTTP/1.1\r\n\r\n").await;
    assert_eq!(Reply::parse(&out).status, 404);
}

#[tokio::test]
async fn request_body_round_trip() {
    let out = exchange(
        app(),
        b"POST /echo HTTP/1.1\r\nContent-Type: application/json\r\nContent-Length: 19\r\n\r\n{\"authorized\":true}",
    )
    .await;
    let reply = Reply::parse(&out);
    assert_eq!(reply.status, 200);
    assert_eq!(reply.header("content-type"), Some("application/json"));
    assert_eq!(reply.body, b"{\"authorized\":true}");
}

#[tokio::test]
async fn chunked_request_body() {
    let out = exchange(
        app(),
        b"POST /echo HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n4\r\nWiki\r\n5\r\npedia\r\n0\r\n\r\n",
    )
    .await;
    let reply = Reply::parse(&out);
    assert_eq!(reply.status, 200);
    assert_eq!(reply.body, b"Wikipedia");
}

#[tokio::test]
async fn streaming_body_is_close_delimited() {
    let out = exchange(app(), b"GET /report HTTP/1.1\r\n\r\n").await;
    let reply = Reply::parse(&out);
    assert_eq!(reply.status, 200);
    assert_eq!(reply.header("content-length"), None);
    assert_eq!(reply.body.len(), 1500);
}

#[tokio::test]
async fn one_request_per_connection() {
    // a pipelined second request is discarded with the stream
    let out = exchange(
        app(),
        b"GET /users/1 HTTP/1.1\r\n\r\nGET /users/2 HTTP/1.1\r\n\r\n",
    )
    .await;
    let reply = Reply::parse(&out);
    assert_eq!(reply.status, 200);
    // the framing check inside parse already proves no second response
    // trails the first; the body is the first handler's alone
    assert_eq!(reply.body, b"user 1");
}

#[tokio::test]
async fn malformed_request_gets_no_response() {
    let out = exchange(app(), b"GET / HTTP/9.9\r\n\r\n").await;
    assert!(out.is_empty());
}

#[tokio::test]
async fn authz_surface_end_to_end() {
    let mut store = MemStore::new();
    let reporting = store.node("Reporting");
    let read_report = store.node("ReadReport");
    store.edge(reporting, read_report);
    store.grant("bob", reporting);

    let mut router = Router::new();
    let (_integrity, rx) = routes::integrity_flag();
    routes::register(&mut router, Arc::new(AuthzResolver::new(store)), rx).unwrap();

    let out = exchange(
        router,
        b"GET /api/v1/u-auth/authz?user_id=bob&rp_name=ReadReport HTTP/1.1\r\nHost: uauth\r\n\r\n",
    )
    .await;
    let reply = Reply::parse(&out);
    assert_eq!(reply.status, 200);
    assert_eq!(reply.header("content-type"), Some("application/json"));
    let json: serde_json::Value = serde_json::from_slice(&reply.body).unwrap();
    assert_eq!(json, serde_json::json!({ "authorized": true }));
}

#[tokio::test]
async fn unknown_method_matches_nothing() {
    let out = exchange(app(), b"BREW /users/42 HTTP/1.1\r\n\r\n").await;
    assert_eq!(Reply::parse(&out).status, 404);
}
