use super::{FeedState, RequestParser, State};
use crate::method::Method;
use crate::request::Request;

fn parse(input: &[u8]) -> Request {
    let mut parser = RequestParser::new(None);
    match parser.feed(input) {
        Ok(FeedState::Complete) => parser.into_request(),
        other => panic!("expected complete message, got {other:?}"),
    }
}

macro_rules! test {
    (#[partial] $input:literal) => {
        let mut parser = RequestParser::new(None);
        assert_eq!(parser.feed($input).unwrap(), FeedState::Partial);
    };
    (#[error] $input:expr) => {
        let mut parser = RequestParser::new(None);
        let mut result = Ok(FeedState::Partial);
        for b in $input.iter() {
            result = parser.feed(std::slice::from_ref(b));
            if result.is_err() {
                break;
            }
        }
        result.unwrap_err();
    };
}

#[test]
fn simple_get() {
    let request = parse(b"GET /index.html HTTP/1.1\r\nHost: example.com\r\n\r\n");
    assert_eq!(*request.method(), Method::Get);
    assert_eq!(request.url().path(), "/index.html");
    assert_eq!(request.url().host(), Some("example.com"));
    assert!(request.body().is_empty());
}

#[test]
fn post_with_body() {
    let request = parse(
        b"POST /submit HTTP/1.1\r\nContent-Length: 11\r\nContent-Type: text/plain\r\n\r\nhello world",
    );
    assert_eq!(*request.method(), Method::Post);
    assert_eq!(&request.body()[..], b"hello world");
    assert_eq!(request.header("content-type"), Some("text/plain"));
}

#[test]
fn chunked_body() {
    let request = parse(
        b"PUT /data HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n4\r\nWiki\r\n5\r\npedia\r\n0\r\n\r\n",
    );
    assert_eq!(&request.body()[..], b"Wikipedia");
}

#[test]
fn fragmentation_invariance() {
    let message =
        b"POST /api/v1/u-auth/authz?user_id=u1&rp_name=Admin HTTP/1.1\r\n\
          Host: uauth.local:8443\r\n\
          X-Client-Cert-Dn: CN=agent-1\r\n\
          Content-Length: 5\r\n\r\nhello";

    let whole = parse(message);

    for frag in 1..message.len() {
        let mut parser = RequestParser::new(None);
        let mut state = FeedState::Partial;
        for chunk in message.chunks(frag) {
            state = parser.feed(chunk).unwrap();
        }
        assert_eq!(state, FeedState::Complete, "fragment size {frag}");
        let request = parser.into_request();

        assert_eq!(request.method(), whole.method());
        assert_eq!(request.url(), whole.url());
        assert_eq!(request.body(), whole.body());
        assert_eq!(
            request.header("x-client-cert-dn"),
            whole.header("x-client-cert-dn")
        );
    }
}

#[test]
fn state_progression() {
    let mut parser = RequestParser::new(None);
    assert_eq!(parser.state(), State::Begin);

    parser.feed(b"GET / HTTP/1.1\r\n").unwrap();
    assert_eq!(parser.state(), State::Url);

    parser.feed(b"Host: a\r\n").unwrap();
    assert_eq!(parser.state(), State::Headers);

    assert_eq!(parser.feed(b"\r\n").unwrap(), FeedState::Complete);
    assert_eq!(parser.state(), State::MessageComplete);
}

#[test]
fn last_header_value_wins() {
    let request = parse(b"GET / HTTP/1.1\r\nX-Trace: one\r\nX-TRACE: two\r\n\r\n");
    assert_eq!(request.header("x-trace"), Some("two"));
    assert_eq!(request.headers().len(), 1);
}

#[test]
fn upgrade_short_circuits_completion() {
    let mut parser = RequestParser::new(None);
    let state = parser
        .feed(b"GET /socket HTTP/1.1\r\nConnection: upgrade\r\nUpgrade: websocket\r\n\r\n")
        .unwrap();
    assert_eq!(state, FeedState::Complete);
    assert!(parser.is_upgrade());
}

#[test]
fn unknown_method_token_is_kept() {
    let request = parse(b"BREW /pot HTTP/1.1\r\n\r\n");
    assert_eq!(*request.method(), Method::Unknown);
}

#[test]
fn malformed_input() {
    test!(#[error] b"GET / HTTP/1.1\rContent-Ty");
    test!(#[error] b" / HTTP/1.1\r\n");
    test!(#[error] b"GET /\x01 HTTP/1.1\r\n\r\n");
    test!(#[error] b"GET / HTTP/2.3\r\n\r\n");
    test!(#[error] b"GET / HTTP/1.1\r\nNoColonHere\r\n\r\n");
    test!(#[error] b"GET / HTTP/1.1\r\n continuation\r\n\r\n");
    test!(#[error] b"GET / HTTP/1.1\r\nContent-Length: potato\r\n\r\n");
}

#[test]
fn partial_input() {
    test!(#[partial] b"");
    test!(#[partial] b"GET /");
    test!(#[partial] b"GET / HTTP/1.1");
    test!(#[partial] b"GET / HTTP/1.1\r\nHost: a\r\n");
    test!(#[partial] b"POST / HTTP/1.1\r\nContent-Length: 5\r\n\r\nhel");
}
