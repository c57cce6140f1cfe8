//! Incremental HTTP/1.1 request parser.
//!
//! [`RequestParser`] is an explicit state machine: the connection handler
//! feeds it arbitrary byte fragments and consumes the reported transition
//! until the message completes. It owns the in-progress request and never
//! touches the socket.
use bytes::{Buf, BytesMut};
use std::net::SocketAddr;

use crate::headers::HeaderMap;
use crate::method::Method;
use crate::request::Request;
use crate::uri::{Url, UriError};

mod chunked;
#[cfg(test)]
mod test;

pub use chunked::ChunkedDecoder;

/// Reject a single field growing without bound.
const MAX_FIELD_CAP: usize = 4 * 1024;
const MAX_HEADERS: usize = 64;

/// Parse progression. States are totally ordered; not every state is
/// visited for every message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum State {
    /// No bytes consumed yet.
    Begin,
    /// Request line seen, target URL populated.
    Url,
    /// Header fields are being consumed.
    Headers,
    /// Empty line seen, body framing decided.
    HeadersComplete,
    /// Fixed-length body bytes are being consumed.
    Body,
    /// Inside a chunk-size line of a chunked body.
    ChunkHeader,
    /// A chunk's data has been fully consumed.
    ChunkComplete,
    /// Terminal state, the request is frozen.
    MessageComplete,
}

/// Outcome of one [`RequestParser::feed`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeedState {
    /// Fragment consumed, more bytes required.
    Partial,
    /// The message is complete; call [`RequestParser::into_request`].
    Complete,
}

#[derive(Debug)]
enum Framing {
    None,
    Length(u64),
    Chunked(ChunkedDecoder),
}

/// Incremental request parser, one per connection.
#[derive(Debug)]
pub struct RequestParser {
    state: State,
    buffer: BytesMut,
    remote: Option<SocketAddr>,
    method: Method,
    url: Url,
    headers: HeaderMap,
    header_count: usize,
    framing: Framing,
    upgrade: bool,
    body: BytesMut,
}

impl RequestParser {
    /// Create a parser for a connection from `remote`.
    pub fn new(remote: Option<SocketAddr>) -> Self {
        Self {
            state: State::Begin,
            buffer: BytesMut::with_capacity(1024),
            remote,
            method: Method::Unknown,
            url: Url::new(),
            headers: HeaderMap::with_capacity(16),
            header_count: 0,
            framing: Framing::None,
            upgrade: false,
            body: BytesMut::new(),
        }
    }

    /// Current parse state.
    pub fn state(&self) -> State {
        self.state
    }

    /// Returns `true` once an `Upgrade` request short-circuited completion.
    pub fn is_upgrade(&self) -> bool {
        self.upgrade
    }

    /// Consume one byte fragment and advance the state machine.
    ///
    /// A fully consumed fragment with an incomplete message is
    /// [`FeedState::Partial`], not an error; the caller waits for more
    /// bytes. Any byte sequence that cannot be tokenized is a fatal
    /// [`ParseError`] and the connection must be torn down.
    pub fn feed(&mut self, fragment: &[u8]) -> Result<FeedState, ParseError> {
        self.buffer.extend_from_slice(fragment);

        loop {
            match self.state {
                State::Begin => {
                    if !self.parse_reqline()? {
                        return self.pending();
                    }
                }
                State::Url | State::Headers => {
                    if !self.parse_headers()? {
                        return self.pending();
                    }
                }
                State::HeadersComplete => self.decide_framing()?,
                State::Body => {
                    if !self.parse_sized_body() {
                        return self.pending();
                    }
                }
                State::ChunkHeader | State::ChunkComplete => {
                    if !self.parse_chunked_body()? {
                        return self.pending();
                    }
                }
                State::MessageComplete => return Ok(FeedState::Complete),
            }
        }
    }

    /// Freeze the parsed message into an immutable [`Request`].
    ///
    /// # Panics
    ///
    /// Panics if the message is not complete.
    pub fn into_request(self) -> Request {
        assert_eq!(self.state, State::MessageComplete, "message is not complete");
        Request::from_parts(
            self.remote,
            self.method,
            self.url,
            self.headers,
            self.body.freeze(),
        )
    }

    fn pending(&self) -> Result<FeedState, ParseError> {
        if self.buffer.len() > MAX_FIELD_CAP
            && matches!(self.state, State::Begin | State::Url | State::Headers)
        {
            return Err(ErrorKind::TooLong.into());
        }
        Ok(FeedState::Partial)
    }

    // ===== Request line =====

    fn parse_reqline(&mut self) -> Result<bool, ParseError> {
        let Some(line) = take_line(&mut self.buffer)? else {
            return Ok(false);
        };
        let line = str::from_utf8(&line).map_err(|_| ErrorKind::InvalidChar)?;

        let mut parts = line.split(' ');
        let (Some(method), Some(target), Some(version), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(ErrorKind::InvalidSeparator.into());
        };

        if method.is_empty() || !method.bytes().all(is_token_byte) {
            return Err(ErrorKind::InvalidChar.into());
        }
        self.method = Method::from_bytes(method.as_bytes());

        if !matches!(version, "HTTP/1.1" | "HTTP/1.0") {
            return Err(ErrorKind::UnsupportedVersion.into());
        }

        self.url.parse_target(target)?;
        self.state = State::Url;
        Ok(true)
    }

    // ===== Headers =====

    fn parse_headers(&mut self) -> Result<bool, ParseError> {
        loop {
            let Some(line) = take_line(&mut self.buffer)? else {
                return Ok(false);
            };
            if line.is_empty() {
                self.state = State::HeadersComplete;
                return Ok(true);
            }

            self.state = State::Headers;
            self.header_count += 1;
            if self.header_count > MAX_HEADERS {
                return Err(ErrorKind::TooManyHeaders.into());
            }

            // obs-fold continuation would be a value without a current
            // field name, which is a protocol error here
            if line[0] == b' ' || line[0] == b'\t' {
                return Err(ErrorKind::OrphanHeaderValue.into());
            }

            let at = line
                .iter()
                .position(|&b| b == b':')
                .ok_or(ErrorKind::InvalidSeparator)?;
            let mut name = line;
            let mut value = name.split_off(at);
            value.advance(1);
            trim_ows(&mut value);

            if name.is_empty() || !name.iter().copied().all(is_token_byte) {
                return Err(ErrorKind::InvalidChar.into());
            }

            // request-line URLs of reverse-proxied requests usually lack a
            // host, the Host header supplies it afterwards
            if name.eq_ignore_ascii_case(b"host") && self.url.host().is_none() {
                let authority =
                    str::from_utf8(&value).map_err(|_| ErrorKind::InvalidChar)?;
                self.url.parse_authority(authority)?;
            }

            self.headers.insert(name.freeze(), value.freeze());
        }
    }

    fn decide_framing(&mut self) -> Result<(), ParseError> {
        if let Some(te) = self.headers.get_str("transfer-encoding") {
            if te
                .split(',')
                .any(|part| part.trim().eq_ignore_ascii_case("chunked"))
            {
                self.framing = Framing::Chunked(ChunkedDecoder::new());
            }
        } else if let Some(value) = self.headers.get_str("content-length") {
            let len = value
                .trim()
                .parse::<u64>()
                .map_err(|_| ErrorKind::InvalidContentLength)?;
            self.framing = Framing::Length(len);
        }

        if self.headers.contains("upgrade") {
            self.upgrade = true;
        }

        // an upgrade hands the connection over after the header block, the
        // normal body/completion handling is short-circuited
        if self.upgrade {
            self.state = State::MessageComplete;
            return Ok(());
        }

        self.state = match self.framing {
            Framing::None | Framing::Length(0) => State::MessageComplete,
            Framing::Length(_) => State::Body,
            Framing::Chunked(_) => State::ChunkHeader,
        };
        Ok(())
    }

    // ===== Body =====

    fn parse_sized_body(&mut self) -> bool {
        let Framing::Length(len) = self.framing else {
            unreachable!("sized body state with no length framing");
        };
        let remaining = len as usize - self.body.len();
        let take = remaining.min(self.buffer.len());
        self.body.extend_from_slice(&self.buffer.split_to(take));
        if self.body.len() == len as usize {
            self.state = State::MessageComplete;
            true
        } else {
            false
        }
    }

    fn parse_chunked_body(&mut self) -> Result<bool, ParseError> {
        let Framing::Chunked(decoder) = &mut self.framing else {
            unreachable!("chunked body state with no chunked framing");
        };
        match decoder.decode(&mut self.buffer, &mut self.body)? {
            chunked::Progress::Pending => {
                self.state = decoder.state();
                Ok(false)
            }
            chunked::Progress::Done => {
                self.state = State::MessageComplete;
                Ok(true)
            }
        }
    }
}

// ===== Line scanning =====

/// Split one line off `bytes`, tolerating both CRLF and bare LF, returning
/// `None` when no full line has arrived yet.
fn take_line(bytes: &mut BytesMut) -> Result<Option<BytesMut>, ParseError> {
    let Some(lf) = bytes.iter().position(|&b| b == b'\n') else {
        // a stray CR not followed by LF is detectable early
        if bytes.last() != Some(&b'\r') && bytes.contains(&b'\r') {
            return Err(ErrorKind::InvalidSeparator.into());
        }
        return Ok(None);
    };

    let mut line = bytes.split_to(lf + 1);
    line.truncate(lf);
    if line.last() == Some(&b'\r') {
        line.truncate(line.len() - 1);
    }
    if line.contains(&b'\r') {
        return Err(ErrorKind::InvalidSeparator.into());
    }
    Ok(Some(line))
}

fn trim_ows(value: &mut BytesMut) {
    while matches!(value.first(), Some(b' ' | b'\t')) {
        value.advance(1);
    }
    while matches!(value.last(), Some(b' ' | b'\t')) {
        value.truncate(value.len() - 1);
    }
}

const fn is_token_byte(b: u8) -> bool {
    matches!(b,
        b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9'
        | b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-'
        | b'.' | b'^' | b'_' | b'`' | b'|' | b'~')
}

// ===== Error =====

/// Fatal request parsing error; the connection is aborted without a
/// response.
#[derive(Debug)]
pub struct ParseError {
    kind: ErrorKind,
}

#[derive(Debug)]
pub(crate) enum ErrorKind {
    InvalidSeparator,
    InvalidChar,
    UnsupportedVersion,
    InvalidUri(UriError),
    InvalidContentLength,
    InvalidChunk,
    OrphanHeaderValue,
    TooManyHeaders,
    TooLong,
}

impl From<ErrorKind> for ParseError {
    #[inline]
    fn from(kind: ErrorKind) -> Self {
        Self { kind }
    }
}

impl From<UriError> for ParseError {
    fn from(err: UriError) -> Self {
        Self { kind: ErrorKind::InvalidUri(err) }
    }
}

impl std::error::Error for ParseError {}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match &self.kind {
            ErrorKind::InvalidSeparator => f.write_str("invalid separator"),
            ErrorKind::InvalidChar => f.write_str("invalid character"),
            ErrorKind::UnsupportedVersion => f.write_str("unsupported HTTP version"),
            ErrorKind::InvalidUri(err) => write!(f, "invalid uri: {err}"),
            ErrorKind::InvalidContentLength => f.write_str("invalid content-length"),
            ErrorKind::InvalidChunk => f.write_str("invalid chunked encoding"),
            ErrorKind::OrphanHeaderValue => {
                f.write_str("header value without a field name")
            }
            ErrorKind::TooManyHeaders => {
                f.write_str("received headers count exceeded the configured maximum")
            }
            ErrorKind::TooLong => f.write_str("field size exceeded the configured maximum"),
        }
    }
}
