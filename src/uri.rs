//! Field-indexed URL parsing.
//!
//! A [`Url`] is populated additively: each parse call only fills the fields
//! it recognizes and leaves the rest untouched. This mirrors reverse-proxy
//! behavior where the request line carries an origin-form target and the
//! `Host` header supplies the authority afterwards.
use std::fmt;

/// A request URL assembled across parser callbacks.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Url {
    scheme: Option<String>,
    userinfo: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    path: String,
    query: Option<String>,
    fragment: Option<String>,
}

impl Url {
    /// Create an empty [`Url`].
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scheme(&self) -> Option<&str> {
        self.scheme.as_deref()
    }

    pub fn userinfo(&self) -> Option<&str> {
        self.userinfo.as_deref()
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Decoded request path. Empty until a target is parsed.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Raw query string, without the leading `?`.
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn fragment(&self) -> Option<&str> {
        self.fragment.as_deref()
    }

    /// Set the scheme, e.g. when the transport is known to be encrypted.
    pub fn set_scheme(&mut self, scheme: &str) {
        self.scheme = Some(scheme.to_owned());
    }

    /// Percent-decoded `(key, value)` query pairs in declaration order.
    ///
    /// A key without `=` yields an empty value.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let Some(query) = self.query.as_deref() else {
            return Vec::new();
        };
        query
            .split('&')
            .filter(|part| !part.is_empty())
            .map(|part| match part.split_once('=') {
                Some((key, value)) => (percent_decode(key), percent_decode(value)),
                None => (percent_decode(part), String::new()),
            })
            .collect()
    }
}

// ===== Parsing =====

impl Url {
    /// Parse a request-line target into this URL.
    ///
    /// Accepts origin-form (`/path?query`), absolute-form
    /// (`scheme://host:port/path`) and asterisk-form (`*`). Recognized
    /// fields are populated additively.
    pub fn parse_target(&mut self, target: &str) -> Result<(), UriError> {
        if target.is_empty() {
            return Err(UriError::Empty);
        }
        if target.bytes().any(invalid_uri_byte) {
            return Err(UriError::InvalidChar);
        }

        if target == "*" {
            self.path = "*".to_owned();
            return Ok(());
        }

        let mut rest = target;

        if !rest.starts_with('/') {
            // absolute-form
            let Some((scheme, tail)) = rest.split_once("://") else {
                return Err(UriError::InvalidTarget);
            };
            if scheme.is_empty() {
                return Err(UriError::InvalidTarget);
            }
            self.scheme = Some(scheme.to_owned());

            let authority_end = tail
                .find(['/', '?', '#'])
                .unwrap_or(tail.len());
            self.parse_authority(&tail[..authority_end])?;
            rest = &tail[authority_end..];
            if rest.is_empty() {
                self.path = "/".to_owned();
                return Ok(());
            }
        }

        let (rest, fragment) = match rest.split_once('#') {
            Some((head, fragment)) => (head, Some(fragment)),
            None => (rest, None),
        };
        let (path, query) = match rest.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (rest, None),
        };

        self.path = percent_decode(path);
        if let Some(query) = query {
            self.query = Some(query.to_owned());
        }
        if let Some(fragment) = fragment {
            self.fragment = Some(fragment.to_owned());
        }
        Ok(())
    }

    /// Parse an authority (`userinfo@host:port`) into this URL, as used for
    /// the `Host` header when the request line lacked a host.
    pub fn parse_authority(&mut self, authority: &str) -> Result<(), UriError> {
        if authority.is_empty() {
            return Err(UriError::Empty);
        }
        if authority.bytes().any(invalid_uri_byte) {
            return Err(UriError::InvalidChar);
        }

        let rest = match authority.rsplit_once('@') {
            Some((userinfo, rest)) => {
                self.userinfo = Some(userinfo.to_owned());
                rest
            }
            None => authority,
        };

        let (host, port) = match rest.rsplit_once(':') {
            Some((host, port)) => {
                let port = port.parse::<u16>().map_err(|_| UriError::InvalidPort)?;
                (host, Some(port))
            }
            None => (rest, None),
        };

        if host.is_empty() {
            return Err(UriError::Empty);
        }
        self.host = Some(host.to_owned());
        if port.is_some() {
            self.port = port;
        }
        Ok(())
    }
}

impl fmt::Display for Url {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(scheme) = &self.scheme {
            write!(f, "{scheme}://")?;
        }
        if let Some(host) = &self.host {
            f.write_str(host)?;
            if let Some(port) = self.port {
                write!(f, ":{port}")?;
            }
        }
        f.write_str(&self.path)?;
        if let Some(query) = &self.query {
            write!(f, "?{query}")?;
        }
        Ok(())
    }
}

const fn invalid_uri_byte(b: u8) -> bool {
    b <= b' ' || b == 0x7f
}

/// Decode `%XX` escapes and `+` as space.
pub fn percent_decode(src: &str) -> String {
    let bytes = src.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => match (hex_val(bytes.get(i + 1)), hex_val(bytes.get(i + 2))) {
                (Some(hi), Some(lo)) => {
                    out.push(hi << 4 | lo);
                    i += 3;
                }
                _ => {
                    out.push(b'%');
                    i += 1;
                }
            },
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_val(b: Option<&u8>) -> Option<u8> {
    match b? {
        b @ b'0'..=b'9' => Some(b - b'0'),
        b @ b'a'..=b'f' => Some(b - b'a' + 10),
        b @ b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

// ===== Error =====

/// URL parsing error.
#[derive(Debug, PartialEq, Eq)]
pub enum UriError {
    Empty,
    InvalidChar,
    InvalidTarget,
    InvalidPort,
}

impl std::error::Error for UriError {}

impl fmt::Display for UriError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UriError::Empty => f.write_str("empty uri component"),
            UriError::InvalidChar => f.write_str("invalid character in uri"),
            UriError::InvalidTarget => f.write_str("invalid request target"),
            UriError::InvalidPort => f.write_str("invalid port"),
        }
    }
}
