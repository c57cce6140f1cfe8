//! Immutable parsed request.
use bytes::Bytes;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::headers::HeaderMap;
use crate::method::Method;
use crate::uri::Url;

/// A fully parsed HTTP request.
///
/// Produced by [`RequestParser::into_request`][crate::parser::RequestParser::into_request]
/// once the message completes, then shared with handlers behind an [`Arc`].
/// Nothing here mutates after construction.
#[derive(Debug)]
pub struct Request {
    remote: Option<SocketAddr>,
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Bytes,
}

impl Request {
    pub(crate) fn from_parts(
        remote: Option<SocketAddr>,
        method: Method,
        url: Url,
        headers: HeaderMap,
        body: Bytes,
    ) -> Self {
        Self { remote, method, url, headers, body }
    }

    /// Peer address of the connection this request arrived on.
    pub fn remote(&self) -> Option<SocketAddr> {
        self.remote
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Request body, empty when the message carried none.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Header value by case-insensitive name, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get_str(name)
    }

    /// Decoded query pairs in declaration order.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.url.query_pairs()
    }

    /// Identity of the requester as asserted by the TLS-terminating proxy
    /// in the `X-Client-Cert-Dn` header.
    pub fn requester_id(&self) -> Option<&str> {
        self.header("x-client-cert-dn")
    }

    /// Wrap the request for shared handler access.
    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}
