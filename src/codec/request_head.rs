//! The parsed head of a request, before it becomes a full
//! [`Request`](crate::Request).

use http::header::{CONNECTION, EXPECT};
use http::request::Parts;
use http::{HeaderMap, Method, Request, Uri, Version};

/// A parsed request head.
///
/// Wraps an `http::Request<()>` and adds the connection-level queries the
/// serve loop needs: keep-alive semantics and expect-continue detection.
#[derive(Debug)]
pub struct RequestHeader {
    inner: Request<()>,
}

impl RequestHeader {
    pub fn method(&self) -> &Method {
        self.inner.method()
    }

    pub fn uri(&self) -> &Uri {
        self.inner.uri()
    }

    pub fn version(&self) -> Version {
        self.inner.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        self.inner.headers_mut()
    }

    /// The raw request target as received on the wire.
    pub fn target(&self) -> String {
        self.inner
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| self.inner.uri().path().to_string())
    }

    /// Keep-alive semantics per RFC 7230: HTTP/1.1 defaults to keep-alive
    /// unless `Connection: close`; HTTP/1.0 requires `Connection: keep-alive`.
    pub fn keep_alive(&self) -> bool {
        let connection = self
            .headers()
            .get(CONNECTION)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        let has_token = |token: &str| {
            connection.split(',').any(|part| part.trim().eq_ignore_ascii_case(token))
        };

        match self.version() {
            Version::HTTP_11 => !has_token("close"),
            Version::HTTP_10 => has_token("keep-alive"),
            _ => false,
        }
    }

    /// Whether the client asked for a `100 Continue` interim response.
    pub fn expects_continue(&self) -> bool {
        self.headers()
            .get(EXPECT)
            .map(|value| value.as_bytes().len() >= 4 && &value.as_bytes()[..4] == b"100-")
            .unwrap_or(false)
    }
}

impl From<Parts> for RequestHeader {
    #[inline]
    fn from(parts: Parts) -> Self {
        Self { inner: Request::from_parts(parts, ()) }
    }
}

impl From<Request<()>> for RequestHeader {
    #[inline]
    fn from(inner: Request<()>) -> Self {
        Self { inner }
    }
}
