//! The response model and its builder surface.

use http::header::{CONTENT_TYPE, SET_COOKIE};
use http::{HeaderMap, HeaderValue, StatusCode, Version};
use tracing::warn;

use crate::cookie::Cookie;

/// An HTTP response under construction.
///
/// The version and keep-alive flag are carried over from the request when the
/// response is created; the status defaults to `200 OK`.
pub struct Response {
    status: StatusCode,
    version: Version,
    headers: HeaderMap,
    body: String,
    keep_alive: bool,
}

impl Response {
    pub(crate) fn new(version: Version, keep_alive: bool) -> Self {
        Self {
            status: StatusCode::OK,
            version,
            headers: HeaderMap::new(),
            body: String::new(),
            keep_alive,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut String {
        &mut self.body
    }

    /// Sets a `text/plain` body with the given status.
    pub fn text(&mut self, status: StatusCode, body: impl Into<String>) {
        self.status = status;
        self.body = body.into();
        self.headers.insert(CONTENT_TYPE, HeaderValue::from_str(mime::TEXT_PLAIN.as_ref()).unwrap());
    }

    /// Sets an `application/json` body with the given status.
    pub fn json(&mut self, status: StatusCode, body: impl Into<String>) {
        self.status = status;
        self.body = body.into();
        self.headers.insert(CONTENT_TYPE, HeaderValue::from_str(mime::APPLICATION_JSON.as_ref()).unwrap());
    }

    /// Appends a `Set-Cookie` header for `cookie`.
    ///
    /// The header is only emitted when the cookie serializes non-empty, i.e.
    /// when its name is a valid HTTP token.
    pub fn set_cookie(&mut self, cookie: &Cookie) {
        let value = cookie.to_header_value();
        if value.is_empty() {
            return;
        }
        match HeaderValue::from_str(&value) {
            Ok(value) => {
                self.headers.append(SET_COOKIE, value);
            }
            Err(_) => warn!("serialized cookie is not a valid header value, skipped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response() -> Response {
        Response::new(Version::HTTP_11, true)
    }

    #[test]
    fn defaults() {
        let resp = response();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.body(), "");
        assert!(resp.keep_alive());
    }

    #[test]
    fn text_sets_status_body_and_content_type() {
        let mut resp = response();
        resp.text(StatusCode::OK, "Pong!");
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.body(), "Pong!");
        assert_eq!(resp.headers().get(CONTENT_TYPE).unwrap(), "text/plain");
    }

    #[test]
    fn json_sets_content_type() {
        let mut resp = response();
        resp.json(StatusCode::NOT_FOUND, r#"{"error":{"message":"Unknown resource"}}"#);
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(resp.headers().get(CONTENT_TYPE).unwrap(), "application/json");
    }

    #[test]
    fn set_cookie_appends_header() {
        let mut resp = response();
        resp.set_cookie(&Cookie::new("msg", "hello world"));
        resp.set_cookie(&Cookie::new("other", "1"));

        let values: Vec<_> = resp.headers().get_all(SET_COOKIE).iter().collect();
        assert_eq!(values.len(), 2);
        assert_eq!(values[0], "msg=hello%20world");
        assert_eq!(values[1], "other=1");
    }

    #[test]
    fn set_cookie_skips_invalid_names() {
        let mut resp = response();
        resp.set_cookie(&Cookie::new("a b", "value"));
        assert!(resp.headers().get(SET_COOKIE).is_none());
    }
}
