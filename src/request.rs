//! The request model handed to middlewares and handlers.
//!
//! A [`Request`] is built once per wire-level request from the parsed head and
//! the collected body. Construction percent-decodes the path; an invalid path
//! fails with a `400`-status [`HttpError`]. A malformed query string is
//! discarded (with a warning) while the request itself stays valid, and
//! [`Request::target`] then reconstructs a query-less target.

use std::sync::OnceLock;

use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode, Version};
use tracing::warn;

use crate::codec::RequestHeader;
use crate::cookie::CookieJar;
use crate::error::HttpError;
use crate::params::{PathParams, QueryParams};
use crate::percent;

#[derive(Debug)]
pub struct Request {
    head: RequestHeader,
    body: Bytes,
    /// Percent-decoded.
    path: String,
    /// Raw path plus the query string, unless the query was discarded.
    target: String,
    queries: QueryParams,
    params: PathParams,
    cookies: OnceLock<CookieJar>,
}

impl Request {
    /// Builds a request from a parsed head and its body.
    ///
    /// Fails with a `400 Bad Request` error when the path part of the target
    /// does not percent-decode.
    pub(crate) fn from_wire(head: RequestHeader, body: Bytes) -> Result<Self, HttpError> {
        let target = head.target();
        let (raw_path, raw_query) = match target.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (target.as_str(), None),
        };

        let path = percent::decode(raw_path)
            .map_err(|_| HttpError::new(StatusCode::BAD_REQUEST, "invalid url path"))?;

        // Discard the whole query string if it is malformed.
        let (queries, target) = match raw_query {
            Some(raw) => match QueryParams::parse(raw) {
                Some(queries) => (queries, format!("{raw_path}?{raw}")),
                None => {
                    warn!("malformed query string discarded");
                    (QueryParams::new(), raw_path.to_string())
                }
            },
            None => (QueryParams::new(), raw_path.to_string()),
        };

        Ok(Self {
            head,
            body,
            path,
            target,
            queries,
            params: PathParams::new(),
            cookies: OnceLock::new(),
        })
    }

    pub fn method(&self) -> &Method {
        self.head.method()
    }

    pub fn version(&self) -> Version {
        self.head.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.head.headers()
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        self.head.headers_mut()
    }

    /// The percent-decoded path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The request target. Differs from the raw wire target only when a
    /// malformed query string was discarded.
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn params(&self) -> &PathParams {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut PathParams {
        &mut self.params
    }

    /// Splits the request into the lookup path and the parameter sink used by
    /// route resolution.
    pub(crate) fn locate_parts(&mut self) -> (&str, &mut PathParams) {
        (&self.path, &mut self.params)
    }

    pub fn queries(&self) -> &QueryParams {
        &self.queries
    }

    pub fn queries_mut(&mut self) -> &mut QueryParams {
        &mut self.queries
    }

    /// Request cookies, parsed from the `Cookie` headers on first access.
    pub fn cookies(&self) -> &CookieJar {
        self.cookies.get_or_init(|| CookieJar::parse(self.head.headers()))
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }
}
