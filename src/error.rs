//! Error types shared across the library
//!
//! Two error families matter to applications:
//!
//! - [`RouteError`]: registration-time failures raised by
//!   [`Router::add_route`](crate::router::Router::add_route) when a route
//!   template conflicts with an already registered one.
//! - [`HttpError`]: an application-level error carrying an HTTP status and an
//!   optional application error code. Returning one from a handler produces a
//!   response with that status and a JSON error body.

use http::StatusCode;
use thiserror::Error;

/// Boundary error type for user handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Route registration failure.
///
/// Registration is strict: any template that would make lookups ambiguous is
/// rejected instead of being resolved by precedence rules.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RouteError {
    /// Two handlers registered for the same terminus.
    #[error("a handler is already registered for path '{path}'")]
    HandlerExists { path: String },

    /// A wildcard segment with an empty name, or more than one wildcard in a
    /// single segment.
    #[error("invalid wildcard in path '{path}'")]
    InvalidWildcard { path: String },

    /// A wildcard inserted where plain children already exist.
    #[error("wildcard segment '{wildcard}' conflicts with existing children in path '{path}'")]
    WildcardChildConflict { wildcard: String, path: String },

    /// A plain segment inserted under an existing wildcard (or vice versa).
    #[error("'{segment}' in path '{path}' conflicts with existing wildcard '{wildcard}' in '{prefix}'")]
    WildcardConflict { segment: String, path: String, wildcard: String, prefix: String },

    /// A catch-all followed by more path segments.
    #[error("catch-all is only allowed at the end of the path in '{path}'")]
    CatchAllNotTerminal { path: String },

    /// A catch-all competing with a handler registered for the segment root,
    /// e.g. `/src/*fp` vs an existing `/src/`.
    #[error("catch-all conflicts with existing handle for path segment root in '{path}'")]
    CatchAllRootConflict { path: String },

    /// A catch-all not preceded by `/`.
    #[error("no / before catch-all in path '{path}'")]
    NoSlashBeforeCatchAll { path: String },
}

impl RouteError {
    pub(crate) fn handler_exists(path: impl Into<String>) -> Self {
        Self::HandlerExists { path: path.into() }
    }

    pub(crate) fn invalid_wildcard(path: impl Into<String>) -> Self {
        Self::InvalidWildcard { path: path.into() }
    }

    pub(crate) fn wildcard_child_conflict(wildcard: impl Into<String>, path: impl Into<String>) -> Self {
        Self::WildcardChildConflict { wildcard: wildcard.into(), path: path.into() }
    }

    pub(crate) fn wildcard_conflict(
        segment: impl Into<String>,
        path: impl Into<String>,
        wildcard: impl Into<String>,
        prefix: impl Into<String>,
    ) -> Self {
        Self::WildcardConflict {
            segment: segment.into(),
            path: path.into(),
            wildcard: wildcard.into(),
            prefix: prefix.into(),
        }
    }

    pub(crate) fn catch_all_not_terminal(path: impl Into<String>) -> Self {
        Self::CatchAllNotTerminal { path: path.into() }
    }

    pub(crate) fn catch_all_root_conflict(path: impl Into<String>) -> Self {
        Self::CatchAllRootConflict { path: path.into() }
    }

    pub(crate) fn no_slash_before_catch_all(path: impl Into<String>) -> Self {
        Self::NoSlashBeforeCatchAll { path: path.into() }
    }
}

/// An HTTP error with a status code and an optional application error code.
///
/// The serve loop turns these into responses with a JSON body of the shape
/// `{"error": {"message": <text>, "code": <int>}}` where `code` is emitted
/// only when present.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct HttpError {
    status: StatusCode,
    code: Option<i64>,
    message: String,
}

impl HttpError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, code: None, message: message.into() }
    }

    pub fn with_code(status: StatusCode, code: i64, message: impl Into<String>) -> Self {
        Self { status, code: Some(code), message: message.into() }
    }

    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    pub fn error_code(&self) -> Option<i64> {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Renders the error as a JSON error body into `resp`.
    pub(crate) fn render(&self, resp: &mut crate::response::Response) {
        let mut err = serde_json::json!({ "message": self.message });
        if let Some(code) = self.code {
            err["code"] = code.into();
        }
        let body = serde_json::json!({ "error": err });
        resp.json(self.status, body.to_string());
    }
}
