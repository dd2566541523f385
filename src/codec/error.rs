//! Wire-level error types.
//!
//! [`ParseError`] covers request decoding, [`SendError`] covers response
//! serialization and the write path. Both carry I/O sources where relevant so
//! the session layer can tell a protocol violation from a dropped peer.

use std::io;
use thiserror::Error;

/// Errors raised while parsing an HTTP request.
#[derive(Error, Debug)]
pub enum ParseError {
    /// Header section exceeds the maximum allowed size.
    #[error("header size too large, current: {current_size} exceeds the limit {max_size}")]
    TooLargeHeader { current_size: usize, max_size: usize },

    /// Number of headers exceeds the maximum allowed.
    #[error("header number exceeds the limit {max_num}")]
    TooManyHeaders { max_num: usize },

    /// Invalid header format or content.
    #[error("invalid header: {reason}")]
    InvalidHeader { reason: String },

    /// Unsupported HTTP version.
    #[error("invalid http version: {0:?}")]
    InvalidVersion(Option<u8>),

    /// Invalid or unsupported HTTP method.
    #[error("invalid http method")]
    InvalidMethod,

    /// Invalid URI format.
    #[error("invalid http uri")]
    InvalidUri,

    /// Invalid Content-Length header.
    #[error("invalid content-length header: {reason}")]
    InvalidContentLength { reason: String },

    /// A request body framing this library does not accept.
    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    /// I/O error while reading.
    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ParseError {
    pub(crate) fn too_large_header(current_size: usize, max_size: usize) -> Self {
        Self::TooLargeHeader { current_size, max_size }
    }

    pub(crate) fn too_many_headers(max_num: usize) -> Self {
        Self::TooManyHeaders { max_num }
    }

    pub(crate) fn invalid_header<S: ToString>(reason: S) -> Self {
        Self::InvalidHeader { reason: reason.to_string() }
    }

    pub(crate) fn invalid_content_length<S: ToString>(reason: S) -> Self {
        Self::InvalidContentLength { reason: reason.to_string() }
    }

    pub(crate) fn invalid_body<S: ToString>(reason: S) -> Self {
        Self::InvalidBody { reason: reason.to_string() }
    }

    pub(crate) fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}

/// Errors raised while serializing or writing an HTTP response.
#[derive(Error, Debug)]
pub enum SendError {
    /// The response carries a version the serializer cannot emit.
    #[error("unsupported http version: {version:?}")]
    UnsupportedVersion { version: http::Version },

    /// I/O error while writing.
    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl SendError {
    pub(crate) fn unsupported_version(version: http::Version) -> Self {
        Self::UnsupportedVersion { version }
    }

    pub(crate) fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}
