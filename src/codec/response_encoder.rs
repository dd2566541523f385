//! The response serializer.
//!
//! Serializes a complete [`Response`] in one shot: status line, headers, then
//! the body. The encoder owns the framing headers: it installs `Server` when
//! the handler did not set one, always writes `Content-Length` from the
//! actual body, and emits the `Connection` header according to the response's
//! keep-alive flag and HTTP version.

use bytes::{BufMut, BytesMut};
use http::header::{CONNECTION, CONTENT_LENGTH, SERVER};
use http::Version;
use tokio_util::codec::Encoder;
use tracing::error;

use crate::codec::SendError;
use crate::response::Response;

const INIT_HEADER_SIZE: usize = 4 * 1024;

pub(crate) const SERVER_NAME: &str = concat!("wicket/", env!("CARGO_PKG_VERSION"));

pub struct ResponseEncoder;

impl Encoder<Response> for ResponseEncoder {
    type Error = SendError;

    fn encode(&mut self, resp: Response, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(INIT_HEADER_SIZE + resp.body().len());

        match resp.version() {
            Version::HTTP_11 => dst.put_slice(b"HTTP/1.1 "),
            Version::HTTP_10 => dst.put_slice(b"HTTP/1.0 "),
            version => {
                error!(?version, "unsupported http version");
                return Err(SendError::unsupported_version(version));
            }
        }
        dst.put_slice(resp.status().as_str().as_bytes());
        dst.put_slice(b" ");
        dst.put_slice(resp.status().canonical_reason().unwrap_or("Unknown").as_bytes());
        dst.put_slice(b"\r\n");

        // Handler-set headers, minus the framing ones the encoder owns.
        for (name, value) in resp.headers() {
            if *name == CONTENT_LENGTH || *name == CONNECTION {
                continue;
            }
            dst.put_slice(name.as_ref());
            dst.put_slice(b": ");
            dst.put_slice(value.as_ref());
            dst.put_slice(b"\r\n");
        }

        if !resp.headers().contains_key(SERVER) {
            dst.put_slice(b"server: ");
            dst.put_slice(SERVER_NAME.as_bytes());
            dst.put_slice(b"\r\n");
        }

        dst.put_slice(b"content-length: ");
        dst.put_slice(resp.body().len().to_string().as_bytes());
        dst.put_slice(b"\r\n");

        match (resp.version(), resp.keep_alive()) {
            (Version::HTTP_11, false) => dst.put_slice(b"connection: close\r\n"),
            (Version::HTTP_10, true) => dst.put_slice(b"connection: keep-alive\r\n"),
            _ => {}
        }

        dst.put_slice(b"\r\n");
        dst.put_slice(resp.body().as_bytes());
        Ok(())
    }
}
