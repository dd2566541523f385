//! Per-connection request/response handling.
//!
//! [`HttpConnection`] drives one TCP connection through its keep-alive
//! lifetime: idle wait, head parse, optional `100 Continue`, body read,
//! dispatch, write, then either the next iteration or close.
//!
//! Three deadlines guard each iteration:
//!
//! - the *idle* timer covers the wait for the first bytes of a request;
//! - the *read* deadline (`effective_read_timeout` past the first byte)
//!   covers the header and body parse;
//! - the *serve* deadline (`serve_timeout` past the first byte) covers
//!   dispatch and the response write, so time spent reading is subtracted
//!   from the serve budget.
//!
//! The shutdown token is observed while idle and between iterations; a
//! request already in flight completes its write before the session exits.

use std::io;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use http::StatusCode;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::Instant;
use tokio_util::codec::{Decoder, Encoder};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::codec::{
    Message, ParseError, PayloadItem, PayloadSize, RequestDecoder, RequestHeader, ResponseEncoder, SendError,
};
use crate::error::HttpError;
use crate::middleware::Decision;
use crate::request::Request;
use crate::response::Response;
use crate::router::Router;
use crate::server::ServerOptions;

const INITIAL_READ_SIZE: usize = 512;
const READ_CHUNK_SIZE: usize = 8 * 1024;

const CONTINUE_RESPONSE: &[u8] = b"HTTP/1.1 100 Continue\r\n\r\n";

/// A session-terminating error.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("request error: {source}")]
    Parse {
        #[from]
        source: ParseError,
    },

    #[error("response error: {source}")]
    Send {
        #[from]
        source: SendError,
    },

    #[error("connection idled out")]
    IdleTimeout,

    #[error("request read timed out")]
    ReadTimeout,

    #[error("request serve timed out")]
    ServeTimeout,
}

impl SessionError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::IdleTimeout | Self::ReadTimeout | Self::ServeTimeout)
    }

    /// True when the peer simply went away: end-of-stream, reset, or a broken
    /// pipe. These end the session silently.
    pub fn is_disconnect(&self) -> bool {
        let io_kind = match self {
            Self::Parse { source: ParseError::Io { source } } => source.kind(),
            Self::Send { source: SendError::Io { source } } => source.kind(),
            _ => return false,
        };
        matches!(
            io_kind,
            io::ErrorKind::UnexpectedEof | io::ErrorKind::ConnectionReset | io::ErrorKind::BrokenPipe
        )
    }
}

/// An HTTP connection being served.
pub struct HttpConnection<R, W> {
    reader: R,
    writer: W,
    buffer: BytesMut,
    decoder: RequestDecoder,
    encoder: ResponseEncoder,
}

impl<R, W> HttpConnection<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            buffer: BytesMut::with_capacity(INITIAL_READ_SIZE),
            decoder: RequestDecoder::new(),
            encoder: ResponseEncoder,
        }
    }

    /// Serves requests on this connection until it closes, times out, or the
    /// shutdown token fires.
    pub async fn serve(
        mut self,
        router: &Router,
        opts: &ServerOptions,
        shutdown: &CancellationToken,
    ) -> Result<(), SessionError> {
        let read_timeout = opts.effective_read_timeout();

        loop {
            // Idle phase: wait for the first bytes of the next request. Data
            // may already be buffered when requests arrive back to back.
            if self.buffer.is_empty() {
                let idle_deadline = deadline_after(opts.idle_timeout);
                self.buffer.reserve(INITIAL_READ_SIZE);
                let reader = &mut self.reader;
                let buffer = &mut self.buffer;
                let read = tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => return Ok(()),
                    read = timed(idle_deadline, SessionError::IdleTimeout, read_some(reader, buffer)) => read?,
                };
                if read == 0 {
                    // Peer closed while idle.
                    break;
                }
            } else if shutdown.is_cancelled() {
                break;
            }

            let read_start = Instant::now();
            let read_deadline = deadline_from(read_start, read_timeout);

            let (header, body) = match self.read_request(read_deadline).await {
                Ok(parts) => parts,
                Err(err) => {
                    if matches!(err, SessionError::Parse { .. }) && !err.is_disconnect() {
                        self.send_error_response(StatusCode::BAD_REQUEST, "bad request").await.ok();
                    }
                    return Err(err);
                }
            };

            // The serve budget starts at the first byte: time already spent
            // reading counts against it.
            let serve_deadline = deadline_from(read_start, opts.serve_timeout);

            let response = timed(serve_deadline, SessionError::ServeTimeout, async {
                Ok(handle_request(router, header, body).await)
            })
            .await?;
            let keep_alive = response.keep_alive();

            let mut wire = BytesMut::new();
            self.encoder.encode(response, &mut wire)?;
            let writer = &mut self.writer;
            timed(serve_deadline, SessionError::ServeTimeout, async move {
                writer.write_all(&wire).await.map_err(SendError::io)?;
                writer.flush().await.map_err(SendError::io)?;
                Ok(())
            })
            .await?;

            if !keep_alive || shutdown.is_cancelled() {
                break;
            }
        }

        // Half-close the send side; the peer observes EOF after the last
        // response.
        let _ = self.writer.shutdown().await;
        debug!("connection closed");
        Ok(())
    }

    /// Reads one request: head, optional interim response, then the body.
    async fn read_request(
        &mut self,
        read_deadline: Option<Instant>,
    ) -> Result<(RequestHeader, Bytes), SessionError> {
        let (header, payload_size) = loop {
            if let Some(message) = self.decoder.decode(&mut self.buffer)? {
                match message {
                    Message::Header(head) => break head,
                    Message::Payload(_) => {
                        return Err(ParseError::invalid_body("unexpected payload while expecting a request head").into())
                    }
                }
            }
            self.read_more(read_deadline).await?;
        };

        // Send the interim response before consuming the body.
        if header.expects_continue() {
            self.writer.write_all(CONTINUE_RESPONSE).await.map_err(SendError::io)?;
            self.writer.flush().await.map_err(SendError::io)?;
            info!("received expect request header, sent 100 Continue interim response");
        }

        let mut body = BytesMut::new();
        if let PayloadSize::Length(length) = payload_size {
            body.reserve(length as usize);
        }
        loop {
            match self.decoder.decode(&mut self.buffer)? {
                Some(Message::Payload(PayloadItem::Chunk(chunk))) => body.extend_from_slice(&chunk),
                Some(Message::Payload(PayloadItem::Eof)) => break,
                Some(Message::Header(_)) => {
                    return Err(ParseError::invalid_body("unexpected head while reading a request body").into())
                }
                None => self.read_more(read_deadline).await?,
            }
        }

        Ok((header, body.freeze()))
    }

    async fn read_more(&mut self, deadline: Option<Instant>) -> Result<(), SessionError> {
        self.buffer.reserve(READ_CHUNK_SIZE);
        let reader = &mut self.reader;
        let buffer = &mut self.buffer;
        let read = timed(deadline, SessionError::ReadTimeout, read_some(reader, buffer)).await?;
        if read == 0 {
            return Err(ParseError::io(io::Error::from(io::ErrorKind::UnexpectedEof)).into());
        }
        Ok(())
    }

    async fn send_error_response(&mut self, status: StatusCode, message: &str) -> Result<(), SessionError> {
        let mut resp = Response::new(http::Version::HTTP_11, false);
        let body = serde_json::json!({ "error": { "message": message } });
        resp.json(status, body.to_string());

        let mut wire = BytesMut::new();
        self.encoder.encode(resp, &mut wire)?;
        self.writer.write_all(&wire).await.map_err(SendError::io)?;
        self.writer.flush().await.map_err(SendError::io)?;
        Ok(())
    }
}

async fn read_some<R: AsyncRead + Unpin>(reader: &mut R, buffer: &mut BytesMut) -> Result<usize, SessionError> {
    let read = reader.read_buf(buffer).await.map_err(ParseError::io)?;
    Ok(read)
}

fn deadline_after(timeout: Duration) -> Option<Instant> {
    (timeout > Duration::ZERO).then(|| Instant::now() + timeout)
}

fn deadline_from(start: Instant, timeout: Duration) -> Option<Instant> {
    (timeout > Duration::ZERO).then(|| start + timeout)
}

async fn timed<T, F>(deadline: Option<Instant>, timeout_error: SessionError, fut: F) -> Result<T, SessionError>
where
    F: std::future::Future<Output = Result<T, SessionError>>,
{
    match deadline {
        Some(deadline) => match tokio::time::timeout_at(deadline, fut).await {
            Ok(result) => result,
            Err(_) => Err(timeout_error),
        },
        None => fut.await,
    }
}

/// Dispatches one parsed request through the router and middleware stack,
/// producing the response to serialize.
pub(crate) async fn handle_request(router: &Router, header: RequestHeader, body: Bytes) -> Response {
    let version = header.version();
    let keep_alive = header.keep_alive();
    let mut resp = Response::new(version, keep_alive);

    let mut req = match Request::from_wire(header, body) {
        Ok(req) => req,
        Err(err) => {
            err.render(&mut resp);
            return resp;
        }
    };

    // Locating the route binds path params into the request; middlewares may
    // rely on them.
    let method = req.method().clone();
    let (path, params) = req.locate_parts();
    let handler = router.locate_route(&method, path, params);

    if router.run_pre_handle(&mut req, &mut resp).await == Decision::Abort {
        return resp;
    }

    // An unknown resource is not an error; router-level middlewares still
    // observe the response.
    let Some(handler) = handler else {
        let err = HttpError::new(StatusCode::NOT_FOUND, "Unknown resource");
        err.render(&mut resp);
        let _ = router.run_post_handle(&mut req, &mut resp).await;
        return resp;
    };

    // Only an abort from the per-route post-phase gates the router-level
    // post-phase; see `RouteHandler::call`.
    if handler.call(&mut req, &mut resp).await == Decision::Abort {
        return resp;
    }

    let _ = router.run_post_handle(&mut req, &mut resp).await;
    resp
}
