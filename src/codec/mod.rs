//! The HTTP/1.1 wire layer.
//!
//! Decoding is a two-phase state machine built on [`tokio_util::codec`]:
//! request heads are parsed with `httparse`, then the body is framed by a
//! payload decoder selected from the head (`Content-Length` or empty).
//! Encoding serializes a complete [`Response`](crate::Response) in one shot.
//!
//! Chunked request bodies are not supported by this library's request model
//! (a complete in-memory byte string) and are rejected at parse time.

mod error;
pub use error::ParseError;
pub use error::SendError;

mod message;
pub use message::Message;
pub use message::PayloadItem;
pub use message::PayloadSize;

mod request_head;
pub use request_head::RequestHeader;

mod header_decoder;
pub(crate) use header_decoder::HeaderDecoder;

mod body_decoder;
pub(crate) use body_decoder::PayloadDecoder;

mod request_decoder;
pub use request_decoder::RequestDecoder;

mod response_encoder;
pub use response_encoder::ResponseEncoder;
