//! The request decoder.
//!
//! Coordinates head parsing and payload framing through a two-phase state
//! machine: while `payload_decoder` is `None` the decoder is parsing a head;
//! afterwards it frames the body until `Eof`, then resets for the next
//! request on the connection.

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use crate::codec::{HeaderDecoder, Message, ParseError, PayloadDecoder, PayloadItem, PayloadSize, RequestHeader};

pub struct RequestDecoder {
    header_decoder: HeaderDecoder,
    payload_decoder: Option<PayloadDecoder>,
}

impl RequestDecoder {
    pub fn new() -> Self {
        Default::default()
    }
}

impl Default for RequestDecoder {
    fn default() -> Self {
        Self { header_decoder: HeaderDecoder, payload_decoder: None }
    }
}

impl Decoder for RequestDecoder {
    type Item = Message<(RequestHeader, PayloadSize)>;
    type Error = ParseError;

    /// Returns the next decoded item, or `None` when more data is needed.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // Payload phase.
        if let Some(payload_decoder) = &mut self.payload_decoder {
            let message = match payload_decoder.decode(src)? {
                Some(item @ PayloadItem::Chunk(_)) => Some(Message::Payload(item)),
                Some(item @ PayloadItem::Eof) => {
                    // This request's payload is finished.
                    self.payload_decoder.take();
                    Some(Message::Payload(item))
                }
                None => None,
            };

            return Ok(message);
        }

        // Head phase.
        let message = match self.header_decoder.decode(src)? {
            Some((header, payload_size)) => {
                self.payload_decoder = Some(payload_size.into());
                Some(Message::Header((header, payload_size)))
            }
            None => None,
        };

        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn head_then_payload_then_reset() {
        let str = indoc! {"
        POST /upload HTTP/1.1\r
        Content-Length: 5\r
        \r
        helloGET /next HTTP/1.1\r
        \r
        "};

        let mut buf = BytesMut::from(str);
        let mut decoder = RequestDecoder::new();

        let (header, payload_size) = match decoder.decode(&mut buf).unwrap().unwrap() {
            Message::Header(head) => head,
            Message::Payload(_) => panic!("expected a request head"),
        };
        assert_eq!(header.uri().path(), "/upload");
        assert_eq!(payload_size, PayloadSize::Length(5));

        let chunk = match decoder.decode(&mut buf).unwrap().unwrap() {
            Message::Payload(PayloadItem::Chunk(chunk)) => chunk,
            _ => panic!("expected a payload chunk"),
        };
        assert_eq!(&chunk[..], b"hello");

        assert!(matches!(decoder.decode(&mut buf).unwrap().unwrap(), Message::Payload(PayloadItem::Eof)));

        // pipelined next request decodes from the leftover
        let (header, payload_size) = match decoder.decode(&mut buf).unwrap().unwrap() {
            Message::Header(head) => head,
            Message::Payload(_) => panic!("expected a request head"),
        };
        assert_eq!(header.uri().path(), "/next");
        assert!(payload_size.is_empty());
        assert!(matches!(decoder.decode(&mut buf).unwrap().unwrap(), Message::Payload(PayloadItem::Eof)));
    }

    #[test]
    fn bodyless_request_still_emits_eof() {
        let mut buf = BytesMut::from("GET /ping HTTP/1.1\r\n\r\n");
        let mut decoder = RequestDecoder::new();

        assert!(matches!(decoder.decode(&mut buf).unwrap().unwrap(), Message::Header(_)));
        assert!(matches!(decoder.decode(&mut buf).unwrap().unwrap(), Message::Payload(PayloadItem::Eof)));
        assert!(decoder.decode(&mut buf).unwrap().is_none());
    }
}
