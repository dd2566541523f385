use std::str::FromStr;

use bytes::{Buf, BytesMut};
use http::header::{CONTENT_LENGTH, TRANSFER_ENCODING};
use http::{HeaderName, HeaderValue, Method, Request, Uri, Version};
use httparse::Status;
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::codec::{ParseError, PayloadSize, RequestHeader};

const MAX_HEADER_NUM: usize = 64;
const MAX_HEADER_BYTES: usize = 8 * 1024;

pub(crate) struct HeaderDecoder;

impl Decoder for HeaderDecoder {
    type Item = (RequestHeader, PayloadSize);
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADER_NUM];
        let mut parsed = httparse::Request::new(&mut headers);

        let status = parsed.parse(src).map_err(|e| match e {
            httparse::Error::TooManyHeaders => ParseError::too_many_headers(MAX_HEADER_NUM),
            e => ParseError::invalid_header(e.to_string()),
        })?;

        match status {
            Status::Complete(head_end) => {
                trace!(head_size = head_end, "parsed request head");
                if head_end > MAX_HEADER_BYTES {
                    return Err(ParseError::too_large_header(head_end, MAX_HEADER_BYTES));
                }

                let version = match parsed.version {
                    Some(0) => Version::HTTP_10,
                    Some(1) => Version::HTTP_11,
                    // http2/3 are out of scope
                    version => return Err(ParseError::InvalidVersion(version)),
                };

                let method = parsed
                    .method
                    .and_then(|m| Method::from_str(m).ok())
                    .ok_or(ParseError::InvalidMethod)?;

                let uri = parsed
                    .path
                    .and_then(|p| Uri::from_str(p).ok())
                    .ok_or(ParseError::InvalidUri)?;

                let mut builder = Request::builder().method(method).uri(uri).version(version);

                let header_map = builder.headers_mut().unwrap();
                header_map.reserve(parsed.headers.len());
                for header in parsed.headers.iter() {
                    let name = HeaderName::from_str(header.name)
                        .map_err(|e| ParseError::invalid_header(e.to_string()))?;
                    let value = HeaderValue::from_bytes(header.value)
                        .map_err(|e| ParseError::invalid_header(e.to_string()))?;
                    header_map.append(name, value);
                }

                let header = RequestHeader::from(builder.body(()).unwrap());
                let payload_size = parse_payload_size(&header)?;

                src.advance(head_end);
                Ok(Some((header, payload_size)))
            }
            Status::Partial => {
                if src.len() > MAX_HEADER_BYTES {
                    return Err(ParseError::too_large_header(src.len(), MAX_HEADER_BYTES));
                }
                Ok(None)
            }
        }
    }
}

// Refer: https://www.rfc-editor.org/rfc/rfc7230#section-3.3
fn parse_payload_size(header: &RequestHeader) -> Result<PayloadSize, ParseError> {
    let te_header = header.headers().get(TRANSFER_ENCODING);
    let cl_header = header.headers().get(CONTENT_LENGTH);

    match (te_header, cl_header) {
        (None, None) => Ok(PayloadSize::Empty),

        (te_value @ Some(_), None) => {
            if is_chunked(te_value) {
                Err(ParseError::invalid_body("chunked request bodies are not supported"))
            } else {
                Ok(PayloadSize::Empty)
            }
        }

        (None, Some(cl_value)) => {
            let cl_str = cl_value
                .to_str()
                .map_err(|_| ParseError::invalid_content_length("value is not visible ascii"))?;

            let length = cl_str
                .trim()
                .parse::<u64>()
                .map_err(|_| ParseError::invalid_content_length(format!("value {cl_str} is not u64")))?;

            if length == 0 {
                Ok(PayloadSize::Empty)
            } else {
                Ok(PayloadSize::Length(length))
            }
        }

        (Some(_), Some(_)) => {
            Err(ParseError::invalid_content_length("transfer_encoding and content_length both present in headers"))
        }
    }
}

fn is_chunked(header_value: Option<&HeaderValue>) -> bool {
    header_value
        .and_then(|value| value.to_str().ok())
        .and_then(|encodings| encodings.rsplit(',').next())
        .map(|last_encoding| last_encoding.trim() == "chunked")
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderMap;
    use indoc::indoc;

    fn decode(input: &str) -> Result<Option<(RequestHeader, PayloadSize)>, ParseError> {
        let mut buf = BytesMut::from(input);
        HeaderDecoder.decode(&mut buf)
    }

    #[test]
    fn check_is_chunked() {
        {
            let headers = HeaderMap::new();
            assert!(!is_chunked(headers.get(TRANSFER_ENCODING)));
        }

        {
            let mut headers = HeaderMap::new();
            headers.insert("Transfer-Encoding", "gzip, chunked".parse().unwrap());
            assert!(is_chunked(headers.get(TRANSFER_ENCODING)));
        }

        {
            let mut headers = HeaderMap::new();
            headers.insert("Transfer-Encoding", "chunked, gzip".parse().unwrap());
            assert!(!is_chunked(headers.get(TRANSFER_ENCODING)));
        }
    }

    #[test]
    fn from_curl() {
        let str = indoc! {"
        GET /index.html HTTP/1.1\r
        Host: 127.0.0.1:8080\r
        User-Agent: curl/7.79.1\r
        Accept: */*\r
        \r
        "};

        let (header, payload_size) = decode(str).unwrap().unwrap();

        assert!(payload_size.is_empty());
        assert_eq!(header.method(), &Method::GET);
        assert_eq!(header.version(), Version::HTTP_11);
        assert_eq!(header.uri().path(), "/index.html");
        assert_eq!(header.uri().query(), None);
        assert_eq!(header.headers().len(), 3);
        assert_eq!(header.headers().get(http::header::HOST).unwrap(), "127.0.0.1:8080");
        assert_eq!(header.headers().get(http::header::USER_AGENT).unwrap(), "curl/7.79.1");
        assert_eq!(header.headers().get(http::header::ACCEPT).unwrap(), "*/*");
    }

    #[test]
    fn consumes_exactly_the_head() {
        let str = indoc! {"
        POST /upload HTTP/1.1\r
        Host: 127.0.0.1:8080\r
        Content-Length: 3\r
        \r
        123"};

        let mut buf = BytesMut::from(str);
        let (header, payload_size) = HeaderDecoder.decode(&mut buf).unwrap().unwrap();

        assert_eq!(payload_size, PayloadSize::Length(3));
        assert_eq!(header.method(), &Method::POST);
        assert_eq!(&buf[..], b"123");
    }

    #[test]
    fn partial_head_needs_more_data() {
        let result = decode("GET /index.html HTTP/1.1\r\nHost: 127.0").unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn query_string_is_preserved() {
        let str = indoc! {"
        GET /index/?a=1&b=2&a=3 HTTP/1.1\r
        Host: 127.0.0.1:8080\r
        Connection: keep-alive\r
        \r
        "};

        let (header, _) = decode(str).unwrap().unwrap();
        assert_eq!(header.uri().path(), "/index/");
        assert_eq!(header.uri().query(), Some("a=1&b=2&a=3"));
        assert!(header.keep_alive());
    }

    #[test]
    fn rejects_chunked_bodies() {
        let str = indoc! {"
        POST /upload HTTP/1.1\r
        Transfer-Encoding: chunked\r
        \r
        "};

        assert!(matches!(decode(str), Err(ParseError::InvalidBody { .. })));
    }

    #[test]
    fn rejects_conflicting_framing_headers() {
        let str = indoc! {"
        POST /upload HTTP/1.1\r
        Transfer-Encoding: chunked\r
        Content-Length: 5\r
        \r
        "};

        assert!(matches!(decode(str), Err(ParseError::InvalidContentLength { .. })));
    }

    #[test]
    fn rejects_unsupported_version() {
        assert!(matches!(
            decode("GET /index.html HTTP/0.9\r\n\r\n"),
            Err(ParseError::InvalidHeader { .. }) | Err(ParseError::InvalidVersion(_))
        ));
    }
}
