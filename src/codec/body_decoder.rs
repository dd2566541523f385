//! Payload framing for request bodies.
//!
//! The decoder variant is selected from the request head: a `Content-Length`
//! body or no body at all. Both produce a stream of [`PayloadItem`]s that is
//! always terminated by [`PayloadItem::Eof`].

use std::cmp;

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use crate::codec::{ParseError, PayloadItem, PayloadSize};

pub(crate) enum PayloadDecoder {
    Empty,
    Length(LengthDecoder),
}

impl PayloadDecoder {
    pub(crate) fn empty() -> Self {
        Self::Empty
    }

    pub(crate) fn fix_length(length: u64) -> Self {
        Self::Length(LengthDecoder::new(length))
    }
}

impl From<PayloadSize> for PayloadDecoder {
    fn from(size: PayloadSize) -> Self {
        match size {
            PayloadSize::Length(length) => Self::fix_length(length),
            PayloadSize::Empty => Self::empty(),
        }
    }
}

impl Decoder for PayloadDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self {
            Self::Empty => Ok(Some(PayloadItem::Eof)),
            Self::Length(decoder) => decoder.decode(src),
        }
    }
}

/// Frames a payload whose size is fixed by the `Content-Length` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LengthDecoder {
    /// Bytes remaining to be read.
    length: u64,
}

impl LengthDecoder {
    fn new(length: u64) -> Self {
        Self { length }
    }
}

impl Decoder for LengthDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.length == 0 {
            return Ok(Some(PayloadItem::Eof));
        }

        if src.is_empty() {
            return Ok(None);
        }

        let len = cmp::min(self.length, src.len() as u64);
        let bytes = src.split_to(len as usize).freeze();

        self.length -= bytes.len() as u64;
        Ok(Some(PayloadItem::Chunk(bytes)))
    }
}
