use bytes::{Buf, BufMut, Bytes, BytesMut};
use http::{HeaderMap, Method, StatusCode};

use crate::error::FrameError;
use crate::frame::head::{parse_padding, Head, Kind, StreamId, HEADER_LEN};

const END_STREAM: u8 = 0x1;
const END_HEADERS: u8 = 0x4;
const PADDED: u8 = 0x8;
const PRIORITY: u8 = 0x20;

/// The four request pseudo-headers plus `:status` for responses
/// (spec.md §3). Exactly one occurrence of each is allowed; for requests
/// they must appear before any regular header in the block.
#[derive(Debug, Default, Clone)]
pub struct Pseudo {
    pub method: Option<Method>,
    pub scheme: Option<String>,
    pub authority: Option<String>,
    pub path: Option<String>,
    pub status: Option<StatusCode>,
}

impl Pseudo {
    pub fn response(status: StatusCode) -> Pseudo {
        Pseudo {
            status: Some(status),
            ..Pseudo::default()
        }
    }
}

/// A decoded HEADERS frame: request (or response) line plus regular
/// headers. By the time this type exists, the header block fragment has
/// already been fully HPACK-decoded -- `CONTINUATION` assembly happens one
/// layer down, in `codec::framed_read`.
#[derive(Debug, Clone)]
pub struct Headers {
    stream_id: StreamId,
    pseudo: Pseudo,
    fields: HeaderMap,
    end_stream: bool,
}

/// Raw, not-yet-HPACK-decoded HEADERS frame head. Carries the stream id
/// and flags needed before the header block bytes (possibly spread
/// across CONTINUATION frames) are fully assembled.
#[derive(Debug, Clone, Copy)]
pub struct HeadersHead {
    stream_id: StreamId,
    end_stream: bool,
    end_headers: bool,
}

impl HeadersHead {
    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    pub fn is_end_stream(&self) -> bool {
        self.end_stream
    }

    pub fn end_headers(&self) -> bool {
        self.end_headers
    }

    pub fn into_headers(self, pseudo: Pseudo, fields: HeaderMap) -> Headers {
        Headers {
            stream_id: self.stream_id,
            pseudo,
            fields,
            end_stream: self.end_stream,
        }
    }
}

impl Headers {
    pub fn new(stream_id: StreamId, pseudo: Pseudo, fields: HeaderMap, end_stream: bool) -> Self {
        Headers {
            stream_id,
            pseudo,
            fields,
            end_stream,
        }
    }

    /// Strips the frame header, PAD length, and (if present) the 5-byte
    /// stream-dependency/weight fields. Scheduling on that dependency is a
    /// non-goal, but the bytes must still be skipped to find the header
    /// block fragment.
    ///
    /// Returns the parsed `HeadersHead` plus the remaining header-block
    /// fragment bytes belonging to *this* frame.
    pub fn parse_head(head: Head, payload: Bytes) -> Result<(HeadersHead, Bytes), FrameError> {
        if head.stream_id().is_zero() {
            return Err(FrameError::InvalidStreamId);
        }

        let padded = head.flag() & PADDED == PADDED;
        let (_, mut payload) = parse_padding(padded, payload)?;

        if head.flag() & PRIORITY == PRIORITY {
            if payload.len() < 5 {
                return Err(FrameError::PayloadTooShort);
            }
            let mut dep_buf = payload.clone();
            let raw = dep_buf.get_u32();
            let dependency = StreamId::new(raw);
            if dependency == head.stream_id() {
                return Err(FrameError::SelfDependency);
            }
            payload = payload.split_off(5);
        }

        Ok((
            HeadersHead {
                stream_id: head.stream_id(),
                end_stream: head.flag() & END_STREAM == END_STREAM,
                end_headers: head.flag() & END_HEADERS == END_HEADERS,
            },
            payload,
        ))
    }

    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    pub fn is_end_stream(&self) -> bool {
        self.end_stream
    }

    pub fn pseudo(&self) -> &Pseudo {
        &self.pseudo
    }

    pub fn fields(&self) -> &HeaderMap {
        &self.fields
    }

    pub fn into_parts(self) -> (Pseudo, HeaderMap) {
        (self.pseudo, self.fields)
    }

    /// Writes the frame head with a placeholder length and `END_HEADERS`
    /// set; the caller patches the length in once the HPACK-encoded body
    /// has been appended, and clears `END_HEADERS` via `patch_end_headers`
    /// if the block turned out to need CONTINUATION frames (mirrors
    /// `carllerche-h2`'s two-pass `Headers::encode`).
    pub fn encode_head(&self, dst: &mut BytesMut) -> usize {
        let flag = if self.end_stream {
            END_STREAM | END_HEADERS
        } else {
            END_HEADERS
        };
        let head = Head::new(Kind::Headers, flag, self.stream_id);
        let pos = dst.len();
        head.encode(0, dst);
        pos
    }

    pub fn patch_length(dst: &mut BytesMut, pos: usize) {
        let len = dst.len() - pos - HEADER_LEN;
        let len_bytes = (len as u32).to_be_bytes();
        dst[pos..pos + 3].copy_from_slice(&len_bytes[1..]);
    }

    /// Clears the `END_HEADERS` flag `encode_head` set optimistically, once
    /// the caller has determined the header block doesn't fit in one frame
    /// and CONTINUATION frames will follow. The flag byte is the 5th byte
    /// of the frame header (`frame::Head::encode`'s layout).
    pub fn patch_end_headers(dst: &mut BytesMut, pos: usize) {
        dst[pos + 4] &= !END_HEADERS;
    }
}

/// PUSH_PROMISE is parsed (server push is a non-goal, spec.md §2) solely so
/// a peer that sends one gets a well-formed PROTOCOL_ERROR instead of the
/// connection wedging on an unrecognized frame.
#[derive(Debug, Clone)]
pub struct PushPromise {
    stream_id: StreamId,
    promised_id: StreamId,
}

impl PushPromise {
    pub fn parse_head(head: Head, payload: Bytes) -> Result<(PushPromise, Bytes), FrameError> {
        if head.stream_id().is_zero() {
            return Err(FrameError::InvalidStreamId);
        }

        let padded = head.flag() & PADDED == PADDED;
        let (_, mut payload) = parse_padding(padded, payload)?;

        if payload.len() < 4 {
            return Err(FrameError::PayloadTooShort);
        }
        let mut buf = payload.clone();
        let promised_id = StreamId::new(buf.get_u32());
        payload = payload.split_off(4);

        Ok((
            PushPromise {
                stream_id: head.stream_id(),
                promised_id,
            },
            payload,
        ))
    }

    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    pub fn promised_id(&self) -> StreamId {
        self.promised_id
    }
}

/// CONTINUATION carries header block fragments that didn't fit in the
/// preceding HEADERS/PUSH_PROMISE/CONTINUATION frame. No flags besides
/// `END_HEADERS` are defined (spec.md §4.3).
#[derive(Debug, Clone)]
pub struct Continuation {
    stream_id: StreamId,
    end_headers: bool,
}

impl Continuation {
    pub fn load(head: Head, payload: Bytes) -> Result<(Continuation, Bytes), FrameError> {
        if head.stream_id().is_zero() {
            return Err(FrameError::InvalidStreamId);
        }

        Ok((
            Continuation {
                stream_id: head.stream_id(),
                end_headers: head.flag() & END_HEADERS == END_HEADERS,
            },
            payload,
        ))
    }

    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    pub fn end_headers(&self) -> bool {
        self.end_headers
    }

    pub fn encode<B: BufMut>(stream_id: StreamId, end_headers: bool, fragment: &[u8], dst: &mut B) {
        let flag = if end_headers { END_HEADERS } else { 0 };
        let head = Head::new(Kind::Continuation, flag, stream_id);
        head.encode(fragment.len(), dst);
        dst.put(fragment);
    }
}
