//! The fixed 9-byte frame header shared by every HTTP/2 frame type.
//!
//! Grounded in `carllerche-h2`'s `frame::Head`/`Kind`/`StreamId` (referenced
//! throughout `src/frame/headers.rs` and `src/frame/ping.rs`, though the
//! teacher's copy of the file itself was not retrieved into the pack).

use bytes::{Buf, BufMut};

use crate::error::FrameError;

pub const HEADER_LEN: usize = 9;

/// 24-bit length, clamped in practice to `[2^14, 2^24-1]` by `Settings`.
pub const DEFAULT_MAX_FRAME_SIZE: u32 = 1 << 14;
pub const MAX_MAX_FRAME_SIZE: u32 = (1 << 24) - 1;

/// A 31-bit stream identifier. The reserved high bit is always read as zero
/// and always written as zero (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(u32);

impl StreamId {
    pub const CONNECTION: StreamId = StreamId(0);

    pub fn new(id: u32) -> StreamId {
        StreamId(id & !(1 << 31))
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn is_client_initiated(&self) -> bool {
        self.0 != 0 && self.0 % 2 == 1
    }

    pub fn is_server_initiated(&self) -> bool {
        self.0 != 0 && self.0 % 2 == 0
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl From<u32> for StreamId {
    fn from(v: u32) -> Self {
        StreamId::new(v)
    }
}

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Data,
    Headers,
    Priority,
    Reset,
    Settings,
    PushPromise,
    Ping,
    GoAway,
    WindowUpdate,
    Continuation,
    Unknown,
}

impl Kind {
    fn from_u8(byte: u8) -> Kind {
        match byte {
            0x0 => Kind::Data,
            0x1 => Kind::Headers,
            0x2 => Kind::Priority,
            0x3 => Kind::Reset,
            0x4 => Kind::Settings,
            0x5 => Kind::PushPromise,
            0x6 => Kind::Ping,
            0x7 => Kind::GoAway,
            0x8 => Kind::WindowUpdate,
            0x9 => Kind::Continuation,
            _ => Kind::Unknown,
        }
    }

    fn encode_u8(&self) -> u8 {
        match *self {
            Kind::Data => 0x0,
            Kind::Headers => 0x1,
            Kind::Priority => 0x2,
            Kind::Reset => 0x3,
            Kind::Settings => 0x4,
            Kind::PushPromise => 0x5,
            Kind::Ping => 0x6,
            Kind::GoAway => 0x7,
            Kind::WindowUpdate => 0x8,
            Kind::Continuation => 0x9,
            Kind::Unknown => 0xf,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Head {
    kind: Kind,
    flag: u8,
    stream_id: StreamId,
}

impl Head {
    pub fn new(kind: Kind, flag: u8, stream_id: StreamId) -> Head {
        Head {
            kind,
            flag,
            stream_id,
        }
    }

    /// Parses the 9-byte header. `src` must contain at least `HEADER_LEN`
    /// bytes; the 24-bit length is returned alongside so callers can slice
    /// the payload without re-reading it.
    pub fn parse(src: &[u8]) -> (Head, u32) {
        let length = (src[0] as u32) << 16 | (src[1] as u32) << 8 | (src[2] as u32);
        let kind = Kind::from_u8(src[3]);
        let flag = src[4];
        let stream_id =
            StreamId::new(u32::from_be_bytes([src[5], src[6], src[7], src[8]]));

        (
            Head {
                kind,
                flag,
                stream_id,
            },
            length,
        )
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn flag(&self) -> u8 {
        self.flag
    }

    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    /// Writes the 9-byte header, given the already-computed payload length.
    pub fn encode<B: BufMut>(&self, length: usize, dst: &mut B) {
        debug_assert!(length <= MAX_MAX_FRAME_SIZE as usize);

        dst.put_u8((length >> 16) as u8);
        dst.put_u8((length >> 8) as u8);
        dst.put_u8(length as u8);
        dst.put_u8(self.kind.encode_u8());
        dst.put_u8(self.flag);
        dst.put_u32(self.stream_id.as_u32());
    }
}

/// Strips and validates an optional PAD length octet (DATA/HEADERS).
///
/// Returns `(pad_len, remaining_src)`. Per spec.md §4.3, the PAD length must
/// be strictly less than the remaining payload length.
pub fn parse_padding(padded: bool, mut src: bytes::Bytes) -> Result<(usize, bytes::Bytes), FrameError> {
    if !padded {
        return Ok((0, src));
    }

    if src.is_empty() {
        return Err(FrameError::TooMuchPadding);
    }

    let pad_len = src.get_u8() as usize;

    if pad_len >= src.len() {
        return Err(FrameError::TooMuchPadding);
    }

    let payload_len = src.len() - pad_len;
    let payload = src.split_to(payload_len);

    Ok((pad_len, payload))
}
