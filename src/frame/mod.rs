//! Frame types and the wire-level `Frame` enum (spec.md §4.3).
//!
//! Grounded in `carllerche-h2`'s `frame` module layout; the per-kind
//! submodules are rewritten against the new `Head`/`StreamId` API in
//! `head.rs` rather than the teacher's `futures` 0.1 era types.

mod data;
mod goaway;
mod head;
mod headers;
mod ping;
mod priority;
mod reset;
mod settings;
mod window_update;

pub use self::data::Data;
pub use self::goaway::GoAway;
pub use self::head::{parse_padding, Head, Kind, StreamId, DEFAULT_MAX_FRAME_SIZE, HEADER_LEN, MAX_MAX_FRAME_SIZE};
pub use self::headers::{Continuation, Headers, HeadersHead, Pseudo, PushPromise};
pub use self::ping::Ping;
pub use self::priority::Priority;
pub use self::reset::RstStream;
pub use self::settings::{
    Parameter, Settings, DEFAULT_INITIAL_WINDOW_SIZE, DEFAULT_MAX_FRAME_SIZE as SETTINGS_DEFAULT_MAX_FRAME_SIZE,
    DEFAULT_SETTINGS_HEADER_TABLE_SIZE,
};
pub use self::window_update::WindowUpdate;

/// The error codes exchanged in RST_STREAM and GOAWAY (spec.md §6).
///
/// Modeled as a newtype over `u32`, not an enum, so that unknown codes
/// received from a peer round-trip losslessly as `Reason(n)` instead of
/// collapsing into a catch-all variant -- "unknown error codes must be
/// tolerated on receipt" (spec.md §6) falls out for free.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reason(u32);

impl Reason {
    pub const NO_ERROR: Reason = Reason(0);
    pub const PROTOCOL_ERROR: Reason = Reason(1);
    pub const INTERNAL_ERROR: Reason = Reason(2);
    pub const FLOW_CONTROL_ERROR: Reason = Reason(3);
    pub const SETTINGS_TIMEOUT: Reason = Reason(4);
    pub const STREAM_CLOSED: Reason = Reason(5);
    pub const FRAME_SIZE_ERROR: Reason = Reason(6);
    pub const REFUSED_STREAM: Reason = Reason(7);
    pub const CANCEL: Reason = Reason(8);
    pub const COMPRESSION_ERROR: Reason = Reason(9);
    pub const CONNECT_ERROR: Reason = Reason(10);
    pub const ENHANCE_YOUR_CALM: Reason = Reason(11);
    pub const INADEQUATE_SECURITY: Reason = Reason(12);
    pub const HTTP_1_1_REQUIRED: Reason = Reason(13);

    pub fn from_u32(v: u32) -> Reason {
        Reason(v)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }

    fn name(&self) -> Option<&'static str> {
        Some(match self.0 {
            0 => "NO_ERROR",
            1 => "PROTOCOL_ERROR",
            2 => "INTERNAL_ERROR",
            3 => "FLOW_CONTROL_ERROR",
            4 => "SETTINGS_TIMEOUT",
            5 => "STREAM_CLOSED",
            6 => "FRAME_SIZE_ERROR",
            7 => "REFUSED_STREAM",
            8 => "CANCEL",
            9 => "COMPRESSION_ERROR",
            10 => "CONNECT_ERROR",
            11 => "ENHANCE_YOUR_CALM",
            12 => "INADEQUATE_SECURITY",
            13 => "HTTP_1_1_REQUIRED",
            _ => return None,
        })
    }
}

impl std::fmt::Display for Reason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "unknown error code 0x{:x}", self.0),
        }
    }
}

/// A fully decoded frame, ready for the connection state machine to act on.
///
/// `Headers`/`PushPromise`/`Continuation` only reach this form after
/// `codec::framed_read` has assembled and HPACK-decoded the complete header
/// block; the frame types themselves only know about a single wire frame.
#[derive(Debug)]
pub enum Frame {
    Data(Data),
    Headers(Headers),
    Priority(Priority),
    Reset(RstStream),
    Settings(Settings),
    PushPromise(PushPromise),
    Ping(Ping),
    GoAway(GoAway),
    WindowUpdate(WindowUpdate),
}

impl Frame {
    pub fn stream_id(&self) -> StreamId {
        match self {
            Frame::Data(f) => f.stream_id(),
            Frame::Headers(f) => f.stream_id(),
            Frame::Priority(f) => f.stream_id(),
            Frame::Reset(f) => f.stream_id(),
            Frame::Settings(_) => StreamId::CONNECTION,
            Frame::PushPromise(f) => f.stream_id(),
            Frame::Ping(_) => StreamId::CONNECTION,
            Frame::GoAway(_) => StreamId::CONNECTION,
            Frame::WindowUpdate(f) => f.stream_id(),
        }
    }
}

impl From<Data> for Frame {
    fn from(f: Data) -> Self {
        Frame::Data(f)
    }
}

impl From<Headers> for Frame {
    fn from(f: Headers) -> Self {
        Frame::Headers(f)
    }
}

impl From<Priority> for Frame {
    fn from(f: Priority) -> Self {
        Frame::Priority(f)
    }
}

impl From<RstStream> for Frame {
    fn from(f: RstStream) -> Self {
        Frame::Reset(f)
    }
}

impl From<Settings> for Frame {
    fn from(f: Settings) -> Self {
        Frame::Settings(f)
    }
}

impl From<PushPromise> for Frame {
    fn from(f: PushPromise) -> Self {
        Frame::PushPromise(f)
    }
}

impl From<Ping> for Frame {
    fn from(f: Ping) -> Self {
        Frame::Ping(f)
    }
}

impl From<GoAway> for Frame {
    fn from(f: GoAway) -> Self {
        Frame::GoAway(f)
    }
}

impl From<WindowUpdate> for Frame {
    fn from(f: WindowUpdate) -> Self {
        Frame::WindowUpdate(f)
    }
}
