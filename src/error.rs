//! Typed error taxonomy: stream errors, connection errors, and I/O errors.
//!
//! Grounded in `carllerche-h2`'s `codec::RecvError` / `frame::Error` split
//! (see `src/codec/framed_read.rs`, `src/frame/mod.rs`), expressed with
//! `thiserror` instead of hand rolled `Display`/`Error` impls.

use std::io;

use crate::frame::{Reason, StreamId};

/// The error codes carried on the wire in RST_STREAM and GOAWAY frames.
///
/// Unknown codes received from a peer are preserved as `Reason::Other` so
/// that "unknown error codes must be tolerated on receipt" (spec.md §6)
/// holds without losing information.
pub use crate::frame::Reason as ErrorCode;

/// An error produced while decoding a single frame.
///
/// This is the fine-grained error the frame codec raises; `proto::connection`
/// decides whether it escalates to a stream error or a connection error,
/// per spec.md §7's propagation policy.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame header was not fully available")]
    Short,

    #[error("unsupported flag bits set on frame")]
    BadFlag,

    #[error("unknown frame kind")]
    BadKind,

    #[error("frame length did not match the fixed size required for this type")]
    BadFrameSize,

    #[error("PAD length exceeded the remaining payload")]
    TooMuchPadding,

    #[error("payload too short for the fields the frame type requires")]
    PayloadTooShort,

    #[error("SETTINGS payload was not a multiple of 6 bytes")]
    PartialSettingLength,

    #[error("frame carried a stream id of 0 where a stream id was required, or vice versa")]
    InvalidStreamId,

    #[error("a stream cannot depend on itself")]
    SelfDependency,

    #[error("WINDOW_UPDATE increment of 0")]
    ZeroIncrement,

    #[error("flow control window would exceed 2^31-1")]
    WindowOverflow,

    #[error("invalid value for a SETTINGS parameter")]
    InvalidSettingValue,

    #[error("HPACK decoding failed: {0}")]
    Hpack(&'static str),

    #[error("malformed pseudo-header or header field: {0}")]
    MalformedHeaders(&'static str),
}

/// Errors surfaced by `Connection::handle_input` / frame decode.
#[derive(Debug, thiserror::Error)]
pub enum RecvError {
    /// Confined to one stream: the connection stays open, RST_STREAM is sent.
    #[error("stream {id:?} error: {reason:?}")]
    Stream { id: StreamId, reason: Reason },

    /// Jeopardizes the whole connection: GOAWAY is sent and the socket closes.
    #[error("connection error: {0:?}")]
    Connection(Reason),

    /// The underlying byte channel failed; no GOAWAY is sent.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

impl From<FrameError> for RecvError {
    /// Frame-level decode failures are connection errors unless explicitly
    /// recognized as stream-scoped above the call site (PRIORITY self-dependency,
    /// malformed HEADERS on a single stream, etc. are mapped at the call site
    /// instead of here, since only the caller knows the frame's stream id).
    fn from(_: FrameError) -> Self {
        RecvError::Connection(Reason::PROTOCOL_ERROR)
    }
}

/// Top level error type returned across the embedding interface (spec.md §6).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Recv(#[from] RecvError),

    #[error("handler error: {0}")]
    Handler(String),

    #[error("reuse pool exhausted")]
    PoolExhausted,
}
