use bytes::{BufMut, Bytes};
use tracing::trace;

use crate::error::FrameError;
use crate::frame::head::{Head, Kind, StreamId};

const ACK_FLAG: u8 = 0x1;

/// PING: round-trip liveness check (spec.md §4.3). The server echoes
/// non-ACK pings back with `ACK` set and an identical payload.
#[derive(Debug, Clone)]
pub struct Ping {
    ack: bool,
    payload: [u8; 8],
}

impl Ping {
    pub fn ping(payload: [u8; 8]) -> Ping {
        Ping {
            ack: false,
            payload,
        }
    }

    pub fn pong(payload: [u8; 8]) -> Ping {
        Ping {
            ack: true,
            payload,
        }
    }

    pub fn is_ack(&self) -> bool {
        self.ack
    }

    pub fn payload(&self) -> [u8; 8] {
        self.payload
    }

    /// Builds a `Ping` frame from a parsed head and its (already
    /// length-validated) payload.
    pub fn load(head: Head, payload: &Bytes) -> Result<Ping, FrameError> {
        debug_assert_eq!(head.kind(), Kind::Ping);

        // PING frames are not associated with any individual stream. If a PING
        // frame is received with a stream identifier field value other than
        // 0x0, the recipient MUST respond with a connection error of type
        // PROTOCOL_ERROR.
        if !head.stream_id().is_zero() {
            return Err(FrameError::InvalidStreamId);
        }

        // In addition to the frame header, PING frames MUST contain 8 octets
        // of opaque data in the payload.
        if payload.len() != 8 {
            return Err(FrameError::BadFrameSize);
        }

        let mut buf = [0u8; 8];
        buf.copy_from_slice(payload);

        // ACK (0x1): when set, this PING frame is a PING response.
        let ack = head.flag() & ACK_FLAG != 0;

        Ok(Ping { ack, payload: buf })
    }

    pub fn encode<B: BufMut>(&self, dst: &mut B) {
        trace!(ack = self.ack, "encoding PING");

        let flag = if self.ack { ACK_FLAG } else { 0 };
        let head = Head::new(Kind::Ping, flag, StreamId::CONNECTION);

        head.encode(8, dst);
        dst.put(&self.payload[..]);
    }
}
