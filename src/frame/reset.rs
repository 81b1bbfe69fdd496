use bytes::{Buf, BufMut, Bytes};

use crate::error::FrameError;
use crate::frame::head::{Head, Kind, StreamId};
use crate::frame::Reason;

/// RST_STREAM: abruptly terminates a single stream (spec.md §4.5/§7).
#[derive(Debug, Clone)]
pub struct RstStream {
    stream_id: StreamId,
    reason: Reason,
}

impl RstStream {
    pub fn new(stream_id: StreamId, reason: Reason) -> RstStream {
        RstStream { stream_id, reason }
    }

    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    pub fn reason(&self) -> Reason {
        self.reason
    }

    pub fn load(head: Head, payload: &Bytes) -> Result<RstStream, FrameError> {
        if head.stream_id().is_zero() {
            return Err(FrameError::InvalidStreamId);
        }

        if payload.len() != 4 {
            return Err(FrameError::BadFrameSize);
        }

        let mut buf = payload.clone();
        let reason = Reason::from_u32(buf.get_u32());

        Ok(RstStream {
            stream_id: head.stream_id(),
            reason,
        })
    }

    pub fn encode<B: BufMut>(&self, dst: &mut B) {
        let head = Head::new(Kind::Reset, 0, self.stream_id);
        head.encode(4, dst);
        dst.put_u32(self.reason.as_u32());
    }
}
