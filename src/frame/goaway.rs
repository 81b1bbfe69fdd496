use bytes::{Buf, BufMut, Bytes};

use crate::error::FrameError;
use crate::frame::head::{Head, Kind, StreamId};
use crate::frame::Reason;

/// GOAWAY: tells the peer which streams were accepted and why the
/// connection is closing (spec.md §7).
#[derive(Debug, Clone)]
pub struct GoAway {
    last_stream_id: StreamId,
    reason: Reason,
    debug_data: Bytes,
}

impl GoAway {
    pub fn new(last_stream_id: StreamId, reason: Reason) -> GoAway {
        GoAway {
            last_stream_id,
            reason,
            debug_data: Bytes::new(),
        }
    }

    pub fn with_debug_data(mut self, data: Bytes) -> Self {
        self.debug_data = data;
        self
    }

    pub fn last_stream_id(&self) -> StreamId {
        self.last_stream_id
    }

    pub fn reason(&self) -> Reason {
        self.reason
    }

    pub fn load(payload: &Bytes) -> Result<GoAway, FrameError> {
        if payload.len() < 8 {
            return Err(FrameError::PayloadTooShort);
        }

        let mut buf = payload.clone();
        let last_stream_id = StreamId::new(buf.get_u32());
        let reason = Reason::from_u32(buf.get_u32());
        let debug_data = buf;

        Ok(GoAway {
            last_stream_id,
            reason,
            debug_data,
        })
    }

    pub fn encode<B: BufMut>(&self, dst: &mut B) {
        let head = Head::new(Kind::GoAway, 0, StreamId::CONNECTION);
        head.encode(8 + self.debug_data.len(), dst);
        dst.put_u32(self.last_stream_id.as_u32());
        dst.put_u32(self.reason.as_u32());
        dst.put(&self.debug_data[..]);
    }
}
