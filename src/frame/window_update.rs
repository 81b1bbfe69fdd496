use bytes::{Buf, BufMut, Bytes};

use crate::error::FrameError;
use crate::frame::head::{Head, Kind, StreamId};

pub const MAX_WINDOW_SIZE: u32 = (1 << 31) - 1;

/// WINDOW_UPDATE: grows a connection or stream flow-control window
/// (spec.md §4.7).
#[derive(Debug, Clone, Copy)]
pub struct WindowUpdate {
    stream_id: StreamId,
    increment: u32,
}

impl WindowUpdate {
    pub fn new(stream_id: StreamId, increment: u32) -> WindowUpdate {
        WindowUpdate {
            stream_id,
            increment,
        }
    }

    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    pub fn size_increment(&self) -> u32 {
        self.increment
    }

    pub fn load(head: Head, payload: &Bytes) -> Result<WindowUpdate, FrameError> {
        if payload.len() != 4 {
            return Err(FrameError::BadFrameSize);
        }

        let mut buf = payload.clone();
        let raw = buf.get_u32();
        let increment = raw & !(1 << 31);

        // A zero increment is a protocol violation (spec.md §4.7), but
        // whether that's stream- or connection-scoped depends on this
        // frame's stream id, which only the caller (`handle_window_update`)
        // knows how to act on -- `FlowControl::apply_increment` raises
        // `FrameError::ZeroIncrement` at that point instead.
        Ok(WindowUpdate {
            stream_id: head.stream_id(),
            increment,
        })
    }

    pub fn encode<B: BufMut>(&self, dst: &mut B) {
        let head = Head::new(Kind::WindowUpdate, 0, self.stream_id);
        head.encode(4, dst);
        dst.put_u32(self.increment);
    }
}
