use bytes::{Buf, BufMut, Bytes};

use crate::error::FrameError;
use crate::frame::head::{Head, Kind, StreamId};

/// PRIORITY frames are parsed and validated but never influence scheduling
/// (spec.md §1 non-goals). Decoding them is still required to keep the
/// connection byte-stream in sync.
#[derive(Debug, Clone)]
pub struct Priority {
    stream_id: StreamId,
    dependency: StreamId,
    is_exclusive: bool,
    weight: u8,
}

impl Priority {
    pub fn load(head: Head, payload: &Bytes) -> Result<Priority, FrameError> {
        if head.stream_id().is_zero() {
            return Err(FrameError::InvalidStreamId);
        }

        if payload.len() != 5 {
            return Err(FrameError::BadFrameSize);
        }

        let mut buf = payload.clone();
        let raw = buf.get_u32();
        let is_exclusive = raw & (1 << 31) != 0;
        let dependency = StreamId::new(raw);
        let weight = buf.get_u8();

        if dependency == head.stream_id() {
            return Err(FrameError::SelfDependency);
        }

        Ok(Priority {
            stream_id: head.stream_id(),
            dependency,
            is_exclusive,
            weight,
        })
    }

    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    pub fn encode<B: BufMut>(&self, dst: &mut B) {
        let head = Head::new(Kind::Priority, 0, self.stream_id);
        head.encode(5, dst);

        let mut raw = self.dependency.as_u32();
        if self.is_exclusive {
            raw |= 1 << 31;
        }
        dst.put_u32(raw);
        dst.put_u8(self.weight);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn head(stream_id: u32) -> Head {
        Head::new(Kind::Priority, 0, StreamId::new(stream_id))
    }

    #[test]
    fn zero_stream_id_is_rejected() {
        let payload = Bytes::from_static(&[0, 0, 0, 1, 16]);
        assert!(matches!(Priority::load(head(0), &payload), Err(FrameError::InvalidStreamId)));
    }

    #[test]
    fn wrong_payload_length_is_rejected() {
        for len in [0usize, 4, 6, 10] {
            let payload = Bytes::from(vec![0u8; len]);
            assert!(matches!(Priority::load(head(1), &payload), Err(FrameError::BadFrameSize)));
        }
    }

    #[test]
    fn self_dependency_is_rejected() {
        let mut payload = vec![0u8; 5];
        payload[..4].copy_from_slice(&3u32.to_be_bytes());
        let payload = Bytes::from(payload);
        assert!(matches!(Priority::load(head(3), &payload), Err(FrameError::SelfDependency)));
    }

    #[test]
    fn valid_priority_round_trips_through_encode() {
        let mut payload = vec![0u8; 5];
        payload[..4].copy_from_slice(&((1u32 << 31) | 7).to_be_bytes());
        payload[4] = 200;
        let priority = Priority::load(head(1), &Bytes::from(payload)).unwrap();
        assert_eq!(priority.stream_id().as_u32(), 1);
        assert!(priority.is_exclusive);
        assert_eq!(priority.dependency.as_u32(), 7);
        assert_eq!(priority.weight, 200);
    }
}
