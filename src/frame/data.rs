use bytes::{BufMut, Bytes};

use crate::error::FrameError;
use crate::frame::head::{parse_padding, Head, Kind, StreamId};

const END_STREAM: u8 = 0x1;
const PADDED: u8 = 0x8;

/// A DATA frame: a chunk of the request or response body.
#[derive(Debug, Clone)]
pub struct Data {
    stream_id: StreamId,
    data: Bytes,
    end_stream: bool,
}

impl Data {
    pub fn new(stream_id: StreamId, data: Bytes, end_stream: bool) -> Data {
        Data {
            stream_id,
            data,
            end_stream,
        }
    }

    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    pub fn is_end_stream(&self) -> bool {
        self.end_stream
    }

    pub fn payload(&self) -> &Bytes {
        &self.data
    }

    pub fn into_payload(self) -> Bytes {
        self.data
    }

    pub fn load(head: Head, payload: Bytes) -> Result<Data, FrameError> {
        if head.stream_id().is_zero() {
            return Err(FrameError::InvalidStreamId);
        }

        let padded = head.flag() & PADDED == PADDED;
        let (_, data) = parse_padding(padded, payload)?;

        Ok(Data {
            stream_id: head.stream_id(),
            data,
            end_stream: head.flag() & END_STREAM == END_STREAM,
        })
    }

    pub fn encode<B: BufMut>(&self, dst: &mut B) {
        let flag = if self.end_stream { END_STREAM } else { 0 };
        let head = Head::new(Kind::Data, flag, self.stream_id);
        head.encode(self.data.len(), dst);
        dst.put(&self.data[..]);
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn head(flag: u8) -> Head {
        Head::new(Kind::Data, flag, StreamId::new(1))
    }

    #[test]
    fn zero_stream_id_is_rejected() {
        let head = Head::new(Kind::Data, 0, StreamId::CONNECTION);
        assert!(matches!(Data::load(head, Bytes::from_static(b"x")), Err(FrameError::InvalidStreamId)));
    }

    #[test]
    fn pad_length_equal_to_remaining_payload_is_rejected() {
        let payload = Bytes::from_static(&[3, 1, 2, 3]);
        assert!(matches!(Data::load(head(PADDED), payload), Err(FrameError::TooMuchPadding)));
    }

    #[test]
    fn padding_is_stripped_from_the_returned_payload() {
        let payload = Bytes::from_static(&[2, b'h', b'i', 0, 0]);
        let data = Data::load(head(PADDED), payload).unwrap();
        assert_eq!(data.payload().as_ref(), b"hi");
    }

    #[test]
    fn end_stream_flag_is_read_back() {
        let data = Data::load(head(END_STREAM), Bytes::from_static(b"x")).unwrap();
        assert!(data.is_end_stream());
    }
}
