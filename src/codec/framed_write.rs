//! Encodes frames into an `OutputBuffer` (spec.md §4.2/§4.3).
//!
//! Grounded in `carllerche-h2/src/proto/framed_write.rs`'s `FramedWrite`,
//! reworked around the `OutputBuffer` staging contract instead of a
//! `Sink`/`AsyncWrite` combinator chain: each frame type's own `encode`
//! writes into a scratch `BytesMut`, which is then staged into the
//! `OutputBuffer` as one or more wire frames.

use bytes::BytesMut;

use crate::frame::{self, Frame, HEADER_LEN};
use crate::hpack_codec;
use crate::io::{BufferOverflow, OutputBuffer};

pub struct FrameEncoder {
    hpack: hpack_codec::Encoder,
    max_frame_size: u32,
}

impl FrameEncoder {
    pub fn new(max_frame_size: u32) -> FrameEncoder {
        FrameEncoder {
            hpack: hpack_codec::Encoder::new(),
            max_frame_size,
        }
    }

    pub fn set_max_frame_size(&mut self, size: u32) {
        self.max_frame_size = size;
    }

    pub fn encode_frame(&mut self, frame: &Frame, out: &mut OutputBuffer) -> Result<(), BufferOverflow> {
        match frame {
            Frame::Data(f) => {
                for chunk in f.payload().chunks(self.max_frame_size as usize) {
                    let end_stream = f.is_end_stream() && chunk.len() == f.payload().len();
                    let piece = frame::Data::new(f.stream_id(), bytes::Bytes::copy_from_slice(chunk), end_stream);
                    let mut buf = BytesMut::new();
                    piece.encode(&mut buf);
                    out.write_bytes(&buf)?;
                }
                Ok(())
            }
            Frame::Headers(f) => self.encode_headers(f, out),
            Frame::Priority(f) => self.encode_simple(|b| f.encode(b), out),
            Frame::Reset(f) => self.encode_simple(|b| f.encode(b), out),
            Frame::Settings(f) => self.encode_simple(|b| f.encode(b), out),
            Frame::PushPromise(_) => Ok(()),
            Frame::Ping(f) => self.encode_simple(|b| f.encode(b), out),
            Frame::GoAway(f) => self.encode_simple(|b| f.encode(b), out),
            Frame::WindowUpdate(f) => self.encode_simple(|b| f.encode(b), out),
        }
    }

    fn encode_simple<F>(&self, write: F, out: &mut OutputBuffer) -> Result<(), BufferOverflow>
    where
        F: FnOnce(&mut BytesMut),
    {
        let mut buf = BytesMut::new();
        write(&mut buf);
        out.write_bytes(&buf)
    }

    fn encode_headers(&mut self, headers: &frame::Headers, out: &mut OutputBuffer) -> Result<(), BufferOverflow> {
        let block = self.hpack.encode(headers.pseudo(), headers.fields());

        let mut buf = BytesMut::new();
        let pos = headers.encode_head(&mut buf);

        if block.len() <= self.max_frame_size as usize {
            buf.extend_from_slice(&block);
            frame::Headers::patch_length(&mut buf, pos);
            return out.write_bytes(&buf);
        }

        // Header block doesn't fit in one frame: split across
        // CONTINUATION frames, each capped at `max_frame_size`. The HEADERS
        // frame itself must not carry END_HEADERS in this case, or the
        // peer's decoder will treat the block as already complete and
        // reject the CONTINUATION frames that follow.
        let max = self.max_frame_size as usize;
        let (first, rest) = block.split_at(max);
        buf.extend_from_slice(first);
        frame::Headers::patch_length(&mut buf, pos);
        frame::Headers::patch_end_headers(&mut buf, pos);
        out.write_bytes(&buf)?;

        let mut remaining = rest;
        while !remaining.is_empty() {
            let take = remaining.len().min(max);
            let (chunk, next) = remaining.split_at(take);
            let mut cont_buf = BytesMut::with_capacity(HEADER_LEN + chunk.len());
            frame::Continuation::encode(headers.stream_id(), next.is_empty(), chunk, &mut cont_buf);
            out.write_bytes(&cont_buf)?;
            remaining = next;
        }

        Ok(())
    }
}
