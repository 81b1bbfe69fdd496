//! Decodes complete frames out of the bytes staged in an `InputBuffer`
//! (spec.md §4.3/§4.6).
//!
//! Grounded in `carllerche-h2/src/codec/framed_read.rs`'s
//! `FramedRead`/`Partial`/`Continuable` shape: HPACK decoding always runs,
//! even for a header block whose stream will ultimately be rejected, to
//! keep the decoder's dynamic table synchronized with the peer's encoder.
//! The teacher drives this as a `futures::Stream::poll`; here it is a
//! plain method the connection-driving task calls in a loop until it
//! returns `Ok(None)` ("no complete frame yet").

use bytes::{Bytes, BytesMut};

use crate::error::{FrameError, RecvError};
use crate::frame::{
    self, Continuation, Data, Frame, GoAway, Head, HeadersHead, Kind, Ping, Priority, PushPromise, RstStream,
    Settings, StreamId, WindowUpdate, HEADER_LEN,
};
use crate::hpack_codec;
use crate::io::InputBuffer;

/// Frame kinds whose oversize condition is a connection error rather than
/// a stream error (spec.md §4.6: frames that can change connection state).
fn frame_size_error_is_connection_scoped(kind: Kind, stream_id: StreamId) -> bool {
    matches!(kind, Kind::Headers | Kind::PushPromise | Kind::Continuation | Kind::Settings) || stream_id.is_zero()
}

/// `FrameError::Hpack` is genuine compression-state corruption and must
/// tear down the whole connection (the peer's dynamic table and ours have
/// diverged, so no further header block on any stream can be trusted).
/// `FrameError::MalformedHeaders` is a semantic validation failure (an
/// uppercase name, a misplaced pseudo-header, a bad `te` value, ...) that
/// only concerns the one stream it was found on (spec.md §4.4).
fn hpack_decode_error(err: FrameError, stream_id: StreamId) -> RecvError {
    match err {
        FrameError::MalformedHeaders(_) => RecvError::Stream {
            id: stream_id,
            reason: frame::Reason::PROTOCOL_ERROR,
        },
        _ => RecvError::Connection(frame::Reason::COMPRESSION_ERROR),
    }
}

/// PRIORITY's own frame-size and self-dependency violations are
/// stream-scoped (spec.md's frame table): they say nothing about the rest
/// of the connection, unlike a HEADERS-family frame.
fn priority_decode_error(err: FrameError, stream_id: StreamId) -> RecvError {
    match err {
        FrameError::BadFrameSize => RecvError::Stream {
            id: stream_id,
            reason: frame::Reason::FRAME_SIZE_ERROR,
        },
        FrameError::SelfDependency => RecvError::Stream {
            id: stream_id,
            reason: frame::Reason::PROTOCOL_ERROR,
        },
        _ => RecvError::Connection(frame::Reason::PROTOCOL_ERROR),
    }
}

/// A HEADERS or PUSH_PROMISE frame still waiting on CONTINUATION frames to
/// complete its header block (END_HEADERS not yet seen).
enum Partial {
    Headers(HeadersHead),
    PushPromise(PushPromise),
}

pub struct FrameDecoder {
    hpack: hpack_codec::Decoder,
    max_frame_size: u32,
    max_header_list_size: usize,
    partial: Option<(Partial, BytesMut)>,
}

impl FrameDecoder {
    pub fn new(max_frame_size: u32, header_table_size: usize, max_header_list_size: usize) -> FrameDecoder {
        FrameDecoder {
            hpack: hpack_codec::Decoder::new(header_table_size),
            max_frame_size,
            max_header_list_size,
            partial: None,
        }
    }

    pub fn set_max_frame_size(&mut self, size: u32) {
        self.max_frame_size = size;
    }

    pub fn set_header_table_size(&mut self, size: usize) {
        self.hpack.set_max_dynamic_table_size(size);
    }

    /// Attempts to decode the next complete frame out of `input`. Returns
    /// `Ok(None)` when fewer bytes are staged than a full frame requires
    /// (spec.md §4.1's `add_data`/`available` contract) -- the caller
    /// should read more from the channel and retry.
    pub fn decode(&mut self, input: &mut InputBuffer) -> Result<Option<Frame>, RecvError> {
        loop {
            if !input.available(HEADER_LEN) {
                return Ok(None);
            }

            input.mark();
            let mut head_bytes = [0u8; HEADER_LEN];
            input.read_bytes(&mut head_bytes);
            let (head, length) = Head::parse(&head_bytes);
            let length = length as usize;

            if !input.available(length) {
                input.reset_to_mark();
                return Ok(None);
            }

            if length > self.max_frame_size as usize {
                let reason = frame::Reason::FRAME_SIZE_ERROR;
                return Err(if frame_size_error_is_connection_scoped(head.kind(), head.stream_id()) {
                    RecvError::Connection(reason)
                } else {
                    RecvError::Stream {
                        id: head.stream_id(),
                        reason,
                    }
                });
            }

            let mut payload = vec![0u8; length];
            input.read_bytes(&mut payload);
            let payload = Bytes::from(payload);

            if let Some(frame) = self.decode_frame(head, payload)? {
                return Ok(Some(frame));
            }
            // else: a CONTINUATION was consumed into `self.partial` without
            // producing a frame yet; loop to try the next one.
        }
    }

    fn decode_frame(&mut self, head: Head, payload: Bytes) -> Result<Option<Frame>, RecvError> {
        if self.partial.is_some() && head.kind() != Kind::Continuation {
            return Err(RecvError::Connection(frame::Reason::PROTOCOL_ERROR));
        }

        match head.kind() {
            Kind::Data => Ok(Some(Data::load(head, payload)?.into())),
            Kind::Headers => {
                let (headers_head, fragment) = frame::Headers::parse_head(head, payload)?;
                self.start_or_finish_headers(headers_head, fragment, true)
            }
            Kind::Priority => {
                let priority = Priority::load(head, &payload).map_err(|e| priority_decode_error(e, head.stream_id()))?;
                Ok(Some(priority.into()))
            }
            Kind::Reset => Ok(Some(RstStream::load(head, &payload)?.into())),
            Kind::Settings => Ok(Some(Settings::load(head, &payload)?.into())),
            Kind::PushPromise => {
                // Server push is always rejected (spec.md §1 non-goal); the
                // frame is still decoded so the byte stream stays in sync
                // before the connection reports the error.
                let (pp, fragment) = PushPromise::parse_head(head, payload)?;
                self.start_or_finish_push_promise(pp, fragment);
                Err(RecvError::Connection(frame::Reason::PROTOCOL_ERROR))
            }
            Kind::Ping => Ok(Some(Ping::load(head, &payload)?.into())),
            Kind::GoAway => Ok(Some(GoAway::load(&payload)?.into())),
            Kind::WindowUpdate => Ok(Some(WindowUpdate::load(head, &payload)?.into())),
            Kind::Continuation => {
                let (cont, fragment) = Continuation::load(head, payload)?;
                self.continue_headers(cont, fragment)
            }
            Kind::Unknown => Ok(None),
        }
    }

    fn start_or_finish_headers(
        &mut self,
        headers_head: HeadersHead,
        fragment: Bytes,
        is_request: bool,
    ) -> Result<Option<Frame>, RecvError> {
        let mut buf = BytesMut::with_capacity(fragment.len());
        buf.extend_from_slice(&fragment);

        if headers_head.end_headers() {
            let (pseudo, fields) = self
                .hpack
                .decode(&buf, is_request)
                .map_err(|e| hpack_decode_error(e, headers_head.stream_id()))?;
            return Ok(Some(headers_head.into_headers(pseudo, fields).into()));
        }

        if buf.len() > self.max_header_list_size {
            return Err(RecvError::Connection(frame::Reason::PROTOCOL_ERROR));
        }

        self.partial = Some((Partial::Headers(headers_head), buf));
        Ok(None)
    }

    /// Decoded purely to keep HPACK state synchronized; the block is
    /// discarded since a pushed stream is rejected regardless.
    fn start_or_finish_push_promise(&mut self, _pp: PushPromise, fragment: Bytes) {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&fragment);
        let _ = self.hpack.decode(&buf, true);
    }

    fn continue_headers(&mut self, cont: Continuation, fragment: Bytes) -> Result<Option<Frame>, RecvError> {
        let (partial, mut buf) = self
            .partial
            .take()
            .ok_or(RecvError::Connection(frame::Reason::PROTOCOL_ERROR))?;

        let expected_stream_id = match &partial {
            Partial::Headers(h) => h.stream_id(),
            Partial::PushPromise(p) => p.stream_id(),
        };
        if cont.stream_id() != expected_stream_id {
            return Err(RecvError::Connection(frame::Reason::PROTOCOL_ERROR));
        }

        buf.extend_from_slice(&fragment);
        if buf.len() > self.max_header_list_size {
            return Err(RecvError::Connection(frame::Reason::PROTOCOL_ERROR));
        }

        if !cont.end_headers() {
            self.partial = Some((partial, buf));
            return Ok(None);
        }

        let is_request = matches!(partial, Partial::Headers(_));
        let (pseudo, fields) = self
            .hpack
            .decode(&buf, is_request)
            .map_err(|e| hpack_decode_error(e, expected_stream_id))?;

        match partial {
            Partial::Headers(h) => Ok(Some(h.into_headers(pseudo, fields).into())),
            Partial::PushPromise(_) => Err(RecvError::Connection(frame::Reason::PROTOCOL_ERROR)),
        }
    }
}
