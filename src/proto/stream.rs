//! Per-stream state machine and context (spec.md §4.5).
//!
//! Grounded in `carllerche-h2/src/proto/streams.rs`'s stream-state
//! transitions and `src/proto/streams/flow_control.rs`'s per-stream window,
//! reworked around the explicit `{IDLE, OPEN, HALF_CLOSED_LOCAL,
//! HALF_CLOSED_REMOTE, CLOSED}` table spec.md §4.5 specifies (the teacher's
//! `state::Stream` additionally tracks RESERVED states for push, which is a
//! non-goal here and so is dropped).

use bytes::{Bytes, BytesMut};
use http::HeaderMap;

use crate::error::RecvError;
use crate::frame::{Pseudo, StreamId};
use crate::proto::flow_control::FlowControl;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    Open,
    HalfClosedLocal,
    HalfClosedRemote,
    Closed,
}

/// The event that drives a stream-state transition. Frame types that never
/// affect stream state (SETTINGS, PING, GOAWAY, WINDOW_UPDATE on stream 0)
/// aren't represented here; they're handled at the connection level.
#[derive(Debug, Clone, Copy)]
pub enum StreamEvent {
    RecvHeaders { end_stream: bool },
    RecvData { end_stream: bool },
    RecvPriority,
    RecvWindowUpdate,
    RecvRstStream,
}

/// Request line + headers + accumulated body for one in-flight stream.
/// Reset and returned to the `reuse` pool once the stream reaches
/// `Closed`.
#[derive(Debug)]
pub struct Stream {
    id: StreamId,
    state: StreamState,
    pub recv_flow: FlowControl,
    pub send_flow: FlowControl,
    /// Bytes received and consumed on this stream since its last
    /// WINDOW_UPDATE was sent (spec.md §4.7).
    pub recv_unacked: usize,
    pseudo: Option<Pseudo>,
    headers: HeaderMap,
    body: BytesMut,
}

impl Stream {
    pub fn new(id: StreamId, initial_window: u32) -> Stream {
        Stream {
            id,
            state: StreamState::Idle,
            recv_flow: FlowControl::new(initial_window),
            send_flow: FlowControl::new(initial_window),
            recv_unacked: 0,
            pseudo: None,
            headers: HeaderMap::new(),
            body: BytesMut::new(),
        }
    }

    /// Clears request state and rewinds flow-control windows so the
    /// instance can be checked out of the pool for a brand new stream id
    /// without leaking the previous request's data (spec.md §4.8).
    pub fn reset_for_reuse(&mut self, id: StreamId, initial_window: u32) {
        self.id = id;
        self.state = StreamState::Idle;
        self.recv_flow = FlowControl::new(initial_window);
        self.send_flow = FlowControl::new(initial_window);
        self.recv_unacked = 0;
        self.pseudo = None;
        self.headers.clear();
        self.body.clear();
    }

    pub fn id(&self) -> StreamId {
        self.id
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == StreamState::Closed
    }

    pub fn set_request(&mut self, pseudo: Pseudo, headers: HeaderMap) {
        self.pseudo = Some(pseudo);
        self.headers = headers;
    }

    pub fn pseudo(&self) -> Option<&Pseudo> {
        self.pseudo.as_ref()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn append_body(&mut self, data: &Bytes) {
        self.body.extend_from_slice(data);
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Drives the state machine per spec.md §4.5's transition table.
    /// Returns a `RecvError::Stream` for locally-scoped violations
    /// (STREAM_CLOSED on a closed stream, etc); the connection decides
    /// whether any given violation should instead be connection-scoped
    /// (e.g. frames on a never-opened stream, handled one layer up since
    /// this type only exists once a stream has been created).
    pub fn on_event(&mut self, event: StreamEvent) -> Result<(), RecvError> {
        use StreamEvent::*;
        use StreamState::*;

        match (self.state, event) {
            (Idle, RecvHeaders { end_stream }) => {
                self.state = if end_stream { HalfClosedRemote } else { Open };
                Ok(())
            }
            (Idle, RecvPriority) => Ok(()),
            (Idle, _) => Err(self.protocol_error()),

            (Open, RecvHeaders { end_stream }) | (Open, RecvData { end_stream }) => {
                if end_stream {
                    self.state = HalfClosedRemote;
                }
                Ok(())
            }
            (Open, RecvRstStream) => {
                self.state = Closed;
                Ok(())
            }
            (Open, RecvPriority) | (Open, RecvWindowUpdate) => Ok(()),

            (HalfClosedRemote, RecvWindowUpdate) | (HalfClosedRemote, RecvPriority) => Ok(()),
            (HalfClosedRemote, RecvRstStream) => {
                self.state = Closed;
                Ok(())
            }
            (HalfClosedRemote, RecvHeaders { .. }) | (HalfClosedRemote, RecvData { .. }) => {
                Err(self.stream_closed_error())
            }

            (HalfClosedLocal, RecvRstStream) => {
                self.state = Closed;
                Ok(())
            }
            (HalfClosedLocal, RecvData { end_stream }) => {
                if end_stream {
                    self.state = Closed;
                }
                Ok(())
            }
            (HalfClosedLocal, RecvWindowUpdate) | (HalfClosedLocal, RecvPriority) => Ok(()),
            (HalfClosedLocal, RecvHeaders { .. }) => Err(self.stream_closed_error()),

            (Closed, RecvPriority) => Ok(()),
            (Closed, _) => Err(self.stream_closed_error()),
        }
    }

    /// Marks the stream half closed on the local (server) side once the
    /// final response DATA frame with END_STREAM has been written.
    pub fn send_end_stream(&mut self) {
        self.state = match self.state {
            StreamState::Open => StreamState::HalfClosedLocal,
            StreamState::HalfClosedRemote => StreamState::Closed,
            other => other,
        };
    }

    fn protocol_error(&self) -> RecvError {
        RecvError::Stream {
            id: self.id,
            reason: crate::frame::Reason::PROTOCOL_ERROR,
        }
    }

    fn stream_closed_error(&self) -> RecvError {
        RecvError::Stream {
            id: self.id,
            reason: crate::frame::Reason::STREAM_CLOSED,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream() -> Stream {
        Stream::new(StreamId::new(1), 65_535)
    }

    #[test]
    fn headers_without_end_stream_opens_the_stream() {
        let mut s = stream();
        s.on_event(StreamEvent::RecvHeaders { end_stream: false }).unwrap();
        assert_eq!(s.state(), StreamState::Open);
    }

    #[test]
    fn headers_with_end_stream_skips_straight_to_half_closed_remote() {
        let mut s = stream();
        s.on_event(StreamEvent::RecvHeaders { end_stream: true }).unwrap();
        assert_eq!(s.state(), StreamState::HalfClosedRemote);
    }

    #[test]
    fn data_after_half_closed_remote_is_stream_closed_error() {
        let mut s = stream();
        s.on_event(StreamEvent::RecvHeaders { end_stream: true }).unwrap();
        let err = s.on_event(StreamEvent::RecvData { end_stream: false }).unwrap_err();
        assert!(matches!(
            err,
            RecvError::Stream { reason, .. } if reason == crate::frame::Reason::STREAM_CLOSED
        ));
    }

    #[test]
    fn rst_stream_moves_open_to_closed() {
        let mut s = stream();
        s.on_event(StreamEvent::RecvHeaders { end_stream: false }).unwrap();
        s.on_event(StreamEvent::RecvRstStream).unwrap();
        assert_eq!(s.state(), StreamState::Closed);
        assert!(s.is_closed());
    }

    #[test]
    fn data_with_end_stream_closes_an_open_stream() {
        let mut s = stream();
        s.on_event(StreamEvent::RecvHeaders { end_stream: false }).unwrap();
        s.on_event(StreamEvent::RecvData { end_stream: true }).unwrap();
        assert_eq!(s.state(), StreamState::HalfClosedRemote);
    }

    #[test]
    fn send_end_stream_from_open_goes_half_closed_local() {
        let mut s = stream();
        s.on_event(StreamEvent::RecvHeaders { end_stream: false }).unwrap();
        s.send_end_stream();
        assert_eq!(s.state(), StreamState::HalfClosedLocal);
    }

    #[test]
    fn send_end_stream_from_half_closed_remote_fully_closes() {
        let mut s = stream();
        s.on_event(StreamEvent::RecvHeaders { end_stream: true }).unwrap();
        s.send_end_stream();
        assert_eq!(s.state(), StreamState::Closed);
    }

    #[test]
    fn idle_only_accepts_headers_or_priority() {
        let mut s = stream();
        let err = s.on_event(StreamEvent::RecvData { end_stream: false }).unwrap_err();
        assert!(matches!(
            err,
            RecvError::Stream { reason, .. } if reason == crate::frame::Reason::PROTOCOL_ERROR
        ));
    }

    #[test]
    fn closed_rejects_everything_but_priority() {
        let mut s = stream();
        s.on_event(StreamEvent::RecvHeaders { end_stream: false }).unwrap();
        s.on_event(StreamEvent::RecvRstStream).unwrap();

        s.on_event(StreamEvent::RecvPriority).unwrap();
        assert!(s.on_event(StreamEvent::RecvData { end_stream: false }).is_err());
        assert!(s.on_event(StreamEvent::RecvHeaders { end_stream: false }).is_err());
    }

    #[test]
    fn reset_for_reuse_clears_state_and_body() {
        let mut s = stream();
        s.on_event(StreamEvent::RecvHeaders { end_stream: false }).unwrap();
        s.append_body(&Bytes::from_static(b"leftover"));
        s.set_request(Pseudo::default(), HeaderMap::new());

        s.reset_for_reuse(StreamId::new(3), 1024);

        assert_eq!(s.id(), StreamId::new(3));
        assert_eq!(s.state(), StreamState::Idle);
        assert!(s.body().is_empty());
        assert!(s.pseudo().is_none());
    }
}
