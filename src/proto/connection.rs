//! The connection state machine (spec.md §4.6) and the embedding interface
//! (spec.md §6: `new`/`reset`/`handle_input`/`send_output`/`close`).
//!
//! Grounded in `carllerche-h2/src/proto/connection.rs`'s `Connection` type
//! and `src/server.rs`'s handshake/preface reading, reworked from a
//! `futures` 0.1 `Sink`/`Stream` combinator pair into an explicit
//! async/await read-decode-dispatch loop, since spec.md §5 describes a
//! single connection-driving task rather than a poll-based transport.

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::codec::{FrameDecoder, FrameEncoder};
use crate::config::Config;
use crate::dispatch::{self, Dispatcher, ResponseSink, StreamRequest};
use crate::error::RecvError;
use crate::frame::{self, Frame, Reason, StreamId};
use crate::io::{InputBuffer, OutputBuffer};
use crate::proto::flow_control::FlowControl;
use crate::proto::stream::{StreamEvent, StreamState};
use crate::proto::streams::Streams;
use crate::reuse::{OutputBufferPool, StreamPool};
use crate::settings::Settings;

/// The client connection preface (spec.md §6): `PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n`.
pub const PREFACE: &[u8] = b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n";

const OUTPUT_FRAME_PADDING: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnState {
    Start,
    AwaitingSettings,
    Open,
    Closed,
}

/// Return value of `handle_input`: tells the external I/O loop whether to
/// call back in immediately, wait for readiness, or tear the socket down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputOutcome {
    AllDataHandled,
    DataStillToHandle,
    CloseConnection,
}

/// A clonable handle a `ResponseSink` uses to enqueue a filled
/// `OutputBuffer` from any thread (spec.md §5's only cross-thread
/// operation).
#[derive(Clone)]
pub struct OutputSender {
    tx: mpsc::UnboundedSender<OutputBuffer>,
}

impl OutputSender {
    pub fn send(&self, buffer: OutputBuffer) {
        // The receiver only disappears once the connection is dropped, at
        // which point there is nothing left to flush to anyway.
        let _ = self.tx.send(buffer);
    }
}

pub struct Connection<T, D> {
    state: ConnState,
    channel: Option<T>,
    on_close: Option<Box<dyn FnOnce() + Send>>,

    input: InputBuffer,
    decoder: FrameDecoder,
    /// Shared with every `ResponseSink` handed out by `dispatch_request`:
    /// HPACK encoding is stateful, so the whole connection must funnel
    /// through one encoder instance no matter which task is writing a
    /// response at a given moment.
    encoder: Arc<Mutex<FrameEncoder>>,

    server_settings: Settings,
    client_settings: Settings,
    conn_send_flow: FlowControl,
    conn_recv_flow: FlowControl,
    /// Bytes received and consumed since the last connection-level
    /// WINDOW_UPDATE was sent (spec.md §4.7's receive-side replenishment).
    conn_recv_unacked: usize,

    streams: Arc<Streams>,
    stream_pool: Arc<StreamPool>,
    output_pool: Arc<OutputBufferPool>,

    dispatcher: Arc<D>,
    output_tx: mpsc::UnboundedSender<OutputBuffer>,
    output_rx: mpsc::UnboundedReceiver<OutputBuffer>,

    config: Config,
}

impl<T, D> Connection<T, D>
where
    T: AsyncRead + AsyncWrite + Unpin,
    D: Dispatcher + 'static,
{
    pub fn new(config: Config, dispatcher: Arc<D>) -> Connection<T, D> {
        let (output_tx, output_rx) = mpsc::unbounded_channel();
        let settings = config.settings().clone();

        Connection {
            state: ConnState::Start,
            channel: None,
            on_close: None,
            input: InputBuffer::new(config.input_buffer_capacity),
            decoder: FrameDecoder::new(
                settings.max_frame_size(),
                settings.header_table_size() as usize,
                config.max_header_list_size,
            ),
            encoder: Arc::new(Mutex::new(FrameEncoder::new(settings.max_frame_size()))),
            server_settings: settings,
            client_settings: Settings::default(),
            conn_send_flow: FlowControl::new(frame::DEFAULT_INITIAL_WINDOW_SIZE),
            conn_recv_flow: FlowControl::new(frame::DEFAULT_INITIAL_WINDOW_SIZE),
            conn_recv_unacked: 0,
            streams: Arc::new(Streams::new()),
            stream_pool: Arc::new(StreamPool::new(
                config.stream_pool_capacity,
                frame::DEFAULT_INITIAL_WINDOW_SIZE,
            )),
            output_pool: Arc::new(OutputBufferPool::new(
                config.output_buffer_pool_capacity,
                config.output_buffer_capacity,
            )),
            dispatcher,
            output_tx,
            output_rx,
            config,
        }
    }

    pub fn output_sender(&self) -> OutputSender {
        OutputSender {
            tx: self.output_tx.clone(),
        }
    }

    /// Prepares the connection for a fresh TCP connection (spec.md §6):
    /// stores the channel and moves to `Start`, from which the first call
    /// to `handle_input` sends the server's initial SETTINGS frame.
    pub fn reset<F>(&mut self, channel: T, on_close: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.channel = Some(channel);
        self.on_close = Some(Box::new(on_close));
        self.state = ConnState::Start;
        self.client_settings = Settings::default();
        self.encoder.lock().unwrap().set_max_frame_size(self.server_settings.max_frame_size());
    }

    /// Drives parsing until no complete frame remains in the input buffer,
    /// or until an unrecoverable error closes the connection (spec.md §6).
    pub async fn handle_input(&mut self) -> InputOutcome {
        if self.state == ConnState::Closed {
            return InputOutcome::CloseConnection;
        }

        if self.state == ConnState::Start {
            self.send_initial_settings().await;
            self.state = ConnState::AwaitingSettings;
            if !self.read_preface().await {
                self.fail(Reason::PROTOCOL_ERROR).await;
                return InputOutcome::CloseConnection;
            }
        }

        let filled = match self.fill_input().await {
            Ok(filled) => filled,
            Err(_) => {
                self.close().await;
                return InputOutcome::CloseConnection;
            }
        };

        loop {
            let decoded = self.decoder.decode(&mut self.input);
            match decoded {
                Ok(Some(frame)) => {
                    if let Err(err) = self.dispatch_frame(frame).await {
                        self.handle_recv_error(err).await;
                        if self.state == ConnState::Closed {
                            return InputOutcome::CloseConnection;
                        }
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    self.handle_recv_error(err).await;
                    return InputOutcome::CloseConnection;
                }
            }
        }

        self.drain_output().await;

        if filled {
            InputOutcome::DataStillToHandle
        } else {
            InputOutcome::AllDataHandled
        }
    }

    /// Thread-safe enqueue of a filled output buffer (spec.md §6).
    pub fn send_output(&self, buffer: OutputBuffer) {
        self.output_sender().send(buffer);
    }

    /// Idempotent shutdown: closes every stream, then the channel.
    pub async fn close(&mut self) {
        if self.state == ConnState::Closed {
            return;
        }
        self.state = ConnState::Closed;

        if let Some(mut channel) = self.channel.take() {
            let _ = channel.shutdown().await;
        }
        if let Some(on_close) = self.on_close.take() {
            on_close();
        }
    }

    async fn send_initial_settings(&mut self) {
        let frame = self.server_settings.to_frame();
        self.encode_and_queue(frame.into()).await;
    }

    async fn read_preface(&mut self) -> bool {
        let channel = match self.channel.as_mut() {
            Some(c) => c,
            None => return false,
        };

        while !self.input.available(PREFACE.len()) {
            if self.input.add_data(channel).await.is_err() {
                return false;
            }
        }

        self.input.mark();
        let mut buf = [0u8; PREFACE.len()];
        self.input.read_bytes(&mut buf);
        if buf == *PREFACE {
            true
        } else {
            self.input.reset_to_mark();
            false
        }
    }

    async fn fill_input(&mut self) -> std::io::Result<bool> {
        let channel = self.channel.as_mut().expect("handle_input called before reset");
        self.input.add_data(channel).await
    }

    async fn dispatch_frame(&mut self, frame: Frame) -> Result<(), RecvError> {
        // RFC 9113 §3.4: the first frame a peer sends after the preface
        // must be SETTINGS.
        if self.state == ConnState::AwaitingSettings && !matches!(frame, Frame::Settings(_)) {
            return Err(RecvError::Connection(Reason::PROTOCOL_ERROR));
        }

        match frame {
            Frame::Settings(settings) => self.handle_settings(settings).await,
            Frame::Ping(ping) => self.handle_ping(ping).await,
            Frame::GoAway(goaway) => {
                debug!(last_stream_id = %goaway.last_stream_id(), reason = %goaway.reason(), "peer sent GOAWAY");
                self.state = ConnState::Closed;
                Ok(())
            }
            Frame::WindowUpdate(wu) => self.handle_window_update(wu),
            Frame::Priority(p) => self.handle_priority(p),
            Frame::Reset(rst) => self.handle_reset(rst),
            Frame::Headers(headers) => self.handle_headers(headers),
            Frame::Data(data) => self.handle_data(data).await,
            Frame::PushPromise(_) => Err(RecvError::Connection(Reason::PROTOCOL_ERROR)),
        }
    }

    async fn handle_settings(&mut self, settings: frame::Settings) -> Result<(), RecvError> {
        if settings.is_ack() {
            return Ok(());
        }

        let old_initial_window = self.client_settings.initial_window_size() as i64;

        self.client_settings.apply(&settings)?;

        let new_initial_window = self.client_settings.initial_window_size() as i64;
        if new_initial_window != old_initial_window {
            self.streams
                .apply_initial_window_delta(new_initial_window - old_initial_window)?;
        }

        self.encoder
            .lock()
            .unwrap()
            .set_max_frame_size(self.client_settings.max_frame_size());

        if self.state == ConnState::AwaitingSettings {
            self.state = ConnState::Open;
        }

        self.encode_and_queue(frame::Settings::ack().into()).await;
        Ok(())
    }

    async fn handle_ping(&mut self, ping: frame::Ping) -> Result<(), RecvError> {
        if ping.is_ack() {
            return Ok(());
        }
        trace!("replying to PING");
        self.encode_and_queue(frame::Ping::pong(ping.payload()).into()).await;
        Ok(())
    }

    fn handle_window_update(&mut self, wu: frame::WindowUpdate) -> Result<(), RecvError> {
        if wu.stream_id().is_zero() {
            self.conn_send_flow.apply_frame(&wu).map_err(|e| match e {
                crate::error::FrameError::ZeroIncrement => RecvError::Connection(Reason::PROTOCOL_ERROR),
                _ => RecvError::Connection(Reason::FLOW_CONTROL_ERROR),
            })
        } else {
            let id = wu.stream_id();
            let result = self.streams.with_stream(id, |stream| stream.send_flow.apply_frame(&wu));
            match result {
                Some(Ok(())) => Ok(()),
                Some(Err(crate::error::FrameError::ZeroIncrement)) => {
                    Err(RecvError::Stream { id, reason: Reason::PROTOCOL_ERROR })
                }
                Some(Err(_)) => Err(RecvError::Stream { id, reason: Reason::FLOW_CONTROL_ERROR }),
                None => Err(RecvError::Connection(Reason::PROTOCOL_ERROR)),
            }
        }
    }

    fn handle_priority(&mut self, priority: frame::Priority) -> Result<(), RecvError> {
        // Accepted on IDLE/OPEN/HALF_CLOSED_REMOTE/CLOSED alike; scheduling
        // on it is a non-goal (spec.md §1), so there is nothing further to
        // do once it has parsed successfully.
        let _ = priority;
        Ok(())
    }

    fn handle_reset(&mut self, rst: frame::RstStream) -> Result<(), RecvError> {
        let id = rst.stream_id();
        if !self.streams.contains(id) {
            if self.streams.was_recently_closed(id) {
                return Err(RecvError::Stream { id, reason: Reason::STREAM_CLOSED });
            }
            return Err(RecvError::Connection(Reason::PROTOCOL_ERROR));
        }
        self.streams.with_stream(id, |stream| stream.on_event(StreamEvent::RecvRstStream));
        self.streams.close(id, &self.stream_pool, false);
        Ok(())
    }

    fn handle_headers(&mut self, headers: frame::Headers) -> Result<(), RecvError> {
        let id = headers.stream_id();

        if !self.streams.contains(id) {
            if self.streams.was_recently_closed(id) {
                return Err(RecvError::Stream { id, reason: Reason::STREAM_CLOSED });
            }
            if !self.streams.validate_new_stream_id(id) {
                return Err(RecvError::Connection(Reason::PROTOCOL_ERROR));
            }
            if let Some(max) = self.server_settings.max_concurrent_streams() {
                if self.streams.len() as u32 >= max {
                    return Err(RecvError::Stream { id, reason: Reason::REFUSED_STREAM });
                }
            }
            if self
                .streams
                .open(id, &self.stream_pool, self.client_settings.initial_window_size())
                .is_none()
            {
                return Err(RecvError::Stream { id, reason: Reason::REFUSED_STREAM });
            }
        }

        let end_stream = headers.is_end_stream();
        let (pseudo, fields) = headers.into_parts();

        let closed = self.streams.with_stream(id, |stream| -> Result<bool, RecvError> {
            stream.on_event(StreamEvent::RecvHeaders { end_stream })?;
            stream.set_request(pseudo, fields);
            Ok(stream.state() == StreamState::HalfClosedRemote)
        });

        match closed {
            Some(Ok(true)) => self.dispatch_request(id),
            Some(Ok(false)) => {}
            Some(Err(e)) => return Err(e),
            None => return Err(RecvError::Connection(Reason::PROTOCOL_ERROR)),
        }

        Ok(())
    }

    async fn handle_data(&mut self, data: frame::Data) -> Result<(), RecvError> {
        let id = data.stream_id();
        if !self.streams.contains(id) {
            if self.streams.was_recently_closed(id) {
                return Err(RecvError::Stream { id, reason: Reason::STREAM_CLOSED });
            }
            return Err(RecvError::Connection(Reason::PROTOCOL_ERROR));
        }

        let len = data.payload().len();
        if len > self.conn_recv_flow.available() {
            return Err(RecvError::Connection(Reason::FLOW_CONTROL_ERROR));
        }
        self.conn_recv_flow.consume(len);
        self.conn_recv_unacked += len;

        let end_stream = data.is_end_stream();
        let payload = data.into_payload();

        let result = self.streams.with_stream(id, |stream| -> Result<(bool, Option<u32>), RecvError> {
            if len > stream.recv_flow.available() {
                return Err(RecvError::Stream { id, reason: Reason::FLOW_CONTROL_ERROR });
            }
            stream.on_event(StreamEvent::RecvData { end_stream })?;
            stream.recv_flow.consume(len);
            stream.recv_unacked += len;
            stream.append_body(&payload);

            let half_closed = stream.state() == StreamState::HalfClosedRemote;
            // No point replenishing a window the peer has already said it
            // won't send more DATA against.
            let increment = if half_closed {
                None
            } else {
                due_increment(&mut stream.recv_unacked, stream.recv_flow.initial_window())
            };
            if let Some(inc) = increment {
                let _ = stream.recv_flow.apply_increment(inc);
            }
            Ok((half_closed, increment))
        });

        // Replenish the connection-level window regardless of how the
        // per-stream outcome below turns out, so bulk traffic spread across
        // many streams doesn't stall the whole connection (spec.md §4.7).
        if let Some(inc) = due_increment(&mut self.conn_recv_unacked, self.conn_recv_flow.initial_window()) {
            let _ = self.conn_recv_flow.apply_increment(inc);
            let frame = frame::WindowUpdate::new(StreamId::CONNECTION, inc);
            self.encode_and_queue(frame.into()).await;
        }

        match result {
            Some(Ok((closed, stream_increment))) => {
                if let Some(inc) = stream_increment {
                    let frame = frame::WindowUpdate::new(id, inc);
                    self.encode_and_queue(frame.into()).await;
                }
                if closed {
                    self.dispatch_request(id);
                }
            }
            Some(Err(e)) => return Err(e),
            None => return Err(RecvError::Connection(Reason::PROTOCOL_ERROR)),
        }

        Ok(())
    }

    /// Submits the completed request to the dispatcher (spec.md §4.5/§5):
    /// the connection task continues processing the next frame while the
    /// handler runs concurrently.
    fn dispatch_request(&self, id: StreamId) {
        let built = self.streams.with_stream(id, |stream| {
            let pseudo = stream.pseudo().cloned().unwrap_or_default();
            dispatch::build_request(&pseudo, stream.headers().clone(), Bytes::copy_from_slice(stream.body()))
        });

        let request = match built {
            Some(Ok(request)) => request,
            _ => return,
        };

        let sink = ConnectionResponseSink {
            stream_id: id,
            sender: self.output_sender(),
            encoder: Arc::clone(&self.encoder),
            streams: Arc::clone(&self.streams),
            stream_pool: Arc::clone(&self.stream_pool),
            output_buffer_capacity: self.config.output_buffer_capacity,
        };

        if let Some(timeout) = self.config.stream_timeout {
            self.spawn_stream_timeout(id, timeout);
        }

        self.dispatcher.dispatch(StreamRequest { stream_id: id, request }, Box::new(sink));
    }

    /// Cancels a dispatched stream that hasn't produced a response within
    /// `timeout` (spec.md §5's stream-level timeout): sends RST_STREAM(CANCEL)
    /// and removes it from the table. A handler that finishes right as the
    /// timer fires may race this -- `Streams::close` is a no-op for an id
    /// already removed, and a stray RST_STREAM on a stream a compliant peer
    /// has already seen fully closed is harmless.
    fn spawn_stream_timeout(&self, id: StreamId, timeout: std::time::Duration) {
        let streams = Arc::clone(&self.streams);
        let stream_pool = Arc::clone(&self.stream_pool);
        let encoder = Arc::clone(&self.encoder);
        let sender = self.output_sender();

        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;

            if !streams.contains(id) {
                return;
            }

            let rst = frame::RstStream::new(id, Reason::CANCEL);
            let mut buf = OutputBuffer::new(OUTPUT_FRAME_PADDING);
            if encoder.lock().unwrap().encode_frame(&Frame::Reset(rst), &mut buf).is_ok() {
                sender.send(buf);
            }
            streams.close(id, &stream_pool, false);
        });
    }

    async fn handle_recv_error(&mut self, err: RecvError) {
        match err {
            RecvError::Stream { id, reason } => {
                warn!(stream_id = %id, %reason, "stream error");
                let rst = frame::RstStream::new(id, reason);
                self.encode_and_queue(rst.into()).await;
                self.streams.close(id, &self.stream_pool, false);
            }
            RecvError::Connection(reason) => {
                warn!(%reason, "connection error");
                self.fail(reason).await;
            }
            RecvError::Io(_) => {
                self.close().await;
            }
        }
    }

    async fn fail(&mut self, reason: Reason) {
        let goaway = frame::GoAway::new(self.streams.last_successful_stream_id(), reason);
        self.encode_and_queue(goaway.into()).await;
        self.drain_output().await;
        self.close().await;
    }

    async fn encode_and_queue(&mut self, frame: Frame) {
        let mut buf = self.output_pool.checkout();
        let encoded = self.encoder.lock().unwrap().encode_frame(&frame, &mut buf);
        if encoded.is_ok() {
            self.output_tx.send(buf).ok();
        }
    }

    async fn drain_output(&mut self) {
        let channel = match self.channel.as_mut() {
            Some(c) => c,
            None => return,
        };

        while let Ok(buffer) = self.output_rx.try_recv() {
            if channel.write_all(buffer.as_slice()).await.is_err() {
                self.state = ConnState::Closed;
                return;
            }
            self.output_pool.release(buffer);
        }
    }
}

/// Decides whether enough unacknowledged bytes have piled up on a
/// receive-side window to justify sending a WINDOW_UPDATE now, rather than
/// waiting for the window to fully drain (spec.md §4.7) -- waiting that
/// long would stall the peer every time the window's worth of data arrives.
/// Resets `unacked` to 0 and returns the increment to send when the
/// threshold (half the initial window) is crossed.
fn due_increment(unacked: &mut usize, initial_window: u32) -> Option<u32> {
    let threshold = (initial_window as usize) / 2;
    if *unacked == 0 || *unacked < threshold {
        return None;
    }
    let increment = *unacked as u32;
    *unacked = 0;
    Some(increment)
}

/// Backs a handler's `ResponseSink` with the connection's shared HPACK
/// encoder and `send_output` (spec.md §6's dispatcher seam). Runs on
/// whatever task the `Dispatcher` chooses to execute the handler on.
struct ConnectionResponseSink {
    stream_id: StreamId,
    sender: OutputSender,
    encoder: Arc<Mutex<FrameEncoder>>,
    /// By the time a handler has a `ResponseSink`, the client side of the
    /// stream is already `HALF_CLOSED_REMOTE` (dispatch only happens once
    /// the request is fully received), so finishing the response -- an
    /// END_STREAM DATA/HEADERS frame or a RST_STREAM -- closes the stream
    /// in both directions at once. Releasing it here, from whichever task
    /// runs the handler, is the "removal triggered from a handler task"
    /// case `Streams` is built to allow (spec.md §5).
    streams: Arc<Streams>,
    stream_pool: Arc<StreamPool>,
    output_buffer_capacity: usize,
}

impl ResponseSink for ConnectionResponseSink {
    fn send_response(&mut self, response: http::Response<()>, end_of_stream: bool) {
        let pseudo = frame::Pseudo::response(response.status());
        let headers = frame::Headers::new(self.stream_id, pseudo, response.headers().clone(), end_of_stream);

        let mut buf = OutputBuffer::new(self.output_buffer_capacity);
        if self
            .encoder
            .lock()
            .unwrap()
            .encode_frame(&Frame::Headers(headers), &mut buf)
            .is_ok()
        {
            self.sender.send(buf);
        }

        if end_of_stream {
            self.streams.close(self.stream_id, &self.stream_pool, true);
        }
    }

    fn send_data(&mut self, data: Bytes, end_of_stream: bool) {
        let len = data.len();
        let frame = frame::Data::new(self.stream_id, data, end_of_stream);

        let mut buf = OutputBuffer::new(len + OUTPUT_FRAME_PADDING);
        if self
            .encoder
            .lock()
            .unwrap()
            .encode_frame(&Frame::Data(frame), &mut buf)
            .is_ok()
        {
            self.sender.send(buf);
        }

        if end_of_stream {
            self.streams.close(self.stream_id, &self.stream_pool, true);
        }
    }

    fn send_reset(&mut self, reason: Reason) {
        let frame = frame::RstStream::new(self.stream_id, reason);

        let mut buf = OutputBuffer::new(OUTPUT_FRAME_PADDING);
        if self
            .encoder
            .lock()
            .unwrap()
            .encode_frame(&Frame::Reset(frame), &mut buf)
            .is_ok()
        {
            self.sender.send(buf);
        }

        self.streams.close(self.stream_id, &self.stream_pool, false);
    }
}
