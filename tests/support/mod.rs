//! Shared frame-building helpers for the integration tests, grounded in
//! `carllerche-h2/tests/support/mod.rs`'s `frames` builder module but
//! rewritten against raw wire bytes instead of the teacher's own `Frame`
//! types, since these tests only see this crate's public API.

#![allow(dead_code)]

use h2_core::{Config, Dispatcher, ResponseSink, StreamRequest};

pub const PREFACE: &[u8] = b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n";

pub const KIND_DATA: u8 = 0x0;
pub const KIND_HEADERS: u8 = 0x1;
pub const KIND_RST_STREAM: u8 = 0x3;
pub const KIND_SETTINGS: u8 = 0x4;
pub const KIND_PING: u8 = 0x6;
pub const KIND_GOAWAY: u8 = 0x7;
pub const KIND_WINDOW_UPDATE: u8 = 0x8;

pub const FLAG_ACK: u8 = 0x1;
pub const FLAG_END_STREAM: u8 = 0x1;
pub const FLAG_END_HEADERS: u8 = 0x4;

pub const SETTINGS_MAX_CONCURRENT_STREAMS: u16 = 0x3;
pub const SETTINGS_INITIAL_WINDOW_SIZE: u16 = 0x4;

fn frame_header(length: usize, kind: u8, flags: u8, stream_id: u32) -> [u8; 9] {
    let len = length as u32;
    [
        (len >> 16) as u8,
        (len >> 8) as u8,
        len as u8,
        kind,
        flags,
        (stream_id >> 24) as u8,
        (stream_id >> 16) as u8,
        (stream_id >> 8) as u8,
        stream_id as u8,
    ]
}

pub fn settings_frame(params: &[(u16, u32)]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(params.len() * 6);
    for (id, value) in params {
        payload.extend_from_slice(&id.to_be_bytes());
        payload.extend_from_slice(&value.to_be_bytes());
    }
    let mut frame = frame_header(payload.len(), KIND_SETTINGS, 0, 0).to_vec();
    frame.extend_from_slice(&payload);
    frame
}

pub fn settings_ack() -> Vec<u8> {
    frame_header(0, KIND_SETTINGS, FLAG_ACK, 0).to_vec()
}

pub fn ping_frame(ack: bool, data: u64) -> Vec<u8> {
    let flags = if ack { FLAG_ACK } else { 0 };
    let mut frame = frame_header(8, KIND_PING, flags, 0).to_vec();
    frame.extend_from_slice(&data.to_be_bytes());
    frame
}

/// RFC 7541 §6.2.1 "Literal Header Field with Incremental Indexing — New
/// Name" representation, plain (no Huffman). Sufficient for headers short
/// enough that the length prefix never needs continuation bytes, which is
/// all this test suite's fixtures need.
pub fn hpack_literal_block(headers: &[(&str, &str)]) -> Vec<u8> {
    let mut block = Vec::new();
    for (name, value) in headers {
        assert!(name.len() < 127 && value.len() < 127, "fixture header too long for plain HPACK literal");
        block.push(0x40);
        block.push(name.len() as u8);
        block.extend_from_slice(name.as_bytes());
        block.push(value.len() as u8);
        block.extend_from_slice(value.as_bytes());
    }
    block
}

pub fn headers_frame(stream_id: u32, headers: &[(&str, &str)], end_stream: bool) -> Vec<u8> {
    let block = hpack_literal_block(headers);
    let mut flags = FLAG_END_HEADERS;
    if end_stream {
        flags |= FLAG_END_STREAM;
    }
    let mut frame = frame_header(block.len(), KIND_HEADERS, flags, stream_id).to_vec();
    frame.extend_from_slice(&block);
    frame
}

pub fn data_frame(stream_id: u32, payload: &[u8], end_stream: bool) -> Vec<u8> {
    let flags = if end_stream { FLAG_END_STREAM } else { 0 };
    let mut frame = frame_header(payload.len(), KIND_DATA, flags, stream_id).to_vec();
    frame.extend_from_slice(payload);
    frame
}

pub fn window_update_frame(stream_id: u32, increment: u32) -> Vec<u8> {
    let mut frame = frame_header(4, KIND_WINDOW_UPDATE, 0, stream_id).to_vec();
    frame.extend_from_slice(&increment.to_be_bytes());
    frame
}

pub fn rst_stream_frame(stream_id: u32, error_code: u32) -> Vec<u8> {
    let mut frame = frame_header(4, KIND_RST_STREAM, 0, stream_id).to_vec();
    frame.extend_from_slice(&error_code.to_be_bytes());
    frame
}

/// A decoded frame header plus its raw payload, for assertions against
/// whatever the connection writes back.
pub struct RecvFrame {
    pub kind: u8,
    pub flags: u8,
    pub stream_id: u32,
    pub payload: Vec<u8>,
}

pub async fn read_frame<R>(io: &mut R) -> RecvFrame
where
    R: tokio::io::AsyncRead + Unpin,
{
    use tokio::io::AsyncReadExt;

    let mut head = [0u8; 9];
    io.read_exact(&mut head).await.expect("expected a frame header, got EOF/closed socket");

    let length = ((head[0] as usize) << 16) | ((head[1] as usize) << 8) | head[2] as usize;
    let kind = head[3];
    let flags = head[4];
    let stream_id = u32::from_be_bytes([head[5], head[6], head[7], head[8]]) & !(1 << 31);

    let mut payload = vec![0u8; length];
    if length > 0 {
        io.read_exact(&mut payload).await.expect("expected full frame payload, got EOF");
    }

    RecvFrame { kind, flags, stream_id, payload }
}

pub fn goaway_reason(payload: &[u8]) -> u32 {
    u32::from_be_bytes([payload[4], payload[5], payload[6], payload[7]])
}

pub fn test_config() -> Config {
    Config::builder()
        .max_concurrent_streams(100)
        .input_buffer_capacity(16 * 1024)
        .output_buffer_capacity(16 * 1024)
        .build()
}

/// A dispatcher that should never actually be reached -- used by tests
/// whose scenario is rejected before a request is ever fully received.
pub struct NullDispatcher;

impl Dispatcher for NullDispatcher {
    fn dispatch(&self, _request: StreamRequest, _response_sink: Box<dyn ResponseSink>) {
        panic!("dispatch should not have been called in this scenario");
    }
}

/// Replies to every request with `200 OK` and a short fixed body.
pub struct EchoDispatcher {
    pub body: &'static [u8],
}

impl Dispatcher for EchoDispatcher {
    fn dispatch(&self, _request: StreamRequest, mut response_sink: Box<dyn ResponseSink>) {
        let response = http::Response::builder().status(200).body(()).unwrap();
        response_sink.send_response(response, false);
        response_sink.send_data(bytes::Bytes::from_static(self.body), true);
    }
}
