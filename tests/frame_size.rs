//! Scenario 7 of spec.md §8: a HEADERS frame whose payload length exceeds
//! `max_frame_size`. Because HEADERS changes connection state (HPACK),
//! this must be a connection error, not a per-stream one.

mod support;

use std::sync::Arc;

use tokio::io::AsyncWriteExt;

use support::*;

#[tokio::test]
async fn oversize_headers_frame_is_frame_size_error() {
    let (mut client, server) = tokio::io::duplex(64 * 1024);

    // Large enough to stage a frame bigger than the default 16 KiB
    // max_frame_size, so the decoder actually sees the full oversize
    // payload rather than stalling waiting for more bytes.
    let config = h2_core::Config::builder()
        .max_concurrent_streams(100)
        .input_buffer_capacity(64 * 1024)
        .output_buffer_capacity(16 * 1024)
        .build();

    tokio::spawn(h2_core::serve_connection(server, config, Arc::new(NullDispatcher)));

    client.write_all(PREFACE).await.unwrap();
    client.write_all(&settings_frame(&[])).await.unwrap();
    let server_settings = read_frame(&mut client).await;
    let _ack = read_frame(&mut client).await;

    let max_frame_size = server_settings
        .payload
        .chunks(6)
        .find(|p| u16::from_be_bytes([p[0], p[1]]) == 0x5)
        .map(|p| u32::from_be_bytes([p[2], p[3], p[4], p[5]]))
        .unwrap_or(16 * 1024);

    // 9-byte header claiming a payload one byte over the limit; content is
    // never inspected since the frame-size check runs before HPACK decode.
    let oversize_len = max_frame_size as usize + 1;
    let mut frame = vec![
        (oversize_len >> 16) as u8,
        (oversize_len >> 8) as u8,
        oversize_len as u8,
        KIND_HEADERS,
        FLAG_END_HEADERS | FLAG_END_STREAM,
        0,
        0,
        0,
        1,
    ];
    frame.extend(std::iter::repeat(0u8).take(oversize_len));
    client.write_all(&frame).await.unwrap();

    let goaway = read_frame(&mut client).await;
    assert_eq!(goaway.kind, KIND_GOAWAY);
    assert_eq!(goaway_reason(&goaway.payload), 6, "expected FRAME_SIZE_ERROR");
}
