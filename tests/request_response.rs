//! Scenarios 3, 4 and 5 of spec.md §8: a simple request/response, an
//! even (server-initiated-range) stream id from the client, and
//! RST_STREAM on a stream that was never opened.

mod support;

use std::sync::Arc;

use tokio::io::AsyncWriteExt;

use support::*;

async fn complete_handshake(client: &mut tokio::io::DuplexStream) {
    client.write_all(PREFACE).await.unwrap();
    client.write_all(&settings_frame(&[])).await.unwrap();
    let _server_settings = read_frame(client).await;
    let _ack = read_frame(client).await;
    client.write_all(&settings_ack()).await.unwrap();
}

#[tokio::test]
async fn simple_request_response() {
    let (mut client, server) = tokio::io::duplex(16 * 1024);

    tokio::spawn(h2_core::serve_connection(
        server,
        test_config(),
        Arc::new(EchoDispatcher { body: b"hello" }),
    ));

    complete_handshake(&mut client).await;

    let request = headers_frame(
        1,
        &[
            (":method", "GET"),
            (":scheme", "http"),
            (":path", "/"),
            (":authority", "localhost"),
        ],
        true,
    );
    client.write_all(&request).await.unwrap();

    let headers = read_frame(&mut client).await;
    assert_eq!(headers.kind, KIND_HEADERS);
    assert_eq!(headers.stream_id, 1);

    let data = read_frame(&mut client).await;
    assert_eq!(data.kind, KIND_DATA);
    assert_eq!(data.stream_id, 1);
    assert_eq!(data.flags & FLAG_END_STREAM, FLAG_END_STREAM);
    assert_eq!(data.payload, b"hello");
}

#[tokio::test]
async fn even_stream_id_from_client_is_a_protocol_error() {
    let (mut client, server) = tokio::io::duplex(4096);

    tokio::spawn(h2_core::serve_connection(server, test_config(), Arc::new(NullDispatcher)));

    complete_handshake(&mut client).await;

    let request = headers_frame(2, &[(":method", "GET"), (":scheme", "http"), (":path", "/")], true);
    client.write_all(&request).await.unwrap();

    let goaway = read_frame(&mut client).await;
    assert_eq!(goaway.kind, KIND_GOAWAY);
    assert_eq!(goaway_reason(&goaway.payload), 1, "expected PROTOCOL_ERROR");
}

#[tokio::test]
async fn rst_stream_on_never_opened_stream_is_a_protocol_error() {
    let (mut client, server) = tokio::io::duplex(4096);

    tokio::spawn(h2_core::serve_connection(server, test_config(), Arc::new(NullDispatcher)));

    complete_handshake(&mut client).await;

    client.write_all(&rst_stream_frame(1, 8)).await.unwrap();

    let goaway = read_frame(&mut client).await;
    assert_eq!(goaway.kind, KIND_GOAWAY);
    assert_eq!(goaway_reason(&goaway.payload), 1, "expected PROTOCOL_ERROR");
}
