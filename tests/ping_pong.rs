//! Scenario 8 of spec.md §8: a PING round-trip.

mod support;

use std::sync::Arc;

use tokio::io::AsyncWriteExt;

use support::*;

#[tokio::test]
async fn ping_gets_acked_with_same_payload_and_nothing_else() {
    let (mut client, server) = tokio::io::duplex(4096);

    tokio::spawn(h2_core::serve_connection(server, test_config(), Arc::new(NullDispatcher)));

    client.write_all(PREFACE).await.unwrap();
    client.write_all(&settings_frame(&[])).await.unwrap();
    let _server_settings = read_frame(&mut client).await;
    let _ack = read_frame(&mut client).await;
    client.write_all(&settings_ack()).await.unwrap();

    client.write_all(&ping_frame(false, 784388230)).await.unwrap();

    let pong = read_frame(&mut client).await;
    assert_eq!(pong.kind, KIND_PING);
    assert_eq!(pong.flags, FLAG_ACK);
    assert_eq!(u64::from_be_bytes(pong.payload.try_into().unwrap()), 784388230);
}

#[tokio::test]
async fn ping_ack_from_client_gets_no_response() {
    let (mut client, server) = tokio::io::duplex(4096);

    tokio::spawn(h2_core::serve_connection(server, test_config(), Arc::new(NullDispatcher)));

    client.write_all(PREFACE).await.unwrap();
    client.write_all(&settings_frame(&[])).await.unwrap();
    let _server_settings = read_frame(&mut client).await;
    let _ack = read_frame(&mut client).await;
    client.write_all(&settings_ack()).await.unwrap();

    client.write_all(&ping_frame(true, 1)).await.unwrap();

    // Nothing else the client sent should produce a reply; a follow-up
    // non-ack PING proves the connection is still alive and the ack above
    // was silently dropped rather than queued behind it.
    client.write_all(&ping_frame(false, 2)).await.unwrap();
    let pong = read_frame(&mut client).await;
    assert_eq!(pong.kind, KIND_PING);
    assert_eq!(pong.flags, FLAG_ACK);
    assert_eq!(u64::from_be_bytes(pong.payload.try_into().unwrap()), 2);
}
