//! Scenario 6 of spec.md §8: two WINDOW_UPDATE frames on stream 0 whose
//! increments sum to 2^31, overflowing the connection send window.

mod support;

use std::sync::Arc;

use tokio::io::AsyncWriteExt;

use support::*;

#[tokio::test]
async fn window_update_sum_overflowing_2_31_is_flow_control_error() {
    let (mut client, server) = tokio::io::duplex(4096);

    tokio::spawn(h2_core::serve_connection(server, test_config(), Arc::new(NullDispatcher)));

    client.write_all(PREFACE).await.unwrap();
    client.write_all(&settings_frame(&[])).await.unwrap();
    let _server_settings = read_frame(&mut client).await;
    let _ack = read_frame(&mut client).await;

    // Each increment alone keeps the window under 2^31-1; together they
    // push it to exactly 2^31.
    let half = 1u32 << 30;
    client.write_all(&window_update_frame(0, half)).await.unwrap();
    client.write_all(&window_update_frame(0, half)).await.unwrap();

    let goaway = read_frame(&mut client).await;
    assert_eq!(goaway.kind, KIND_GOAWAY);
    assert_eq!(goaway_reason(&goaway.payload), 3, "expected FLOW_CONTROL_ERROR");
}
