#![allow(dead_code)]

use hostlink_bridge::BridgeClient;
use hostlink_mock::MockHost;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn connected_host() -> (MockHost, BridgeClient) {
    init_tracing();
    let host = MockHost::new();
    let client = host.connect();
    (host, client)
}
