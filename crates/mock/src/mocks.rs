//! Test doubles for the host globals a client normally reads.

use hostlink_bridge::{AssetScheme, BridgeClient, HostMetadata};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

use crate::handler::HostReply;
use crate::host::{Fallback, FallbackFuture, MockHost};

/// Answer every command that has no registered handler with `f(cmd, payload)`.
pub fn mock_ipc<F, Fut>(host: &MockHost, f: F)
where
    F: Fn(String, Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HostReply> + Send + 'static,
{
    let fallback: Fallback = Arc::new(move |cmd: String, payload: Value| -> FallbackFuture {
        Box::pin(f(cmd, payload))
    });
    host.set_fallback(Some(fallback));
}

/// Pretend the client runs in window `current`, with `additional` windows open.
pub fn mock_windows(client: &BridgeClient, current: &str, additional: &[&str]) {
    client.set_metadata(Some(HostMetadata::new(current, additional)));
}

/// Asset URLs use `http://<protocol>.localhost/` on Windows and
/// `<protocol>://localhost/` elsewhere.
pub fn mock_convert_file_src(client: &BridgeClient, os_name: &str) {
    let scheme = if os_name.eq_ignore_ascii_case("windows") {
        AssetScheme::Http
    } else {
        AssetScheme::Custom
    };
    client.set_asset_scheme(Some(scheme));
}

/// Undo `mock_ipc`, `mock_windows` and `mock_convert_file_src`.
pub fn clear_mocks(host: &MockHost, client: &BridgeClient) {
    host.set_fallback(None);
    client.set_metadata(None);
    client.set_asset_scheme(None);
}
