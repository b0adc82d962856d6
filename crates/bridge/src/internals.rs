//! Host-provided metadata and asset URL conversion.

use serde::{Deserialize, Serialize};

/// How the host exposes local files to the webview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetScheme {
    /// `<protocol>://localhost/<path>`
    Custom,
    /// `http://<protocol>.localhost/<path>`, used where custom schemes are unsupported.
    Http,
}

pub const DEFAULT_ASSET_PROTOCOL: &str = "asset";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowMetadata {
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostMetadata {
    pub windows: Vec<WindowMetadata>,
    pub current_window: WindowMetadata,
}

impl HostMetadata {
    pub fn new(current: &str, additional: &[&str]) -> Self {
        let windows = std::iter::once(current)
            .chain(additional.iter().copied())
            .map(|label| WindowMetadata {
                label: label.to_string(),
            })
            .collect();

        Self {
            windows,
            current_window: WindowMetadata {
                label: current.to_string(),
            },
        }
    }

    pub fn labels(&self) -> Vec<&str> {
        self.windows.iter().map(|w| w.label.as_str()).collect()
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct HostInternals {
    pub metadata: Option<HostMetadata>,
    pub asset_scheme: Option<AssetScheme>,
}

/// Escapes `urlencoding` applies that URI components leave literal.
const URI_COMPONENT_SAFE: [(&str, &str); 5] = [
    ("%21", "!"),
    ("%27", "'"),
    ("%28", "("),
    ("%29", ")"),
    ("%2A", "*"),
];

/// Percent-encode `raw` as a URI component: everything but `A-Za-z0-9-_.!~*'()`.
pub fn encode_uri_component(raw: &str) -> String {
    URI_COMPONENT_SAFE
        .iter()
        .fold(urlencoding::encode(raw).into_owned(), |encoded, &(escaped, plain)| {
            encoded.replace(escaped, plain)
        })
}

/// Build the URL under which the host serves `file_path`.
pub fn convert_file_src(scheme: AssetScheme, file_path: &str, protocol: &str) -> String {
    let path = encode_uri_component(file_path);
    match scheme {
        AssetScheme::Http => format!("http://{}.localhost/{}", protocol, path),
        AssetScheme::Custom => format!("{}://localhost/{}", protocol, path),
    }
}
