use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_APP_NAME, DEFAULT_APP_VERSION, PROTOCOL_VERSION};
use crate::types::NavigatorSnapshot;

/// Handshake sent once after every successful open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hello {
    pub app: String,
    pub version: String,
    pub protocol: u32,
}

impl Hello {
    /// Creates a handshake for the current protocol version.
    pub fn new(app: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            version: version.into(),
            protocol: PROTOCOL_VERSION,
        }
    }
}

impl Default for Hello {
    fn default() -> Self {
        Self::new(DEFAULT_APP_NAME, DEFAULT_APP_VERSION)
    }
}

/// Frames sent from the client to the Host.
///
/// Serialized flat, with the variant name in the `command` field:
/// `{"command":"hello","app":"shop","version":"1.2.0","protocol":1}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command")]
pub enum ClientFrame {
    #[serde(rename = "hello")]
    Hello(Hello),
    #[serde(rename = "nav:snapshot")]
    NavSnapshot(NavigatorSnapshot),
}

impl ClientFrame {
    /// Returns the `command` tag of this frame.
    pub fn command(&self) -> &'static str {
        match self {
            ClientFrame::Hello(_) => crate::constants::COMMAND_HELLO,
            ClientFrame::NavSnapshot(_) => crate::constants::COMMAND_NAV_SNAPSHOT,
        }
    }

    /// Serializes the frame to JSON text.
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl From<Hello> for ClientFrame {
    fn from(hello: Hello) -> Self {
        ClientFrame::Hello(hello)
    }
}

impl From<NavigatorSnapshot> for ClientFrame {
    fn from(snapshot: NavigatorSnapshot) -> Self {
        ClientFrame::NavSnapshot(snapshot)
    }
}
