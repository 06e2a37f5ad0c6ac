//! Error types for the device channel.

use thiserror::Error;
use tokio_tungstenite::tungstenite;

use crate::session::SessionState;

/// Errors surfaced by the session and its transport driver.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The WebSocket handshake failed.
    #[error("failed to connect to device channel: {0}")]
    Connect(#[source] tungstenite::Error),

    /// The transport failed mid-session.
    #[error("websocket transport error: {0}")]
    Transport(#[source] tungstenite::Error),

    /// A send was attempted outside the open state.
    #[error("send attempted while {0:?}: session is not connected")]
    NotConnected(SessionState),

    /// An outbound message could not be serialized.
    #[error("failed to encode outbound message: {0}")]
    Encode(#[from] serde_json::Error),

    /// An inbound frame was not valid JSON. The frame is dropped; the
    /// session survives.
    #[error("malformed inbound frame: {0}")]
    Frame(#[source] serde_json::Error),
}
