//! TestChannel: in-process mock device channel.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};

use lumen_lib::config::ChannelConfig;

/// Errors from TestChannel operations.
#[derive(Debug, Error)]
pub enum TestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("peer closed the channel before the expected frame")]
    ClosedEarly,

    #[error("timed out waiting for a frame")]
    Timeout,
}

/// Frame receive timeout. Generous; only hit on regressions.
const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// In-process mock device channel endpoint.
///
/// Binds an ephemeral port and accepts a single device connection.
pub struct TestChannel {
    listener: TcpListener,
    port: u16,
}

impl TestChannel {
    /// Bind a listener on an OS-assigned port.
    pub async fn bind() -> Result<Self, TestError> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();
        Ok(Self { listener, port })
    }

    /// The port the mock channel is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Channel configuration pointing a device at this endpoint.
    pub fn channel_config(&self, ack: bool) -> ChannelConfig {
        ChannelConfig {
            scheme: "ws".to_string(),
            host: format!("127.0.0.1:{}", self.port),
            version: "v1.1".to_string(),
            path: "websocket".to_string(),
            ack,
        }
    }

    /// Accept one device connection, recording the HTTP request path.
    pub async fn accept(self) -> Result<DevicePeer, TestError> {
        let (stream, _) = self.listener.accept().await?;

        let mut request_path = None;
        let ws = accept_hdr_async(stream, |req: &Request, resp: Response| {
            request_path = Some(req.uri().to_string());
            Ok(resp)
        })
        .await?;

        Ok(DevicePeer {
            ws,
            request_path: request_path.unwrap_or_default(),
        })
    }
}

/// Cloud side of an accepted device connection.
pub struct DevicePeer {
    ws: WebSocketStream<TcpStream>,
    request_path: String,
}

impl DevicePeer {
    /// Request path (with query string) the device connected with.
    pub fn request_path(&self) -> &str {
        &self.request_path
    }

    /// Receive the next text frame, parsed as JSON.
    pub async fn recv_json(&mut self) -> Result<serde_json::Value, TestError> {
        loop {
            let message = tokio::time::timeout(RECV_TIMEOUT, self.ws.next())
                .await
                .map_err(|_| TestError::Timeout)?;

            match message {
                Some(Ok(Message::Text(text))) => return Ok(serde_json::from_str(&text)?),
                Some(Ok(Message::Close(_))) | None => return Err(TestError::ClosedEarly),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }

    /// Send an arbitrary JSON frame to the device.
    pub async fn send_json(&mut self, frame: &serde_json::Value) -> Result<(), TestError> {
        self.ws.send(Message::Text(frame.to_string().into())).await?;
        Ok(())
    }

    /// Send a raw text frame (not necessarily valid JSON).
    pub async fn send_text(&mut self, text: &str) -> Result<(), TestError> {
        self.ws.send(Message::Text(text.to_string().into())).await?;
        Ok(())
    }

    /// Send an `action` frame carrying the given action names.
    pub async fn send_actions(&mut self, names: &[&str]) -> Result<(), TestError> {
        let actions: Vec<_> = names
            .iter()
            .map(|name| serde_json::json!({ "name": name, "parameters": {} }))
            .collect();

        self.send_json(&serde_json::json!({
            "type": "action",
            "cid": 1,
            "data": { "actions": actions },
        }))
        .await
    }

    /// Close the connection from the cloud side.
    pub async fn close(mut self) -> Result<(), TestError> {
        self.ws.close(None).await?;
        Ok(())
    }
}
