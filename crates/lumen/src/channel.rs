//! Device channel transport driver.
//!
//! Connects to the cloud channel over WebSocket and feeds transport events
//! into a [`DeviceSession`]: open once, then each text frame in order, then
//! close. Connection failures and mid-session drops end the run — there is
//! no reconnection.

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use lumen_telemetry::events;

use crate::config::{ChannelConfig, DeviceConfig};
use crate::error::ChannelError;
use crate::session::{DeviceSession, MessageSink};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

impl MessageSink for WsSink {
    async fn send_text(&mut self, text: String) -> Result<(), ChannelError> {
        self.send(Message::Text(text.into()))
            .await
            .map_err(ChannelError::Transport)
    }

    async fn close(&mut self) -> Result<(), ChannelError> {
        SinkExt::close(self).await.map_err(ChannelError::Transport)
    }
}

/// One device's connection to the cloud channel.
pub struct DeviceChannel {
    channel: ChannelConfig,
    device: DeviceConfig,
}

impl DeviceChannel {
    pub fn new(channel: ChannelConfig, device: DeviceConfig) -> Self {
        Self { channel, device }
    }

    /// Connect and serve the session until the channel closes, the
    /// transport fails, or the shutdown signal fires.
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) -> Result<(), ChannelError> {
        let url = self.channel.endpoint_url();
        tracing::info!(url = %url, "connecting to device channel");

        let (ws_stream, _response) = connect_async(&url).await.map_err(ChannelError::Connect)?;
        let (sender, mut receiver) = ws_stream.split();

        let mut session = DeviceSession::new(self.device, sender);
        session.handle_open().await?;

        loop {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        tracing::info!("shutting down device channel");
                        session.shutdown().await;
                        return Ok(());
                    }
                }

                result = receiver.next() => {
                    match result {
                        Some(Ok(Message::Text(text))) => {
                            tracing::debug!(frame = %text, "received message");
                            match session.handle_frame(&text).await {
                                Ok(()) => {}
                                Err(ChannelError::Frame(error)) => {
                                    tracing::warn!(
                                        event = events::FRAME_REJECTED,
                                        %error,
                                        "dropping malformed frame"
                                    );
                                }
                                Err(error) => return Err(error),
                            }
                        }
                        Some(Ok(Message::Ping(_))) => {
                            // tungstenite queues the pong reply on its own.
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            session.handle_close();
                            return Ok(());
                        }
                        Some(Err(error)) => {
                            session.handle_close();
                            return Err(ChannelError::Transport(error));
                        }
                        _ => {}
                    }
                }
            }
        }
    }
}
