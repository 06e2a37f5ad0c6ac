//! The device message session.
//!
//! One session owns one logical connection to the cloud device channel: it
//! registers the device when the connection opens, classifies inbound
//! frames, dispatches recognized actions to the device state, and reports
//! each change back as a field update. Handlers are methods on the session,
//! invoked by the transport driver exactly once per event and strictly in
//! order — one inbound frame is fully processed before the next is read.

use std::future::Future;

use serde_json::json;

use lumen_telemetry::events;

use crate::config::DeviceConfig;
use crate::error::ChannelError;
use crate::protocol::{
    self, Action, DeviceMessage, FieldUpdateMessage, InboundFrame, RegisterMessage,
};

/// Connection lifecycle. Strictly linear; there is no reconnection edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Open,
    Closed,
}

/// Write half of the transport boundary.
///
/// One call transmits one complete, non-fragmented text frame. The session
/// depends on nothing else from the transport.
pub trait MessageSink: Send {
    fn send_text(
        &mut self,
        text: String,
    ) -> impl Future<Output = Result<(), ChannelError>> + Send;

    fn close(&mut self) -> impl Future<Output = Result<(), ChannelError>> + Send;
}

/// Device state reported to the cloud.
///
/// Written on recognized actions, never read back by session logic — the
/// cloud is the authority on current state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceState {
    pub on: bool,
}

/// One device's session on the channel.
pub struct DeviceSession<S> {
    device: DeviceConfig,
    sink: S,
    state: SessionState,
    device_state: DeviceState,
}

impl<S: MessageSink> DeviceSession<S> {
    pub fn new(device: DeviceConfig, sink: S) -> Self {
        Self {
            device,
            sink,
            state: SessionState::Connecting,
            device_state: DeviceState::default(),
        }
    }

    /// Session lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Last state written by an action. Exposed for inspection only.
    pub fn device_state(&self) -> DeviceState {
        self.device_state
    }

    /// The transport signaled readiness. Registers the device, exactly once.
    ///
    /// Registration is fire-and-forget: no reply is awaited, and no inbound
    /// frame ever triggers another register message.
    pub async fn handle_open(&mut self) -> Result<(), ChannelError> {
        if self.state != SessionState::Connecting {
            tracing::warn!(state = ?self.state, "ignoring open event outside connect");
            return Ok(());
        }
        self.state = SessionState::Open;
        tracing::info!(
            event = events::CONNECTED,
            device_id = %self.device.device_id,
            "device channel open"
        );

        let register = RegisterMessage::new(&self.device.device_id, &self.device.device_token);
        self.send_message(&DeviceMessage::Register(register)).await?;
        tracing::info!(
            event = events::REGISTER_SENT,
            device_id = %self.device.device_id,
            "registration sent"
        );
        Ok(())
    }

    /// One inbound frame, fully processed before the driver reads the next.
    pub async fn handle_frame(&mut self, raw: &str) -> Result<(), ChannelError> {
        let frame = protocol::classify(raw).map_err(ChannelError::Frame)?;

        match frame {
            InboundFrame::Action { actions } => self.dispatch_actions(actions).await?,
            InboundFrame::Ping => {
                // Recognized; no response, no mutation.
                tracing::debug!("ping frame received");
            }
            InboundFrame::Other => {
                tracing::debug!("ignoring frame without a recognized type");
            }
        }
        Ok(())
    }

    /// The transport signaled teardown. Log only; no retry, no reconnect.
    pub fn handle_close(&mut self) {
        self.state = SessionState::Closed;
        tracing::info!(
            event = events::DISCONNECTED,
            device_id = %self.device.device_id,
            "device channel closed"
        );
    }

    /// Local teardown: close the sink and leave the session unusable.
    pub async fn shutdown(&mut self) {
        if let Err(error) = self.sink.close().await {
            tracing::debug!(%error, "error closing channel sink");
        }
        self.state = SessionState::Closed;
    }

    /// Apply one batch of actions, in order. An unrecognized or malformed
    /// action never blocks the rest of the batch.
    async fn dispatch_actions(&mut self, actions: Vec<Action>) -> Result<(), ChannelError> {
        for action in actions {
            let Some(name) = action.name.as_deref() else {
                tracing::warn!(event = events::UNKNOWN_ACTION, "action without a name");
                continue;
            };

            match name.to_ascii_uppercase().as_str() {
                "SETON" => self.apply_state(true).await?,
                "SETOFF" => self.apply_state(false).await?,
                _ => {
                    tracing::warn!(
                        event = events::UNKNOWN_ACTION,
                        action = name,
                        "unknown action for device"
                    );
                }
            }
        }
        Ok(())
    }

    /// Flip the device state and report it to the cloud.
    async fn apply_state(&mut self, on: bool) -> Result<(), ChannelError> {
        self.device_state.on = on;
        self.send_field_update(json!({ "state": on })).await
    }

    /// Report a changed device attribute, using the same device id that was
    /// used at registration.
    pub async fn send_field_update(&mut self, data: serde_json::Value) -> Result<(), ChannelError> {
        let update = FieldUpdateMessage::new(&self.device.device_id, data);
        self.send_message(&DeviceMessage::FieldUpdate(update)).await?;
        tracing::info!(
            event = events::FIELD_UPDATE_SENT,
            device_id = %self.device.device_id,
            "field update sent"
        );
        Ok(())
    }

    /// Serialize and transmit one outbound message as a single text frame.
    ///
    /// Valid only while the session is open; sends in any other state fail
    /// with `NotConnected` without touching the transport.
    pub async fn send_message(&mut self, message: &DeviceMessage) -> Result<(), ChannelError> {
        if self.state != SessionState::Open {
            return Err(ChannelError::NotConnected(self.state));
        }

        let text = message.to_text()?;
        tracing::debug!(frame = %text, "sending message");
        self.sink.send_text(text).await
    }
}
