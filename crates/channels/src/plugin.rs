use std::sync::Arc;

use async_trait::async_trait;

use crate::{Result, inbound::InboundEvent};

/// Receives inbound events from a transport.
///
/// Implementations must tolerate concurrent calls; transports invoke the sink
/// from their own I/O tasks.
#[async_trait]
pub trait InboundSink: Send + Sync {
    async fn on_event(&self, event: InboundEvent);
}

/// Send messages to a channel.
#[async_trait]
pub trait ChannelOutbound: Send + Sync {
    async fn send_text(&self, conversation_id: &str, text: &str) -> Result<()>;

    /// Send a "typing" indicator. No-op by default.
    async fn send_typing(&self, _conversation_id: &str) -> Result<()> {
        Ok(())
    }
}

/// Channel health snapshot.
#[derive(Debug, Clone)]
pub struct ChannelHealthSnapshot {
    pub connected: bool,
    pub details: Option<String>,
}

/// Core channel plugin trait. Each messaging platform implements this.
#[async_trait]
pub trait ChannelPlugin: Send + Sync {
    /// Channel identifier (e.g. "telegram").
    fn id(&self) -> &str;

    /// Connect and start delivering inbound events to `sink`.
    async fn start(&mut self, config: serde_json::Value, sink: Arc<dyn InboundSink>)
    -> Result<()>;

    /// Stop receiving. Sending may fail afterwards.
    async fn stop(&mut self) -> Result<()>;

    /// Outbound adapter for replies.
    fn outbound(&self) -> Arc<dyn ChannelOutbound>;

    /// Probe connection health.
    async fn probe(&self) -> Result<ChannelHealthSnapshot>;
}
