//! The presence-channel seam.

use async_trait::async_trait;
use thiserror::Error;

use super::payload::PresencePayload;

#[derive(Error, Debug)]
pub enum ChannelError {
    /// The peer went away; the caller must reconnect.
    #[error("Presence channel closed: {0}")]
    Closed(String),

    #[error("No presence endpoint found")]
    NotFound,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Presence update rejected: {0}")]
    Rejected(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Presence bridge unavailable: {0}")]
    Unavailable(String),
}

impl ChannelError {
    /// Whether the connection must be re-established before the next push.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed(_))
    }
}

/// A sink for presence payloads.
///
/// The channel owns its connection. `connect` may be called again after a
/// [`ChannelError::Closed`] to re-establish it.
#[async_trait]
pub trait PresenceChannel: Send {
    async fn connect(&mut self) -> Result<(), ChannelError>;

    async fn push(&mut self, payload: &PresencePayload) -> Result<(), ChannelError>;

    /// Remove any displayed activity. Idempotent.
    async fn clear(&mut self) -> Result<(), ChannelError>;
}

#[async_trait]
impl PresenceChannel for Box<dyn PresenceChannel> {
    async fn connect(&mut self) -> Result<(), ChannelError> {
        (**self).connect().await
    }

    async fn push(&mut self, payload: &PresencePayload) -> Result<(), ChannelError> {
        (**self).push(payload).await
    }

    async fn clear(&mut self) -> Result<(), ChannelError> {
        (**self).clear().await
    }
}
