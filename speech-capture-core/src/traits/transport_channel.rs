use crate::models::error::CaptureError;

/// Lifecycle of a duplex transport channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Connecting,
    Open,
    Closing,
    Closed,
}

impl ChannelState {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }
}

/// A text-oriented duplex channel owned by an external connection manager.
///
/// The capture controller only reads `ready_state` and calls `send_text`;
/// it never opens or closes the channel.
pub trait TransportChannel: Send + Sync {
    /// Current state, readable without blocking.
    fn ready_state(&self) -> ChannelState;

    /// Queue one text message. Must not wait for network acknowledgment.
    fn send_text(&self, text: &str) -> Result<(), CaptureError>;

    /// Begin closing the channel.
    fn close(&self);
}

impl<T: TransportChannel + ?Sized> TransportChannel for std::sync::Arc<T> {
    fn ready_state(&self) -> ChannelState {
        (**self).ready_state()
    }

    fn send_text(&self, text: &str) -> Result<(), CaptureError> {
        (**self).send_text(text)
    }

    fn close(&self) {
        (**self).close()
    }
}
