use std::time::Duration;

use super::stream::InputConstraints;

/// Sample rate expected by the speech service.
pub const DEFAULT_TARGET_SAMPLE_RATE: u32 = 16_000;

/// Native-rate samples per processing callback.
pub const DEFAULT_BLOCK_SIZE: usize = 4096;

/// Configuration for a capture controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfiguration {
    /// Target sample rate in Hz (default: 16000).
    pub target_sample_rate: u32,

    /// Native-rate samples per block (default: 4096).
    pub block_size: usize,

    /// Number of channels requested from the device (default: 1).
    pub channels: u16,

    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,

    /// Specific microphone device ID, or None for system default.
    pub device_id: Option<String>,
}

impl CaptureConfiguration {
    pub fn validate(&self) -> Result<(), String> {
        if self.target_sample_rate == 0 {
            return Err("target sample rate must be positive".into());
        }
        if !(128..=65536).contains(&self.block_size) {
            return Err(format!("unsupported block size: {}", self.block_size));
        }
        if ![1, 2].contains(&self.channels) {
            return Err(format!("unsupported channel count: {}", self.channels));
        }
        Ok(())
    }

    pub fn input_constraints(&self) -> InputConstraints {
        InputConstraints {
            channel_count: self.channels,
            echo_cancellation: self.echo_cancellation,
            noise_suppression: self.noise_suppression,
            auto_gain_control: self.auto_gain_control,
            device_id: self.device_id.clone(),
        }
    }
}

impl Default for CaptureConfiguration {
    fn default() -> Self {
        Self {
            target_sample_rate: DEFAULT_TARGET_SAMPLE_RATE,
            block_size: DEFAULT_BLOCK_SIZE,
            channels: 1,
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
            device_id: None,
        }
    }
}

/// Configuration for the authentication handshake on a transport channel.
#[derive(Debug, Clone, PartialEq)]
pub struct HandshakeConfig {
    /// Bearer token sent in the `authenticate` message.
    pub token: String,

    /// Optional topic/context payload embedded in the `authenticate` message.
    pub context: Option<serde_json::Value>,

    /// Time allowed for `auth_success` to arrive after the channel opens.
    /// Must stay below the server's own 15 s connection timeout.
    pub timeout: Duration,
}

impl HandshakeConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            context: None,
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.token.is_empty() {
            return Err("authentication token must not be empty".into());
        }
        if self.timeout.is_zero() {
            return Err("handshake timeout must be non-zero".into());
        }
        Ok(())
    }
}
