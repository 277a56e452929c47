use super::audio_models::AudioSource;

/// Constraints passed to the platform when opening an input stream.
///
/// The voice-processing flags are hints: the platform applies them at the
/// driver or OS level where supported and ignores them otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputConstraints {
    pub channel_count: u16,
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
    /// Specific device ID, or None for the system default.
    pub device_id: Option<String>,
}

impl InputConstraints {
    pub fn wants_voice_processing(&self) -> bool {
        self.echo_cancellation || self.noise_suppression || self.auto_gain_control
    }
}

impl Default for InputConstraints {
    fn default() -> Self {
        Self {
            channel_count: 1,
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
            device_id: None,
        }
    }
}

/// Format reported by the platform once a stream is open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamInfo {
    /// Native sample rate in Hz. Chosen by the device, never by the caller.
    pub native_sample_rate: u32,
    /// Channels per interleaved frame as delivered to the callback.
    pub channels: u16,
    pub device: AudioSource,
}

/// A live OS-level capture session, owned by the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioStreamHandle {
    info: StreamInfo,
    open: bool,
}

impl AudioStreamHandle {
    pub fn new(info: StreamInfo) -> Self {
        Self { info, open: true }
    }

    pub fn native_sample_rate(&self) -> u32 {
        self.info.native_sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.info.channels
    }

    pub fn device(&self) -> &AudioSource {
        &self.info.device
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Marks the handle closed. Returns false if it was already closed.
    pub fn mark_closed(&mut self) -> bool {
        std::mem::replace(&mut self.open, false)
    }
}
