use crate::models::audio_models::AudioSource;
use crate::models::error::CaptureError;
use crate::models::stream::{InputConstraints, StreamInfo};

/// Callback invoked when an audio buffer is available.
///
/// Parameters:
/// - `samples`: Interleaved f32 samples.
/// - `sample_rate`: Native sample rate of the delivered audio in Hz.
/// - `channels`: Number of interleaved channels.
///
/// Runs on the platform's real-time audio thread. It must not block.
pub type AudioBufferCallback = Box<dyn FnMut(&[f32], u32, u16) + Send + 'static>;

/// Invoked at most once if the stream fails after `open` has returned,
/// e.g. the device was unplugged. Not invoked for failures caused by `close`.
pub type StreamErrorCallback = Box<dyn FnOnce(CaptureError) + Send + 'static>;

/// Interface for platform-specific microphone inputs.
///
/// Implemented by:
/// - `WasapiMicCapture` (Windows)
pub trait AudioInput: Send {
    /// Whether the host exposes the audio APIs this input needs.
    ///
    /// Must not open devices or trigger permission prompts.
    fn is_supported() -> bool
    where
        Self: Sized;

    /// Whether a capture device is currently available.
    fn is_available(&self) -> bool;

    /// Open the input stream and start delivering buffers via `callback`.
    ///
    /// Returns once the platform has reported the stream format.
    /// Fails with `PermissionDenied` if access is refused and
    /// `DeviceUnavailable` if no input device exists. Later failures go to
    /// `on_stream_error`, after which no more buffers are delivered.
    fn open(
        &mut self,
        constraints: &InputConstraints,
        callback: AudioBufferCallback,
        on_stream_error: StreamErrorCallback,
    ) -> Result<StreamInfo, CaptureError>;

    /// Stop delivering buffers and release OS resources.
    ///
    /// Closing an input that is not open is a no-op.
    fn close(&mut self) -> Result<(), CaptureError>;

    /// Information about the device backing this input.
    fn device_info(&self) -> AudioSource;
}
