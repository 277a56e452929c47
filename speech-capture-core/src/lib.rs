//! # speech-capture-core
//!
//! Platform-agnostic realtime speech capture core.
//!
//! Takes microphone audio at the device's native rate, decimates it to
//! 16 kHz, quantizes it to 16-bit PCM and streams it as base64
//! `realtime_input` JSON frames over a duplex text channel. Platform
//! backends (Windows WASAPI) implement the `AudioInput` trait and plug into
//! the generic `CaptureController`.
//!
//! ## Architecture
//!
//! ```text
//! speech-capture-core (this crate)
//! ├── traits/       ← AudioInput, CaptureDelegate, TransportChannel
//! ├── models/       ← CaptureError, CaptureState, CaptureConfiguration, AudioStreamHandle, etc.
//! ├── processing/   ← Resampler, PCM16 encoder, RingBuffer, downmix, levels
//! ├── transport/    ← realtime_input envelope, authentication handshake
//! └── session/      ← CaptureController (lifecycle and per-block wiring)
//! ```

pub mod models;
pub mod processing;
pub mod session;
pub mod transport;
pub mod traits;

#[cfg(test)]
mod test_support;

// Re-export key types at crate root for convenience.
pub use models::audio_models::{AudioLevels, AudioSource, AudioTransportType, CaptureSessionDiagnostics};
pub use models::config::{CaptureConfiguration, HandshakeConfig};
pub use models::error::{CaptureError, CaptureErrorReport};
pub use models::state::{CaptureState, CaptureStatus};
pub use models::stream::{AudioStreamHandle, InputConstraints, StreamInfo};
pub use processing::resampler::{resample, Resampler};
pub use processing::ring_buffer::RingBuffer;
pub use session::controller::CaptureController;
pub use traits::audio_input::{AudioBufferCallback, AudioInput, StreamErrorCallback};
pub use traits::capture_delegate::{CaptureCallbacks, CaptureDelegate};
pub use traits::transport_channel::{ChannelState, TransportChannel};
pub use transport::envelope::{decode_realtime_input, FrameEncoder, ServerMessage};
pub use transport::handshake::{AuthenticatedChannel, HandshakePhase};
