//! # speech-capture-windows
//!
//! Windows WASAPI backend for speech-capture-core.
//!
//! Provides:
//! - `WasapiMicCapture`: microphone input via a WASAPI capture endpoint,
//!   tagged for communications so OS echo cancellation / noise suppression /
//!   AGC apply where available
//! - `DeviceEnumerator`: capture endpoint enumeration via MMDevice API
//! - `permissions`: Windows microphone privacy check
//!
//! ## Usage
//! ```ignore
//! use speech_capture_core::{CaptureConfiguration, CaptureController};
//! use speech_capture_windows::WasapiMicCapture;
//!
//! let mic = WasapiMicCapture::default_device();
//! let mut controller = CaptureController::new(mic, CaptureConfiguration::default())?;
//! controller.set_transport_channel(channel);
//! controller.start_capture()?;
//! ```

#[cfg(target_os = "windows")]
mod com;
#[cfg(target_os = "windows")]
pub mod device_enumerator;
#[cfg(target_os = "windows")]
pub mod error;
#[cfg(target_os = "windows")]
pub mod permissions;
#[cfg(target_os = "windows")]
pub mod wasapi_mic;

#[cfg(target_os = "windows")]
pub use device_enumerator::DeviceEnumerator;
#[cfg(target_os = "windows")]
pub use error::WasapiError;
#[cfg(target_os = "windows")]
pub use wasapi_mic::WasapiMicCapture;
