use serde::{Deserialize, Serialize};

/// Transport type for an audio device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AudioTransportType {
    BuiltIn,
    Bluetooth,
    BluetoothLE,
    Usb,
    Virtual,
    Unknown,
}

/// An audio input device available for capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioSource {
    pub id: String,
    pub name: String,
    pub is_default: bool,
    pub transport_type: Option<AudioTransportType>,
}

/// Level metering for one resampled block (RMS and peak, 0.0–1.0).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct AudioLevels {
    pub rms: f32,
    pub peak: f32,
}

/// Counters for debugging a capture session.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CaptureSessionDiagnostics {
    pub session_id: Option<String>,
    pub native_format: String,
    pub device_callback_count: u64,
    pub blocks_processed: u64,
    pub frames_sent: u64,
    /// Blocks discarded because the transport channel was not open.
    pub frames_dropped: u64,
    pub processing_errors: u64,
    pub bytes_sent: u64,
}
