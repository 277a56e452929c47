use thiserror::Error;
use windows::Win32::Foundation::E_ACCESSDENIED;
use windows::Win32::Media::Audio::AUDCLNT_E_DEVICE_INVALIDATED;

use speech_capture_core::CaptureError;

/// A failed WASAPI/COM call, tagged with the API that failed.
#[derive(Debug, Error)]
pub enum WasapiError {
    #[error("{call} failed: {source}")]
    Call {
        call: &'static str,
        #[source]
        source: windows::core::Error,
    },

    #[error("no capture endpoint found")]
    NoDevice,

    #[error("unsupported mix format: {0}")]
    UnsupportedFormat(String),
}

impl From<WasapiError> for CaptureError {
    fn from(e: WasapiError) -> Self {
        match e {
            WasapiError::Call { ref source, .. } if source.code() == E_ACCESSDENIED => {
                CaptureError::PermissionDenied
            }
            WasapiError::Call { ref source, .. } if source.code() == AUDCLNT_E_DEVICE_INVALIDATED => {
                CaptureError::DeviceUnavailable
            }
            WasapiError::NoDevice => CaptureError::DeviceUnavailable,
            WasapiError::UnsupportedFormat(detail) => CaptureError::ConfigurationFailed(detail),
            other => CaptureError::Unknown(other.to_string()),
        }
    }
}

pub(crate) trait WinResultExt<T> {
    fn context(self, call: &'static str) -> Result<T, WasapiError>;
}

impl<T> WinResultExt<T> for windows::core::Result<T> {
    fn context(self, call: &'static str) -> Result<T, WasapiError> {
        self.map_err(|source| WasapiError::Call { call, source })
    }
}
