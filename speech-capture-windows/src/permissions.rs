//! Windows microphone privacy checks.
//!
//! On Windows 10 1803+, microphone access is controlled by Settings >
//! Privacy > Microphone. Unpackaged desktop apps get no consent dialog:
//! when the toggle is off, activating the capture endpoint fails with
//! `E_ACCESSDENIED`, which `WasapiMicCapture::open` reports as
//! `CaptureError::PermissionDenied`.

use windows::Win32::Foundation::E_ACCESSDENIED;
use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::*;

use speech_capture_core::CaptureError;

use crate::com::ComScope;
use crate::device_enumerator::DeviceEnumerator;

/// Whether the MMDevice API can be instantiated on this host.
///
/// Opens no endpoint, so it never touches privacy settings.
pub fn audio_apis_available() -> bool {
    let Ok(_com) = ComScope::enter() else {
        return false;
    };
    DeviceEnumerator::new().is_ok()
}

/// Check if microphone access is allowed.
///
/// Activates (without starting) an `IAudioClient` on the default capture
/// endpoint. Returns `Ok(false)` if there is no device or access is denied.
pub fn check_microphone_permission() -> Result<bool, CaptureError> {
    let _com = ComScope::enter()?;
    let enumerator = DeviceEnumerator::new()?;

    let Ok(device) = enumerator.capture_endpoint(None, false) else {
        return Ok(false);
    };

    let result: windows::core::Result<IAudioClient> = unsafe { device.Activate(CLSCTX_ALL, None) };
    match result {
        Ok(_) => Ok(true),
        Err(e) if e.code() == E_ACCESSDENIED || e.code() == AUDCLNT_E_DEVICE_IN_USE => Ok(false),
        Err(e) => {
            log::warn!("Unexpected error checking mic permission: {}", e);
            Ok(true)
        }
    }
}
