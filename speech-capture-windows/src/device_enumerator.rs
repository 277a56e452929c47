//! Capture endpoint enumeration via the MMDevice API.
//!
//! Wraps `IMMDeviceEnumerator` to list microphones with friendly names and
//! transport types, and to resolve the endpoint a capture stream should use.

use windows::core::*;
use windows::Win32::Devices::FunctionDiscovery::*;
use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::*;

use speech_capture_core::{AudioSource, AudioTransportType};

use crate::error::{WasapiError, WinResultExt};

/// Capture device enumerator.
///
/// Requires COM to be initialized on the calling thread.
pub struct DeviceEnumerator {
    enumerator: IMMDeviceEnumerator,
}

impl DeviceEnumerator {
    pub fn new() -> std::result::Result<Self, WasapiError> {
        let enumerator: IMMDeviceEnumerator =
            unsafe { CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL) }
                .context("CoCreateInstance(MMDeviceEnumerator)")?;
        Ok(Self { enumerator })
    }

    /// List active capture (microphone) endpoints.
    pub fn list_capture_devices(&self) -> std::result::Result<Vec<AudioSource>, WasapiError> {
        unsafe {
            let collection = self
                .enumerator
                .EnumAudioEndpoints(eCapture, DEVICE_STATE_ACTIVE)
                .context("EnumAudioEndpoints")?;
            let count = collection.GetCount().context("GetCount")?;

            let default_id = self
                .enumerator
                .GetDefaultAudioEndpoint(eCapture, eConsole)
                .ok()
                .and_then(|d| d.GetId().ok())
                .and_then(|id| id.to_string().ok());

            let mut devices = Vec::new();
            for i in 0..count {
                let Ok(device) = collection.Item(i) else {
                    continue;
                };
                let Some(id) = device.GetId().ok().and_then(|id| id.to_string().ok()) else {
                    continue;
                };

                let name = Self::friendly_name(&device).unwrap_or_else(|| format!("Microphone {}", i + 1));
                let is_default = default_id.as_deref() == Some(id.as_str());
                devices.push(AudioSource {
                    id,
                    name,
                    is_default,
                    transport_type: Some(Self::transport_type(&device)),
                });
            }
            Ok(devices)
        }
    }

    pub fn has_capture_device(&self) -> bool {
        self.list_capture_devices()
            .map(|devices| !devices.is_empty())
            .unwrap_or(false)
    }

    /// Resolve the endpoint to capture from.
    ///
    /// With no explicit ID, the communications-role default is used when
    /// `communications` is set (this is the endpoint Windows attaches its
    /// echo-cancellation chain to), otherwise the console default.
    pub fn capture_endpoint(
        &self,
        device_id: Option<&str>,
        communications: bool,
    ) -> std::result::Result<IMMDevice, WasapiError> {
        unsafe {
            match device_id {
                Some(id) => {
                    let wide_id: Vec<u16> = id.encode_utf16().chain(std::iter::once(0)).collect();
                    self.enumerator
                        .GetDevice(PCWSTR(wide_id.as_ptr()))
                        .map_err(|_| WasapiError::NoDevice)
                }
                None => {
                    let role = if communications { eCommunications } else { eConsole };
                    self.enumerator
                        .GetDefaultAudioEndpoint(eCapture, role)
                        .map_err(|_| WasapiError::NoDevice)
                }
            }
        }
    }

    /// Describe an endpoint as an `AudioSource`.
    pub fn describe(&self, device: &IMMDevice) -> AudioSource {
        let id = unsafe { device.GetId().ok().and_then(|id| id.to_string().ok()) }.unwrap_or_default();
        let default_id = unsafe {
            self.enumerator
                .GetDefaultAudioEndpoint(eCapture, eConsole)
                .ok()
                .and_then(|d| d.GetId().ok())
                .and_then(|id| id.to_string().ok())
        };
        AudioSource {
            is_default: default_id.as_deref() == Some(id.as_str()),
            name: Self::friendly_name(device).unwrap_or_else(|| "Microphone".into()),
            transport_type: Some(Self::transport_type(device)),
            id,
        }
    }

    fn friendly_name(device: &IMMDevice) -> Option<String> {
        unsafe {
            let store = device.OpenPropertyStore(STGM_READ).ok()?;
            let value = store.GetValue(&PKEY_Device_FriendlyName).ok()?;
            let name = value.to_string();
            (!name.is_empty()).then_some(name)
        }
    }

    /// Classify the bus from `PKEY_Device_EnumeratorName` (e.g. "BTHENUM", "USB").
    fn transport_type(device: &IMMDevice) -> AudioTransportType {
        let enumerator_name = unsafe {
            device
                .OpenPropertyStore(STGM_READ)
                .ok()
                .and_then(|store| store.GetValue(&PKEY_Device_EnumeratorName).ok())
                .map(|value| value.to_string())
        };
        match enumerator_name.as_deref() {
            Some(name) if name.contains("BTHLEENUM") => AudioTransportType::BluetoothLE,
            Some(name) if name.contains("BTHENUM") => AudioTransportType::Bluetooth,
            Some(name) if name.contains("USB") => AudioTransportType::Usb,
            Some(name) if name.contains("SWD") => AudioTransportType::Virtual,
            Some(_) => AudioTransportType::BuiltIn,
            None => AudioTransportType::Unknown,
        }
    }
}
