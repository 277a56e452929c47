//! WASAPI microphone input.
//!
//! Captures from a WASAPI capture endpoint in shared mode on a dedicated
//! MMCSS-registered thread and delivers Float32 packets via the
//! `AudioBufferCallback`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, SyncSender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use windows::core::*;
use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::*;
use windows::Win32::System::Threading::*;

use speech_capture_core::{
    AudioBufferCallback, AudioInput, AudioSource, AudioTransportType, CaptureError, InputConstraints,
    StreamErrorCallback, StreamInfo,
};

use crate::com::ComScope;
use crate::device_enumerator::DeviceEnumerator;
use crate::error::{WasapiError, WinResultExt};
use crate::permissions;

/// How long `open` waits for the capture thread to report its format.
const OPEN_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared-mode buffer duration in 100 ns units (100 ms).
const BUFFER_DURATION: i64 = 1_000_000;

const WAVE_FORMAT_IEEE_FLOAT: u16 = 0x0003;
const WAVE_FORMAT_EXTENSIBLE: u16 = 0xFFFE;
const KSDATAFORMAT_SUBTYPE_IEEE_FLOAT: GUID = GUID::from_u128(0x00000003_0000_0010_8000_00aa00389b71);

/// Format the capture thread reports once the stream is running.
struct NativeFormat {
    sample_rate: u32,
    channels: u16,
    device: AudioSource,
}

/// WASAPI microphone capture.
///
/// COM objects never leave the capture thread; `open` and `close` only
/// exchange the stream format and a stop flag with it.
pub struct WasapiMicCapture {
    device_id: Option<String>,
    device_name: String,
    is_default: bool,
    transport_type: Option<AudioTransportType>,
    running: Arc<AtomicBool>,
    capture_handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl WasapiMicCapture {
    /// Capture from the system default microphone.
    pub fn default_device() -> Self {
        Self {
            device_id: None,
            device_name: "Default Microphone".into(),
            is_default: true,
            transport_type: None,
            running: Arc::new(AtomicBool::new(false)),
            capture_handle: Mutex::new(None),
        }
    }

    /// Capture from a specific microphone listed by `DeviceEnumerator`.
    pub fn with_device(source: &AudioSource) -> Self {
        Self {
            device_id: Some(source.id.clone()),
            device_name: source.name.clone(),
            is_default: source.is_default,
            transport_type: source.transport_type,
            running: Arc::new(AtomicBool::new(false)),
            capture_handle: Mutex::new(None),
        }
    }

    fn join_capture_thread(&self) {
        if let Some(handle) = self.capture_handle.lock().take() {
            if handle.join().is_err() {
                log::error!("Mic capture thread panicked");
            }
        }
    }
}

impl AudioInput for WasapiMicCapture {
    fn is_supported() -> bool {
        permissions::audio_apis_available()
    }

    fn is_available(&self) -> bool {
        let Ok(_com) = ComScope::enter() else {
            return false;
        };
        DeviceEnumerator::new()
            .map(|e| e.has_capture_device())
            .unwrap_or(false)
    }

    fn open(
        &mut self,
        constraints: &InputConstraints,
        callback: AudioBufferCallback,
        on_stream_error: StreamErrorCallback,
    ) -> std::result::Result<StreamInfo, CaptureError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(CaptureError::ConfigurationFailed(
                "mic capture already running".into(),
            ));
        }

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let device_id = constraints.device_id.clone().or_else(|| self.device_id.clone());
        let constraints = constraints.clone();
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);

        let handle = thread::Builder::new()
            .name("wasapi-mic-capture".into())
            .spawn(move || {
                let mut started = false;
                let result = mic_capture_loop(
                    &running,
                    device_id.as_deref(),
                    &constraints,
                    callback,
                    &ready_tx,
                    &mut started,
                );
                if let Err(e) = result {
                    log::error!("Mic capture error: {}", e);
                    let error = CaptureError::from(e);
                    if !started {
                        let _ = ready_tx.try_send(Err(error));
                    } else if running.load(Ordering::SeqCst) {
                        on_stream_error(error);
                    }
                }
                running.store(false, Ordering::SeqCst);
            })
            .map_err(|e| CaptureError::Unknown(format!("failed to spawn mic thread: {}", e)))?;
        *self.capture_handle.lock() = Some(handle);

        match ready_rx.recv_timeout(OPEN_TIMEOUT) {
            Ok(Ok(format)) => {
                self.device_name = format.device.name.clone();
                self.transport_type = format.device.transport_type;
                Ok(StreamInfo {
                    native_sample_rate: format.sample_rate,
                    channels: format.channels,
                    device: format.device,
                })
            }
            Ok(Err(e)) => {
                self.running.store(false, Ordering::SeqCst);
                self.join_capture_thread();
                Err(e)
            }
            Err(_) => {
                self.running.store(false, Ordering::SeqCst);
                self.join_capture_thread();
                Err(CaptureError::DeviceUnavailable)
            }
        }
    }

    fn close(&mut self) -> std::result::Result<(), CaptureError> {
        self.running.store(false, Ordering::SeqCst);
        self.join_capture_thread();
        Ok(())
    }

    fn device_info(&self) -> AudioSource {
        AudioSource {
            id: self.device_id.clone().unwrap_or_else(|| "default-mic".into()),
            name: self.device_name.clone(),
            is_default: self.is_default,
            transport_type: self.transport_type,
        }
    }
}

/// Tag the stream as voice communications so Windows inserts its
/// echo-cancellation, noise-suppression and AGC processing where the
/// driver provides it. Must run before `Initialize`.
unsafe fn request_voice_processing(audio_client: &IAudioClient) {
    let client2: IAudioClient2 = match audio_client.cast() {
        Ok(c) => c,
        Err(e) => {
            log::warn!("IAudioClient2 unavailable, voice processing hints ignored: {}", e);
            return;
        }
    };

    let properties = AudioClientProperties {
        cbSize: std::mem::size_of::<AudioClientProperties>() as u32,
        bIsOffload: false.into(),
        eCategory: AudioCategory_Communications,
        Options: AUDCLNT_STREAMOPTIONS_NONE,
    };
    if let Err(e) = client2.SetClientProperties(&properties) {
        log::warn!("SetClientProperties(Communications) failed: {}", e);
    }
}

/// Capture loop running on a dedicated thread.
///
/// Sequence:
/// 1. Enter COM (MTA)
/// 2. Resolve the endpoint (explicit, communications or console default)
/// 3. Activate IAudioClient, apply voice-processing category
/// 4. Initialize in shared mode with the device mix format
/// 5. Report the native format back to `open` and set `started`
/// 6. Register with MMCSS, start, poll for packets until `running` clears
fn mic_capture_loop(
    running: &AtomicBool,
    device_id: Option<&str>,
    constraints: &InputConstraints,
    mut callback: AudioBufferCallback,
    ready_tx: &SyncSender<std::result::Result<NativeFormat, CaptureError>>,
    started: &mut bool,
) -> std::result::Result<(), WasapiError> {
    let _com = ComScope::enter()?;
    let enumerator = DeviceEnumerator::new()?;
    let device = enumerator.capture_endpoint(device_id, constraints.echo_cancellation)?;
    let source = enumerator.describe(&device);

    unsafe {
        let audio_client: IAudioClient = device.Activate(CLSCTX_ALL, None).context("IMMDevice::Activate")?;

        if constraints.wants_voice_processing() {
            request_voice_processing(&audio_client);
        }

        let mix_format_ptr = audio_client.GetMixFormat().context("GetMixFormat")?;
        let mix_format = &*mix_format_ptr;
        let sample_rate = mix_format.nSamplesPerSec;
        let channels = mix_format.nChannels;
        let bits = mix_format.wBitsPerSample;
        let tag = mix_format.wFormatTag;
        let sub_format = if tag == WAVE_FORMAT_EXTENSIBLE && mix_format.cbSize >= 22 {
            let extensible = mix_format_ptr as *const WAVEFORMATEXTENSIBLE;
            Some(std::ptr::addr_of!((*extensible).SubFormat).read_unaligned())
        } else {
            None
        };

        if !is_float32_format(tag, bits, sub_format) {
            CoTaskMemFree(Some(mix_format_ptr as *const _ as *const _));
            return Err(WasapiError::UnsupportedFormat(format!(
                "{} Hz, {} ch, {}-bit, tag {:#06x}",
                sample_rate, channels, bits, tag
            )));
        }

        let init = audio_client.Initialize(
            AUDCLNT_SHAREMODE_SHARED,
            AUDCLNT_STREAMFLAGS_NOPERSIST,
            BUFFER_DURATION,
            0,
            mix_format,
            None,
        );
        CoTaskMemFree(Some(mix_format_ptr as *const _ as *const _));
        init.context("IAudioClient::Initialize")?;

        let capture_client: IAudioCaptureClient = audio_client.GetService().context("GetService")?;

        let mut task_index: u32 = 0;
        let _mmcss_handle = AvSetMmThreadCharacteristicsW(w!("Pro Audio"), &mut task_index);

        audio_client.Start().context("IAudioClient::Start")?;

        log::info!(
            "WASAPI mic '{}' started: {} Hz, {} ch, voice processing {}",
            source.name,
            sample_rate,
            channels,
            if constraints.wants_voice_processing() { "requested" } else { "off" }
        );
        let _ = ready_tx.send(Ok(NativeFormat {
            sample_rate,
            channels,
            device: source,
        }));
        *started = true;

        let mut silence: Vec<f32> = Vec::new();
        let outcome = poll_packets(running, &capture_client, sample_rate, channels, &mut callback, &mut silence);

        let _ = audio_client.Stop();
        outcome
    }
}

/// Whether a mix format carries 32-bit IEEE float samples.
fn is_float32_format(tag: u16, bits: u16, sub_format: Option<GUID>) -> bool {
    if bits != 32 {
        return false;
    }
    match tag {
        WAVE_FORMAT_IEEE_FLOAT => true,
        WAVE_FORMAT_EXTENSIBLE => sub_format == Some(KSDATAFORMAT_SUBTYPE_IEEE_FLOAT),
        _ => false,
    }
}

unsafe fn poll_packets(
    running: &AtomicBool,
    capture_client: &IAudioCaptureClient,
    sample_rate: u32,
    channels: u16,
    callback: &mut AudioBufferCallback,
    silence: &mut Vec<f32>,
) -> std::result::Result<(), WasapiError> {
    while running.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(10));

        let mut packet_length = capture_client.GetNextPacketSize().context("GetNextPacketSize")?;

        while packet_length > 0 {
            let mut buffer_ptr: *mut u8 = std::ptr::null_mut();
            let mut num_frames: u32 = 0;
            let mut flags: u32 = 0;

            capture_client
                .GetBuffer(&mut buffer_ptr, &mut num_frames, &mut flags, None, None)
                .context("GetBuffer")?;

            if num_frames > 0 && !buffer_ptr.is_null() {
                let total_samples = num_frames as usize * channels as usize;

                if flags & (AUDCLNT_BUFFERFLAGS_SILENT.0 as u32) != 0 {
                    if silence.len() < total_samples {
                        silence.resize(total_samples, 0.0);
                    }
                    callback(&silence[..total_samples], sample_rate, channels);
                } else {
                    let samples = std::slice::from_raw_parts(buffer_ptr as *const f32, total_samples);
                    callback(samples, sample_rate, channels);
                }
            }

            capture_client.ReleaseBuffer(num_frames).context("ReleaseBuffer")?;
            packet_length = capture_client.GetNextPacketSize().context("GetNextPacketSize")?;
        }
    }
    Ok(())
}
