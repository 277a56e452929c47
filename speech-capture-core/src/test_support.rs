//! In-memory `AudioInput` and `TransportChannel` used by unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::audio_models::{AudioSource, AudioTransportType};
use crate::models::error::CaptureError;
use crate::models::stream::{InputConstraints, StreamInfo};
use crate::traits::audio_input::{AudioBufferCallback, AudioInput, StreamErrorCallback};
use crate::traits::transport_channel::{ChannelState, TransportChannel};

#[derive(Default)]
struct MockInputInner {
    callback: Option<AudioBufferCallback>,
    on_stream_error: Option<StreamErrorCallback>,
    open_count: usize,
    close_count: usize,
    is_open: bool,
    last_constraints: Option<InputConstraints>,
}

/// Test handle for pushing device buffers into a `MockInput`.
#[derive(Clone, Default)]
pub struct MockInputHandle(Arc<Mutex<MockInputInner>>);

impl MockInputHandle {
    /// Invoke the registered callback synchronously, as the audio thread would.
    ///
    /// The callback is retained after `close` so tests can simulate a late
    /// callback racing teardown.
    pub fn push(&self, samples: &[f32], sample_rate: u32, channels: u16) {
        let mut inner = self.0.lock();
        if let Some(callback) = inner.callback.as_mut() {
            callback(samples, sample_rate, channels);
        }
    }

    /// Fail the running stream, as an unplugged device would.
    pub fn fail_stream(&self, error: CaptureError) {
        let sink = self.0.lock().on_stream_error.take();
        if let Some(sink) = sink {
            sink(error);
        }
    }

    pub fn open_count(&self) -> usize {
        self.0.lock().open_count
    }

    pub fn close_count(&self) -> usize {
        self.0.lock().close_count
    }

    pub fn is_open(&self) -> bool {
        self.0.lock().is_open
    }

    pub fn last_constraints(&self) -> Option<InputConstraints> {
        self.0.lock().last_constraints.clone()
    }
}

pub struct MockInput {
    handle: MockInputHandle,
    native_rate: u32,
    channels: u16,
    open_error: Option<CaptureError>,
    primed_packet: Option<Vec<f32>>,
}

impl MockInput {
    pub fn new(native_rate: u32) -> (Self, MockInputHandle) {
        let handle = MockInputHandle::default();
        let input = Self {
            handle: handle.clone(),
            native_rate,
            channels: 1,
            open_error: None,
            primed_packet: None,
        };
        (input, handle)
    }

    pub fn failing(error: CaptureError) -> (Self, MockInputHandle) {
        let (mut input, handle) = Self::new(48000);
        input.open_error = Some(error);
        (input, handle)
    }

    pub fn with_channels(mut self, channels: u16) -> Self {
        self.channels = channels;
        self
    }

    /// Deliver `samples` from inside `open`, before it returns.
    pub fn with_primed_packet(mut self, samples: Vec<f32>) -> Self {
        self.primed_packet = Some(samples);
        self
    }
}

impl AudioInput for MockInput {
    fn is_supported() -> bool {
        true
    }

    fn is_available(&self) -> bool {
        self.open_error != Some(CaptureError::DeviceUnavailable)
    }

    fn open(
        &mut self,
        constraints: &InputConstraints,
        mut callback: AudioBufferCallback,
        on_stream_error: StreamErrorCallback,
    ) -> Result<StreamInfo, CaptureError> {
        let mut inner = self.handle.0.lock();
        inner.last_constraints = Some(constraints.clone());
        if let Some(e) = &self.open_error {
            return Err(e.clone());
        }
        if let Some(samples) = &self.primed_packet {
            callback(samples, self.native_rate, self.channels);
        }
        inner.open_count += 1;
        inner.is_open = true;
        inner.callback = Some(callback);
        inner.on_stream_error = Some(on_stream_error);
        Ok(StreamInfo {
            native_sample_rate: self.native_rate,
            channels: self.channels,
            device: self.device_info(),
        })
    }

    fn close(&mut self) -> Result<(), CaptureError> {
        let mut inner = self.handle.0.lock();
        if inner.is_open {
            inner.is_open = false;
            inner.close_count += 1;
        }
        inner.on_stream_error = None;
        Ok(())
    }

    fn device_info(&self) -> AudioSource {
        AudioSource {
            id: "mock-mic".into(),
            name: "Mock Microphone".into(),
            is_default: true,
            transport_type: Some(AudioTransportType::Virtual),
        }
    }
}

/// Records every message sent; state is settable from the test.
pub struct MockChannel {
    state: Mutex<ChannelState>,
    sent: Mutex<Vec<String>>,
    close_count: AtomicUsize,
    fail_sends: AtomicBool,
    panic_on_send: AtomicBool,
}

impl MockChannel {
    pub fn new(state: ChannelState) -> Self {
        Self {
            state: Mutex::new(state),
            sent: Mutex::new(Vec::new()),
            close_count: AtomicUsize::new(0),
            fail_sends: AtomicBool::new(false),
            panic_on_send: AtomicBool::new(false),
        }
    }

    pub fn set_state(&self, state: ChannelState) {
        *self.state.lock() = state;
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    pub fn send_count(&self) -> usize {
        self.sent.lock().len()
    }

    pub fn close_count(&self) -> usize {
        self.close_count.load(Ordering::SeqCst)
    }

    pub fn fail_next_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Panic on the next send only.
    pub fn panic_next_send(&self) {
        self.panic_on_send.store(true, Ordering::SeqCst);
    }
}

impl TransportChannel for MockChannel {
    fn ready_state(&self) -> ChannelState {
        *self.state.lock()
    }

    fn send_text(&self, text: &str) -> Result<(), CaptureError> {
        if self.panic_on_send.swap(false, Ordering::SeqCst) {
            panic!("simulated failure while sending");
        }
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(CaptureError::TransportError("socket buffer full".into()));
        }
        self.sent.lock().push(text.to_string());
        Ok(())
    }

    fn close(&self) {
        self.close_count.fetch_add(1, Ordering::SeqCst);
        *self.state.lock() = ChannelState::Closed;
    }
}
