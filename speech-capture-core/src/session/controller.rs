use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::models::audio_models::{AudioSource, CaptureSessionDiagnostics};
use crate::models::config::CaptureConfiguration;
use crate::models::error::CaptureError;
use crate::models::state::{CaptureState, CaptureStatus};
use crate::models::stream::AudioStreamHandle;
use crate::traits::audio_input::{AudioBufferCallback, AudioInput, StreamErrorCallback};
use crate::traits::capture_delegate::CaptureDelegate;
use crate::traits::transport_channel::TransportChannel;

use super::block_pipeline::BlockPipeline;
use super::shared::Shared;

/// Capture lifecycle orchestrator.
///
/// Generic over the microphone backend via the `AudioInput` trait. Owns the
/// open stream, wires the device callback to
/// resample → PCM16 → `realtime_input` envelope → transport channel, and
/// reports state and errors to a `CaptureDelegate`.
///
/// ```text
/// idle ──start_capture──▶ capturing ──stop_capture──▶ idle
/// ```
///
/// One controller drives at most one capture at a time. After `destroy` it
/// refuses to start again; construct a new controller instead.
pub struct CaptureController<I: AudioInput> {
    input: I,
    config: CaptureConfiguration,
    shared: Arc<Shared>,
    stream: Option<AudioStreamHandle>,
    destroyed: bool,
}

impl<I: AudioInput> CaptureController<I> {
    pub fn new(input: I, config: CaptureConfiguration) -> Result<Self, CaptureError> {
        config.validate().map_err(CaptureError::ConfigurationFailed)?;
        Ok(Self {
            input,
            config,
            shared: Arc::new(Shared::new()),
            stream: None,
            destroyed: false,
        })
    }

    /// Whether the host exposes the audio APIs `I` needs. No side effects.
    pub fn is_supported() -> bool {
        I::is_supported()
    }

    pub fn config(&self) -> &CaptureConfiguration {
        &self.config
    }

    pub fn set_delegate(&mut self, delegate: Arc<dyn CaptureDelegate>) {
        if self.destroyed {
            log::warn!("Ignoring delegate on a destroyed capture controller");
            return;
        }
        self.shared.set_delegate(Some(delegate));
    }

    /// Attach the channel audio frames are sent on. May be swapped while capturing.
    pub fn set_transport_channel(&mut self, channel: Arc<dyn TransportChannel>) {
        if self.destroyed {
            log::warn!("Ignoring transport channel on a destroyed capture controller");
            return;
        }
        self.shared.set_channel(Some(channel));
    }

    pub fn clear_transport_channel(&mut self) {
        self.shared.set_channel(None);
    }

    pub fn state(&self) -> CaptureState {
        self.shared.state()
    }

    pub fn status(&self) -> CaptureStatus {
        CaptureStatus {
            is_capturing: self.shared.state().is_capturing(),
        }
    }

    pub fn diagnostics(&self) -> CaptureSessionDiagnostics {
        self.shared.diagnostics()
    }

    /// The open stream, if capturing.
    pub fn stream(&self) -> Option<&AudioStreamHandle> {
        self.stream.as_ref()
    }

    pub fn available_audio_sources(&self) -> Vec<AudioSource> {
        if self.input.is_available() {
            vec![self.input.device_info()]
        } else {
            Vec::new()
        }
    }

    /// Start capture. Transitions: idle → capturing. No-op if already capturing.
    ///
    /// On failure the state stays idle and the delegate receives one error.
    pub fn start_capture(&mut self) -> Result<(), CaptureError> {
        if self.destroyed {
            return Err(CaptureError::Destroyed);
        }
        if self.stream.is_some() {
            if self.shared.is_accepting() {
                log::debug!("start_capture while capturing; ignoring");
                return Ok(());
            }
            // The previous stream failed underneath us; release it first.
            self.release_stream();
        }

        let session_id = uuid::Uuid::new_v4().to_string();
        self.shared.begin_session(session_id.clone());

        let constraints = self.config.input_constraints();
        let callback = self.make_callback();
        let on_stream_error = self.make_error_sink();
        let info = match self.input.open(&constraints, callback, on_stream_error) {
            Ok(info) => info,
            Err(e) => {
                self.shared.report("failed to start audio capture", e.clone());
                return Err(e);
            }
        };

        log::info!(
            "Capture session {} started on '{}' at {} Hz, {} ch -> {} Hz",
            session_id,
            info.device.name,
            info.native_sample_rate,
            info.channels,
            self.config.target_sample_rate
        );
        self.shared.info.lock().native_format =
            format!("{} Hz, {} ch", info.native_sample_rate, info.channels);
        self.stream = Some(AudioStreamHandle::new(info));

        self.shared.transition(CaptureState::Capturing);
        self.shared.start_accepting();
        Ok(())
    }

    /// Stop capture and release the device. Transitions: capturing → idle.
    ///
    /// Idempotent: a second call does nothing and notifies no one.
    pub fn stop_capture(&mut self) {
        self.shared.stop_accepting();
        if !self.release_stream() {
            return;
        }

        let d = self.diagnostics();
        log::info!(
            "Capture session {} stopped: {} frames sent, {} dropped, {} errors",
            d.session_id.as_deref().unwrap_or("-"),
            d.frames_sent,
            d.frames_dropped,
            d.processing_errors
        );
        self.shared.transition(CaptureState::Idle);
    }

    /// Stop, then detach the channel and delegate. The controller cannot be restarted.
    pub fn destroy(&mut self) {
        self.stop_capture();
        self.shared.set_channel(None);
        self.shared.set_delegate(None);
        self.destroyed = true;
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Close the input behind the current stream, if any.
    fn release_stream(&mut self) -> bool {
        let Some(mut stream) = self.stream.take() else {
            return false;
        };
        if stream.mark_closed() {
            if let Err(e) = self.input.close() {
                log::warn!("Error while closing audio input: {}", e);
            }
        }
        true
    }

    fn make_error_sink(&self) -> StreamErrorCallback {
        let shared = Arc::clone(&self.shared);
        Box::new(move |error: CaptureError| shared.stream_failed(error))
    }

    fn make_callback(&self) -> AudioBufferCallback {
        let shared = Arc::clone(&self.shared);
        let mut pipeline = BlockPipeline::new(&self.config);

        Box::new(move |samples: &[f32], sample_rate: u32, channels: u16| {
            if !shared.is_accepting() {
                return;
            }
            shared.counters.device_callbacks.fetch_add(1, Ordering::Relaxed);

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                pipeline.push(samples, sample_rate, channels, &shared);
            }));
            if let Err(payload) = outcome {
                pipeline.reset();
                let detail = panic_message(payload.as_ref());
                shared.report(
                    "audio callback panicked",
                    CaptureError::ProcessingError(detail),
                );
            }
        })
    }
}

impl<I: AudioInput> Drop for CaptureController<I> {
    fn drop(&mut self) {
        self.stop_capture();
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    use base64::Engine;
    use parking_lot::Mutex;

    use super::*;
    use crate::models::config::HandshakeConfig;
    use crate::transport::handshake::AuthenticatedChannel;
    use crate::models::audio_models::AudioLevels;
    use crate::models::error::CaptureErrorReport;
    use crate::test_support::{MockChannel, MockInput, MockInputHandle};
    use crate::traits::capture_delegate::CaptureCallbacks;
    use crate::traits::transport_channel::ChannelState;
    use crate::transport::envelope::decode_realtime_input;

    #[derive(Default)]
    struct RecordingDelegate {
        states: Mutex<Vec<CaptureState>>,
        errors: Mutex<Vec<CaptureErrorReport>>,
        audio: Mutex<Vec<(usize, AudioLevels)>>,
    }

    impl CaptureDelegate for RecordingDelegate {
        fn on_state_changed(&self, state: CaptureState) {
            self.states.lock().push(state);
        }

        fn on_error(&self, report: &CaptureErrorReport) {
            self.errors.lock().push(report.clone());
        }

        fn on_audio_data(&self, frame: &[i16], levels: &AudioLevels) {
            self.audio.lock().push((frame.len(), *levels));
        }
    }

    struct Harness {
        controller: CaptureController<MockInput>,
        device: MockInputHandle,
        channel: Arc<MockChannel>,
        delegate: Arc<RecordingDelegate>,
    }

    fn harness(native_rate: u32, channel_state: ChannelState) -> Harness {
        let (input, device) = MockInput::new(native_rate);
        let mut controller = CaptureController::new(input, CaptureConfiguration::default()).unwrap();
        let channel = Arc::new(MockChannel::new(channel_state));
        let delegate = Arc::new(RecordingDelegate::default());
        controller.set_transport_channel(channel.clone());
        controller.set_delegate(delegate.clone());
        Harness {
            controller,
            device,
            channel,
            delegate,
        }
    }

    #[test]
    fn end_to_end_48k_block() {
        let mut h = harness(48000, ChannelState::Open);
        h.controller.start_capture().unwrap();

        h.device.push(&vec![0.5f32; 4096], 48000, 1);

        let sent = h.channel.sent();
        assert_eq!(sent.len(), 1);
        let pcm = decode_realtime_input(&sent[0]).unwrap();
        assert_eq!(pcm.len(), 1365);
        assert!(pcm.iter().all(|&v| v == 16383));

        let value: serde_json::Value = serde_json::from_str(&sent[0]).unwrap();
        assert_eq!(value["type"], "realtime_input");
        let data = value["media_chunks"][0]["data"].as_str().unwrap();
        let bytes = base64::engine::general_purpose::STANDARD.decode(data).unwrap();
        assert_eq!(bytes.len(), 2730);

        let d = h.controller.diagnostics();
        assert_eq!(d.frames_sent, 1);
        assert_eq!(d.bytes_sent, 2730);
        assert_eq!(d.native_format, "48000 Hz, 1 ch");
        assert!(d.session_id.is_some());

        let audio = h.delegate.audio.lock();
        assert_eq!(audio.len(), 1);
        assert_eq!(audio[0].0, 1365);
        approx::assert_relative_eq!(audio[0].1.peak, 0.5, epsilon = 1e-6);
    }

    #[test]
    fn packets_are_reblocked_to_block_size() {
        let mut h = harness(16000, ChannelState::Open);
        h.controller.start_capture().unwrap();

        // 10 ms packets: 4096 samples needs 41 of them.
        for _ in 0..40 {
            h.device.push(&[0.1f32; 100], 16000, 1);
        }
        assert_eq!(h.channel.send_count(), 0);

        h.device.push(&[0.1f32; 100], 16000, 1);
        assert_eq!(h.channel.send_count(), 1);
        // Identity rate: one block in, one 4096-word frame out.
        assert_eq!(decode_realtime_input(&h.channel.sent()[0]).unwrap().len(), 4096);

        // A single oversized packet yields several blocks.
        h.device.push(&vec![0.1f32; 4096 * 3], 16000, 1);
        assert_eq!(h.channel.send_count(), 4);
    }

    #[test]
    fn stereo_device_is_downmixed() {
        let (input, device) = MockInput::new(48000);
        let input = input.with_channels(2);
        let mut controller = CaptureController::new(input, CaptureConfiguration::default()).unwrap();
        let channel = Arc::new(MockChannel::new(ChannelState::Open));
        controller.set_transport_channel(channel.clone());
        controller.start_capture().unwrap();

        let stereo: Vec<f32> = (0..4096).flat_map(|_| [1.0f32, 0.0]).collect();
        device.push(&stereo, 48000, 2);

        let pcm = decode_realtime_input(&channel.sent()[0]).unwrap();
        assert_eq!(pcm.len(), 1365);
        assert!(pcm.iter().all(|&v| v == 16383));
    }

    #[test]
    fn frames_dropped_while_channel_not_open() {
        let mut h = harness(48000, ChannelState::Connecting);
        h.controller.start_capture().unwrap();

        h.device.push(&vec![0.2f32; 4096], 48000, 1);
        h.channel.set_state(ChannelState::Closing);
        h.device.push(&vec![0.2f32; 4096], 48000, 1);
        h.channel.set_state(ChannelState::Closed);
        h.device.push(&vec![0.2f32; 4096], 48000, 1);

        assert_eq!(h.channel.send_count(), 0);
        assert_eq!(h.controller.diagnostics().frames_dropped, 3);
        assert!(h.delegate.errors.lock().is_empty());

        h.channel.set_state(ChannelState::Open);
        h.device.push(&vec![0.2f32; 4096], 48000, 1);
        assert_eq!(h.channel.send_count(), 1);
    }

    #[test]
    fn frames_dropped_without_channel() {
        let (input, device) = MockInput::new(48000);
        let mut controller = CaptureController::new(input, CaptureConfiguration::default()).unwrap();
        controller.start_capture().unwrap();

        device.push(&vec![0.2f32; 4096], 48000, 1);
        assert_eq!(controller.diagnostics().frames_dropped, 1);
    }

    #[test]
    fn start_and_stop_are_idempotent() {
        let mut h = harness(48000, ChannelState::Open);

        h.controller.start_capture().unwrap();
        h.controller.start_capture().unwrap();
        assert_eq!(h.device.open_count(), 1);
        assert_eq!(*h.delegate.states.lock(), vec![CaptureState::Capturing]);
        assert!(h.controller.status().is_capturing);

        h.controller.stop_capture();
        h.controller.stop_capture();
        assert_eq!(h.device.close_count(), 1);
        assert_eq!(
            *h.delegate.states.lock(),
            vec![CaptureState::Capturing, CaptureState::Idle]
        );
        assert!(!h.controller.status().is_capturing);
        assert!(h.controller.stream().is_none());
    }

    #[test]
    fn restart_after_stop_opens_again() {
        let mut h = harness(48000, ChannelState::Open);
        h.controller.start_capture().unwrap();
        let first = h.controller.diagnostics().session_id;
        h.controller.stop_capture();
        h.controller.start_capture().unwrap();

        assert_eq!(h.device.open_count(), 2);
        assert_ne!(h.controller.diagnostics().session_id, first);
        assert_eq!(h.controller.stream().map(|s| s.native_sample_rate()), Some(48000));
    }

    #[test]
    fn permission_denied_keeps_idle_and_reports_once() {
        let (input, device) = MockInput::failing(CaptureError::PermissionDenied);
        let mut controller = CaptureController::new(input, CaptureConfiguration::default()).unwrap();
        let delegate = Arc::new(RecordingDelegate::default());
        controller.set_delegate(delegate.clone());

        assert_eq!(controller.start_capture(), Err(CaptureError::PermissionDenied));
        assert_eq!(controller.state(), CaptureState::Idle);
        assert!(delegate.states.lock().is_empty());

        let errors = delegate.errors.lock();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].cause, CaptureError::PermissionDenied);
        assert_eq!(device.open_count(), 0);
    }

    #[test]
    fn device_unavailable_is_reported() {
        let (input, _device) = MockInput::failing(CaptureError::DeviceUnavailable);
        let mut controller = CaptureController::new(input, CaptureConfiguration::default()).unwrap();
        assert!(controller.available_audio_sources().is_empty());
        assert_eq!(controller.start_capture(), Err(CaptureError::DeviceUnavailable));
        assert!(!controller.status().is_capturing);
    }

    #[test]
    fn constraints_reach_the_device() {
        let (input, device) = MockInput::new(44100);
        let config = CaptureConfiguration {
            noise_suppression: false,
            ..Default::default()
        };
        let mut controller = CaptureController::new(input, config).unwrap();
        controller.start_capture().unwrap();

        let constraints = device.last_constraints().unwrap();
        assert_eq!(constraints.channel_count, 1);
        assert!(constraints.echo_cancellation);
        assert!(!constraints.noise_suppression);
        assert!(constraints.auto_gain_control);
    }

    #[test]
    fn processing_error_is_isolated_to_one_block() {
        let mut h = harness(48000, ChannelState::Open);
        h.controller.start_capture().unwrap();

        // A zero native rate cannot be resampled.
        h.device.push(&vec![0.5f32; 4096], 0, 1);
        assert_eq!(h.controller.state(), CaptureState::Capturing);
        {
            let errors = h.delegate.errors.lock();
            assert_eq!(errors.len(), 1);
            assert!(matches!(errors[0].cause, CaptureError::ProcessingError(_)));
        }
        assert_eq!(h.channel.send_count(), 0);

        h.device.push(&vec![0.5f32; 4096], 48000, 1);
        assert_eq!(h.channel.send_count(), 1);
        assert_eq!(h.delegate.errors.lock().len(), 1);
        assert_eq!(h.controller.diagnostics().processing_errors, 1);
    }

    #[test]
    fn panic_in_callback_is_contained() {
        let mut h = harness(48000, ChannelState::Open);
        h.controller.start_capture().unwrap();

        h.channel.panic_next_send();
        h.device.push(&vec![0.5f32; 4096], 48000, 1);

        assert_eq!(h.controller.state(), CaptureState::Capturing);
        {
            let errors = h.delegate.errors.lock();
            assert_eq!(errors.len(), 1);
            assert_eq!(
                errors[0].cause,
                CaptureError::ProcessingError("simulated failure while sending".into())
            );
        }

        h.device.push(&vec![0.5f32; 4096], 48000, 1);
        assert_eq!(h.channel.send_count(), 1);
        assert_eq!(h.delegate.errors.lock().len(), 1);
    }

    #[test]
    fn send_failure_is_reported_and_capture_continues() {
        let mut h = harness(48000, ChannelState::Open);
        h.controller.start_capture().unwrap();

        h.channel.fail_next_sends(true);
        h.device.push(&vec![0.5f32; 4096], 48000, 1);
        h.channel.fail_next_sends(false);
        h.device.push(&vec![0.5f32; 4096], 48000, 1);

        let errors = h.delegate.errors.lock();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0].cause, CaptureError::TransportError(_)));
        assert_eq!(h.channel.send_count(), 1);
    }

    #[test]
    fn late_callback_after_stop_is_ignored() {
        let mut h = harness(48000, ChannelState::Open);
        h.controller.start_capture().unwrap();
        h.controller.stop_capture();

        h.device.push(&vec![0.5f32; 4096], 48000, 1);
        assert_eq!(h.channel.send_count(), 0);
        assert_eq!(h.controller.diagnostics().device_callback_count, 0);
    }

    #[test]
    fn destroy_detaches_and_refuses_restart() {
        let mut h = harness(48000, ChannelState::Open);
        h.controller.start_capture().unwrap();
        h.controller.destroy();

        assert!(h.controller.is_destroyed());
        assert!(!h.device.is_open());
        assert_eq!(h.controller.start_capture(), Err(CaptureError::Destroyed));
        assert_eq!(h.device.open_count(), 1);

        // Observers were cleared: only the transitions before destroy were seen.
        assert_eq!(
            *h.delegate.states.lock(),
            vec![CaptureState::Capturing, CaptureState::Idle]
        );
        assert!(h.delegate.errors.lock().is_empty());
        assert_eq!(Arc::strong_count(&h.channel), 1);
    }

    #[test]
    fn dropping_controller_releases_device() {
        let (input, device) = MockInput::new(48000);
        {
            let mut controller = CaptureController::new(input, CaptureConfiguration::default()).unwrap();
            controller.start_capture().unwrap();
        }
        assert_eq!(device.close_count(), 1);
    }

    #[test]
    fn closure_callbacks_receive_events() {
        let (input, device) = MockInput::new(16000);
        let mut controller = CaptureController::new(input, CaptureConfiguration::default()).unwrap();

        let states = Arc::new(Mutex::new(Vec::new()));
        let frames = Arc::new(Mutex::new(0usize));
        let states_seen = Arc::clone(&states);
        let frames_seen = Arc::clone(&frames);
        controller.set_delegate(Arc::new(
            CaptureCallbacks::new()
                .on_state_change(move |s| states_seen.lock().push(s))
                .on_audio_data(move |_, _| *frames_seen.lock() += 1),
        ));
        controller.set_transport_channel(Arc::new(MockChannel::new(ChannelState::Open)));

        controller.start_capture().unwrap();
        device.push(&vec![0.0f32; 4096], 16000, 1);
        controller.stop_capture();

        assert_eq!(*states.lock(), vec![CaptureState::Capturing, CaptureState::Idle]);
        assert_eq!(*frames.lock(), 1);
    }

    #[test]
    fn rejects_invalid_configuration() {
        let (input, _device) = MockInput::new(48000);
        let config = CaptureConfiguration {
            target_sample_rate: 0,
            ..Default::default()
        };
        assert!(matches!(
            CaptureController::new(input, config),
            Err(CaptureError::ConfigurationFailed(_))
        ));
    }

    #[test]
    fn support_check_delegates_to_input() {
        assert!(CaptureController::<MockInput>::is_supported());
    }

    #[test]
    fn audio_is_held_back_until_authenticated() {
        let mut h = harness(48000, ChannelState::Open);
        let socket = Arc::new(MockChannel::new(ChannelState::Open));
        let channel = Arc::new(
            AuthenticatedChannel::new(Arc::clone(&socket), HandshakeConfig::new("secret")).unwrap(),
        );
        h.controller.set_transport_channel(channel.clone());
        h.controller.start_capture().unwrap();

        channel.on_open().unwrap();
        h.device.push(&vec![0.5f32; 4096], 48000, 1);
        assert_eq!(socket.send_count(), 1, "only authenticate goes out");
        assert_eq!(h.controller.diagnostics().frames_dropped, 1);

        channel.on_message(r#"{"type":"auth_success"}"#);
        h.device.push(&vec![0.5f32; 4096], 48000, 1);

        let sent = socket.sent();
        assert_eq!(sent.len(), 2);
        assert!(sent[0].contains(r#""type":"authenticate""#));
        assert_eq!(decode_realtime_input(&sent[1]).unwrap().len(), 1365);
        assert_eq!(h.controller.diagnostics().frames_sent, 1);
    }

    #[test]
    fn callback_does_not_wait_on_controller_locks() {
        let mut h = harness(48000, ChannelState::Open);
        h.controller.start_capture().unwrap();

        let state_guard = h.controller.shared.state.lock();
        let info_guard = h.controller.shared.info.lock();

        let device = h.device.clone();
        let (done_tx, done_rx) = mpsc::channel();
        thread::spawn(move || {
            device.push(&vec![0.5f32; 4096], 48000, 1);
            let _ = done_tx.send(());
        });
        assert!(done_rx.recv_timeout(Duration::from_secs(2)).is_ok());

        drop(info_guard);
        drop(state_guard);
        assert_eq!(h.channel.send_count(), 1);
        assert_eq!(h.controller.diagnostics().device_callback_count, 1);
    }

    #[test]
    fn stream_failure_reports_once_and_goes_idle() {
        let mut h = harness(48000, ChannelState::Open);
        h.controller.start_capture().unwrap();

        h.device.fail_stream(CaptureError::DeviceUnavailable);
        assert_eq!(h.controller.state(), CaptureState::Idle);
        assert!(!h.controller.status().is_capturing);
        {
            let errors = h.delegate.errors.lock();
            assert_eq!(errors.len(), 1);
            assert_eq!(errors[0].cause, CaptureError::DeviceUnavailable);
        }
        assert_eq!(
            *h.delegate.states.lock(),
            vec![CaptureState::Capturing, CaptureState::Idle]
        );

        // Buffers still in flight from the dead stream are ignored.
        h.device.push(&vec![0.5f32; 4096], 48000, 1);
        assert_eq!(h.channel.send_count(), 0);

        // Restarting releases the dead stream and opens a fresh one.
        h.controller.start_capture().unwrap();
        assert_eq!(h.device.close_count(), 1);
        assert_eq!(h.device.open_count(), 2);
        assert_eq!(h.controller.state(), CaptureState::Capturing);
        h.device.push(&vec![0.5f32; 4096], 48000, 1);
        assert_eq!(h.channel.send_count(), 1);
        assert_eq!(h.delegate.errors.lock().len(), 1);
    }

    #[test]
    fn stream_failure_after_stop_is_not_reported() {
        let mut h = harness(48000, ChannelState::Open);
        h.controller.start_capture().unwrap();
        h.controller.stop_capture();

        h.device.fail_stream(CaptureError::DeviceUnavailable);
        assert!(h.delegate.errors.lock().is_empty());
        assert_eq!(
            *h.delegate.states.lock(),
            vec![CaptureState::Capturing, CaptureState::Idle]
        );
    }

    #[test]
    fn buffers_delivered_during_open_are_ignored() {
        let (input, device) = MockInput::new(48000);
        let input = input.with_primed_packet(vec![0.5f32; 4096]);
        let mut controller = CaptureController::new(input, CaptureConfiguration::default()).unwrap();
        let channel = Arc::new(MockChannel::new(ChannelState::Open));
        controller.set_transport_channel(channel.clone());

        controller.start_capture().unwrap();
        assert_eq!(channel.send_count(), 0);
        assert_eq!(controller.diagnostics().device_callback_count, 0);

        device.push(&vec![0.5f32; 4096], 48000, 1);
        assert_eq!(channel.send_count(), 1);
    }
}
