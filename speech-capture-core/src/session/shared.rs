use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::{ArcSwapOption, Guard};
use parking_lot::Mutex;

use crate::models::audio_models::CaptureSessionDiagnostics;
use crate::models::error::{CaptureError, CaptureErrorReport};
use crate::models::state::CaptureState;
use crate::traits::capture_delegate::CaptureDelegate;
use crate::traits::transport_channel::TransportChannel;

pub(crate) type ChannelSlot = Guard<Option<Arc<Arc<dyn TransportChannel>>>>;
pub(crate) type DelegateSlot = Guard<Option<Arc<Arc<dyn CaptureDelegate>>>>;

/// Per-session counters, bumped from the audio thread.
#[derive(Default)]
pub(crate) struct Counters {
    pub device_callbacks: AtomicU64,
    pub blocks_processed: AtomicU64,
    pub frames_sent: AtomicU64,
    pub frames_dropped: AtomicU64,
    pub processing_errors: AtomicU64,
    pub bytes_sent: AtomicU64,
}

impl Counters {
    fn reset(&self) {
        for counter in [
            &self.device_callbacks,
            &self.blocks_processed,
            &self.frames_sent,
            &self.frames_dropped,
            &self.processing_errors,
            &self.bytes_sent,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

#[derive(Default)]
pub(crate) struct SessionInfo {
    pub session_id: Option<String>,
    pub native_format: String,
}

/// State shared between the controller and the audio-thread callback.
///
/// The callback only touches atomics and the arc-swap slots; the mutexes
/// are taken by the controller and by the stream-failure path.
pub(crate) struct Shared {
    /// Cleared first on teardown so late callbacks become no-ops.
    accepting: AtomicBool,
    pub counters: Counters,
    pub state: Mutex<CaptureState>,
    pub info: Mutex<SessionInfo>,
    /// Failure reported by the input before the session started accepting.
    fault: Mutex<Option<CaptureError>>,
    channel: ArcSwapOption<Arc<dyn TransportChannel>>,
    delegate: ArcSwapOption<Arc<dyn CaptureDelegate>>,
}

impl Shared {
    pub fn new() -> Self {
        Self {
            accepting: AtomicBool::new(false),
            counters: Counters::default(),
            state: Mutex::new(CaptureState::Idle),
            info: Mutex::new(SessionInfo::default()),
            fault: Mutex::new(None),
            channel: ArcSwapOption::empty(),
            delegate: ArcSwapOption::empty(),
        }
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }

    pub fn stop_accepting(&self) {
        self.accepting.store(false, Ordering::SeqCst);
    }

    /// Let the callback through, unless the stream already failed.
    pub fn start_accepting(&self) {
        self.accepting.store(true, Ordering::SeqCst);
        self.surface_fault();
    }

    /// Clear counters and session info for a new `start_capture`.
    pub fn begin_session(&self, session_id: String) {
        self.counters.reset();
        *self.info.lock() = SessionInfo {
            session_id: Some(session_id),
            native_format: String::new(),
        };
        *self.fault.lock() = None;
    }

    pub fn channel(&self) -> ChannelSlot {
        self.channel.load()
    }

    pub fn set_channel(&self, channel: Option<Arc<dyn TransportChannel>>) {
        self.channel.store(channel.map(Arc::new));
    }

    pub fn delegate(&self) -> DelegateSlot {
        self.delegate.load()
    }

    pub fn set_delegate(&self, delegate: Option<Arc<dyn CaptureDelegate>>) {
        self.delegate.store(delegate.map(Arc::new));
    }

    pub fn state(&self) -> CaptureState {
        *self.state.lock()
    }

    pub fn diagnostics(&self) -> CaptureSessionDiagnostics {
        let info = self.info.lock();
        let c = &self.counters;
        CaptureSessionDiagnostics {
            session_id: info.session_id.clone(),
            native_format: info.native_format.clone(),
            device_callback_count: c.device_callbacks.load(Ordering::Relaxed),
            blocks_processed: c.blocks_processed.load(Ordering::Relaxed),
            frames_sent: c.frames_sent.load(Ordering::Relaxed),
            frames_dropped: c.frames_dropped.load(Ordering::Relaxed),
            processing_errors: c.processing_errors.load(Ordering::Relaxed),
            bytes_sent: c.bytes_sent.load(Ordering::Relaxed),
        }
    }

    /// Store `new_state` and notify the delegate if it changed.
    pub fn transition(&self, new_state: CaptureState) {
        {
            let mut state = self.state.lock();
            if *state == new_state {
                return;
            }
            *state = new_state;
        }
        log::info!("Capture state -> {}", new_state.as_str());
        if let Some(delegate) = self.delegate().as_deref() {
            delegate.on_state_changed(new_state);
        }
    }

    /// Log an error and surface it once through the delegate.
    pub fn report(&self, message: &str, error: CaptureError) {
        log::error!("{}: {}", message, error);
        if matches!(error, CaptureError::ProcessingError(_) | CaptureError::TransportError(_)) {
            self.counters.processing_errors.fetch_add(1, Ordering::Relaxed);
        }
        if let Some(delegate) = self.delegate().as_deref() {
            delegate.on_error(&CaptureErrorReport::new(message, error));
        }
    }

    /// The input stream died underneath a running session.
    ///
    /// Reported once, then the session goes idle. A failure that lands
    /// while `start_capture` is still finishing is held until
    /// `start_accepting`; one that lands after `stop_capture` is dropped.
    pub fn stream_failed(&self, error: CaptureError) {
        *self.fault.lock() = Some(error);
        self.surface_fault();
    }

    fn surface_fault(&self) {
        let error = {
            let mut fault = self.fault.lock();
            if fault.is_none() || !self.accepting.swap(false, Ordering::SeqCst) {
                return;
            }
            fault.take()
        };
        if let Some(error) = error {
            self.report("audio input stream failed", error);
            self.transition(CaptureState::Idle);
        }
    }
}
