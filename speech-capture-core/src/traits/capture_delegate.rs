use crate::models::audio_models::AudioLevels;
use crate::models::error::CaptureErrorReport;
use crate::models::state::CaptureState;

/// Event delegate for capture controller notifications.
///
/// `on_state_changed` is called from the thread that calls `start`/`stop`.
/// `on_error` and `on_audio_data` may be called from the real-time audio
/// thread; implementations should hand off rather than do heavy work.
pub trait CaptureDelegate: Send + Sync {
    /// Called once per state transition.
    fn on_state_changed(&self, state: CaptureState);

    /// Called exactly once per error occurrence.
    fn on_error(&self, report: &CaptureErrorReport);

    /// Called for every block sent, with its PCM frame and levels.
    fn on_audio_data(&self, _frame: &[i16], _levels: &AudioLevels) {}
}

type StateFn = Box<dyn Fn(CaptureState) + Send + Sync>;
type ErrorFn = Box<dyn Fn(&CaptureErrorReport) + Send + Sync>;
type AudioDataFn = Box<dyn Fn(&[i16], &AudioLevels) + Send + Sync>;

/// Closure-based delegate. Unset callbacks are ignored.
#[derive(Default)]
pub struct CaptureCallbacks {
    on_state_change: Option<StateFn>,
    on_error: Option<ErrorFn>,
    on_audio_data: Option<AudioDataFn>,
}

impl CaptureCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_state_change(mut self, f: impl Fn(CaptureState) + Send + Sync + 'static) -> Self {
        self.on_state_change = Some(Box::new(f));
        self
    }

    pub fn on_error(mut self, f: impl Fn(&CaptureErrorReport) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    pub fn on_audio_data(mut self, f: impl Fn(&[i16], &AudioLevels) + Send + Sync + 'static) -> Self {
        self.on_audio_data = Some(Box::new(f));
        self
    }
}

impl CaptureDelegate for CaptureCallbacks {
    fn on_state_changed(&self, state: CaptureState) {
        if let Some(f) = &self.on_state_change {
            f(state);
        }
    }

    fn on_error(&self, report: &CaptureErrorReport) {
        if let Some(f) = &self.on_error {
            f(report);
        }
    }

    fn on_audio_data(&self, frame: &[i16], levels: &AudioLevels) {
        if let Some(f) = &self.on_audio_data {
            f(frame, levels);
        }
    }
}
