use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::models::config::HandshakeConfig;
use crate::models::error::{CaptureError, CaptureErrorReport};
use crate::traits::transport_channel::{ChannelState, TransportChannel};
use crate::transport::envelope::{self, ServerMessage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakePhase {
    /// Channel not yet open; nothing sent.
    Pending,
    /// `authenticate` sent, waiting for `auth_success`.
    Authenticating { deadline: Instant },
    Authenticated,
    /// Timed out or the channel closed before authentication.
    Failed,
}

type ErrorObserver = Box<dyn Fn(&CaptureErrorReport) + Send + Sync>;

struct Progress {
    phase: HandshakePhase,
    /// A timeout is closing the channel; waiters hold off until it is done.
    closing: bool,
}

struct HandshakeState<C> {
    inner: C,
    config: HandshakeConfig,
    progress: Mutex<Progress>,
    changed: Condvar,
    /// Mirrors `phase == Authenticated` for lock-free `ready_state`.
    authenticated: AtomicBool,
    on_error: Option<ErrorObserver>,
}

/// Wraps a transport channel with the authenticate / `auth_success` handshake.
///
/// The connection owner drives it: call [`on_open`](Self::on_open) when the
/// underlying channel opens, feed every inbound text frame to
/// [`on_message`](Self::on_message), and [`on_closed`](Self::on_closed) when
/// it closes. Until `auth_success` has been seen, `ready_state` reports
/// `Connecting`, so the capture controller drops frames rather than sending
/// audio on an unauthenticated channel.
///
/// `on_open` arms a deadline timer. If it expires first the underlying
/// channel is closed and the error observer receives one `HandshakeTimeout`.
/// A timeout is terminal for this wrapper; retrying means opening a new
/// channel and wrapping it again.
pub struct AuthenticatedChannel<C: TransportChannel> {
    state: Arc<HandshakeState<C>>,
}

impl<C: TransportChannel + 'static> AuthenticatedChannel<C> {
    pub fn new(inner: C, config: HandshakeConfig) -> Result<Self, CaptureError> {
        Self::build(inner, config, None)
    }

    /// Like [`new`](Self::new), with `observer` receiving handshake failures.
    pub fn with_error_observer(
        inner: C,
        config: HandshakeConfig,
        observer: impl Fn(&CaptureErrorReport) + Send + Sync + 'static,
    ) -> Result<Self, CaptureError> {
        Self::build(inner, config, Some(Box::new(observer)))
    }

    fn build(inner: C, config: HandshakeConfig, on_error: Option<ErrorObserver>) -> Result<Self, CaptureError> {
        config.validate().map_err(CaptureError::ConfigurationFailed)?;
        Ok(Self {
            state: Arc::new(HandshakeState {
                inner,
                config,
                progress: Mutex::new(Progress {
                    phase: HandshakePhase::Pending,
                    closing: false,
                }),
                changed: Condvar::new(),
                authenticated: AtomicBool::new(false),
                on_error,
            }),
        })
    }

    pub fn inner(&self) -> &C {
        &self.state.inner
    }

    pub fn phase(&self) -> HandshakePhase {
        self.state.progress.lock().phase
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.authenticated.load(Ordering::Acquire)
    }

    /// Send the `authenticate` message and start the handshake timer.
    ///
    /// If the send fails the handshake returns to `Pending` and `on_open`
    /// may be called again.
    pub fn on_open(&self) -> Result<(), CaptureError> {
        let state = &self.state;
        let message = envelope::authenticate_message(&state.config.token, state.config.context.as_ref())?;
        {
            let mut progress = state.progress.lock();
            if !matches!(progress.phase, HandshakePhase::Pending) {
                return Ok(());
            }
            progress.phase = HandshakePhase::Authenticating {
                deadline: Instant::now() + state.config.timeout,
            };
        }

        // Sent without the lock: the reply may arrive before `send_text` returns.
        if let Err(e) = state.inner.send_text(&message) {
            let mut progress = state.progress.lock();
            if matches!(progress.phase, HandshakePhase::Authenticating { .. }) {
                progress.phase = HandshakePhase::Pending;
            }
            return Err(e);
        }

        log::info!(
            "Sent authenticate, waiting up to {:?} for auth_success",
            state.config.timeout
        );
        self.arm_deadline();
        Ok(())
    }

    fn arm_deadline(&self) {
        let state = Arc::clone(&self.state);
        let spawned = thread::Builder::new()
            .name("handshake-deadline".into())
            .spawn(move || state.watch_deadline());
        if let Err(e) = spawned {
            log::warn!("Failed to start handshake timer, timeout fires only when polled: {}", e);
        }
    }

    /// Inspect one inbound text frame.
    ///
    /// Returns the parsed message, or `None` if it was not valid JSON with a
    /// `type` field. Malformed frames are logged and otherwise ignored.
    pub fn on_message(&self, text: &str) -> Option<ServerMessage> {
        let message = match envelope::parse_server_message(text) {
            Ok(message) => message,
            Err(e) => {
                log::warn!("Ignoring malformed message from speech service: {}", e);
                return None;
            }
        };

        if message.is_auth_success() {
            let mut progress = self.state.progress.lock();
            let current = progress.phase;
            match current {
                HandshakePhase::Authenticating { .. } => {
                    progress.phase = HandshakePhase::Authenticated;
                    self.state.authenticated.store(true, Ordering::Release);
                    log::info!("Speech service authentication succeeded");
                    self.state.changed.notify_all();
                }
                HandshakePhase::Pending => {
                    log::warn!("auth_success arrived before authenticate was sent; ignoring");
                }
                HandshakePhase::Authenticated => {}
                HandshakePhase::Failed => {
                    log::warn!("auth_success arrived after the handshake failed; ignoring");
                }
            }
        }
        Some(message)
    }

    /// Record that the underlying channel closed.
    pub fn on_closed(&self) {
        let mut progress = self.state.progress.lock();
        if !matches!(progress.phase, HandshakePhase::Authenticated) {
            progress.phase = HandshakePhase::Failed;
        }
        self.state.changed.notify_all();
    }

    /// Non-blocking timeout check for owners that run their own event loop.
    ///
    /// Closes the channel and returns `HandshakeTimeout` once the deadline
    /// has passed without `auth_success`.
    pub fn poll_timeout(&self) -> Result<(), CaptureError> {
        let mut progress = self.state.progress.lock();
        loop {
            let current = progress.phase;
            match current {
                HandshakePhase::Authenticating { deadline } if Instant::now() >= deadline => {
                    self.state.fail_on_timeout(progress);
                    return Err(CaptureError::HandshakeTimeout);
                }
                HandshakePhase::Failed if progress.closing => self.state.changed.wait(&mut progress),
                HandshakePhase::Failed => return Err(CaptureError::HandshakeTimeout),
                _ => return Ok(()),
            }
        }
    }

    /// Block until `auth_success` arrives or the handshake deadline passes.
    pub fn wait_until_ready(&self) -> Result<(), CaptureError> {
        let mut progress = self.state.progress.lock();
        loop {
            let current = progress.phase;
            match current {
                HandshakePhase::Authenticated => return Ok(()),
                HandshakePhase::Failed if progress.closing => self.state.changed.wait(&mut progress),
                HandshakePhase::Failed => return Err(CaptureError::HandshakeTimeout),
                HandshakePhase::Pending => {
                    return Err(CaptureError::TransportError(
                        "handshake not started; channel is not open".into(),
                    ))
                }
                HandshakePhase::Authenticating { deadline } => {
                    if self.state.changed.wait_until(&mut progress, deadline).timed_out()
                        && matches!(progress.phase, HandshakePhase::Authenticating { .. })
                    {
                        self.state.fail_on_timeout(progress);
                        return Err(CaptureError::HandshakeTimeout);
                    }
                }
            }
        }
    }
}

impl<C: TransportChannel> HandshakeState<C> {
    /// Body of the deadline timer thread. Exits as soon as the phase leaves
    /// `Authenticating`.
    fn watch_deadline(&self) {
        let mut progress = self.progress.lock();
        loop {
            let HandshakePhase::Authenticating { deadline } = progress.phase else {
                return;
            };
            if self.changed.wait_until(&mut progress, deadline).timed_out()
                && matches!(progress.phase, HandshakePhase::Authenticating { .. })
            {
                self.fail_on_timeout(progress);
                return;
            }
        }
    }

    /// Move `Authenticating` to `Failed`, close the channel and report once.
    ///
    /// The caller's guard decides who wins the race; the close and the
    /// report happen without the lock, since closing may re-enter `on_closed`.
    fn fail_on_timeout(&self, mut progress: MutexGuard<'_, Progress>) {
        progress.phase = HandshakePhase::Failed;
        progress.closing = true;
        drop(progress);

        log::warn!(
            "No auth_success within {:?}; closing channel",
            self.config.timeout
        );
        self.inner.close();
        if let Some(observer) = &self.on_error {
            observer(&CaptureErrorReport::new(
                "speech service handshake timed out",
                CaptureError::HandshakeTimeout,
            ));
        }

        self.progress.lock().closing = false;
        self.changed.notify_all();
    }
}

impl<C: TransportChannel> TransportChannel for AuthenticatedChannel<C> {
    fn ready_state(&self) -> ChannelState {
        match self.state.inner.ready_state() {
            ChannelState::Open if self.state.authenticated.load(Ordering::Acquire) => ChannelState::Open,
            ChannelState::Open => ChannelState::Connecting,
            other => other,
        }
    }

    fn send_text(&self, text: &str) -> Result<(), CaptureError> {
        self.state.inner.send_text(text)
    }

    fn close(&self) {
        self.state.inner.close();
    }
}
