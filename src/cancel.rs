//! Cooperative cancellation and load timeouts
//!
//! A [`CancellationToken`] is threaded through every suspension point of a
//! load: fetches are wrapped in [`Cancellable`], and CPU-bound stages
//! (archive decompression, texture decode, parsing) pass through
//! [`checkpoint`] between steps. A [`TimeoutGuard`] cancels the token with
//! [`CancelReason::TimedOut`] once its deadline passes.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::LoadError;

/// Why a token was cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    Cancelled,
    TimedOut(Duration),
}

impl From<CancelReason> for LoadError {
    fn from(reason: CancelReason) -> Self {
        match reason {
            CancelReason::Cancelled => LoadError::Cancelled,
            CancelReason::TimedOut(after) => LoadError::TimedOut(after),
        }
    }
}

#[derive(Default)]
struct TokenState {
    reason: Option<CancelReason>,
    wakers: Vec<Waker>,
    children: Vec<CancellationToken>,
}

/// Token that signals cancellation to cooperative async tasks.
///
/// Cloning a token creates another handle to the same state. The first
/// cancel wins; later calls keep the original reason.
#[derive(Clone, Default)]
pub struct CancellationToken {
    state: Arc<Mutex<TokenState>>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signals cancellation.
    pub fn cancel(&self) {
        self.cancel_with(CancelReason::Cancelled);
    }

    pub fn cancel_with(&self, reason: CancelReason) {
        let (wakers, children) = {
            let mut state = self.state.lock();
            if state.reason.is_some() {
                return;
            }
            state.reason = Some(reason);
            (
                std::mem::take(&mut state.wakers),
                std::mem::take(&mut state.children),
            )
        };
        for waker in wakers {
            waker.wake();
        }
        for child in children {
            child.cancel_with(reason);
        }
    }

    /// A token cancelled together with this one, but cancellable on its own.
    pub fn child_token(&self) -> CancellationToken {
        let child = CancellationToken::new();
        let mut state = self.state.lock();
        let reason = state.reason;
        match reason {
            Some(reason) => {
                drop(state);
                child.cancel_with(reason);
            }
            None => {
                state.children.retain(|c| !c.is_cancelled());
                state.children.push(child.clone());
            }
        }
        child
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.lock().reason.is_some()
    }

    pub fn reason(&self) -> Option<CancelReason> {
        self.state.lock().reason
    }

    /// `Err` with the reason once cancelled
    pub fn check(&self) -> Result<(), CancelReason> {
        match self.reason() {
            Some(reason) => Err(reason),
            None => Ok(()),
        }
    }

    /// Wake `waker` on cancel. Returns the reason instead if already cancelled.
    fn register(&self, waker: &Waker) -> Result<(), CancelReason> {
        let mut state = self.state.lock();
        if let Some(reason) = state.reason {
            return Err(reason);
        }
        if !state.wakers.iter().any(|w| w.will_wake(waker)) {
            state.wakers.push(waker.clone());
        }
        Ok(())
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("reason", &self.reason())
            .finish()
    }
}

/// A future that resolves early with the cancel reason.
pub struct Cancellable<F> {
    inner: Pin<Box<F>>,
    token: CancellationToken,
}

impl<F: Future> Cancellable<F> {
    pub fn new(inner: F, token: CancellationToken) -> Self {
        Self {
            inner: Box::pin(inner),
            token,
        }
    }
}

impl<F: Future> Future for Cancellable<F> {
    type Output = Result<F::Output, CancelReason>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if let Err(reason) = self.token.register(cx.waker()) {
            return Poll::Ready(Err(reason));
        }
        self.inner.as_mut().poll(cx).map(Ok)
    }
}

/// Extension for wrapping any future in a [`Cancellable`]
pub trait CancellableExt: Future + Sized {
    fn cancellable(self, token: &CancellationToken) -> Cancellable<Self> {
        Cancellable::new(self, token.clone())
    }
}

impl<F: Future> CancellableExt for F {}

/// Future returned by [`checkpoint`].
///
/// Yields once to the executor, then completes. Checks the token on every poll.
pub struct Checkpoint {
    yielded: bool,
    token: CancellationToken,
}

/// Yield point that also observes cancellation
pub fn checkpoint(token: &CancellationToken) -> Checkpoint {
    Checkpoint {
        yielded: false,
        token: token.clone(),
    }
}

impl Future for Checkpoint {
    type Output = Result<(), CancelReason>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.token.check()?;
        if self.yielded {
            return Poll::Ready(Ok(()));
        }
        self.yielded = true;
        cx.waker().wake_by_ref();
        Poll::Pending
    }
}

/// Cancels a token with [`CancelReason::TimedOut`] after a duration.
///
/// Dropping the guard disarms it.
pub struct TimeoutGuard {
    #[cfg(not(target_arch = "wasm32"))]
    disarm: Arc<(Mutex<bool>, parking_lot::Condvar)>,
    #[cfg(target_arch = "wasm32")]
    _timer: gloo_timers::callback::Timeout,
}

impl TimeoutGuard {
    #[cfg(not(target_arch = "wasm32"))]
    pub fn arm(token: &CancellationToken, after: Duration) -> Self {
        let disarm = Arc::new((Mutex::new(false), parking_lot::Condvar::new()));
        let watchdog = disarm.clone();
        let token = token.clone();
        let deadline = std::time::Instant::now() + after;

        let spawned = std::thread::Builder::new()
            .name("load-timeout".into())
            .spawn(move || {
                let (lock, cvar) = &*watchdog;
                let mut disarmed = lock.lock();
                while !*disarmed {
                    if cvar.wait_until(&mut disarmed, deadline).timed_out() {
                        break;
                    }
                }
                if !*disarmed {
                    log::warn!("Load timed out after {after:?}");
                    token.cancel_with(CancelReason::TimedOut(after));
                }
            });
        if let Err(err) = spawned {
            log::error!("Could not start load timeout watchdog: {err}");
        }

        Self { disarm }
    }

    #[cfg(target_arch = "wasm32")]
    pub fn arm(token: &CancellationToken, after: Duration) -> Self {
        let token = token.clone();
        let millis = u32::try_from(after.as_millis()).unwrap_or(u32::MAX);
        let timer = gloo_timers::callback::Timeout::new(millis, move || {
            log::warn!("Load timed out after {after:?}");
            token.cancel_with(CancelReason::TimedOut(after));
        });
        Self { _timer: timer }
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl Drop for TimeoutGuard {
    fn drop(&mut self) {
        let (lock, cvar) = &*self.disarm;
        *lock.lock() = true;
        cvar.notify_all();
    }
}
