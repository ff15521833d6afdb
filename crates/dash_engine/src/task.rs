use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use dash_logging::dash_trace;
use futures_util::future::{BoxFuture, FutureExt};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{lock, TaskError};

/// Follow-up scheduled once a wrapped operation settles.
#[derive(Clone)]
pub struct Repeat {
    invoke: Arc<dyn Fn() + Send + Sync>,
    interval: Duration,
}

impl Repeat {
    pub fn new(interval: Duration, invoke: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            invoke: Arc::new(invoke),
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl fmt::Debug for Repeat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repeat")
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
struct CancelState {
    canceled: AtomicBool,
    token: CancellationToken,
    /// Armed repeat timer. Guarded together with `canceled` so that arming
    /// and canceling cannot interleave.
    timer: Mutex<Option<JoinHandle<()>>>,
}

/// Cancels one [`CancelableTask`] and its repeat timer. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    state: Arc<CancelState>,
}

impl CancelHandle {
    /// A handle for work that has already settled, with `repeat` armed now.
    pub fn armed(repeat: Repeat) -> Self {
        let handle = Self::default();
        handle.arm(repeat);
        handle
    }

    /// Idempotent. Once this returns the task's result can only be
    /// [`TaskError::Canceled`] and no repeat will fire.
    pub fn cancel(&self) {
        let mut timer = lock(&self.state.timer);
        self.state.canceled.store(true, Ordering::SeqCst);
        self.state.token.cancel();
        if let Some(pending) = timer.take() {
            pending.abort();
        }
    }

    pub fn is_canceled(&self) -> bool {
        self.state.canceled.load(Ordering::SeqCst)
    }

    pub fn has_pending_repeat(&self) -> bool {
        lock(&self.state.timer)
            .as_ref()
            .is_some_and(|pending| !pending.is_finished())
    }

    fn arm(&self, repeat: Repeat) {
        let mut timer = lock(&self.state.timer);
        if self.is_canceled() {
            return;
        }
        let Repeat { invoke, interval } = repeat;
        dash_trace!("repeat armed in {:?}", interval);
        *timer = Some(tokio::spawn(async move {
            tokio::time::sleep(interval).await;
            invoke();
        }));
    }
}

/// One asynchronous operation plus the means to cancel it.
///
/// Awaiting the task yields the wrapped result unless [`CancelHandle::cancel`]
/// was called first, in which case it yields [`TaskError::Canceled`] and the
/// wrapped future is dropped.
pub struct CancelableTask<T, E> {
    result: BoxFuture<'static, Result<T, TaskError<E>>>,
    handle: CancelHandle,
}

impl<T, E> CancelableTask<T, E> {
    pub fn handle(&self) -> CancelHandle {
        self.handle.clone()
    }

    pub fn cancel(&self) {
        self.handle.cancel();
    }
}

impl<T, E> Future for CancelableTask<T, E> {
    type Output = Result<T, TaskError<E>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.result.as_mut().poll(cx)
    }
}

impl<T, E> fmt::Debug for CancelableTask<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelableTask")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

/// Wraps `future` so it can be canceled, optionally arming `repeat` after it
/// settles. The repeat is armed after failures too, but never after a cancel.
pub fn wrap<F, T, E>(future: F, repeat: Option<Repeat>) -> CancelableTask<T, E>
where
    F: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    let handle = CancelHandle::default();
    let watcher = handle.clone();
    let result = async move {
        let outcome = tokio::select! {
            biased;
            _ = watcher.state.token.cancelled() => return Err(TaskError::Canceled),
            outcome = future => outcome,
        };
        if watcher.is_canceled() {
            return Err(TaskError::Canceled);
        }
        if let Some(repeat) = repeat {
            watcher.arm(repeat);
        }
        outcome.map_err(TaskError::Failed)
    }
    .boxed();

    CancelableTask { result, handle }
}
