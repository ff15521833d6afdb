//! Generic fetch controller shared by every dashboard widget.
//!
//! A [`DataOrchestrator`] owns at most one in-flight [`CancelableTask`] and
//! publishes its outcome as a [`FetchState`]. Starting a new fetch always
//! cancels the previous one first, and the cancel flag is checked under the
//! same lock that guards publication. Every launch and injection gets a
//! generation number and only the newest generation may publish, so a
//! superseded task never writes state.
//!
//! [`CancelableTask`]: crate::CancelableTask

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dash_core::FetchState;
use dash_logging::{dash_debug, dash_trace};
use futures_util::future::{BoxFuture, FutureExt};
use tokio::sync::watch;

use crate::task::{self, CancelHandle, Repeat};
use crate::{lock, TaskError};

pub type FetchFn<D, E> = Arc<dyn Fn() -> BoxFuture<'static, Result<D, E>> + Send + Sync>;
type TransformFn<D, T> = Arc<dyn Fn(D) -> T + Send + Sync>;
type Listener<T, E> = Arc<dyn Fn(&OrchestratorState<T, E>) + Send + Sync>;

/// State as seen by consumers; cancellation surfaces as `Err(Canceled)` only
/// after a plain [`DataOrchestrator::cancel`] with `ignore_cancel_errors` off.
pub type OrchestratorState<T, E> = FetchState<T, TaskError<E>>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrchestratorOptions {
    /// Poll again this long after every settled fetch, failures included.
    pub repeat_interval: Option<Duration>,
    pub ignore_cancel_errors: bool,
    /// Reset to `Initial` before refetching on a dependency change.
    pub flush_on_dependency_change: bool,
}

pub struct OrchestratorBuilder<D, T, E> {
    fetch: FetchFn<D, E>,
    transform: TransformFn<D, T>,
    options: OrchestratorOptions,
    listener: Option<Listener<T, E>>,
}

impl<D, T, E> OrchestratorBuilder<D, T, E>
where
    D: Send + 'static,
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn options(mut self, options: OrchestratorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn repeat_every(mut self, interval: Duration) -> Self {
        self.options.repeat_interval = Some(interval);
        self
    }

    pub fn ignore_cancel_errors(mut self, ignore: bool) -> Self {
        self.options.ignore_cancel_errors = ignore;
        self
    }

    pub fn flush_on_dependency_change(mut self, flush: bool) -> Self {
        self.options.flush_on_dependency_change = flush;
        self
    }

    /// Called with every published state while the orchestrator lock is held.
    /// The listener must not call back into the same orchestrator.
    pub fn on_change(
        mut self,
        listener: impl Fn(&OrchestratorState<T, E>) + Send + Sync + 'static,
    ) -> Self {
        self.listener = Some(Arc::new(listener));
        self
    }

    pub fn build(self) -> DataOrchestrator<D, T, E> {
        let (state_tx, _) = watch::channel(FetchState::Initial);
        DataOrchestrator {
            shared: Arc::new(Shared {
                fetch: self.fetch,
                transform: self.transform,
                options: self.options,
                listener: self.listener,
                state_tx,
                control: Mutex::new(Control::default()),
            }),
        }
    }
}

/// Three render slots for a consumer of a [`DataOrchestrator`].
pub trait StateView<D, T, E> {
    type View;

    fn initial(&self) -> Self::View;
    fn ok(&self, data: &T, refresh: &Refresher<D, T, E>) -> Self::View;
    fn err(&self, error: &TaskError<E>, refresh: &Refresher<D, T, E>) -> Self::View;
}

/// Refresh capability handed to render slots.
pub struct Refresher<D, T, E> {
    target: DataOrchestrator<D, T, E>,
}

impl<D, T, E> Refresher<D, T, E>
where
    D: Send + 'static,
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn refresh(&self, injected: Option<D>) {
        self.target.refresh(injected);
    }
}

#[derive(Default)]
struct Control {
    active: Option<CancelHandle>,
    torn_down: bool,
    /// Generation of the newest launched task, injected value or flush.
    /// Outcomes of older generations are stale.
    launched: u64,
}

impl Control {
    fn next_generation(&mut self) -> u64 {
        self.launched += 1;
        self.launched
    }
}

struct Shared<D, T, E> {
    fetch: FetchFn<D, E>,
    transform: TransformFn<D, T>,
    options: OrchestratorOptions,
    listener: Option<Listener<T, E>>,
    state_tx: watch::Sender<OrchestratorState<T, E>>,
    control: Mutex<Control>,
}

pub struct DataOrchestrator<D, T, E> {
    shared: Arc<Shared<D, T, E>>,
}

impl<D, T, E> Clone for DataOrchestrator<D, T, E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<D, T, E> fmt::Debug for DataOrchestrator<D, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataOrchestrator")
            .field("options", &self.shared.options)
            .finish_non_exhaustive()
    }
}

impl<D, T, E> DataOrchestrator<D, T, E>
where
    D: Send + 'static,
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn builder<F, Fut, X>(fetch: F, transform: X) -> OrchestratorBuilder<D, T, E>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<D, E>> + Send + 'static,
        X: Fn(D) -> T + Send + Sync + 'static,
    {
        OrchestratorBuilder {
            fetch: Arc::new(move || fetch().boxed()),
            transform: Arc::new(transform),
            options: OrchestratorOptions::default(),
            listener: None,
        }
    }

    pub fn new<F, Fut, X>(fetch: F, transform: X, options: OrchestratorOptions) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<D, E>> + Send + 'static,
        X: Fn(D) -> T + Send + Sync + 'static,
    {
        Self::builder(fetch, transform).options(options).build()
    }

    pub fn options(&self) -> &OrchestratorOptions {
        &self.shared.options
    }

    /// Cancels any active fetch and starts a new one.
    pub fn start(&self) {
        self.shared.start();
    }

    /// With `injected` data the network is skipped: the state becomes
    /// `Ok(transform(injected))` before this returns and, when polling, the
    /// next poll is armed as if a fetch had just completed. Without data this
    /// is [`DataOrchestrator::start`].
    pub fn refresh(&self, injected: Option<D>) {
        match injected {
            Some(data) => self.shared.inject(data),
            None => self.shared.start(),
        }
    }

    pub fn on_dependencies_changed(&self) {
        self.shared.dependencies_changed();
    }

    /// Cancels the active fetch and any armed poll without tearing down.
    pub fn cancel(&self) {
        let mut control = lock(&self.shared.control);
        if let Some(previous) = control.active.take() {
            previous.cancel();
        }
    }

    /// Cancels everything; the state never changes afterwards.
    pub fn teardown(&self) {
        let mut control = lock(&self.shared.control);
        control.torn_down = true;
        if let Some(previous) = control.active.take() {
            dash_debug!("orchestrator torn down");
            previous.cancel();
        }
    }

    pub fn is_torn_down(&self) -> bool {
        lock(&self.shared.control).torn_down
    }

    pub fn has_pending_poll(&self) -> bool {
        lock(&self.shared.control)
            .active
            .as_ref()
            .is_some_and(CancelHandle::has_pending_repeat)
    }

    pub fn state(&self) -> OrchestratorState<T, E> {
        self.shared.state_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<OrchestratorState<T, E>> {
        self.shared.state_tx.subscribe()
    }

    pub fn render<V>(&self, view: &V) -> V::View
    where
        V: StateView<D, T, E>,
    {
        // Snapshot first so a slot may call refresh without holding the borrow.
        let state = self.state();
        let refresher = Refresher {
            target: self.clone(),
        };
        match &state {
            FetchState::Initial => view.initial(),
            FetchState::Ok(data) => view.ok(data, &refresher),
            FetchState::Err(error) => view.err(error, &refresher),
        }
    }
}

impl<D, T, E> Shared<D, T, E>
where
    D: Send + 'static,
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn start(self: &Arc<Self>) {
        let mut control = lock(&self.control);
        if control.torn_down {
            return;
        }
        self.launch(&mut control);
    }

    fn inject(self: &Arc<Self>, data: D) {
        let mut control = lock(&self.control);
        if control.torn_down {
            return;
        }
        if let Some(previous) = control.active.take() {
            previous.cancel();
        }
        control.next_generation();
        self.publish(FetchState::Ok((self.transform)(data)));
        if let Some(interval) = self.options.repeat_interval {
            control.active = Some(CancelHandle::armed(self.repeat(interval)));
        }
    }

    fn dependencies_changed(self: &Arc<Self>) {
        let mut control = lock(&self.control);
        if control.torn_down {
            return;
        }
        if let Some(previous) = control.active.take() {
            previous.cancel();
        }
        if self.options.flush_on_dependency_change {
            control.next_generation();
            self.publish(FetchState::Initial);
        }
        self.launch(&mut control);
    }

    fn launch(self: &Arc<Self>, control: &mut Control) {
        if let Some(previous) = control.active.take() {
            previous.cancel();
        }
        let repeat = self
            .options
            .repeat_interval
            .map(|interval| self.repeat(interval));
        let generation = control.next_generation();
        let task = task::wrap((self.fetch)(), repeat);
        let handle = task.handle();
        control.active = Some(handle.clone());

        let shared = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = task.await;
            shared.settle(generation, &handle, outcome);
        });
    }

    fn repeat(self: &Arc<Self>, interval: Duration) -> Repeat {
        let weak = Arc::downgrade(self);
        Repeat::new(interval, move || {
            if let Some(shared) = weak.upgrade() {
                dash_trace!("poll interval elapsed");
                shared.start();
            }
        })
    }

    fn settle(&self, generation: u64, handle: &CancelHandle, outcome: Result<D, TaskError<E>>) {
        let control = lock(&self.control);
        if control.torn_down {
            return;
        }
        if generation < control.launched {
            dash_trace!("superseded result dropped");
            return;
        }
        let outcome = if handle.is_canceled() {
            Err(TaskError::Canceled)
        } else {
            outcome
        };
        let next = match outcome {
            Ok(data) => FetchState::Ok((self.transform)(data)),
            Err(TaskError::Canceled) if self.options.ignore_cancel_errors => {
                dash_trace!("cancel error ignored");
                return;
            }
            Err(error) => FetchState::Err(error),
        };
        self.publish(next);
    }

    /// Callers hold the control lock.
    fn publish(&self, next: OrchestratorState<T, E>) {
        if let Some(listener) = &self.listener {
            listener(&next);
        }
        self.state_tx.send_replace(next);
    }
}
