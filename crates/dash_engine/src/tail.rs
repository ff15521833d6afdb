use std::sync::{Arc, Mutex};
use std::time::Duration;

use dash_core::{FetchState, LogTailState, TailBatch, TailLine, DEFAULT_TAIL_CAPACITY};
use dash_logging::{dash_trace, dash_warn};

use crate::orchestrator::OrchestratorState;
use crate::{lock, ApiError, DashboardApi, DataOrchestrator};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TailSettings {
    pub poll_interval: Duration,
    pub capacity: usize,
}

impl Default for TailSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            capacity: DEFAULT_TAIL_CAPACITY,
        }
    }
}

/// Polls the resolver log and keeps the recent lines for one viewer.
///
/// The continuation id and the line buffer belong to this instance; two tails
/// on the same server never see each other's progress. Polling keeps going
/// after transport errors.
#[derive(Clone)]
pub struct LiveLogTail {
    state: Arc<Mutex<LogTailState>>,
    orchestrator: DataOrchestrator<TailBatch, TailBatch, ApiError>,
}

impl LiveLogTail {
    pub fn new(api: Arc<dyn DashboardApi>, settings: TailSettings) -> Self {
        let state = Arc::new(Mutex::new(LogTailState::new(settings.capacity)));
        let source = Arc::clone(&state);
        let sink = Arc::clone(&state);

        let orchestrator = DataOrchestrator::builder(
            move || {
                let next_id = lock(&source).next_id();
                let api = Arc::clone(&api);
                async move { api.log_tail(next_id).await }
            },
            |batch: TailBatch| batch,
        )
        .repeat_every(settings.poll_interval)
        .ignore_cancel_errors(true)
        .on_change(move |state| match state {
            FetchState::Ok(batch) => {
                let added = lock(&sink).apply_batch(batch.clone());
                dash_trace!("tail +{} lines, next id {}", added, batch.next_id);
            }
            FetchState::Err(error) => dash_warn!("log tail poll failed: {}", error),
            FetchState::Initial => {}
        })
        .build();

        Self {
            state,
            orchestrator,
        }
    }

    /// Starts polling. Calling it again restarts the cycle immediately.
    pub fn start(&self) {
        self.orchestrator.start();
    }

    /// Polls now instead of waiting for the interval.
    pub fn refresh(&self) {
        self.orchestrator.refresh(None);
    }

    pub fn next_id(&self) -> Option<u64> {
        lock(&self.state).next_id()
    }

    pub fn lines(&self) -> Vec<TailLine> {
        lock(&self.state).lines().cloned().collect()
    }

    /// Lines received after the first `seen` together with the new total,
    /// read under one lock so consecutive calls neither skip nor repeat lines.
    pub fn lines_since(&self, seen: u64) -> (Vec<TailLine>, u64) {
        let state = lock(&self.state);
        (state.lines_after(seen), state.received())
    }

    pub fn received(&self) -> u64 {
        lock(&self.state).received()
    }

    pub fn fetch_state(&self) -> OrchestratorState<TailBatch, ApiError> {
        self.orchestrator.state()
    }

    pub fn is_polling(&self) -> bool {
        self.orchestrator.has_pending_poll()
    }

    pub fn teardown(&self) {
        self.orchestrator.teardown();
    }
}
