use std::sync::{Arc, Mutex};
use std::time::Duration;

use dash_logging::dash_trace;
use tokio::task::JoinHandle;

use crate::lock;

/// Quiet period used for filter edits.
pub const FILTER_DEBOUNCE: Duration = Duration::from_millis(300);

#[derive(Debug, Default)]
struct Slot {
    generation: u64,
    pending: Option<JoinHandle<()>>,
}

/// Collapses bursts of calls into one delayed invocation of the last action.
///
/// Each [`Debouncer::call`] restarts the delay; only the most recently
/// supplied action runs, and only once the delay passes without another call.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    slot: Arc<Mutex<Slot>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            slot: Arc::new(Mutex::new(Slot::default())),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn call<F>(&self, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut slot = lock(&self.slot);
        slot.generation = slot.generation.wrapping_add(1);
        let generation = slot.generation;
        if let Some(previous) = slot.pending.take() {
            dash_trace!("debounce superseded");
            previous.abort();
        }

        let shared = Arc::clone(&self.slot);
        let delay = self.delay;
        slot.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                // A newer call may have raced the abort of this timer.
                let mut slot = lock(&shared);
                if slot.generation != generation {
                    return;
                }
                slot.pending = None;
            }
            action();
        }));
    }

    /// Drops the pending action, if any.
    pub fn cancel(&self) {
        let mut slot = lock(&self.slot);
        slot.generation = slot.generation.wrapping_add(1);
        if let Some(previous) = slot.pending.take() {
            previous.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        lock(&self.slot).pending.is_some()
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(FILTER_DEBOUNCE)
    }
}
