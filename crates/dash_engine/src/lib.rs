//! Dashboard engine: async fetch orchestration and the HTTP transport.
//!
//! Everything here spawns onto the ambient Tokio runtime, so constructors and
//! triggers must be called from within one.
mod api;
mod debounce;
mod orchestrator;
mod paginated;
mod tail;
mod task;
mod types;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use api::{ApiSettings, DashboardApi, ReqwestApi};
pub use debounce::{Debouncer, FILTER_DEBOUNCE};
pub use orchestrator::{
    DataOrchestrator, FetchFn, OrchestratorBuilder, OrchestratorOptions, OrchestratorState,
    Refresher, StateView,
};
pub use paginated::{EpochError, EpochPage, PaginatedLogFetcher, PagingSettings};
pub use tail::{LiveLogTail, TailSettings};
pub use task::{wrap, CancelHandle, CancelableTask, Repeat};
pub use types::{ApiError, FailureKind, TaskError};

/// Locks `mutex`, recovering the data if a panicking holder poisoned it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
