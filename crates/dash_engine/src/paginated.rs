use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use dash_core::{
    update, Effect, FetchState, FilterSet, LogEntry, LogQueryState, LogViewModel, Msg,
    PageRequest, PageResult, DEFAULT_PAGE_SIZE,
};
use dash_logging::{dash_debug, dash_trace, dash_warn};

use crate::{lock, ApiError, DashboardApi, DataOrchestrator, Debouncer, TaskError, FILTER_DEBOUNCE};

/// A page tagged with the filter epoch it was requested for.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochPage {
    pub epoch: u64,
    pub page: PageResult<LogEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{error}")]
pub struct EpochError {
    pub epoch: u64,
    pub error: ApiError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagingSettings {
    pub page_size: usize,
    pub debounce: Duration,
}

impl Default for PagingSettings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            debounce: FILTER_DEBOUNCE,
        }
    }
}

struct FetcherShared {
    state: Mutex<LogQueryState>,
    /// Request the orchestrator's fetch closure sends next.
    request: Arc<Mutex<PageRequest>>,
    orchestrator: DataOrchestrator<EpochPage, EpochPage, EpochError>,
    debouncer: Debouncer,
}

/// Cursor-paginated query log with debounced, invalidating filter edits.
///
/// Decisions are made by [`dash_core::update`]; this type runs the resulting
/// effects. Page requests go out immediately, filter edits go through the
/// debouncer, and at most one request is in flight at a time.
#[derive(Clone)]
pub struct PaginatedLogFetcher {
    shared: Arc<FetcherShared>,
}

impl PaginatedLogFetcher {
    pub fn new(api: Arc<dyn DashboardApi>, settings: PagingSettings) -> Self {
        let shared = Arc::new_cyclic(|weak: &Weak<FetcherShared>| {
            let request = Arc::new(Mutex::new(PageRequest::default()));
            let outgoing = Arc::clone(&request);
            let listener = weak.clone();

            let orchestrator = DataOrchestrator::builder(
                move || {
                    let request = lock(&outgoing).clone();
                    let api = Arc::clone(&api);
                    async move {
                        let epoch = request.epoch;
                        match api.query_page(&request).await {
                            Ok(page) => Ok(EpochPage { epoch, page }),
                            Err(error) => Err(EpochError { epoch, error }),
                        }
                    }
                },
                |page: EpochPage| page,
            )
            .ignore_cancel_errors(true)
            .on_change(move |state| {
                if let Some(shared) = listener.upgrade() {
                    shared.on_settled(state);
                }
            })
            .build();

            FetcherShared {
                state: Mutex::new(LogQueryState::new(settings.page_size)),
                request,
                orchestrator,
                debouncer: Debouncer::new(settings.debounce),
            }
        });
        Self { shared }
    }

    /// Makes sure rows through `page` plus one read-ahead page are loaded.
    /// No-op at the end of data, while loading, or when already covered.
    pub fn fetch_page(&self, page: usize, page_size: usize) {
        self.shared.dispatch(Msg::PageRequested { page, page_size });
    }

    /// Replaces the filters. Equal filters are ignored; otherwise the list is
    /// reset now and the first page of the new filters is fetched once edits
    /// stop for the debounce window.
    pub fn set_filters(&self, filters: FilterSet) {
        self.shared.dispatch(Msg::FiltersEdited(filters));
    }

    pub fn view(&self) -> LogViewModel {
        lock(&self.shared.state).view()
    }

    /// Snapshot of the underlying state.
    pub fn snapshot(&self) -> LogQueryState {
        lock(&self.shared.state).clone()
    }

    pub fn history_len(&self) -> usize {
        lock(&self.shared.state).history().len()
    }

    pub fn cursor(&self) -> Option<String> {
        lock(&self.shared.state).cursor().map(str::to_string)
    }

    pub fn is_loading(&self) -> bool {
        lock(&self.shared.state).is_loading()
    }

    pub fn at_end(&self) -> bool {
        lock(&self.shared.state).at_end()
    }

    pub fn filters_changed(&self) -> bool {
        lock(&self.shared.state).filters_changed()
    }

    pub fn filters(&self) -> FilterSet {
        lock(&self.shared.state).filters().clone()
    }

    pub fn last_error(&self) -> Option<String> {
        lock(&self.shared.state).last_error().map(str::to_string)
    }

    /// Returns whether anything visible changed since the last call.
    pub fn consume_dirty(&self) -> bool {
        lock(&self.shared.state).consume_dirty()
    }

    pub fn has_pending_filter_fetch(&self) -> bool {
        self.shared.debouncer.is_pending()
    }

    /// Drops the pending filter fetch and any in-flight request for good.
    pub fn teardown(&self) {
        self.shared.debouncer.cancel();
        self.shared.orchestrator.teardown();
    }
}

impl FetcherShared {
    fn dispatch(self: &Arc<Self>, msg: Msg) {
        let effects = {
            let mut guard = lock(&self.state);
            let state = std::mem::take(&mut *guard);
            let (state, effects) = update(state, msg);
            *guard = state;
            effects
        };
        // Effects run without the state lock: the orchestrator lock is always
        // taken before it, never after.
        self.run_effects(effects);
    }

    fn run_effects(self: &Arc<Self>, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::FetchPage(request) => {
                    dash_debug!(
                        "fetching page epoch={} cursor={:?} filters={}",
                        request.epoch,
                        request.cursor,
                        request.filters.len()
                    );
                    *lock(&self.request) = request;
                    self.orchestrator.refresh(None);
                }
                Effect::CancelInFlight => {
                    self.orchestrator.cancel();
                }
                Effect::ScheduleFilterFetch { page_size } => {
                    let weak = Arc::downgrade(self);
                    self.debouncer.call(move || {
                        if let Some(shared) = weak.upgrade() {
                            shared.dispatch(Msg::PageRequested { page: 0, page_size });
                        }
                    });
                }
            }
        }
    }

    /// Runs under the orchestrator lock; only touches the state lock.
    fn on_settled(&self, state: &FetchState<EpochPage, TaskError<EpochError>>) {
        let msg = match state {
            FetchState::Ok(EpochPage { epoch, page }) => {
                dash_trace!("page loaded epoch={} rows={}", epoch, page.items.len());
                Msg::PageLoaded {
                    epoch: *epoch,
                    page: page.clone(),
                }
            }
            FetchState::Err(TaskError::Failed(EpochError { epoch, error })) => {
                dash_warn!("query log fetch failed: {}", error);
                Msg::PageFailed {
                    epoch: *epoch,
                    message: error.to_string(),
                }
            }
            FetchState::Initial | FetchState::Err(TaskError::Canceled) => return,
        };

        let mut guard = lock(&self.state);
        let current = std::mem::take(&mut *guard);
        let (next, effects) = update(current, msg);
        *guard = next;
        debug_assert!(effects.is_empty(), "settled pages never schedule work");
    }
}
