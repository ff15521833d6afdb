use std::collections::VecDeque;

use crate::view_model::{LogRowView, LogViewModel};
use crate::{FilterSet, LogEntry, PageResult, TailBatch, TailLine};

pub const DEFAULT_PAGE_SIZE: usize = 100;
/// Pages fetched beyond the one on screen so advancing does not wait on the network.
pub const READ_AHEAD_PAGES: usize = 1;
pub const DEFAULT_TAIL_CAPACITY: usize = 1000;

/// Everything the transport needs to fetch the next page.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PageRequest {
    pub epoch: u64,
    pub cursor: Option<String>,
    pub filters: FilterSet,
}

impl PageRequest {
    /// `cursor` followed by the encoded filters.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::with_capacity(self.filters.len() + 1);
        if let Some(cursor) = &self.cursor {
            pairs.push(("cursor", cursor.clone()));
        }
        pairs.extend(self.filters.encode());
        pairs
    }
}

/// Why a page request did not reach the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AtEnd,
    Loading,
    ReadAheadSatisfied,
}

/// Paginated query-log state for one viewer.
///
/// `history` only grows while the filter epoch is stable. Changing filters
/// starts a new epoch: history, cursor and end marker are reset and any result
/// still tagged with the old epoch is discarded.
#[derive(Debug, Clone, PartialEq)]
pub struct LogQueryState {
    history: Vec<LogEntry>,
    cursor: Option<String>,
    loading: bool,
    at_end: bool,
    filters: FilterSet,
    filters_changed: bool,
    epoch: u64,
    page_size: usize,
    last_error: Option<String>,
    dirty: bool,
}

impl Default for LogQueryState {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl LogQueryState {
    pub fn new(page_size: usize) -> Self {
        Self {
            history: Vec::new(),
            cursor: None,
            loading: false,
            at_end: false,
            filters: FilterSet::new(),
            filters_changed: false,
            epoch: 0,
            page_size: page_size.max(1),
            last_error: None,
            dirty: false,
        }
    }

    pub fn history(&self) -> &[LogEntry] {
        &self.history
    }

    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn at_end(&self) -> bool {
        self.at_end
    }

    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    pub fn filters_changed(&self) -> bool {
        self.filters_changed
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Returns whether the state changed since the last call.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub fn page_request(&self) -> PageRequest {
        PageRequest {
            epoch: self.epoch,
            cursor: self.cursor.clone(),
            filters: self.filters.clone(),
        }
    }

    /// `None` when a request for `page` has to go to the network.
    pub fn skip_reason(&self, page: usize, page_size: usize) -> Option<SkipReason> {
        if self.at_end {
            return Some(SkipReason::AtEnd);
        }
        if self.loading {
            return Some(SkipReason::Loading);
        }
        let wanted = page
            .saturating_add(1 + READ_AHEAD_PAGES)
            .saturating_mul(page_size);
        if !self.filters_changed && self.history.len() >= wanted {
            return Some(SkipReason::ReadAheadSatisfied);
        }
        None
    }

    pub fn view(&self) -> LogViewModel {
        LogViewModel {
            rows: self.history.iter().map(LogRowView::from_entry).collect(),
            loading: self.loading,
            at_end: self.at_end,
            filters_changed: self.filters_changed,
            active_filters: self.filters.len(),
            error: self.last_error.clone(),
        }
    }

    pub(crate) fn begin_fetch(&mut self, page_size: usize) -> PageRequest {
        self.page_size = page_size.max(1);
        self.loading = true;
        self.dirty = true;
        self.page_request()
    }

    /// Appends a page of the current epoch. Stale pages are dropped.
    pub(crate) fn apply_page(&mut self, epoch: u64, page: PageResult<LogEntry>) -> bool {
        if epoch != self.epoch {
            return false;
        }
        self.history.extend(page.items);
        self.at_end = page.cursor.is_none();
        self.cursor = page.cursor;
        self.filters_changed = false;
        self.loading = false;
        self.last_error = None;
        self.dirty = true;
        true
    }

    /// Records a transport failure of the current epoch. Rows already shown stay.
    pub(crate) fn apply_failure(&mut self, epoch: u64, message: String) -> bool {
        if epoch != self.epoch {
            return false;
        }
        self.loading = false;
        self.last_error = Some(message);
        self.dirty = true;
        true
    }

    /// Starts a new filter epoch unless `filters` equals the current set.
    pub(crate) fn replace_filters(&mut self, filters: FilterSet) -> bool {
        if filters == self.filters {
            return false;
        }
        self.history.clear();
        self.cursor = None;
        self.at_end = false;
        self.loading = false;
        self.filters_changed = true;
        self.filters = filters;
        self.epoch = self.epoch.wrapping_add(1);
        self.last_error = None;
        self.dirty = true;
        true
    }
}

/// Live resolver log for one viewer: the continuation id and a bounded
/// buffer of the most recent lines.
#[derive(Debug, Clone, PartialEq)]
pub struct LogTailState {
    next_id: Option<u64>,
    pid: Option<u32>,
    lines: VecDeque<TailLine>,
    capacity: usize,
    received: u64,
}

impl Default for LogTailState {
    fn default() -> Self {
        Self::new(DEFAULT_TAIL_CAPACITY)
    }
}

impl LogTailState {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            next_id: None,
            pid: None,
            lines: VecDeque::with_capacity(capacity.min(DEFAULT_TAIL_CAPACITY)),
            capacity,
            received: 0,
        }
    }

    pub fn next_id(&self) -> Option<u64> {
        self.next_id
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn lines(&self) -> impl ExactSizeIterator<Item = &TailLine> {
        self.lines.iter()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total lines received since creation, including evicted ones.
    pub fn received(&self) -> u64 {
        self.received
    }

    /// Lines received after the first `seen` ones that are still buffered.
    /// A `seen` beyond [`LogTailState::received`] (the log restarted) yields
    /// the whole buffer.
    pub fn lines_after(&self, seen: u64) -> Vec<TailLine> {
        let fresh = if seen > self.received {
            self.lines.len()
        } else {
            usize::try_from(self.received - seen)
                .unwrap_or(usize::MAX)
                .min(self.lines.len())
        };
        self.lines
            .iter()
            .skip(self.lines.len() - fresh)
            .cloned()
            .collect()
    }

    /// Appends a batch and returns how many lines it added.
    ///
    /// A different server pid means the log restarted, so the buffer and the
    /// counters start over before the batch is applied.
    pub fn apply_batch(&mut self, batch: TailBatch) -> usize {
        if let (Some(previous), Some(current)) = (self.pid, batch.pid) {
            if previous != current {
                self.lines.clear();
                self.received = 0;
            }
        }
        if batch.pid.is_some() {
            self.pid = batch.pid;
        }
        self.next_id = Some(batch.next_id);

        let added = batch.lines.len();
        self.received += added as u64;
        self.lines.extend(batch.lines);
        while self.lines.len() > self.capacity {
            self.lines.pop_front();
        }
        added
    }
}
