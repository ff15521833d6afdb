use crate::PageRequest;

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Issue the request now; the fetcher is already marked loading.
    FetchPage(PageRequest),
    /// Drop whatever request of the previous filter epoch is still in flight.
    CancelInFlight,
    /// Fetch the first page of the new filter epoch once edits go quiet.
    ScheduleFilterFetch { page_size: usize },
}
