use crate::{FilterSet, LogEntry, PageResult};

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// The view needs rows up to `page` (zero based) plus the read-ahead page.
    PageRequested { page: usize, page_size: usize },
    /// User changed the filter controls.
    FiltersEdited(FilterSet),
    /// Transport delivered a page for the given filter epoch.
    PageLoaded {
        epoch: u64,
        page: PageResult<LogEntry>,
    },
    /// Transport failed for the given filter epoch.
    PageFailed { epoch: u64, message: String },
}
