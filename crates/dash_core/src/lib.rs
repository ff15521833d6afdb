//! Dashboard core: pure query-log state machine, filter model and code tables.
mod codes;
mod effect;
mod fetch_state;
mod filter;
mod model;
mod msg;
mod state;
mod update;
mod view_model;

pub use codes::{DnssecStatus, QueryStatus, QueryType, ReplyType, RowTone};
pub use effect::Effect;
pub use fetch_state::FetchState;
pub use filter::{FilterCriterion, FilterError, FilterKey, FilterSet, StatusFilter};
pub use model::{ClientInfo, LogEntry, PageResult, ReplyInfo, Summary, TailBatch, TailLine};
pub use msg::Msg;
pub use state::{
    LogQueryState, LogTailState, PageRequest, SkipReason, DEFAULT_PAGE_SIZE,
    DEFAULT_TAIL_CAPACITY, READ_AHEAD_PAGES,
};
pub use update::update;
pub use view_model::{LogRowView, LogViewModel};
