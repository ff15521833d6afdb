use crate::{Effect, LogQueryState, Msg};

/// Pure update function: applies a message to the query-log state and returns
/// the effects the fetcher has to run.
pub fn update(mut state: LogQueryState, msg: Msg) -> (LogQueryState, Vec<Effect>) {
    let effects = match msg {
        Msg::PageRequested { page, page_size } => {
            let page_size = page_size.max(1);
            if state.skip_reason(page, page_size).is_some() {
                Vec::new()
            } else {
                vec![Effect::FetchPage(state.begin_fetch(page_size))]
            }
        }
        Msg::FiltersEdited(filters) => {
            if state.replace_filters(filters) {
                vec![
                    Effect::CancelInFlight,
                    Effect::ScheduleFilterFetch {
                        page_size: state.page_size(),
                    },
                ]
            } else {
                Vec::new()
            }
        }
        Msg::PageLoaded { epoch, page } => {
            state.apply_page(epoch, page);
            Vec::new()
        }
        Msg::PageFailed { epoch, message } => {
            state.apply_failure(epoch, message);
            Vec::new()
        }
    };

    (state, effects)
}
