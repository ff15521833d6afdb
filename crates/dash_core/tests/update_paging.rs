use std::sync::Once;

use dash_core::{
    update, ClientInfo, Effect, FilterCriterion, FilterSet, LogEntry, LogQueryState, Msg,
    PageRequest, PageResult, QueryStatus, QueryType, ReplyInfo, SkipReason, StatusFilter,
};
use pretty_assertions::assert_eq;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(dash_logging::initialize_for_tests);
}

fn entry(id: u64) -> LogEntry {
    LogEntry {
        id,
        time: 1_700_000_000.0 + id as f64,
        query_type: QueryType::A,
        domain: format!("host{id}.example.com"),
        client: ClientInfo {
            ip: "192.168.1.10".to_string(),
            name: None,
        },
        status: QueryStatus::Forwarded,
        reply: ReplyInfo::default(),
        dnssec: Default::default(),
        upstream: None,
    }
}

fn entries(range: std::ops::Range<u64>) -> Vec<LogEntry> {
    range.map(entry).collect()
}

fn request(state: LogQueryState, page: usize, page_size: usize) -> (LogQueryState, Vec<Effect>) {
    update(state, Msg::PageRequested { page, page_size })
}

fn load(state: LogQueryState, cursor: Option<&str>, items: Vec<LogEntry>) -> LogQueryState {
    let epoch = state.epoch();
    let (state, effects) = update(
        state,
        Msg::PageLoaded {
            epoch,
            page: PageResult::new(cursor.map(str::to_string), items),
        },
    );
    assert!(effects.is_empty());
    state
}

/// State holding `count` rows of a stable epoch with more data on the server.
fn with_history(count: u64) -> LogQueryState {
    let (state, effects) = request(LogQueryState::new(10), 0, 10);
    assert_eq!(effects.len(), 1);
    load(state, Some("next"), entries(0..count))
}

#[test]
fn first_request_fetches_without_cursor() {
    init_logging();
    let (mut state, effects) = request(LogQueryState::new(10), 0, 10);

    assert_eq!(effects, vec![Effect::FetchPage(PageRequest::default())]);
    assert!(state.is_loading());
    assert!(state.consume_dirty());
}

#[test]
fn second_trigger_while_loading_is_dropped() {
    init_logging();
    let (state, _) = request(LogQueryState::new(10), 0, 10);
    assert_eq!(state.skip_reason(0, 10), Some(SkipReason::Loading));

    let (state, effects) = request(state, 3, 10);
    assert!(effects.is_empty());
    assert!(state.is_loading());
}

#[test]
fn read_ahead_window_is_satisfied_exactly_below_the_boundary() {
    init_logging();
    let state = with_history(20);
    assert!(!state.filters_changed());

    let (state, effects) = request(state, 0, 10);
    assert!(effects.is_empty());
    assert_eq!(state.skip_reason(0, 10), Some(SkipReason::ReadAheadSatisfied));

    let (state, effects) = request(state, 1, 10);
    assert_eq!(
        effects,
        vec![Effect::FetchPage(PageRequest {
            epoch: 0,
            cursor: Some("next".to_string()),
            filters: FilterSet::new(),
        })]
    );
    assert!(state.is_loading());
}

#[test]
fn cursor_walk_ends_when_server_returns_no_cursor() {
    init_logging();
    let (state, _) = request(LogQueryState::new(10), 0, 10);
    let state = load(state, Some("abc"), entries(0..5));
    assert_eq!(state.history().len(), 5);
    assert_eq!(state.cursor(), Some("abc"));
    assert!(!state.at_end());

    let (state, effects) = request(state, 0, 10);
    assert_eq!(effects.len(), 1);
    let state = load(state, None, entries(5..7));
    assert_eq!(state.history().len(), 7);
    assert!(state.at_end());
    assert_eq!(state.cursor(), None);

    let (state, effects) = request(state, 0, 10);
    assert!(effects.is_empty());
    assert_eq!(state.skip_reason(5, 10), Some(SkipReason::AtEnd));
}

#[test]
fn changing_filters_resets_epoch_and_schedules_debounced_fetch() {
    init_logging();
    let state = with_history(20);
    let filters = FilterSet::new().with(FilterCriterion::DomainSubstring("ads".to_string()));

    let (state, effects) = update(state, Msg::FiltersEdited(filters.clone()));

    assert_eq!(
        effects,
        vec![
            Effect::CancelInFlight,
            Effect::ScheduleFilterFetch { page_size: 10 },
        ]
    );
    assert!(state.history().is_empty());
    assert_eq!(state.cursor(), None);
    assert!(!state.at_end());
    assert!(!state.is_loading());
    assert!(state.filters_changed());
    assert_eq!(state.filters(), &filters);
    assert_eq!(state.epoch(), 1);
}

#[test]
fn changed_filters_bypass_read_ahead_until_first_success() {
    init_logging();
    let state = with_history(30);
    let filters = FilterSet::new().with(FilterCriterion::Status(StatusFilter::Blocked));
    let (state, _) = update(state, Msg::FiltersEdited(filters));

    let (state, effects) = request(state, 0, 10);
    assert_eq!(effects.len(), 1);
    let state = load(state, Some("b1"), entries(100..130));
    assert!(!state.filters_changed());

    let (_, effects) = request(state, 0, 10);
    assert!(effects.is_empty());
}

#[test]
fn equal_filters_are_a_noop() {
    init_logging();
    let filters = FilterSet::new().with(FilterCriterion::QueryType(QueryType::Aaaa));
    let (state, _) = update(with_history(20), Msg::FiltersEdited(filters));
    let state = load(state, Some("c"), entries(0..20));
    let before = state.clone();

    let same = FilterSet::new().with(FilterCriterion::QueryType(QueryType::Aaaa));
    let (state, effects) = update(state, Msg::FiltersEdited(same));

    assert!(effects.is_empty());
    assert_eq!(state, before);
}

#[test]
fn padded_domain_text_does_not_reset_the_log() {
    init_logging();
    let filters = FilterSet::new().with(FilterCriterion::DomainSubstring("ads".to_string()));
    let (state, _) = update(with_history(20), Msg::FiltersEdited(filters));
    let state = load(state, Some("c"), entries(0..20));
    let before = state.clone();

    let padded = FilterSet::new().with(FilterCriterion::DomainSubstring("ads ".to_string()));
    let (state, effects) = update(state, Msg::FiltersEdited(padded));

    assert!(effects.is_empty());
    assert_eq!(state, before);
}

#[test]
fn stale_page_from_previous_epoch_is_discarded() {
    init_logging();
    let (state, _) = request(LogQueryState::new(10), 0, 10);
    let old_epoch = state.epoch();
    let filters = FilterSet::new().with(FilterCriterion::ClientSubstring("laptop".to_string()));
    let (state, _) = update(state, Msg::FiltersEdited(filters));

    let (state, _) = update(
        state,
        Msg::PageLoaded {
            epoch: old_epoch,
            page: PageResult::new(None, entries(0..4)),
        },
    );

    assert!(state.history().is_empty());
    assert!(!state.at_end());
    assert!(state.filters_changed());
}

#[test]
fn failure_keeps_rows_and_allows_manual_retry() {
    init_logging();
    let state = with_history(5);
    let (state, _) = request(state, 0, 10);
    let epoch = state.epoch();

    let (state, effects) = update(
        state,
        Msg::PageFailed {
            epoch,
            message: "http status 502".to_string(),
        },
    );
    assert!(effects.is_empty());
    assert_eq!(state.history().len(), 5);
    assert!(!state.is_loading());
    assert_eq!(state.view().error.as_deref(), Some("http status 502"));

    let (_, effects) = request(state, 0, 10);
    assert_eq!(effects.len(), 1);
}

#[test]
fn view_rows_carry_status_tone() {
    init_logging();
    let mut blocked = entry(1);
    blocked.status = QueryStatus::Gravity;
    blocked.client.name = Some("phone.lan".to_string());
    let (state, _) = request(LogQueryState::new(10), 0, 10);
    let state = load(state, Some("x"), vec![entry(0), blocked]);

    let view = state.view();
    assert_eq!(view.rows.len(), 2);
    assert_eq!(view.rows[0].tone, dash_core::RowTone::Allowed);
    assert_eq!(view.rows[0].client, "192.168.1.10");
    assert_eq!(view.rows[1].tone, dash_core::RowTone::Blocked);
    assert_eq!(view.rows[1].client, "phone.lan");
}
