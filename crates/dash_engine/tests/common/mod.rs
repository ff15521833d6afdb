#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, Once};
use std::time::Duration;

use dash_core::{
    ClientInfo, LogEntry, PageRequest, PageResult, QueryStatus, QueryType, ReplyInfo, Summary,
    TailBatch, TailLine,
};
use dash_engine::{ApiError, DashboardApi, FailureKind};

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(dash_logging::initialize_for_tests);
}

/// Lets spawned tasks run; with paused time this also advances the clock.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

pub fn entry(id: u64) -> LogEntry {
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

pub fn entries(range: std::ops::Range<u64>) -> Vec<LogEntry> {
    range.map(entry).collect()
}

pub fn page(cursor: Option<&str>, items: Vec<LogEntry>) -> PageResult<LogEntry> {
    PageResult::new(cursor.map(str::to_string), items)
}

pub fn line(message: &str) -> TailLine {
    TailLine {
        timestamp: 1_700_000_000.0,
        message: message.to_string(),
        prio: None,
    }
}

pub fn network_error(message: &str) -> ApiError {
    ApiError {
        kind: FailureKind::Network,
        message: message.to_string(),
    }
}

/// Answers from a script and records every request it receives.
#[derive(Default)]
pub struct ScriptedApi {
    delay: Duration,
    pages: Mutex<VecDeque<Result<PageResult<LogEntry>, ApiError>>>,
    tails: Mutex<VecDeque<Result<TailBatch, ApiError>>>,
    page_requests: Mutex<Vec<PageRequest>>,
    tail_requests: Mutex<Vec<Option<u64>>>,
    summary_calls: AtomicUsize,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every response resolves only after `delay`.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn push_page(&self, response: Result<PageResult<LogEntry>, ApiError>) {
        self.pages.lock().unwrap().push_back(response);
    }

    pub fn push_tail(&self, response: Result<TailBatch, ApiError>) {
        self.tails.lock().unwrap().push_back(response);
    }

    pub fn page_requests(&self) -> Vec<PageRequest> {
        self.page_requests.lock().unwrap().clone()
    }

    pub fn tail_requests(&self) -> Vec<Option<u64>> {
        self.tail_requests.lock().unwrap().clone()
    }

    pub fn summary_calls(&self) -> usize {
        self.summary_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl DashboardApi for ScriptedApi {
    async fn query_page(&self, request: &PageRequest) -> Result<PageResult<LogEntry>, ApiError> {
        self.page_requests.lock().unwrap().push(request.clone());
        let response = self.pages.lock().unwrap().pop_front();
        tokio::time::sleep(self.delay).await;
        response.unwrap_or_else(|| Err(network_error("no scripted page")))
    }

    async fn log_tail(&self, next_id: Option<u64>) -> Result<TailBatch, ApiError> {
        self.tail_requests.lock().unwrap().push(next_id);
        let response = self.tails.lock().unwrap().pop_front();
        tokio::time::sleep(self.delay).await;
        response.unwrap_or_else(|| Err(network_error("no scripted batch")))
    }

    async fn summary(&self) -> Result<Summary, ApiError> {
        self.summary_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(Summary::default())
    }
}
