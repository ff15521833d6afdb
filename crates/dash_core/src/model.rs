use serde::{Deserialize, Serialize};

use crate::{DnssecStatus, QueryStatus, QueryType, ReplyType};

/// One row of the query log as the server reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: u64,
    /// Unix seconds with sub-second precision.
    pub time: f64,
    #[serde(rename = "type")]
    pub query_type: QueryType,
    pub domain: String,
    pub client: ClientInfo,
    pub status: QueryStatus,
    #[serde(default)]
    pub reply: ReplyInfo,
    #[serde(default)]
    pub dnssec: DnssecStatus,
    #[serde(default)]
    pub upstream: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub ip: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl ClientInfo {
    /// Hostname when the server resolved one, otherwise the address.
    pub fn label(&self) -> &str {
        self.name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.ip)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReplyInfo {
    #[serde(rename = "type", default)]
    pub kind: ReplyType,
    /// Reply delay in seconds.
    #[serde(default)]
    pub time: Option<f64>,
}

/// One page of cursor-addressed results. `cursor == None` means the server
/// has nothing after this page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageResult<D> {
    pub cursor: Option<String>,
    pub items: Vec<D>,
}

impl<D> PageResult<D> {
    pub fn new(cursor: Option<String>, items: Vec<D>) -> Self {
        Self { cursor, items }
    }

    pub fn is_last(&self) -> bool {
        self.cursor.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TailLine {
    pub timestamp: f64,
    pub message: String,
    #[serde(default)]
    pub prio: Option<String>,
}

/// Lines appended to the resolver log since the requested id.
#[derive(Debug, Clone, PartialEq)]
pub struct TailBatch {
    pub lines: Vec<TailLine>,
    /// Id to ask for on the next poll.
    pub next_id: u64,
    /// Server process id; a change means the log restarted.
    pub pid: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Summary {
    pub total_queries: u64,
    pub blocked_queries: u64,
    pub percent_blocked: f64,
    pub unique_domains: u64,
    pub forwarded: u64,
    pub cached: u64,
    pub active_clients: u64,
    pub domains_on_blocklist: u64,
}
