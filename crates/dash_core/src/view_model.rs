use crate::{LogEntry, QueryStatus, QueryType, ReplyType, RowTone};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LogViewModel {
    pub rows: Vec<LogRowView>,
    pub loading: bool,
    pub at_end: bool,
    pub filters_changed: bool,
    pub active_filters: usize,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogRowView {
    pub id: u64,
    pub time: f64,
    pub query_type: QueryType,
    pub domain: String,
    pub client: String,
    pub status: QueryStatus,
    pub tone: RowTone,
    pub reply: ReplyType,
    pub reply_ms: Option<f64>,
}

impl LogRowView {
    pub fn from_entry(entry: &LogEntry) -> Self {
        Self {
            id: entry.id,
            time: entry.time,
            query_type: entry.query_type,
            domain: entry.domain.clone(),
            client: entry.client.label().to_string(),
            status: entry.status,
            tone: entry.status.tone(),
            reply: entry.reply.kind,
            reply_ms: entry.reply.time.map(|seconds| seconds * 1000.0),
        }
    }
}
