use chrono::{DateTime, Local, TimeZone};
use dash_core::{LogRowView, LogViewModel, RowTone, Summary, TailLine};
use dash_engine::{ApiError, Refresher, StateView, TaskError};

/// Summary header shown above the query log.
pub struct SummaryPanel;

impl StateView<Summary, Summary, ApiError> for SummaryPanel {
    type View = String;

    fn initial(&self) -> String {
        "Summary: loading...".to_string()
    }

    fn ok(&self, summary: &Summary, _refresh: &Refresher<Summary, Summary, ApiError>) -> String {
        format!(
            "Queries: {} | Blocked: {} ({:.1}%) | Cached: {} | Forwarded: {} | Clients: {} | Blocklist: {}",
            format_with_commas(summary.total_queries),
            format_with_commas(summary.blocked_queries),
            summary.percent_blocked,
            format_with_commas(summary.cached),
            format_with_commas(summary.forwarded),
            summary.active_clients,
            format_with_commas(summary.domains_on_blocklist),
        )
    }

    fn err(
        &self,
        error: &TaskError<ApiError>,
        _refresh: &Refresher<Summary, Summary, ApiError>,
    ) -> String {
        format!("Summary unavailable: {error} (press r to retry)")
    }
}

pub fn format_row<Tz: TimeZone>(row: &LogRowView, zone: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let reply = match row.reply_ms {
        Some(ms) => format!("{} {:.1}ms", row.reply, ms),
        None => row.reply.to_string(),
    };
    format!(
        "{} {:<6} {:<5} {:<40} {:<20} {:<22} {}",
        format_time(row.time, zone),
        tone_label(row.tone),
        row.query_type.code(),
        row.domain,
        row.client,
        row.status.code(),
        reply
    )
}

pub fn format_local_row(row: &LogRowView) -> String {
    format_row(row, &Local)
}

pub fn format_tail_line(line: &TailLine) -> String {
    format!("[{}] {}", format_time(line.timestamp, &Local), line.message)
}

pub fn page_status(view: &LogViewModel) -> String {
    let mut status = format!("{} rows", view.rows.len());
    if view.active_filters > 0 {
        status.push_str(&format!(", {} filters", view.active_filters));
    }
    if view.loading {
        status.push_str(", loading");
    } else if view.at_end {
        status.push_str(", end of log");
    }
    if let Some(error) = &view.error {
        status.push_str(&format!(", last fetch failed: {error}"));
    }
    status
}

fn tone_label(tone: RowTone) -> &'static str {
    match tone {
        RowTone::Allowed => "OK",
        RowTone::Blocked => "BLOCK",
        RowTone::Cached => "CACHE",
        RowTone::Pending => "...",
        RowTone::Unknown => "?",
    }
}

fn format_time<Tz: TimeZone>(seconds: f64, zone: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1e9) as u32;
    match DateTime::from_timestamp(whole as i64, nanos) {
        Some(utc) => utc
            .with_timezone(zone)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        None => format!("{seconds:.0}"),
    }
}

fn format_with_commas(value: u64) -> String {
    let mut out = String::new();
    for (i, ch) in value.to_string().chars().rev().enumerate() {
        if i != 0 && i % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out.chars().rev().collect()
}
