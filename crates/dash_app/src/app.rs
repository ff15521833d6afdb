use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use dash_core::{FilterSet, Summary};
use dash_engine::{
    ApiError, DashboardApi, DataOrchestrator, LiveLogTail, PaginatedLogFetcher, ReqwestApi,
};
use dash_logging::{dash_debug, dash_info};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::MissedTickBehavior;

use crate::command::{self, Command};
use crate::config::DashConfig;
use crate::render::{self, SummaryPanel};

const REDRAW_INTERVAL: Duration = Duration::from_millis(250);

pub async fn run(config: DashConfig) -> anyhow::Result<()> {
    let initial_filters = config.filter_set()?;
    let api: Arc<dyn DashboardApi> =
        Arc::new(ReqwestApi::new(config.api_settings()).context("building http client")?);
    dash_info!("querydash connecting to {}", config.base_url);

    let mut dashboard = Dashboard::new(api, &config);
    dashboard.start(initial_filters);
    let result = dashboard.run_until_quit().await;
    dashboard.teardown();
    result
}

/// Summary header, paged query log and live resolver log for one terminal.
struct Dashboard {
    summary: DataOrchestrator<Summary, Summary, ApiError>,
    log: PaginatedLogFetcher,
    tail: LiveLogTail,
    page_size: usize,
    /// Last page the user asked to see.
    page: usize,
    printed_rows: usize,
    seen_lines: u64,
    needs_redraw: bool,
}

impl Dashboard {
    fn new(api: Arc<dyn DashboardApi>, config: &DashConfig) -> Self {
        let summary_api = Arc::clone(&api);
        let summary = DataOrchestrator::builder(
            move || {
                let api = Arc::clone(&summary_api);
                async move { api.summary().await }
            },
            |summary: Summary| summary,
        )
        .repeat_every(config.summary_interval())
        .ignore_cancel_errors(true)
        .build();

        let paging = config.paging_settings();
        Self {
            summary,
            log: PaginatedLogFetcher::new(Arc::clone(&api), paging),
            tail: LiveLogTail::new(api, config.tail_settings()),
            page_size: paging.page_size,
            page: 0,
            printed_rows: 0,
            seen_lines: 0,
            needs_redraw: true,
        }
    }

    fn start(&self, filters: FilterSet) {
        self.summary.start();
        self.tail.start();
        if filters.is_empty() {
            self.log.fetch_page(0, self.page_size);
        } else {
            self.log.set_filters(filters);
        }
    }

    async fn run_until_quit(&mut self) -> anyhow::Result<()> {
        let mut summary_updates = self.summary.subscribe();
        let mut input = BufReader::new(tokio::io::stdin()).lines();
        let mut input_open = true;
        let mut redraw = tokio::time::interval(REDRAW_INTERVAL);
        redraw.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        println!("{}", command::HELP);
        loop {
            tokio::select! {
                signal = &mut shutdown => {
                    signal.context("waiting for Ctrl-C")?;
                    dash_info!("interrupted, shutting down");
                    return Ok(());
                }
                Ok(()) = summary_updates.changed() => {
                    println!("{}", self.summary.render(&SummaryPanel));
                }
                line = input.next_line(), if input_open => {
                    match line.context("reading stdin")? {
                        Some(line) => {
                            if !self.handle_line(&line) {
                                return Ok(());
                            }
                        }
                        None => {
                            dash_debug!("stdin closed; running until Ctrl-C");
                            input_open = false;
                        }
                    }
                }
                _ = redraw.tick() => self.redraw(),
            }
        }
    }

    /// Returns `false` when the user asked to quit.
    fn handle_line(&mut self, line: &str) -> bool {
        match line.parse::<Command>() {
            Ok(Command::NextPage) => self.next_page(),
            Ok(Command::Filter { key, value }) => {
                let mut filters = self.log.filters();
                match filters.apply(&key, &value) {
                    Ok(()) => self.apply_filters(filters),
                    Err(err) => println!("{err}"),
                }
            }
            Ok(Command::ClearFilters) => self.apply_filters(FilterSet::new()),
            Ok(Command::Refresh) => {
                self.summary.refresh(None);
                self.tail.refresh();
                if self.log.last_error().is_some() {
                    self.log.fetch_page(self.page, self.page_size);
                }
            }
            Ok(Command::Quit) => return false,
            Ok(Command::Help) => println!("{}", command::HELP),
            Err(err) => println!("{err}; {}", command::HELP),
        }
        true
    }

    fn next_page(&mut self) {
        if self.log.at_end() && self.printed_rows >= self.log.history_len() {
            println!("-- end of log --");
            return;
        }
        self.page += 1;
        self.needs_redraw = true;
        self.log.fetch_page(self.page, self.page_size);
    }

    fn apply_filters(&mut self, filters: FilterSet) {
        if filters == self.log.filters() {
            return;
        }
        println!("-- {} filters active, reloading --", filters.len());
        self.page = 0;
        self.printed_rows = 0;
        self.log.set_filters(filters);
    }

    fn redraw(&mut self) {
        let dirty = self.log.consume_dirty();
        if dirty || std::mem::take(&mut self.needs_redraw) {
            let view = self.log.view();
            let visible = view
                .rows
                .len()
                .min((self.page + 1).saturating_mul(self.page_size));
            let start = self.printed_rows.min(visible);
            for row in &view.rows[start..visible] {
                println!("{}", render::format_local_row(row));
            }
            self.printed_rows = visible;
            println!("-- {} --", render::page_status(&view));
        }

        let (lines, received) = self.tail.lines_since(self.seen_lines);
        for line in &lines {
            println!("{}", render::format_tail_line(line));
        }
        self.seen_lines = received;
    }

    fn teardown(&self) {
        self.summary.teardown();
        self.log.teardown();
        self.tail.teardown();
        dash_info!("dashboard torn down");
    }
}
