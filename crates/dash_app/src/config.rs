use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use dash_core::{FilterError, FilterSet, DEFAULT_PAGE_SIZE, DEFAULT_TAIL_CAPACITY};
use dash_engine::{ApiSettings, PagingSettings, TailSettings, FILTER_DEBOUNCE};
use dash_logging::dash_info;
use serde::{Deserialize, Serialize};

use crate::logging::LogDestination;

pub const DEFAULT_CONFIG_PATH: &str = "./querydash.ron";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read {path:?}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("could not parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: ron::error::SpannedError,
    },
    #[error("invalid filter in config: {0}")]
    Filter(#[from] FilterError),
}

/// Settings for one dashboard session. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashConfig {
    pub base_url: String,
    pub session_id: Option<String>,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub max_response_bytes: u64,
    pub page_size: usize,
    pub debounce_ms: u64,
    pub tail_poll_ms: u64,
    pub summary_poll_ms: u64,
    pub tail_capacity: usize,
    /// Initial filters as `(key, value)` pairs, e.g. `("status", "blocked")`.
    pub filters: Vec<(String, String)>,
    pub log_destination: LogDestination,
    pub log_file: PathBuf,
}

impl Default for DashConfig {
    fn default() -> Self {
        let api = ApiSettings::default();
        Self {
            base_url: api.base_url,
            session_id: None,
            connect_timeout_ms: duration_ms(api.connect_timeout),
            request_timeout_ms: duration_ms(api.request_timeout),
            max_response_bytes: api.max_bytes,
            page_size: DEFAULT_PAGE_SIZE,
            debounce_ms: duration_ms(FILTER_DEBOUNCE),
            tail_poll_ms: duration_ms(TailSettings::default().poll_interval),
            summary_poll_ms: 5_000,
            tail_capacity: DEFAULT_TAIL_CAPACITY,
            filters: Vec::new(),
            log_destination: LogDestination::File,
            log_file: PathBuf::from("./querydash.log"),
        }
    }
}

impl DashConfig {
    pub fn api_settings(&self) -> ApiSettings {
        ApiSettings {
            base_url: self.base_url.clone(),
            session_id: self.session_id.clone().filter(|sid| !sid.is_empty()),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            max_bytes: self.max_response_bytes,
        }
    }

    pub fn paging_settings(&self) -> PagingSettings {
        PagingSettings {
            page_size: self.page_size.max(1),
            debounce: Duration::from_millis(self.debounce_ms),
        }
    }

    pub fn tail_settings(&self) -> TailSettings {
        TailSettings {
            poll_interval: Duration::from_millis(self.tail_poll_ms.max(1)),
            capacity: self.tail_capacity.max(1),
        }
    }

    pub fn summary_interval(&self) -> Duration {
        Duration::from_millis(self.summary_poll_ms.max(1))
    }

    pub fn filter_set(&self) -> Result<FilterSet, ConfigError> {
        let pairs = self
            .filters
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()));
        Ok(FilterSet::from_pairs(pairs)?)
    }
}

/// Loads `path`, falling back to defaults when the file does not exist.
pub fn load(path: &Path) -> Result<DashConfig, ConfigError> {
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Ok(DashConfig::default());
        }
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let config = ron::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    dash_info!("Loaded config from {:?}", path);
    Ok(config)
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
