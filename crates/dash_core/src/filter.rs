use std::collections::BTreeMap;

use crate::{DnssecStatus, QueryStatus, QueryType, ReplyType};

/// Value sent for "no filter on this key" by the filter controls.
const ALL: &str = "all";

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("unknown filter key {0:?}")]
    UnknownKey(String),
    #[error("filter {key} expects unix seconds, got {value:?}")]
    InvalidTimestamp { key: &'static str, value: String },
    #[error("filter {key} does not accept code {value:?}")]
    UnknownCode { key: &'static str, value: String },
}

/// One slot in a [`FilterSet`]. A set holds at most one criterion per key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FilterKey {
    TimeRange,
    QueryType,
    Domain,
    Client,
    Status,
    Dnssec,
    Reply,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusFilter {
    Allowed,
    Blocked,
    Exact(QueryStatus),
}

impl StatusFilter {
    pub fn code(self) -> &'static str {
        match self {
            StatusFilter::Allowed => "allowed",
            StatusFilter::Blocked => "blocked",
            StatusFilter::Exact(status) => status.code(),
        }
    }

    pub fn matches(self, status: QueryStatus) -> bool {
        match self {
            StatusFilter::Allowed => !status.is_blocked(),
            StatusFilter::Blocked => status.is_blocked(),
            StatusFilter::Exact(expected) => expected == status,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FilterCriterion {
    /// Inclusive unix-second bounds; either side may be open.
    TimeRange {
        from: Option<i64>,
        until: Option<i64>,
    },
    QueryType(QueryType),
    DomainSubstring(String),
    ClientSubstring(String),
    Status(StatusFilter),
    Dnssec(DnssecStatus),
    Reply(ReplyType),
}

impl FilterCriterion {
    pub fn key(&self) -> FilterKey {
        match self {
            FilterCriterion::TimeRange { .. } => FilterKey::TimeRange,
            FilterCriterion::QueryType(_) => FilterKey::QueryType,
            FilterCriterion::DomainSubstring(_) => FilterKey::Domain,
            FilterCriterion::ClientSubstring(_) => FilterKey::Client,
            FilterCriterion::Status(_) => FilterKey::Status,
            FilterCriterion::Dnssec(_) => FilterKey::Dnssec,
            FilterCriterion::Reply(_) => FilterKey::Reply,
        }
    }

    /// A criterion that filters nothing is stored as an absent key.
    fn is_vacuous(&self) -> bool {
        match self {
            FilterCriterion::TimeRange { from, until } => from.is_none() && until.is_none(),
            FilterCriterion::DomainSubstring(text) | FilterCriterion::ClientSubstring(text) => {
                text.trim().is_empty()
            }
            _ => false,
        }
    }

    /// Substring criteria are matched without surrounding whitespace.
    fn trimmed(self) -> Self {
        match self {
            FilterCriterion::DomainSubstring(text) => {
                FilterCriterion::DomainSubstring(text.trim().to_string())
            }
            FilterCriterion::ClientSubstring(text) => {
                FilterCriterion::ClientSubstring(text.trim().to_string())
            }
            other => other,
        }
    }

    fn encode_into(&self, out: &mut Vec<(&'static str, String)>) {
        match self {
            FilterCriterion::TimeRange { from, until } => {
                if let Some(from) = from {
                    out.push(("from", from.to_string()));
                }
                if let Some(until) = until {
                    out.push(("until", until.to_string()));
                }
            }
            FilterCriterion::QueryType(kind) => out.push(("query_type", kind.code().to_string())),
            FilterCriterion::DomainSubstring(text) => out.push(("domain", text.trim().to_string())),
            FilterCriterion::ClientSubstring(text) => out.push(("client", text.trim().to_string())),
            FilterCriterion::Status(status) => out.push(("status", status.code().to_string())),
            FilterCriterion::Dnssec(dnssec) => out.push(("dnssec", dnssec.code().to_string())),
            FilterCriterion::Reply(reply) => out.push(("reply", reply.code().to_string())),
        }
    }
}

/// Active query-log filters, keyed so the last value per key wins.
///
/// Two sets compare equal when they hold the same criteria, regardless of the
/// order they were edited in.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterSet {
    criteria: BTreeMap<FilterKey, FilterCriterion>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`FilterSet::insert`].
    pub fn with(mut self, criterion: FilterCriterion) -> Self {
        self.insert(criterion);
        self
    }

    /// Stores `criterion`, replacing any previous value for its key.
    /// Vacuous criteria (empty substring, open time range) clear the key.
    pub fn insert(&mut self, criterion: FilterCriterion) -> Option<FilterCriterion> {
        let criterion = criterion.trimmed();
        let key = criterion.key();
        if criterion.is_vacuous() {
            return self.criteria.remove(&key);
        }
        self.criteria.insert(key, criterion)
    }

    pub fn remove(&mut self, key: FilterKey) -> Option<FilterCriterion> {
        self.criteria.remove(&key)
    }

    pub fn get(&self, key: FilterKey) -> Option<&FilterCriterion> {
        self.criteria.get(&key)
    }

    pub fn len(&self) -> usize {
        self.criteria.len()
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FilterCriterion> {
        self.criteria.values()
    }

    /// Applies one wire-style `key=value` edit. An empty value or `all`
    /// removes the filter for that key.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<(), FilterError> {
        let value = value.trim();
        let cleared = value.is_empty() || value.eq_ignore_ascii_case(ALL);
        if key == "from" || key == "until" {
            let stamp = if cleared {
                None
            } else {
                Some(parse_timestamp(key, value)?)
            };
            let (mut from, mut until) = match self.get(FilterKey::TimeRange) {
                Some(FilterCriterion::TimeRange { from, until }) => (*from, *until),
                _ => (None, None),
            };
            if key == "from" {
                from = stamp;
            } else {
                until = stamp;
            }
            self.insert(FilterCriterion::TimeRange { from, until });
            return Ok(());
        }

        let filter_key = wire_key(key).ok_or_else(|| FilterError::UnknownKey(key.to_string()))?;
        if cleared {
            self.remove(filter_key);
            return Ok(());
        }

        let criterion = match filter_key {
            FilterKey::QueryType => FilterCriterion::QueryType(parse_code("query_type", value)?),
            FilterKey::Domain => FilterCriterion::DomainSubstring(value.to_string()),
            FilterKey::Client => FilterCriterion::ClientSubstring(value.to_string()),
            FilterKey::Status => FilterCriterion::Status(parse_status(value)?),
            FilterKey::Dnssec => FilterCriterion::Dnssec(parse_code("dnssec", value)?),
            FilterKey::Reply => FilterCriterion::Reply(parse_code("reply", value)?),
            FilterKey::TimeRange => return Err(FilterError::UnknownKey(key.to_string())),
        };
        self.insert(criterion);
        Ok(())
    }

    pub fn from_pairs<'a>(
        pairs: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<Self, FilterError> {
        let mut set = Self::new();
        for (key, value) in pairs {
            set.apply(key, value)?;
        }
        Ok(set)
    }

    /// Query parameters understood by the server, in a stable key order.
    pub fn encode(&self) -> Vec<(&'static str, String)> {
        let mut out = Vec::with_capacity(self.criteria.len() + 1);
        for criterion in self.criteria.values() {
            criterion.encode_into(&mut out);
        }
        out
    }
}

fn wire_key(key: &str) -> Option<FilterKey> {
    match key {
        "query_type" => Some(FilterKey::QueryType),
        "domain" => Some(FilterKey::Domain),
        "client" => Some(FilterKey::Client),
        "status" => Some(FilterKey::Status),
        "dnssec" => Some(FilterKey::Dnssec),
        "reply" => Some(FilterKey::Reply),
        _ => None,
    }
}

fn parse_timestamp(key: &str, value: &str) -> Result<i64, FilterError> {
    value.parse().map_err(|_| FilterError::InvalidTimestamp {
        key: if key == "from" { "from" } else { "until" },
        value: value.to_string(),
    })
}

fn parse_code<C: std::str::FromStr>(key: &'static str, value: &str) -> Result<C, FilterError> {
    value.parse().map_err(|_| FilterError::UnknownCode {
        key,
        value: value.to_string(),
    })
}

fn parse_status(value: &str) -> Result<StatusFilter, FilterError> {
    if value.eq_ignore_ascii_case("allowed") {
        return Ok(StatusFilter::Allowed);
    }
    if value.eq_ignore_ascii_case("blocked") {
        return Ok(StatusFilter::Blocked);
    }
    parse_code("status", value).map(StatusFilter::Exact)
}
