//! Server enum codes for queries and the row tone lookup built on them.
//!
//! Every table has a fallback variant so a newer server that reports a code
//! this build does not know still produces a row instead of a decode error.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

macro_rules! code_table {
    (
        $(#[$meta:meta])*
        $name:ident, fallback = $fallback:ident {
            $($variant:ident => $code:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(from = "String", into = "String")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Wire code as the server spells it.
            pub fn code(self) -> &'static str {
                match self {
                    $($name::$variant => $code),+
                }
            }

            /// Exact, case-insensitive lookup. `None` for unknown codes.
            pub fn from_code(code: &str) -> Option<Self> {
                let code = code.trim();
                Self::ALL
                    .iter()
                    .copied()
                    .find(|candidate| candidate.code().eq_ignore_ascii_case(code))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                $name::$fallback
            }
        }

        impl From<String> for $name {
            fn from(code: String) -> Self {
                Self::from_code(&code).unwrap_or($name::$fallback)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.code().to_string()
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(code: &str) -> Result<Self, Self::Err> {
                Self::from_code(code).ok_or_else(|| code.to_string())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.code())
            }
        }
    };
}

code_table! {
    /// How the resolver handled a query.
    QueryStatus, fallback = Unknown {
        Unknown => "UNKNOWN",
        Gravity => "GRAVITY",
        Forwarded => "FORWARDED",
        Cache => "CACHE",
        Regex => "REGEX",
        Denylist => "DENYLIST",
        ExternalBlockedIp => "EXTERNAL_BLOCKED_IP",
        ExternalBlockedNull => "EXTERNAL_BLOCKED_NULL",
        ExternalBlockedNxra => "EXTERNAL_BLOCKED_NXRA",
        GravityCname => "GRAVITY_CNAME",
        RegexCname => "REGEX_CNAME",
        DenylistCname => "DENYLIST_CNAME",
        Retried => "RETRIED",
        RetriedDnssec => "RETRIED_DNSSEC",
        InProgress => "IN_PROGRESS",
        DbBusy => "DBBUSY",
        SpecialDomain => "SPECIAL_DOMAIN",
        CacheStale => "CACHE_STALE",
        ExternalBlockedEde15 => "EXTERNAL_BLOCKED_EDE15",
    }
}

code_table! {
    /// DNS record type asked for.
    QueryType, fallback = Other {
        A => "A",
        Aaaa => "AAAA",
        Any => "ANY",
        Srv => "SRV",
        Soa => "SOA",
        Ptr => "PTR",
        Txt => "TXT",
        Naptr => "NAPTR",
        Mx => "MX",
        Ds => "DS",
        Rrsig => "RRSIG",
        Dnskey => "DNSKEY",
        Ns => "NS",
        Svcb => "SVCB",
        Https => "HTTPS",
        Other => "OTHER",
    }
}

code_table! {
    /// Kind of answer the client received.
    ReplyType, fallback = Unknown {
        Unknown => "UNKNOWN",
        NoData => "NODATA",
        NxDomain => "NXDOMAIN",
        Cname => "CNAME",
        Ip => "IP",
        Domain => "DOMAIN",
        RrName => "RRNAME",
        ServFail => "SERVFAIL",
        Refused => "REFUSED",
        NotImp => "NOTIMP",
        Other => "OTHER",
        Dnssec => "DNSSEC",
        NoReply => "NONE",
        Blob => "BLOB",
    }
}

code_table! {
    DnssecStatus, fallback = Unknown {
        Unknown => "UNKNOWN",
        Secure => "SECURE",
        Insecure => "INSECURE",
        Bogus => "BOGUS",
        Abandoned => "ABANDONED",
        Truncated => "TRUNCATED",
    }
}

/// Row decoration for the log viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowTone {
    Allowed,
    Blocked,
    Cached,
    Pending,
    Unknown,
}

impl QueryStatus {
    pub fn is_blocked(self) -> bool {
        matches!(
            self,
            QueryStatus::Gravity
                | QueryStatus::Regex
                | QueryStatus::Denylist
                | QueryStatus::ExternalBlockedIp
                | QueryStatus::ExternalBlockedNull
                | QueryStatus::ExternalBlockedNxra
                | QueryStatus::ExternalBlockedEde15
                | QueryStatus::GravityCname
                | QueryStatus::RegexCname
                | QueryStatus::DenylistCname
                | QueryStatus::DbBusy
                | QueryStatus::SpecialDomain
        )
    }

    pub fn tone(self) -> RowTone {
        match self {
            QueryStatus::Unknown => RowTone::Unknown,
            QueryStatus::InProgress => RowTone::Pending,
            QueryStatus::Cache | QueryStatus::CacheStale => RowTone::Cached,
            QueryStatus::Forwarded | QueryStatus::Retried | QueryStatus::RetriedDnssec => {
                RowTone::Allowed
            }
            status if status.is_blocked() => RowTone::Blocked,
            _ => RowTone::Unknown,
        }
    }
}
