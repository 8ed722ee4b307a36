use std::fmt;

/// Machine-readable error codes surfaced by the CLI and any outer API layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    StoreNotFound,
    InvalidPathPattern,
    InvalidQueryOption,
    InvalidTimestamp,
    InvalidFilterExpression,
    MalformedHopPath,
    PatchApplyFailed,
    CorruptLogRecord,
    StoreUnavailable,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1001",
            Self::StoreNotFound => "E1002",
            Self::InvalidPathPattern => "E2001",
            Self::InvalidQueryOption => "E2002",
            Self::InvalidTimestamp => "E2003",
            Self::InvalidFilterExpression => "E2004",
            Self::MalformedHopPath => "E3001",
            Self::PatchApplyFailed => "E3002",
            Self::CorruptLogRecord => "E3003",
            Self::StoreUnavailable => "E5001",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::StoreNotFound => "Event store not found",
            Self::InvalidPathPattern => "Invalid path pattern",
            Self::InvalidQueryOption => "Invalid query option",
            Self::InvalidTimestamp => "Invalid timestamp",
            Self::InvalidFilterExpression => "Invalid filter expression",
            Self::MalformedHopPath => "Malformed hop path",
            Self::PatchApplyFailed => "Patch could not be applied",
            Self::CorruptLogRecord => "Corrupt event log record",
            Self::StoreUnavailable => "Event store unavailable",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix syntax in .rewind/config.toml and retry."),
            Self::StoreNotFound => {
                Some("Pass --log or --db, or set [store] in .rewind/config.toml.")
            }
            Self::InvalidPathPattern => {
                Some("Use one of /, /g/<glob>, /c/<glob>, /ng/<glob>, /n/<brace-list>.")
            }
            Self::InvalidQueryOption => Some("Check sort/group options against `rwd show --help`."),
            Self::InvalidTimestamp => Some("Use RFC 3339 or unix seconds, e.g. 1547560124.43204."),
            Self::InvalidFilterExpression => {
                Some("Write a predicate over document fields, e.g. `total > 5 && paid == true`.")
            }
            Self::MalformedHopPath | Self::PatchApplyFailed | Self::CorruptLogRecord => {
                Some("The event log is inconsistent for this node; re-import or repair it.")
            }
            Self::StoreUnavailable => Some("Check the store path and permissions, then retry."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }

    /// Whether the caller can fix the request (as opposed to the data or the
    /// environment being at fault).
    #[must_use]
    pub const fn is_bad_request(self) -> bool {
        matches!(
            self,
            Self::InvalidPathPattern
                | Self::InvalidQueryOption
                | Self::InvalidTimestamp
                | Self::InvalidFilterExpression
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
