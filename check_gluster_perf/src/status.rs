//! Monitoring status levels.
//!
//! Nagios and Icinga read a plugin's state from its exit code. The ordering of
//! [`Status`] is the escalation order: a check only ever moves up.

use std::fmt;

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
/// The state a check reports.
pub enum Status {
    /// Every metric is within thresholds
    #[default]
    Ok,
    /// At least one metric reached the warning threshold
    Warning,
    /// At least one metric reached the critical threshold, or the dump is stale
    Critical,
    /// The check itself failed to run
    Unknown,
}

impl Status {
    /// The process exit code understood by the monitoring system.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Status::Ok => 0,
            Status::Warning => 1,
            Status::Critical => 2,
            Status::Unknown => 3,
        }
    }

    /// Keep the worse of `self` and `other`.
    #[must_use]
    pub fn escalate(self, other: Status) -> Status {
        self.max(other)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Status::Ok => "OK",
            Status::Warning => "WARNING",
            Status::Critical => "CRITICAL",
            Status::Unknown => "UNKNOWN",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
/// How operational failures of the check are surfaced.
pub enum ErrorReporting {
    /// Failures are reported as [`Status::Unknown`]
    #[default]
    Unknown,
    /// Failures are reported as [`Status::Critical`]
    Critical,
}

impl ErrorReporting {
    /// The status an operational failure is reported with.
    #[must_use]
    pub const fn status(self) -> Status {
        match self {
            ErrorReporting::Unknown => Status::Unknown,
            ErrorReporting::Critical => Status::Critical,
        }
    }
}

impl std::str::FromStr for ErrorReporting {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input {
            "unknown" => Ok(ErrorReporting::Unknown),
            "critical" => Ok(ErrorReporting::Critical),
            _ => Err(format!(
                "unknown error reporting mode '{input}', expected unknown or critical"
            )),
        }
    }
}
