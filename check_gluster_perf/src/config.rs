//! This module controls configuration parsing from the end user, providing a
//! convenience mechanism for the rest of the program. Parameters arrive from
//! the command line, a YAML file or both; once built a [`Config`] is validated
//! before anything reads the dump.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;

use crate::{
    evaluate::{NameFilter, Thresholds},
    status::ErrorReporting,
    unit::TimeUnit,
};

/// Directory GlusterFS writes io-stats dumps into.
pub const STATS_DIR: &str = "/var/lib/glusterd/stats";

/// Errors produced by [`Config`]
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Error for a serde [`serde_yaml`].
    #[error("Failed to deserialize yaml: {0}")]
    SerdeYaml(#[from] serde_yaml::Error),
    /// Error reading config file
    #[error("Failed to read config file {path:?}: {source}")]
    ReadFile {
        /// File path
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },
    /// A threshold is negative, infinite or NaN.
    #[error("Invalid {name} threshold {value}, expected a finite non-negative number")]
    InvalidThreshold {
        /// Which threshold
        name: &'static str,
        /// The offending value
        value: f64,
    },
    /// Critical threshold below the warning threshold.
    #[error("Critical threshold {critical} is lower than warning threshold {warning}")]
    CriticalBelowWarning {
        /// Warning threshold
        warning: f64,
        /// Critical threshold
        critical: f64,
    },
    /// No volume name was given.
    #[error("Volume name must not be empty")]
    EmptyVolume,
    /// The metric name filter does not compile.
    #[error("Invalid metric filter: {0}")]
    Filter(#[from] regex::Error),
}

fn default_unit() -> TimeUnit {
    TimeUnit::Microseconds
}

fn default_filter() -> String {
    ".*latency_ave_usec".to_string()
}

fn default_max_listed() -> usize {
    5
}

fn default_max_file_age_minutes() -> u64 {
    5
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
#[serde(rename_all = "snake_case")]
/// Parameters of one check run.
pub struct Config {
    /// Warning threshold, in `input_unit`
    pub warning: f64,
    /// Critical threshold, in `input_unit`
    pub critical: f64,
    /// The GlusterFS volume being monitored
    pub volume: String,
    /// Read this dump instead of the volume's default location
    #[serde(default)]
    pub stats_file: Option<PathBuf>,
    /// Unit the thresholds are given in
    #[serde(default = "default_unit")]
    pub input_unit: TimeUnit,
    /// Unit metrics are reported in
    #[serde(default = "default_unit")]
    pub output_unit: TimeUnit,
    /// Unit GlusterFS writes its latencies in
    #[serde(default = "default_unit")]
    pub gluster_unit: TimeUnit,
    /// Case-insensitive regular expression metric names must fully match
    #[serde(default = "default_filter")]
    pub filter: String,
    /// How many exceeding metrics the status line names
    #[serde(default = "default_max_listed")]
    pub max_listed: usize,
    /// Compare only the average of all metrics against the thresholds
    #[serde(default)]
    pub aggregate_only: bool,
    /// Dumps older than this many minutes are stale, zero disables the check
    #[serde(default = "default_max_file_age_minutes")]
    pub max_file_age_minutes: u64,
    /// How failures of the check itself are reported
    #[serde(default)]
    pub report_errors: ErrorReporting,
}

impl Config {
    /// Create a [`Config`] with the given thresholds and volume, every other
    /// parameter at its default.
    #[must_use]
    pub fn new(warning: f64, critical: f64, volume: impl Into<String>) -> Self {
        Self {
            warning,
            critical,
            volume: volume.into(),
            stats_file: None,
            input_unit: default_unit(),
            output_unit: default_unit(),
            gluster_unit: default_unit(),
            filter: default_filter(),
            max_listed: default_max_listed(),
            aggregate_only: false,
            max_file_age_minutes: default_max_file_age_minutes(),
            report_errors: ErrorReporting::default(),
        }
    }

    /// Parse a [`Config`] from YAML text. The result is not yet validated.
    ///
    /// # Errors
    ///
    /// Function will return an error if `contents` is not valid YAML for a
    /// [`Config`].
    pub fn from_yaml(contents: &str) -> Result<Self, Error> {
        Ok(serde_yaml::from_str(contents)?)
    }

    /// Read and parse a YAML [`Config`] from `path`.
    ///
    /// # Errors
    ///
    /// Function will return an error if the file cannot be read or does not
    /// hold a valid [`Config`].
    pub fn load(path: &Path) -> Result<Self, Error> {
        let contents = fs::read_to_string(path).map_err(|source| Error::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&contents)
    }

    /// Check the parameters are consistent with one another.
    ///
    /// # Errors
    ///
    /// Function will return an error if a threshold is negative or not
    /// finite, if critical is below warning, if the volume name is empty or if
    /// the filter is not a valid regular expression.
    pub fn validate(&self) -> Result<(), Error> {
        for (name, value) in [("warning", self.warning), ("critical", self.critical)] {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::InvalidThreshold { name, value });
            }
        }
        if self.critical < self.warning {
            return Err(Error::CriticalBelowWarning {
                warning: self.warning,
                critical: self.critical,
            });
        }
        if self.volume.trim().is_empty() && self.stats_file.is_none() {
            return Err(Error::EmptyVolume);
        }
        self.name_filter()?;
        Ok(())
    }

    /// The dump file to read.
    #[must_use]
    pub fn stats_path(&self) -> PathBuf {
        self.stats_file.clone().unwrap_or_else(|| {
            Path::new(STATS_DIR).join(format!("glusterfs_{volume}.dump", volume = self.volume))
        })
    }

    /// Warning and critical thresholds in `input_unit`.
    #[must_use]
    pub fn thresholds(&self) -> Thresholds {
        Thresholds::new(self.warning, self.critical, self.input_unit)
    }

    /// Compile the metric name filter.
    ///
    /// # Errors
    ///
    /// Function will return an error if the filter is not a valid regular
    /// expression.
    pub fn name_filter(&self) -> Result<NameFilter, Error> {
        Ok(NameFilter::new(&self.filter)?)
    }

    /// The age past which a dump is stale, if the check is enabled.
    #[must_use]
    pub fn max_file_age(&self) -> Option<Duration> {
        (self.max_file_age_minutes > 0).then(|| Duration::from_secs(self.max_file_age_minutes * 60))
    }
}
