//! A single check run
//!
//! Opens the dump once, makes sure it is fresh, then runs it through the
//! reader, the evaluator and the renderer. Every failure along the way is
//! turned into a status so the caller always has exactly one line to print.

use std::{
    fs::File,
    io::{self, Read},
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use tracing::{debug, info, warn};

use crate::{
    config::{self, Config},
    dump,
    evaluate::{self, Evaluation, MetricSet, NameFilter},
    report::{self, Report},
    status::Status,
    unit::convert,
};

/// Name under which the average is listed when only it is compared.
pub const AGGREGATE_NAME: &str = "total_avg";

/// Errors produced by [`try_run`]
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The configuration is inconsistent.
    #[error("Invalid configuration: {0}")]
    Config(#[from] config::Error),
    /// The dump could not be opened or read.
    #[error("Could not read stats file {path:?}: {source}")]
    Io {
        /// The dump path
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: io::Error,
    },
    /// The dump has not been rewritten recently enough.
    #[error(
        "Stats file {path:?} is {age_minutes} minutes old, older than the allowed {max_minutes} minutes"
    )]
    Stale {
        /// The dump path
        path: PathBuf,
        /// Age of the dump in whole minutes
        age_minutes: u64,
        /// Maximum allowed age in minutes
        max_minutes: u64,
    },
    /// The dump is not in the expected format.
    #[error("Could not parse stats file: {0}")]
    Dump(#[from] dump::Error),
    /// A metric value is not numeric.
    #[error("Could not evaluate stats: {0}")]
    Evaluate(#[from] evaluate::Error),
}

impl Error {
    /// The status this failure is reported with. Stale data is always
    /// critical, every other failure is reported as `operational`.
    #[must_use]
    pub fn status(&self, operational: Status) -> Status {
        match self {
            Error::Stale { .. } => Status::Critical,
            Error::Config(_) | Error::Io { .. } | Error::Dump(_) | Error::Evaluate(_) => {
                operational
            }
        }
    }
}

/// The result of a check run: a status and the line to print.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// The status to exit with
    pub status: Status,
    /// The single line of plugin output
    pub line: String,
}

impl Outcome {
    fn from_report(status: Status, report: &Report) -> Self {
        Self {
            status,
            line: report.to_string(),
        }
    }
}

/// Run the check described by `config`. Never fails: errors become an
/// [`Outcome`] carrying their status and diagnostic.
#[must_use]
pub fn run(config: &Config) -> Outcome {
    match try_run(config) {
        Ok(outcome) => outcome,
        Err(err) => {
            let status = err.status(config.report_errors.status());
            warn!(%status, "check failed: {err}");
            Outcome::from_report(status, &Report::failure(status, &err.to_string()))
        }
    }
}

/// Run the check described by `config`.
///
/// # Errors
///
/// Function will return an error if the configuration is invalid, the dump
/// cannot be read, is stale, is malformed or holds a non-numeric metric.
pub fn try_run(config: &Config) -> Result<Outcome, Error> {
    config.validate()?;
    let filter = config.name_filter()?;
    let path = config.stats_path();

    let contents = read_fresh(&path, config.max_file_age())?;
    let objects = dump::read(&contents)?;
    info!(path = %path.display(), objects = objects.len(), "stats file read");

    let (evaluation, status) = evaluate_with_policy(config, &filter, &objects)?;
    let report = report::render(
        status,
        &evaluation.exceeding,
        &evaluation.performance,
        &config.thresholds(),
        evaluation.aggregate,
        config.max_listed,
    );
    Ok(Outcome::from_report(status, &report))
}

/// Evaluate the metrics, comparing either each of them or only their average
/// against the thresholds.
fn evaluate_with_policy(
    config: &Config,
    filter: &NameFilter,
    objects: &[dump::RawObject],
) -> Result<(Evaluation, Status), Error> {
    let thresholds = config.thresholds();
    let mut evaluation = evaluate::evaluate(
        objects,
        filter,
        thresholds,
        config.gluster_unit,
        config.output_unit,
        config.aggregate_only,
    )?;

    if !config.aggregate_only {
        let status = evaluation.status;
        return Ok((evaluation, status));
    }

    let aggregate = evaluation.aggregate;
    let comparable = convert(aggregate.value, aggregate.unit, thresholds.unit());
    let status = thresholds.classify(comparable);
    debug!(%aggregate, %status, "aggregate compared against thresholds");
    if status > Status::Ok {
        evaluation.exceeding = MetricSet::from([(AGGREGATE_NAME.to_string(), aggregate)]);
    }
    evaluation.status = status;
    Ok((evaluation, status))
}

/// Read `path` in full, refusing it if it is older than `max_age`. The file is
/// opened once and closed when this returns, on every path.
fn read_fresh(path: &Path, max_age: Option<Duration>) -> Result<String, Error> {
    let io_err = |source: io::Error| Error::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut file = File::open(path).map_err(io_err)?;

    if let Some(max_age) = max_age {
        let modified = file.metadata().and_then(|m| m.modified()).map_err(io_err)?;
        // A modification time in the future counts as fresh.
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO);
        debug!(age_secs = age.as_secs(), "stats file age");
        if age > max_age {
            return Err(Error::Stale {
                path: path.to_path_buf(),
                age_minutes: age.as_secs() / 60,
                max_minutes: max_age.as_secs() / 60,
            });
        }
    }

    let mut contents = String::new();
    file.read_to_string(&mut contents).map_err(io_err)?;
    Ok(contents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::ErrorReporting;

    #[test]
    fn stale_is_always_critical() {
        let err = Error::Stale {
            path: PathBuf::from("/x"),
            age_minutes: 10,
            max_minutes: 5,
        };
        assert_eq!(err.status(Status::Unknown), Status::Critical);
    }

    #[test]
    fn operational_errors_follow_reporting_mode() {
        let err = Error::Evaluate(evaluate::Error::DataFormat {
            name: "x".to_string(),
            value: "abc".to_string(),
        });
        assert_eq!(err.status(ErrorReporting::Unknown.status()), Status::Unknown);
        assert_eq!(
            err.status(ErrorReporting::Critical.status()),
            Status::Critical
        );
    }

    #[test]
    fn invalid_config_is_reported_not_raised() {
        let config = Config::new(10.0, 5.0, "gv0");
        let outcome = run(&config);
        assert_eq!(outcome.status, Status::Unknown);
        assert!(outcome.line.starts_with("GLUSTERFS PERF UNKNOWN - Invalid configuration"));
        assert!(outcome.line.ends_with('|'));
    }
}
