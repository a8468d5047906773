//! Metric evaluation
//!
//! Every `(name, value)` pair read from the dump is filtered by name,
//! converted, stored and compared against the thresholds. The pass also keeps
//! a running average of every non-zero metric it kept.

use std::collections::BTreeMap;

use average::{Estimate, Mean};
use regex::{Regex, RegexBuilder};
use tracing::{debug, trace};

use crate::{
    dump::RawObject,
    status::Status,
    unit::{Metric, TimeUnit, convert},
};

/// Metrics by name, iterated in lexicographic order.
pub type MetricSet = BTreeMap<String, Metric>;

/// Errors produced by [`evaluate`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A metric value did not parse as a finite decimal number.
    #[error("Metric '{name}' has a non-numeric value '{value}'")]
    DataFormat {
        /// The metric name
        name: String,
        /// The raw value found in the dump
        value: String,
    },
}

/// A case-insensitive, whole-name match on metric names.
#[derive(Debug, Clone)]
pub struct NameFilter {
    regex: Regex,
}

impl NameFilter {
    /// Compile `pattern`. The pattern must match a metric name in full, not a
    /// substring of it.
    ///
    /// # Errors
    ///
    /// Function will return an error if `pattern` is not a valid regular
    /// expression.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let regex = RegexBuilder::new(&format!("^(?:{pattern})$"))
            .case_insensitive(true)
            .build()?;
        Ok(Self { regex })
    }

    /// Whether `name` passes the filter.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
/// Warning and critical boundaries, both in the same unit.
pub struct Thresholds {
    /// Metrics at or above this are at least [`Status::Warning`]
    pub warning: Metric,
    /// Metrics at or above this are [`Status::Critical`]
    pub critical: Metric,
}

impl Thresholds {
    /// Create thresholds from two raw values in `unit`.
    #[must_use]
    pub const fn new(warning: f64, critical: f64, unit: TimeUnit) -> Self {
        Self {
            warning: Metric::new(warning, unit),
            critical: Metric::new(critical, unit),
        }
    }

    /// The unit both thresholds are expressed in.
    #[must_use]
    pub const fn unit(&self) -> TimeUnit {
        self.warning.unit
    }

    /// Classify `value`, expressed in the thresholds' unit. Both comparisons
    /// are inclusive.
    #[must_use]
    pub fn classify(&self, value: f64) -> Status {
        if value >= self.critical.value {
            Status::Critical
        } else if value >= self.warning.value {
            Status::Warning
        } else {
            Status::Ok
        }
    }
}

/// Parameters of one evaluation pass.
#[derive(Debug, Clone, Copy)]
pub struct Evaluator<'a> {
    /// Which metric names take part
    pub filter: &'a NameFilter,
    /// Boundaries metrics are compared against
    pub thresholds: Thresholds,
    /// The unit values in the dump are written in
    pub source_unit: TimeUnit,
    /// The unit kept metrics are reported in
    pub output_unit: TimeUnit,
    /// When set every metric is kept but none is compared
    pub suppress_comparison: bool,
}

/// The result of an evaluation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Every metric that passed the filter, in output unit
    pub performance: MetricSet,
    /// Metrics at or above the warning threshold, in output unit
    pub exceeding: MetricSet,
    /// Mean of all non-zero kept metrics, in output unit
    pub aggregate: Metric,
    /// Worst classification seen
    pub status: Status,
}

impl Evaluator<'_> {
    /// Run one pass over `objects`.
    ///
    /// Objects are visited in order and their entries in dump order. A later
    /// entry of the same name replaces an earlier one in the performance set.
    ///
    /// # Errors
    ///
    /// Function will return an error on the first kept metric whose value is
    /// not a finite decimal number. No partial result is returned.
    pub fn evaluate(&self, objects: &[RawObject]) -> Result<Evaluation, Error> {
        let mut performance = MetricSet::new();
        let mut exceeding = MetricSet::new();
        let mut average = Mean::new();
        let mut status = Status::Ok;
        let threshold_unit = self.thresholds.unit();

        for (name, raw) in objects.iter().flat_map(|object| object.iter()) {
            if !self.filter.matches(name) {
                trace!(name, "metric filtered out");
                continue;
            }

            let value = raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|value| value.is_finite())
                .ok_or_else(|| Error::DataFormat {
                    name: name.to_string(),
                    value: raw.to_string(),
                })?;

            // Both conversions start from the raw value so that rounding in
            // one does not leak into the other.
            let comparable = convert(value, self.source_unit, threshold_unit);
            let output = Metric::new(
                convert(value, self.source_unit, self.output_unit),
                self.output_unit,
            );

            performance.insert(name.to_string(), output);

            if !self.suppress_comparison {
                let level = self.thresholds.classify(comparable);
                if level > Status::Ok {
                    debug!(name, %output, %level, "metric exceeds threshold");
                    exceeding.insert(name.to_string(), output);
                    status = status.escalate(level);
                }
            }

            if comparable.abs() > 0.0 {
                average.add(output.value);
            }
        }

        let mean = if average.is_empty() {
            0.0
        } else {
            average.mean()
        };
        let aggregate = Metric::new(mean, self.output_unit);
        debug!(
            kept = performance.len(),
            exceeding = exceeding.len(),
            %aggregate,
            %status,
            "evaluation finished"
        );

        Ok(Evaluation {
            performance,
            exceeding,
            aggregate,
            status,
        })
    }
}

/// Run one pass over `objects` with the given parameters.
///
/// # Errors
///
/// See [`Evaluator::evaluate`].
pub fn evaluate(
    objects: &[RawObject],
    filter: &NameFilter,
    thresholds: Thresholds,
    source_unit: TimeUnit,
    output_unit: TimeUnit,
    suppress_comparison: bool,
) -> Result<Evaluation, Error> {
    Evaluator {
        filter,
        thresholds,
        source_unit,
        output_unit,
        suppress_comparison,
    }
    .evaluate(objects)
}
