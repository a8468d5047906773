//! Plugin output rendering
//!
//! Nagios and Icinga split plugin output at the first `|`: the left half is
//! shown to humans, the right half is performance data parsed with a fixed
//! grammar, `'label'=value[UOM];[warn];[crit]` separated by spaces.

use std::fmt;

use crate::{
    evaluate::{MetricSet, Thresholds},
    status::Status,
    unit::Metric,
};

/// Leading text of every status line.
pub const PREFIX: &str = "GLUSTERFS PERF";

/// A rendered check result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    /// Human readable summary
    pub status_line: String,
    /// Machine readable performance data, possibly empty
    pub perf_data: String,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.status_line, self.perf_data)
    }
}

impl Report {
    /// A report for a check that could not evaluate any metric.
    ///
    /// The diagnostic is folded onto one line and any `|` replaced, it would
    /// otherwise be read as the start of performance data.
    #[must_use]
    pub fn failure(status: Status, diagnostic: &str) -> Self {
        let diagnostic = diagnostic
            .split(['\n', '\r'])
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
            .replace('|', "/");
        Self {
            status_line: format!("{PREFIX} {status} - {diagnostic}"),
            perf_data: String::new(),
        }
    }
}

/// Render the outcome of an evaluation.
///
/// At most `max_listed` exceeding metrics are named in the status line, the
/// rest are counted.
#[must_use]
pub fn render(
    status: Status,
    exceeding: &MetricSet,
    performance: &MetricSet,
    thresholds: &Thresholds,
    aggregate: Metric,
    max_listed: usize,
) -> Report {
    Report {
        status_line: status_line(status, exceeding, aggregate, max_listed),
        perf_data: perf_data(performance, thresholds),
    }
}

fn status_line(
    status: Status,
    exceeding: &MetricSet,
    aggregate: Metric,
    max_listed: usize,
) -> String {
    if status == Status::Ok {
        return format!(
            "{PREFIX} {status} - All performance metrics within thresholds. Total avg: {aggregate}"
        );
    }

    let mut parts = vec![format!("{PREFIX} {status} - Metric(s) exceeding thresholds:")];
    let listed = exceeding
        .iter()
        .take(max_listed)
        .map(|(name, metric)| format!("{name}: {metric}"))
        .collect::<Vec<_>>();
    if !listed.is_empty() {
        parts.push(listed.join(", "));
    }
    let hidden = exceeding.len().saturating_sub(max_listed);
    if hidden > 0 {
        parts.push(format!("- {hidden} metrics hidden."));
    }
    parts.join(" ")
}

fn perf_data(performance: &MetricSet, thresholds: &Thresholds) -> String {
    performance
        .iter()
        .map(|(name, metric)| {
            // A single quote inside a quoted label is written twice.
            let label = name.replace('\'', "''");
            let warning = thresholds.warning.convert(metric.unit);
            let critical = thresholds.critical.convert(metric.unit);
            format!(
                "'{label}'={metric};{warning};{critical} ",
                warning = warning.value,
                critical = critical.value,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::TimeUnit;

    const US: TimeUnit = TimeUnit::Microseconds;
    const MS: TimeUnit = TimeUnit::Milliseconds;

    fn set(entries: &[(&str, f64)], unit: TimeUnit) -> MetricSet {
        entries
            .iter()
            .map(|(name, value)| ((*name).to_string(), Metric::new(*value, unit)))
            .collect()
    }

    #[test]
    fn ok_line_reports_average() {
        let performance = set(&[("foo_usec", 100.0)], US);
        let report = render(
            Status::Ok,
            &MetricSet::new(),
            &performance,
            &Thresholds::new(150.0, 200.0, US),
            Metric::new(100.0, US),
            5,
        );
        assert_eq!(
            report.status_line,
            "GLUSTERFS PERF OK - All performance metrics within thresholds. Total avg: 100us"
        );
        assert_eq!(report.perf_data, "'foo_usec'=100us;150;200 ");
        assert_eq!(
            report.to_string(),
            "GLUSTERFS PERF OK - All performance metrics within thresholds. Total avg: 100us|'foo_usec'=100us;150;200 "
        );
    }

    #[test]
    fn warning_line_lists_exceeding_metrics() {
        let exceeding = set(&[("write", 120.0), ("read", 80.0)], US);
        let report = render(
            Status::Warning,
            &exceeding,
            &exceeding,
            &Thresholds::new(50.0, 200.0, US),
            Metric::new(100.0, US),
            5,
        );
        assert_eq!(
            report.status_line,
            "GLUSTERFS PERF WARNING - Metric(s) exceeding thresholds: read: 80us, write: 120us"
        );
    }

    #[test]
    fn listing_is_capped_and_rest_counted() {
        let exceeding = set(
            &[("a", 1.0), ("b", 2.0), ("c", 3.0), ("d", 4.0), ("e", 5.0)],
            US,
        );
        let report = render(
            Status::Critical,
            &exceeding,
            &exceeding,
            &Thresholds::new(1.0, 2.0, US),
            Metric::new(3.0, US),
            2,
        );
        assert_eq!(
            report.status_line,
            "GLUSTERFS PERF CRITICAL - Metric(s) exceeding thresholds: a: 1us, b: 2us - 3 metrics hidden."
        );
        assert_eq!(report.status_line.matches("us,").count(), 1);
    }

    #[test]
    fn listing_everything_hides_nothing() {
        let exceeding = set(&[("a", 1.0), ("b", 2.0)], US);
        let report = render(
            Status::Warning,
            &exceeding,
            &exceeding,
            &Thresholds::new(1.0, 5.0, US),
            Metric::new(1.5, US),
            2,
        );
        assert!(!report.status_line.contains("hidden"));
    }

    #[test]
    fn listing_nothing_only_counts() {
        let exceeding = set(&[("a", 1.0), ("b", 2.0)], US);
        let report = render(
            Status::Warning,
            &exceeding,
            &exceeding,
            &Thresholds::new(1.0, 5.0, US),
            Metric::new(1.5, US),
            0,
        );
        assert_eq!(
            report.status_line,
            "GLUSTERFS PERF WARNING - Metric(s) exceeding thresholds: - 2 metrics hidden."
        );
    }

    #[test]
    fn perf_data_thresholds_follow_metric_unit() {
        let performance = set(&[("lookup", 1.5), ("open", 0.25)], MS);
        let report = render(
            Status::Ok,
            &MetricSet::new(),
            &performance,
            &Thresholds::new(500.0, 2000.0, US),
            Metric::new(0.875, MS),
            5,
        );
        assert_eq!(report.perf_data, "'lookup'=1.5ms;0.5;2 'open'=0.25ms;0.5;2 ");
    }

    #[test]
    fn perf_data_labels_escape_quotes() {
        let performance = set(&[("it's", 3.0)], US);
        let report = render(
            Status::Ok,
            &MetricSet::new(),
            &performance,
            &Thresholds::new(5.0, 10.0, US),
            Metric::new(3.0, US),
            5,
        );
        assert_eq!(report.perf_data, "'it''s'=3us;5;10 ");
    }

    #[test]
    fn failure_has_empty_perf_data() {
        let report = Report::failure(Status::Unknown, "Stats file not found");
        assert_eq!(
            report.to_string(),
            "GLUSTERFS PERF UNKNOWN - Stats file not found|"
        );
    }

    #[test]
    fn failure_is_a_single_line() {
        let report = Report::failure(Status::Unknown, "bad fragment: {\n  \"a\" | \"b\"\n}");
        assert_eq!(
            report.status_line,
            "GLUSTERFS PERF UNKNOWN - bad fragment: { \"a\" / \"b\" }"
        );
    }
}
