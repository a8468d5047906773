//! Time units and conversion between them.
//!
//! GlusterFS writes its latencies in microseconds, operators tend to think in
//! milliseconds. Every unit here is a power of ten away from seconds so
//! conversion is a single multiplication or division.

use std::{fmt, str::FromStr};

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
/// Error produced when a unit name is not one of `us`, `ms` or `s`.
#[error("Unknown time unit '{0}', expected one of: us, ms, s")]
pub struct ParseUnitError(String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
/// A unit of time, ordered from finest to coarsest.
pub enum TimeUnit {
    /// One millionth of a second
    #[serde(rename = "us")]
    Microseconds,
    /// One thousandth of a second
    #[serde(rename = "ms")]
    Milliseconds,
    /// A second
    #[serde(rename = "s")]
    Seconds,
}

impl TimeUnit {
    /// The number of decimal digits a value in this unit must be shifted by
    /// to land in seconds.
    #[must_use]
    pub const fn exponent(self) -> i32 {
        match self {
            TimeUnit::Microseconds => 6,
            TimeUnit::Milliseconds => 3,
            TimeUnit::Seconds => 0,
        }
    }

    /// The unit of measure suffix used in plugin output.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            TimeUnit::Microseconds => "us",
            TimeUnit::Milliseconds => "ms",
            TimeUnit::Seconds => "s",
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for TimeUnit {
    type Err = ParseUnitError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input {
            "us" => Ok(TimeUnit::Microseconds),
            "ms" => Ok(TimeUnit::Milliseconds),
            "s" => Ok(TimeUnit::Seconds),
            _ => Err(ParseUnitError(input.to_string())),
        }
    }
}

/// Convert `value` expressed in `from` into `to`.
///
/// Same-unit conversion returns `value` untouched, bit for bit.
#[must_use]
pub fn convert(value: f64, from: TimeUnit, to: TimeUnit) -> f64 {
    let diff = from.exponent() - to.exponent();
    match diff.signum() {
        -1 => value * 10f64.powi(diff.abs()),
        1 => value / 10f64.powi(diff),
        _ => value,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
/// A latency measurement tagged with its unit.
pub struct Metric {
    /// The measured value
    pub value: f64,
    /// The unit `value` is expressed in
    pub unit: TimeUnit,
}

impl Metric {
    /// Create a new [`Metric`]
    #[must_use]
    pub const fn new(value: f64, unit: TimeUnit) -> Self {
        Self { value, unit }
    }

    /// Return a fresh [`Metric`] holding this measurement expressed in `unit`.
    #[must_use]
    pub fn convert(self, unit: TimeUnit) -> Self {
        Self {
            value: convert(self.value, self.unit, unit),
            unit,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // f64's Display never falls back to exponent notation, which the
        // perfdata grammar does not accept.
        write!(f, "{}{}", self.value, self.unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const UNITS: [TimeUnit; 3] = [
        TimeUnit::Microseconds,
        TimeUnit::Milliseconds,
        TimeUnit::Seconds,
    ];

    fn any_unit() -> impl Strategy<Value = TimeUnit> {
        prop::sample::select(UNITS.to_vec())
    }

    #[test]
    fn seconds_to_finer_units_multiplies() {
        assert_eq!(
            convert(1.5, TimeUnit::Seconds, TimeUnit::Milliseconds),
            1500.0
        );
        assert_eq!(
            convert(2.0, TimeUnit::Seconds, TimeUnit::Microseconds),
            2_000_000.0
        );
        assert_eq!(
            convert(3.0, TimeUnit::Milliseconds, TimeUnit::Microseconds),
            3000.0
        );
    }

    #[test]
    fn finer_units_to_seconds_divides() {
        assert_eq!(
            convert(1500.0, TimeUnit::Milliseconds, TimeUnit::Seconds),
            1.5
        );
        assert_eq!(
            convert(250.0, TimeUnit::Microseconds, TimeUnit::Milliseconds),
            0.25
        );
    }

    #[test]
    fn unit_names_parse() {
        assert_eq!("us".parse(), Ok(TimeUnit::Microseconds));
        assert_eq!("ms".parse(), Ok(TimeUnit::Milliseconds));
        assert_eq!("s".parse(), Ok(TimeUnit::Seconds));
        assert!("sec".parse::<TimeUnit>().is_err());
        assert!("MS".parse::<TimeUnit>().is_err());
    }

    #[test]
    fn metric_display_has_no_exponent() {
        let tiny = Metric::new(1.0, TimeUnit::Microseconds).convert(TimeUnit::Seconds);
        assert_eq!(tiny.to_string(), "0.000001s");
        assert_eq!(
            Metric::new(100.0, TimeUnit::Microseconds).to_string(),
            "100us"
        );
    }

    proptest! {
        #[test]
        fn identity_is_exact(value in any::<f64>(), unit in any_unit()) {
            let converted = convert(value, unit, unit);
            prop_assert_eq!(converted.to_bits(), value.to_bits());
        }

        #[test]
        fn conversion_is_transitive(
            value in 0.0f64..1.0e9,
            a in any_unit(),
            b in any_unit(),
            c in any_unit(),
        ) {
            let stepped = convert(convert(value, a, b), b, c);
            let direct = convert(value, a, c);
            let tolerance = direct.abs().max(1.0) * 1e-12;
            prop_assert!((stepped - direct).abs() <= tolerance, "{stepped} != {direct}");
        }

        #[test]
        fn metric_convert_keeps_target_unit(value in 0.0f64..1.0e6, from in any_unit(), to in any_unit()) {
            let metric = Metric::new(value, from).convert(to);
            prop_assert_eq!(metric.unit, to);
            prop_assert_eq!(metric.value, convert(value, from, to));
        }
    }
}
