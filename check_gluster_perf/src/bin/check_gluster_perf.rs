use std::{path::PathBuf, process};

use check_gluster_perf::{
    check,
    config::{self, Config},
    report::Report,
    status::{ErrorReporting, Status},
    unit::TimeUnit,
};
use clap::{Parser, error::ErrorKind};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, util::SubscriberInitExt};

/// Report GlusterFS file operation latency to Nagios or Icinga.
///
/// Volume stat dumping must be enabled beforehand, for example with
/// `gluster volume set <volume> diagnostics.stats-dump-interval 60`.
#[derive(Parser, Debug)]
#[clap(version, about, long_about = None)]
struct Args {
    /// warning threshold, in --unit units
    #[clap(short = 'w', long, required_unless_present = "config_path")]
    warning: Option<f64>,
    /// critical threshold, in --unit units
    #[clap(short = 'c', long, required_unless_present = "config_path")]
    critical: Option<f64>,
    /// the name of the GlusterFS volume
    #[clap(short = 'v', long, required_unless_present = "config_path")]
    volume: Option<String>,
    /// unit the thresholds are given in: us, ms or s [default: us]
    #[clap(short = 'u', long)]
    unit: Option<TimeUnit>,
    /// unit metrics are reported in: us, ms or s [default: us]
    #[clap(long = "output-unit", visible_alias = "ou")]
    output_unit: Option<TimeUnit>,
    /// unit GlusterFS writes its stats in: us, ms or s [default: us]
    #[clap(long)]
    gluster_stats_unit: Option<TimeUnit>,
    /// read this stats dump instead of the volume's default one
    #[clap(long)]
    override_stats_file: Option<PathBuf>,
    /// case-insensitive regular expression metric names must fully match
    #[clap(long)]
    filter: Option<String>,
    /// maximum number of exceeding metrics named in the status line
    #[clap(long)]
    max_listed: Option<usize>,
    /// compare only the average of all metrics against the thresholds
    #[clap(long)]
    aggregate_only: bool,
    /// stats dumps older than this are reported critical, 0 disables
    #[clap(long)]
    max_file_age_minutes: Option<u64>,
    /// status used for failures of the check itself: unknown or critical
    #[clap(long)]
    report_errors: Option<ErrorReporting>,
    /// path on disk to a YAML configuration file, flags override its values
    #[clap(long)]
    config_path: Option<PathBuf>,
    /// write diagnostic logs to stderr
    #[clap(long)]
    verbose: bool,
}

impl Args {
    /// Build the run configuration, layering flags over the optional file.
    fn into_config(self) -> Result<Config, config::Error> {
        let mut config = match &self.config_path {
            Some(path) => {
                debug!(path = %path.display(), "loading configuration file");
                Config::load(path)?
            }
            // clap requires -w, -c and -v whenever --config-path is absent.
            None => Config::new(
                self.warning.unwrap_or_default(),
                self.critical.unwrap_or_default(),
                self.volume.clone().unwrap_or_default(),
            ),
        };

        if let Some(warning) = self.warning {
            config.warning = warning;
        }
        if let Some(critical) = self.critical {
            config.critical = critical;
        }
        if let Some(volume) = self.volume {
            config.volume = volume;
        }
        if let Some(unit) = self.unit {
            config.input_unit = unit;
        }
        if let Some(unit) = self.output_unit {
            config.output_unit = unit;
        }
        if let Some(unit) = self.gluster_stats_unit {
            config.gluster_unit = unit;
        }
        if let Some(path) = self.override_stats_file {
            config.stats_file = Some(path);
        }
        if let Some(filter) = self.filter {
            config.filter = filter;
        }
        if let Some(max_listed) = self.max_listed {
            config.max_listed = max_listed;
        }
        if self.aggregate_only {
            config.aggregate_only = true;
        }
        if let Some(minutes) = self.max_file_age_minutes {
            config.max_file_age_minutes = minutes;
        }
        if let Some(mode) = self.report_errors {
            config.report_errors = mode;
        }
        Ok(config)
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "off" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // stdout belongs to the monitoring system, diagnostics go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .finish()
        .init();
}

fn exit(status: Status, line: &str) -> ! {
    println!("{line}");
    process::exit(status.code())
}

fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            if matches!(
                err.kind(),
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion
            ) {
                err.exit();
            }
            let report = Report::failure(Status::Unknown, &format!("Invalid arguments: {err}"));
            exit(Status::Unknown, &report.to_string());
        }
    };

    init_logging(args.verbose);
    let version = env!("CARGO_PKG_VERSION");
    info!("Starting check_gluster_perf {version} run.");

    let operational = args.report_errors.unwrap_or_default().status();
    let config = match args.into_config() {
        Ok(config) => config,
        Err(err) => {
            let status = operational;
            let report = Report::failure(status, &format!("Invalid configuration: {err}"));
            exit(status, &report.to_string());
        }
    };

    let outcome = check::run(&config);
    info!(status = %outcome.status, "check finished");
    exit(outcome.status, &outcome.line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_flags() {
        let args = Args::try_parse_from(["check_gluster_perf", "-w", "50", "-c", "150", "-v", "gv0"])
            .expect("valid arguments");
        let config = args.into_config().expect("valid config");
        assert_eq!(config, Config::new(50.0, 150.0, "gv0"));
    }

    #[test]
    fn all_flags() {
        let args = Args::try_parse_from([
            "check_gluster_perf",
            "-w",
            "2",
            "-c",
            "5.5",
            "-v",
            "gv0",
            "-u",
            "ms",
            "--ou",
            "s",
            "--gluster-stats-unit",
            "us",
            "--override-stats-file",
            "/tmp/gv0.dump",
            "--filter",
            ".*write.*",
            "--max-listed",
            "2",
            "--aggregate-only",
            "--max-file-age-minutes",
            "0",
            "--report-errors",
            "critical",
        ])
        .expect("valid arguments");
        let config = args.into_config().expect("valid config");
        assert_eq!(config.critical, 5.5);
        assert_eq!(config.input_unit, TimeUnit::Milliseconds);
        assert_eq!(config.output_unit, TimeUnit::Seconds);
        assert_eq!(config.stats_path(), PathBuf::from("/tmp/gv0.dump"));
        assert_eq!(config.filter, ".*write.*");
        assert_eq!(config.max_listed, 2);
        assert!(config.aggregate_only);
        assert_eq!(config.max_file_age(), None);
        assert_eq!(config.report_errors, ErrorReporting::Critical);
    }

    #[test]
    fn thresholds_and_volume_are_required() {
        assert!(Args::try_parse_from(["check_gluster_perf", "-w", "50", "-c", "150"]).is_err());
        assert!(Args::try_parse_from(["check_gluster_perf", "-v", "gv0"]).is_err());
    }

    #[test]
    fn unknown_unit_is_rejected() {
        let result = Args::try_parse_from([
            "check_gluster_perf",
            "-w",
            "50",
            "-c",
            "150",
            "-v",
            "gv0",
            "-u",
            "minutes",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn flags_override_config_file() {
        let dir = tempfile::tempdir().expect("directory could not be created");
        let path = dir.path().join("check.yaml");
        std::fs::write(
            &path,
            "warning: 50\ncritical: 150\nvolume: gv0\noutput_unit: ms\n",
        )
        .expect("config could not be written");

        let config_arg = format!("--config-path={}", path.display());
        let args = Args::try_parse_from(["check_gluster_perf", config_arg.as_str(), "-c", "300"])
            .expect("valid arguments");
        let config = args.into_config().expect("valid config");
        assert_eq!(config.warning, 50.0);
        assert_eq!(config.critical, 300.0);
        assert_eq!(config.volume, "gv0");
        assert_eq!(config.output_unit, TimeUnit::Milliseconds);
    }
}
