//! GlusterFS file operation latency check.
//!
//! This library supports the `check_gluster_perf` binary found elsewhere in
//! this project. GlusterFS, when asked to, periodically writes its io-stats
//! into a dump file. The pieces here read that dump, pick out the latency
//! metrics the operator cares about, compare them against thresholds and
//! render the result the way Nagios and Icinga expect plugin output to look.

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]
#![deny(clippy::dbg_macro)]
#![deny(clippy::unwrap_used)]
#![deny(unused_extern_crates)]
#![deny(unused_allocation)]
#![deny(unused_assignments)]
#![deny(unused_comparisons)]
#![deny(unreachable_pub)]
#![deny(missing_docs)]
#![deny(missing_copy_implementations)]
#![deny(missing_debug_implementations)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::multiple_crate_versions)]

pub mod check;
pub mod config;
pub mod dump;
pub mod evaluate;
pub mod report;
pub mod status;
pub mod unit;
