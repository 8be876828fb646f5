//! Benchmark driver for Paramsweep.
//!
//! Pulls configurations from the sweeper, runs the benchmarked application
//! once per warmup and measurement round through a [`JobRunner`], scores the
//! measured metrics and exports every result once the sweep is over.

pub mod csv_io;
pub mod executor;
pub mod runner;
pub mod transform;

pub use csv_io::{MetricRecord, MetricsCsv, ResultsCsvWriter, CSV_HEADERS};
pub use executor::{BenchmarkExecutor, SweepReport};
pub use runner::{JobRunner, SparkSubmitRunner};
pub use transform::{configuration_label, JobArguments};
