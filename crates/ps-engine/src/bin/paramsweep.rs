use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use ps_engine::{BenchmarkExecutor, SparkSubmitRunner};
use ps_types::{ExecutorConfig, ParameterSet};

/// Tune a Spark application's parameters by benchmarking it.
#[derive(Parser, Debug)]
#[command(name = "paramsweep", version)]
struct Cli {
    /// JSON file declaring the parameters, their values and constraints.
    #[arg(short = 'p', long = "parameters", value_name = "FILE")]
    parameters: PathBuf,
    /// JSON file with the Spark, benchmark and sweeper configuration.
    #[arg(short = 'c', long = "benchmark-config", value_name = "FILE")]
    benchmark_config: PathBuf,
    /// Continue from the checkpoint in the work directory.
    #[arg(long)]
    resume: bool,
    /// Log per-trial detail.
    #[arg(short = 'v', long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let parameters = ParameterSet::from_json_file(&cli.parameters)
        .with_context(|| format!("loading parameters from {}", cli.parameters.display()))?;
    let mut config = ExecutorConfig::from_json_file(&cli.benchmark_config).with_context(|| {
        format!(
            "loading benchmark config from {}",
            cli.benchmark_config.display()
        )
    })?;
    if cli.resume {
        config = config.with_resume(true);
    }

    let runner = SparkSubmitRunner::new(
        config.spark_config.clone(),
        config.benchmark_config.metrics_csv_path.clone(),
    )
    .with_log_dir(&config.sweeper_config.workdir);
    let mut executor = BenchmarkExecutor::new(config, parameters, runner);
    let report = executor.execute().await?;

    println!("{report}");
    Ok(())
}
