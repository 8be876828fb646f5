//! Drives a full benchmark sweep.

use std::fmt;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use ps_optimizer::{StartMode, Sweeper, SweeperOptions};
use ps_store::JsonFileStore;
use ps_types::{Configuration, ExecutorConfig, Metric, ParameterSet, PsError, PsResult};

use crate::csv_io::{MetricsCsv, ResultsCsvWriter};
use crate::runner::JobRunner;
use crate::transform::{configuration_label, JobArguments};

/// Outcome of a finished sweep.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepReport {
    pub sweep_id: Uuid,
    pub best: Option<Configuration>,
    pub best_score: Option<Metric>,
    pub skipped: Vec<Configuration>,
    /// Configurations run during this invocation.
    pub evaluated: usize,
}

impl fmt::Display for SweepReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Sweep {}", self.sweep_id)?;
        match (&self.best, &self.best_score) {
            (Some(best), Some(score)) => {
                writeln!(f, "Best score: {score}")?;
                writeln!(f, "Best config: {best}")?;
            }
            _ => writeln!(f, "No best configuration was found")?,
        }
        writeln!(f, "Configurations skipped due to an error:")?;
        if self.skipped.is_empty() {
            write!(f, "-")
        } else {
            let skipped: Vec<String> = self.skipped.iter().map(ToString::to_string).collect();
            write!(f, "{}", skipped.join("\n"))
        }
    }
}

/// Runs every configuration the sweeper proposes through a [`JobRunner`].
pub struct BenchmarkExecutor<R: JobRunner> {
    config: ExecutorConfig,
    parameters: ParameterSet,
    runner: R,
}

impl<R: JobRunner> BenchmarkExecutor<R> {
    pub fn new(config: ExecutorConfig, parameters: ParameterSet, runner: R) -> Self {
        Self {
            config,
            parameters,
            runner,
        }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub async fn execute(&mut self) -> PsResult<SweepReport> {
        info!("Starting job runner '{}'", self.runner.name());
        self.runner.start().await?;

        let result = self.run_sweep().await;

        if let Err(e) = self.runner.stop().await {
            warn!("Stopping job runner '{}' failed: {e}", self.runner.name());
        }
        result
    }

    async fn run_sweep(&mut self) -> PsResult<SweepReport> {
        let benchmark = self.config.benchmark_config.clone();
        let sweeper_config = self.config.sweeper_config.clone();

        let mut options = SweeperOptions::new(benchmark.train).with_lower(benchmark.lower);
        if let Some(seed) = sweeper_config.seed {
            options = options.with_seed(seed);
        }
        let mode = if sweeper_config.resume {
            StartMode::Resume
        } else {
            StartMode::Fresh
        };
        let store = JsonFileStore::new(&sweeper_config.workdir);
        let mut sweeper = Sweeper::new(&self.parameters, options, store, mode)?;

        let mut metric_name: Option<String> = None;
        let mut evaluated = 0;

        while sweeper.has_next()? {
            let Some(config) = sweeper.get_next()? else {
                break;
            };

            let mut args = JobArguments::from_configuration(&config);
            if let (Some(name), Some(path)) =
                (&benchmark.metrics_csv_param_name, &benchmark.metrics_csv_path)
            {
                args.insert(name.clone(), path.to_string_lossy());
            }
            let label = configuration_label(&config);
            info!("Benchmarking {label}");

            for round in 1..=benchmark.warmup_rounds {
                info!("Warmup round {round}/{} of {label}", benchmark.warmup_rounds);
                if let Err(e) = self.runner.submit(&args).await {
                    warn!("Warmup round {round} of {label} failed: {e}");
                }
            }

            let mut failed = false;
            for round in 1..=benchmark.measurement_rounds {
                info!(
                    "Measurement round {round}/{} of {label}",
                    benchmark.measurement_rounds
                );
                let stale = benchmark.metrics_csv_path.as_deref();
                match self.measure(&args, stale).await {
                    Ok((metric, name)) => {
                        info!("Scoring {label} with {metric}");
                        sweeper.score(&config, metric)?;
                        metric_name = name.or(metric_name);
                    }
                    Err(e) => {
                        warn!("Measurement round {round} of {label} failed: {e}");
                        failed = true;
                        break;
                    }
                }
            }

            if failed {
                sweeper.skipped(&config)?;
            } else {
                sweeper.done(&config)?;
            }
            evaluated += 1;
        }

        info!("Sweep {} finished, no configuration left to try", sweeper.sweep_id());

        let best = sweeper.best().cloned();
        let best_score = match &best {
            Some(best) => {
                let score = sweeper.get_score(best)?;
                info!("Best score: {score}");
                info!("Best config: {best}");

                let output = &benchmark.all_in_one_benchmark_results_csv_path;
                ResultsCsvWriter::new(output)
                    .write(sweeper.get_all_scores_by_config(), metric_name.as_deref())?;
                info!("All benchmark results are saved to {}", output.display());
                Some(score)
            }
            None => {
                warn!("No best configuration was found");
                None
            }
        };

        Ok(SweepReport {
            sweep_id: sweeper.sweep_id(),
            best,
            best_score,
            skipped: sweeper.skipped_configs().to_vec(),
            evaluated,
        })
    }

    /// One measured run: its summarized metric and the metric's name.
    ///
    /// `stale` is removed before the run so that a run which reports
    /// nothing cannot be scored with an earlier run's metrics.
    async fn measure(
        &mut self,
        args: &JobArguments,
        stale: Option<&Path>,
    ) -> PsResult<(Metric, Option<String>)> {
        if let Some(stale) = stale {
            match std::fs::remove_file(stale) {
                Ok(()) => debug!("Removed previous metrics file {}", stale.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        let path = self.runner.submit(args).await?;
        if !path.is_file() {
            return Err(PsError::Runner(format!(
                "run finished without writing {}",
                path.display()
            )));
        }
        let metrics = MetricsCsv::read(&path)?;
        let metric = metrics.summarized_metric()?.ok_or_else(|| {
            PsError::Csv(format!("{} holds no metric records", path.display()))
        })?;
        Ok((metric, metrics.metric_name().map(str::to_string)))
    }
}
