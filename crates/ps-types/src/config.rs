//! Executor configuration loaded from the benchmark config file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config_error;
use crate::errors::PsResult;

/// Where and how to launch the benchmarked Spark application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SparkConfig {
    pub spark_home: PathBuf,
    #[serde(default)]
    pub java_home: Option<PathBuf>,
    pub application_jar_path: PathBuf,
    pub application_classname: String,
    /// Spark master URL, e.g. `local[4]` or `spark://localhost:7077`.
    #[serde(default = "default_master")]
    pub master: String,
}

fn default_master() -> String {
    "local[1]".to_string()
}

/// Measurement protocol and search budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchmarkConfig {
    /// Runs per configuration whose results are discarded.
    pub warmup_rounds: usize,
    /// Runs per configuration whose metrics are scored.
    pub measurement_rounds: usize,
    /// Random samples tried before a parameter's value is locked in.
    pub train: usize,
    /// Minimize the metric when true, maximize otherwise.
    #[serde(default = "default_lower")]
    pub lower: bool,
    pub all_in_one_benchmark_results_csv_path: PathBuf,
    /// CLI flag the application reads its metrics CSV path from.
    #[serde(default)]
    pub metrics_csv_param_name: Option<String>,
    #[serde(default)]
    pub metrics_csv_path: Option<PathBuf>,
}

fn default_lower() -> bool {
    true
}

/// Persistence and resumption of the search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweeperConfig {
    #[serde(default = "default_workdir")]
    pub workdir: PathBuf,
    /// Continue from the checkpoint in `workdir` instead of starting over.
    #[serde(default)]
    pub resume: bool,
    /// Seed for the random trial picks; drawn from entropy when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_workdir() -> PathBuf {
    PathBuf::from("./sweeper_workdir")
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            workdir: default_workdir(),
            resume: false,
            seed: None,
        }
    }
}

/// Top-level benchmark configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    pub spark_config: SparkConfig,
    pub benchmark_config: BenchmarkConfig,
    #[serde(default)]
    pub sweeper_config: SweeperConfig,
}

impl ExecutorConfig {
    pub fn from_json_str(json: &str) -> PsResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> PsResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn with_resume(mut self, resume: bool) -> Self {
        self.sweeper_config.resume = resume;
        self
    }

    pub fn with_workdir(mut self, workdir: impl Into<PathBuf>) -> Self {
        self.sweeper_config.workdir = workdir.into();
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.sweeper_config.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> PsResult<()> {
        let benchmark = &self.benchmark_config;
        if benchmark.metrics_csv_param_name.is_some() && benchmark.metrics_csv_path.is_none() {
            return Err(config_error!(
                "set \"metrics_csv_path\" in benchmark_config, because \"metrics_csv_param_name\" is set"
            ));
        }
        if benchmark.measurement_rounds == 0 {
            return Err(config_error!("measurement_rounds must be at least 1"));
        }
        if benchmark.train == 0 {
            return Err(config_error!("train must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PsError;

    const CONFIG: &str = r#"{
        "spark_config": {
            "spark_home": "/opt/spark",
            "application_jar_path": "/opt/app/bench.jar",
            "application_classname": "org.example.Bench"
        },
        "benchmark_config": {
            "warmup_rounds": 1,
            "measurement_rounds": 3,
            "train": 4,
            "all_in_one_benchmark_results_csv_path": "results.csv",
            "metrics_csv_param_name": "--metrics",
            "metrics_csv_path": "/tmp/metrics.csv"
        }
    }"#;

    #[test]
    fn defaults_fill_optional_fields() {
        let config = ExecutorConfig::from_json_str(CONFIG).unwrap();
        assert_eq!(config.spark_config.master, "local[1]");
        assert!(config.spark_config.java_home.is_none());
        assert!(config.benchmark_config.lower);
        assert_eq!(config.sweeper_config, SweeperConfig::default());
        assert_eq!(config.sweeper_config.workdir, PathBuf::from("./sweeper_workdir"));
    }

    #[test]
    fn metrics_param_requires_path() {
        let mut config = ExecutorConfig::from_json_str(CONFIG).unwrap();
        config.benchmark_config.metrics_csv_path = None;
        assert!(matches!(config.validate(), Err(PsError::Config(_))));
    }

    #[test]
    fn zero_budgets_are_rejected() {
        let mut config = ExecutorConfig::from_json_str(CONFIG).unwrap();
        config.benchmark_config.measurement_rounds = 0;
        assert!(config.validate().is_err());

        let mut config = ExecutorConfig::from_json_str(CONFIG).unwrap();
        config.benchmark_config.train = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn builders_override_sweeper_settings() {
        let config = ExecutorConfig::from_json_str(CONFIG)
            .unwrap()
            .with_resume(true)
            .with_workdir("/tmp/work")
            .with_seed(7);
        assert!(config.sweeper_config.resume);
        assert_eq!(config.sweeper_config.workdir, PathBuf::from("/tmp/work"));
        assert_eq!(config.sweeper_config.seed, Some(7));
    }
}
