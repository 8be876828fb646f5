use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use ps_types::{config_error, PsError, PsResult, SparkConfig};

use crate::transform::JobArguments;

/// Launches the benchmarked application for one run.
#[async_trait]
pub trait JobRunner: Send + Sync {
    /// Bring up whatever the runs need.
    async fn start(&mut self) -> PsResult<()>;

    /// Tear down what `start` brought up.
    async fn stop(&mut self) -> PsResult<()>;

    /// Run the application to completion and return the path of the
    /// metrics CSV it wrote. An error means the run failed.
    async fn submit(&mut self, args: &JobArguments) -> PsResult<PathBuf>;

    fn name(&self) -> &str;
}

/// Runs the application with `spark-submit` in client deploy mode.
#[derive(Debug, Clone)]
pub struct SparkSubmitRunner {
    pub spark: SparkConfig,
    pub metrics_csv_path: Option<PathBuf>,
    /// Directory receiving `out.log` and `out.err` of every child process.
    pub log_dir: Option<PathBuf>,
}

impl SparkSubmitRunner {
    pub fn new(spark: SparkConfig, metrics_csv_path: Option<PathBuf>) -> Self {
        Self {
            spark,
            metrics_csv_path,
            log_dir: None,
        }
    }

    pub fn with_log_dir<P: AsRef<Path>>(mut self, log_dir: P) -> Self {
        self.log_dir = Some(log_dir.as_ref().to_path_buf());
        self
    }

    /// Append a child's output to `out.log` / `out.err` under the log directory.
    pub fn record_output(&self, what: &str, stdout: &[u8], stderr: &[u8]) -> PsResult<()> {
        let Some(log_dir) = &self.log_dir else {
            return Ok(());
        };
        std::fs::create_dir_all(log_dir)?;
        for (name, bytes) in [("out.log", stdout), ("out.err", stderr)] {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_dir.join(name))?;
            writeln!(file, "==> {what}")?;
            file.write_all(bytes)?;
        }
        Ok(())
    }

    /// A `spark://` master is a standalone cluster this runner manages.
    pub fn is_standalone(&self) -> bool {
        self.spark.master.starts_with("spark://")
    }

    /// The `spark-submit` invocation for one run.
    pub fn submit_command(&self, args: &JobArguments) -> Command {
        let mut command = Command::new(self.spark.spark_home.join("bin").join("spark-submit"));
        command
            .arg("--master")
            .arg(&self.spark.master)
            .arg("--deploy-mode")
            .arg("client")
            .arg("--class")
            .arg(&self.spark.application_classname)
            .arg(&self.spark.application_jar_path)
            .args(args.to_args());
        self.with_java_home(&mut command);
        command
    }

    fn script_command(&self, script: &str) -> Command {
        let mut command = Command::new(self.spark.spark_home.join("sbin").join(script));
        self.with_java_home(&mut command);
        command
    }

    fn with_java_home(&self, command: &mut Command) {
        if let Some(java_home) = &self.spark.java_home {
            command.env("JAVA_HOME", java_home);
        }
    }

    async fn run(&self, mut command: Command, what: &str) -> PsResult<()> {
        debug!("Running {what}: {:?}", command.as_std());
        let output = command
            .output()
            .await
            .map_err(|e| PsError::Runner(format!("{what} could not be launched: {e}")))?;

        if let Err(e) = self.record_output(what, &output.stdout, &output.stderr) {
            warn!("Could not record output of {what}: {e}");
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: Vec<&str> = stderr.lines().rev().take(5).collect();
            return Err(PsError::Runner(format!(
                "{what} exited with {}: {}",
                output.status,
                tail.into_iter().rev().collect::<Vec<_>>().join(" | ")
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl JobRunner for SparkSubmitRunner {
    async fn start(&mut self) -> PsResult<()> {
        if !self.is_standalone() {
            return Ok(());
        }
        info!("Starting Spark standalone cluster at {}", self.spark.master);
        self.run(self.script_command("start-master.sh"), "start-master.sh")
            .await?;
        let mut worker = self.script_command("start-worker.sh");
        worker.arg(&self.spark.master);
        self.run(worker, "start-worker.sh").await
    }

    async fn stop(&mut self) -> PsResult<()> {
        if !self.is_standalone() {
            return Ok(());
        }
        info!("Stopping Spark standalone cluster");
        self.run(self.script_command("stop-all.sh"), "stop-all.sh").await
    }

    async fn submit(&mut self, args: &JobArguments) -> PsResult<PathBuf> {
        let metrics_csv_path = self.metrics_csv_path.clone().ok_or_else(|| {
            config_error!("metrics_csv_path is not set, runs have nowhere to report metrics")
        })?;

        if let Err(e) = self.run(self.submit_command(args), "spark-submit").await {
            warn!("Spark application failed: {e}");
            return Err(e);
        }
        Ok(metrics_csv_path)
    }

    fn name(&self) -> &str {
        "spark-submit"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;

    fn spark(master: &str) -> SparkConfig {
        SparkConfig {
            spark_home: PathBuf::from("/opt/spark"),
            java_home: Some(PathBuf::from("/opt/jdk17")),
            application_jar_path: PathBuf::from("/opt/app/bench.jar"),
            application_classname: "org.example.Bench".to_string(),
            master: master.to_string(),
        }
    }

    #[test]
    fn submit_command_layout() {
        let runner = SparkSubmitRunner::new(spark("local[2]"), None);
        let mut args = JobArguments::new();
        args.insert("--partitions", "16");
        args.insert("", "positional");

        let command = runner.submit_command(&args);
        let std = command.as_std();
        assert_eq!(
            Path::new(std.get_program()),
            Path::new("/opt/spark/bin/spark-submit")
        );

        let argv: Vec<&OsStr> = std.get_args().collect();
        assert_eq!(
            argv,
            [
                "--master",
                "local[2]",
                "--deploy-mode",
                "client",
                "--class",
                "org.example.Bench",
                "/opt/app/bench.jar",
                "--partitions",
                "16",
                "positional",
            ]
        );

        let envs: Vec<_> = std.get_envs().collect();
        assert_eq!(
            envs,
            [(OsStr::new("JAVA_HOME"), Some(OsStr::new("/opt/jdk17")))]
        );
    }

    #[test]
    fn child_output_is_appended_to_log_files() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let log_dir = temp_dir.path().join("work");
        let runner = SparkSubmitRunner::new(spark("local[1]"), None).with_log_dir(&log_dir);

        runner
            .record_output("spark-submit", b"Pi is roughly 3.14\n", b"WARN NativeCodeLoader\n")
            .unwrap();
        runner
            .record_output("spark-submit", b"second run\n", b"")
            .unwrap();

        let log = std::fs::read_to_string(log_dir.join("out.log")).unwrap();
        assert_eq!(
            log,
            "==> spark-submit\nPi is roughly 3.14\n==> spark-submit\nsecond run\n"
        );
        let err = std::fs::read_to_string(log_dir.join("out.err")).unwrap();
        assert!(err.contains("WARN NativeCodeLoader"));
    }

    #[test]
    fn no_log_dir_records_nothing() {
        let runner = SparkSubmitRunner::new(spark("local[1]"), None);
        runner.record_output("spark-submit", b"ignored", b"").unwrap();
        assert!(runner.log_dir.is_none());
    }

    #[test]
    fn only_spark_masters_are_standalone() {
        assert!(SparkSubmitRunner::new(spark("spark://localhost:7077"), None).is_standalone());
        assert!(!SparkSubmitRunner::new(spark("local[*]"), None).is_standalone());
    }

    #[tokio::test]
    async fn local_start_and_stop_are_noops() {
        let mut runner = SparkSubmitRunner::new(spark("local[1]"), None);
        runner.start().await.unwrap();
        runner.stop().await.unwrap();
    }

    #[tokio::test]
    async fn missing_binary_is_a_runner_error() {
        let mut config = spark("local[1]");
        config.spark_home = PathBuf::from("/nonexistent/spark");
        let mut runner = SparkSubmitRunner::new(config, Some(PathBuf::from("/tmp/m.csv")));
        assert!(matches!(
            runner.submit(&JobArguments::new()).await,
            Err(PsError::Runner(_))
        ));
    }
}
