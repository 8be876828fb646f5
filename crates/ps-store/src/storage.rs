use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use ps_optimizer::{StateStore, SweeperState};
use ps_types::{PsResult, SweepError};

/// Checkpoint file name inside the work directory.
pub const SNAPSHOT_FILE: &str = "sweeper_state.json";

/// Bumped whenever the serialized state layout changes.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// On-disk envelope around a [`SweeperState`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub format_version: u32,
    pub saved_at: DateTime<Utc>,
    pub state: SweeperState,
}

/// Stores the sweeper checkpoint as JSON in a work directory
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    pub workdir: PathBuf,
}

impl JsonFileStore {
    /// The work directory is created on first save.
    pub fn new<P: AsRef<Path>>(workdir: P) -> Self {
        Self {
            workdir: workdir.as_ref().to_path_buf(),
        }
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.workdir.join(SNAPSHOT_FILE)
    }

    fn temp_path(&self) -> PathBuf {
        self.workdir.join(format!("{SNAPSHOT_FILE}.tmp"))
    }

    /// Read the full envelope, including when it was written.
    pub fn load_snapshot(&self) -> PsResult<Snapshot> {
        let path = self.snapshot_path();
        let json = fs::read_to_string(&path)?;
        let snapshot: Snapshot = serde_json::from_str(&json).map_err(|e| {
            SweepError::corruption(format!("{} does not parse: {e}", path.display()))
        })?;

        if snapshot.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(SweepError::corruption(format!(
                "{} has format version {}, expected {}",
                path.display(),
                snapshot.format_version,
                SNAPSHOT_FORMAT_VERSION
            ))
            .into());
        }
        snapshot.state.validate()?;
        Ok(snapshot)
    }
}

impl Default for JsonFileStore {
    fn default() -> Self {
        Self::new("./sweeper_workdir")
    }
}

impl StateStore for JsonFileStore {
    fn exists(&self) -> bool {
        self.snapshot_path().is_file()
    }

    fn load(&self) -> PsResult<SweeperState> {
        let snapshot = self.load_snapshot()?;
        debug!(
            "Loaded checkpoint of sweep {} saved at {}",
            snapshot.state.sweep_id(),
            snapshot.saved_at
        );
        Ok(snapshot.state)
    }

    fn save(&mut self, state: &SweeperState) -> PsResult<()> {
        fs::create_dir_all(&self.workdir)?;

        let snapshot = Snapshot {
            format_version: SNAPSHOT_FORMAT_VERSION,
            saved_at: Utc::now(),
            state: state.clone(),
        };
        let json = serde_json::to_vec_pretty(&snapshot)?;

        // Write to temp, fsync, then rename over the checkpoint
        let temp_path = self.temp_path();
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(&json)?;
        file.sync_all()?;
        drop(file);
        fs::rename(&temp_path, self.snapshot_path())?;

        if let Ok(dir) = fs::File::open(&self.workdir) {
            if let Err(err) = dir.sync_all() {
                warn!("Directory fsync failed for {}: {err}", self.workdir.display());
            }
        }
        Ok(())
    }

    fn clear(&mut self) -> PsResult<()> {
        for path in [self.snapshot_path(), self.temp_path()] {
            match fs::remove_file(&path) {
                Ok(()) => debug!("Removed {}", path.display()),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ps_optimizer::{StartMode, Sweeper, SweeperOptions};
    use ps_types::{Metric, Parameter, ParameterSet, PsError};
    use tempfile::TempDir;

    fn parameters() -> ParameterSet {
        ParameterSet::new(vec![
            Parameter::new("executors", 1, ["1", "2", "4"]),
            Parameter::new("serializer", 2, ["java", "kryo"]),
        ])
    }

    fn state() -> SweeperState {
        SweeperState::new(&parameters(), 2, true, Some(17)).unwrap()
    }

    #[test]
    fn test_storage_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = JsonFileStore::new(temp_dir.path().join("work"));
        assert!(!store.exists());

        let state = state();
        store.save(&state).unwrap();
        assert!(store.exists());
        assert_eq!(store.load().unwrap(), state);

        let snapshot = store.load_snapshot().unwrap();
        assert_eq!(snapshot.format_version, SNAPSHOT_FORMAT_VERSION);
        assert!(!temp_dir.path().join("work").join("sweeper_state.json.tmp").exists());
    }

    #[test]
    fn saving_twice_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = JsonFileStore::new(temp_dir.path());
        let state = state();
        store.save(&state).unwrap();
        store.save(&state).unwrap();
        assert_eq!(store.load().unwrap(), state);
    }

    #[test]
    fn garbage_file_is_corruption() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(temp_dir.path());
        fs::write(store.snapshot_path(), "{\"format_version\": 1, \"saved").unwrap();

        assert!(store.exists());
        assert!(matches!(
            store.load(),
            Err(PsError::Sweep(SweepError::PersistenceCorruption { .. }))
        ));
    }

    #[test]
    fn unknown_format_version_is_corruption() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = JsonFileStore::new(temp_dir.path());
        store.save(&state()).unwrap();

        let mut json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(store.snapshot_path()).unwrap()).unwrap();
        json["format_version"] = serde_json::json!(99);
        fs::write(store.snapshot_path(), json.to_string()).unwrap();

        assert!(matches!(
            store.load(),
            Err(PsError::Sweep(SweepError::PersistenceCorruption { .. }))
        ));
    }

    #[test]
    fn clear_removes_checkpoint() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = JsonFileStore::new(temp_dir.path());
        store.clear().unwrap();
        store.save(&state()).unwrap();
        store.clear().unwrap();
        assert!(!store.exists());
    }

    #[test]
    fn sweep_resumes_from_disk() {
        let temp_dir = TempDir::new().unwrap();
        let options = SweeperOptions::new(2).with_seed(5);
        let score = |c: &ps_types::Configuration| {
            let executors: i64 = c.get("executors").unwrap().parse().unwrap();
            let penalty = if c.get("serializer") == Some("kryo") { 0 } else { 100 };
            Metric::Scalar(1000 / executors + penalty)
        };

        let mut first = Sweeper::new(
            &parameters(),
            options,
            JsonFileStore::new(temp_dir.path()),
            StartMode::Fresh,
        )
        .unwrap();
        let config = first.get_next().unwrap().unwrap();
        first.score(&config, score(&config)).unwrap();
        first.done(&config).unwrap();
        let sweep_id = first.sweep_id();
        drop(first);

        let mut resumed = Sweeper::new(
            &parameters(),
            options,
            JsonFileStore::new(temp_dir.path()),
            StartMode::Resume,
        )
        .unwrap();
        assert_eq!(resumed.sweep_id(), sweep_id);
        assert_eq!(resumed.done_configs(), [config]);

        while let Some(next) = resumed.get_next().unwrap() {
            resumed.score(&next, score(&next)).unwrap();
            resumed.done(&next).unwrap();
        }
        assert!(resumed.has_best());
        assert_eq!(resumed.best().unwrap().get("serializer"), Some("kryo"));
    }
}
