//! Durable checkpoints for the Paramsweep sweeper.

pub mod storage;

pub use storage::{JsonFileStore, Snapshot, SNAPSHOT_FILE, SNAPSHOT_FORMAT_VERSION};
