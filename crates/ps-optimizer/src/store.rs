//! Persistence seam for sweeper checkpoints.

use ps_types::{PsResult, SweepError};

use crate::state::SweeperState;

/// Durable location holding one serialized [`SweeperState`].
pub trait StateStore {
    /// Whether a checkpoint is present.
    fn exists(&self) -> bool;

    /// Read the checkpoint back. A checkpoint that does not parse or fails
    /// [`SweeperState::validate`] is a `PersistenceCorruption` error.
    fn load(&self) -> PsResult<SweeperState>;

    /// Replace the checkpoint with `state`. Must not leave a half-written
    /// checkpoint behind.
    fn save(&mut self, state: &SweeperState) -> PsResult<()>;

    /// Discard any checkpoint.
    fn clear(&mut self) -> PsResult<()>;
}

/// In-process store holding the serialized checkpoint as JSON.
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    snapshot: Option<String>,
    saves: usize,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `save` calls.
    pub fn save_count(&self) -> usize {
        self.saves
    }

    /// Raw checkpoint text, if any.
    pub fn snapshot(&self) -> Option<&str> {
        self.snapshot.as_deref()
    }

    /// Overwrite the checkpoint text directly.
    pub fn set_snapshot(&mut self, json: impl Into<String>) {
        self.snapshot = Some(json.into());
    }
}

impl StateStore for MemoryStateStore {
    fn exists(&self) -> bool {
        self.snapshot.is_some()
    }

    fn load(&self) -> PsResult<SweeperState> {
        let json = self
            .snapshot
            .as_deref()
            .ok_or_else(|| SweepError::corruption("no checkpoint stored"))?;
        let state: SweeperState = serde_json::from_str(json)
            .map_err(|e| SweepError::corruption(format!("checkpoint does not parse: {e}")))?;
        state.validate()?;
        Ok(state)
    }

    fn save(&mut self, state: &SweeperState) -> PsResult<()> {
        self.snapshot = Some(serde_json::to_string(state)?);
        self.saves += 1;
        Ok(())
    }

    fn clear(&mut self) -> PsResult<()> {
        self.snapshot = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ps_types::{Parameter, ParameterSet, PsError};

    fn state() -> SweeperState {
        let set = ParameterSet::new(vec![Parameter::new("a", 1, ["1", "2"])]);
        SweeperState::new(&set, 1, true, Some(3)).unwrap()
    }

    #[test]
    fn saving_twice_loads_the_same_state() {
        let state = state();
        let mut store = MemoryStateStore::new();
        assert!(!store.exists());

        store.save(&state).unwrap();
        store.save(&state).unwrap();
        assert_eq!(store.save_count(), 2);
        assert_eq!(store.load().unwrap(), state);
    }

    #[test]
    fn garbage_checkpoint_is_corruption() {
        let mut store = MemoryStateStore::new();
        store.set_snapshot("{not json");
        assert!(matches!(
            store.load(),
            Err(PsError::Sweep(SweepError::PersistenceCorruption { .. }))
        ));
    }

    #[test]
    fn clear_removes_checkpoint() {
        let mut store = MemoryStateStore::new();
        store.save(&state()).unwrap();
        store.clear().unwrap();
        assert!(!store.exists());
    }
}
