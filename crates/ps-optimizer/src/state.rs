//! Persistable record of search progress.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use ps_types::{Configuration, Metric, ParameterSet, SweepError};

use crate::domain::expand;

/// Unique sweep identifier.
pub type SweepId = Uuid;

/// Raw samples recorded for one configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreEntry {
    pub config: Configuration,
    pub samples: Vec<Metric>,
}

/// Per-configuration sample history, kept in first-score order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<ScoreEntry>", into = "Vec<ScoreEntry>")]
pub struct ScoreBook {
    entries: Vec<ScoreEntry>,
    index: HashMap<Configuration, usize>,
}

impl ScoreBook {
    pub fn record(&mut self, config: &Configuration, metric: Metric) {
        match self.index.get(config) {
            Some(&i) => self.entries[i].samples.push(metric),
            None => {
                self.index.insert(config.clone(), self.entries.len());
                self.entries.push(ScoreEntry {
                    config: config.clone(),
                    samples: vec![metric],
                });
            }
        }
    }

    pub fn samples(&self, config: &Configuration) -> Option<&[Metric]> {
        self.index
            .get(config)
            .map(|&i| self.entries[i].samples.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScoreEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<Vec<ScoreEntry>> for ScoreBook {
    fn from(entries: Vec<ScoreEntry>) -> Self {
        let index = entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (entry.config.clone(), i))
            .collect();
        Self { entries, index }
    }
}

impl From<ScoreBook> for Vec<ScoreEntry> {
    fn from(book: ScoreBook) -> Self {
        book.entries
    }
}

/// Mutable search state owned by one [`crate::Sweeper`].
///
/// Every field round-trips through serde so a resumed sweep continues with
/// the same sample history, parameter cursor and random stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweeperState {
    sweep_id: SweepId,
    /// Minimize when true.
    lower: bool,
    train: usize,
    remaining_train: usize,
    scores: ScoreBook,
    remaining_configs: Vec<Configuration>,
    done_configs: Vec<Configuration>,
    skipped_configs: Vec<Configuration>,
    /// Declared parameters and constraints the configurations were expanded from.
    parameter_set: ParameterSet,
    /// Names in ascending priority.
    parameters: Vec<String>,
    parameter_index: usize,
    current_parameter_key: String,
    selected: Configuration,
    rng: ChaCha8Rng,
}

impl SweeperState {
    pub fn new(
        parameters: &ParameterSet,
        train: usize,
        lower: bool,
        seed: Option<u64>,
    ) -> Result<Self, SweepError> {
        if train == 0 {
            return Err(SweepError::InvalidTrainBudget { train });
        }
        let configs = expand(&parameters.parameters, parameters.constraints())?;
        let rng = ChaCha8Rng::seed_from_u64(seed.unwrap_or_else(rand::random::<u64>));

        let mut state = Self {
            sweep_id: Uuid::new_v4(),
            lower,
            train,
            remaining_train: train,
            scores: ScoreBook::default(),
            remaining_configs: configs,
            done_configs: Vec::new(),
            skipped_configs: Vec::new(),
            parameters: parameters.names_by_priority(),
            parameter_set: parameters.clone(),
            parameter_index: 0,
            current_parameter_key: String::new(),
            selected: Configuration::new(),
            rng,
        };
        state.current_parameter_key = state.get_next_key()?;
        Ok(state)
    }

    pub fn sweep_id(&self) -> SweepId {
        self.sweep_id
    }

    pub fn lower(&self) -> bool {
        self.lower
    }

    pub fn train(&self) -> usize {
        self.train
    }

    pub fn remaining_train(&self) -> usize {
        self.remaining_train
    }

    pub fn scores(&self) -> &ScoreBook {
        &self.scores
    }

    pub fn remaining_configs(&self) -> &[Configuration] {
        &self.remaining_configs
    }

    pub fn done_configs(&self) -> &[Configuration] {
        &self.done_configs
    }

    pub fn skipped_configs(&self) -> &[Configuration] {
        &self.skipped_configs
    }

    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    pub fn parameter_set(&self) -> &ParameterSet {
        &self.parameter_set
    }

    /// Whether `other` declares the same parameters, values and constraints.
    pub fn covers(&self, other: &ParameterSet) -> bool {
        self.parameter_set.parameters == other.parameters
            && self.parameter_set.constraints() == other.constraints()
    }

    pub fn parameter_index(&self) -> usize {
        self.parameter_index
    }

    pub fn current_parameter_key(&self) -> &str {
        &self.current_parameter_key
    }

    pub fn selected(&self) -> &Configuration {
        &self.selected
    }

    /// Move `config` from remaining to done.
    pub fn done(&mut self, config: &Configuration) -> Result<(), SweepError> {
        let config = self.take_remaining(config, "done")?;
        self.done_configs.push(config);
        Ok(())
    }

    /// Move `config` from remaining to skipped.
    pub fn skipped(&mut self, config: &Configuration) -> Result<(), SweepError> {
        let config = self.take_remaining(config, "skipped")?;
        self.skipped_configs.push(config);
        Ok(())
    }

    /// Advance the parameter cursor and return the parameter it now points at.
    pub fn get_next_key(&mut self) -> Result<String, SweepError> {
        let key = self
            .parameters
            .get(self.parameter_index)
            .cloned()
            .ok_or(SweepError::ExhaustedParameterOrder {
                count: self.parameters.len(),
            })?;
        self.parameter_index += 1;
        Ok(key)
    }

    /// Check the structural invariants a loaded state must satisfy.
    pub fn validate(&self) -> Result<(), SweepError> {
        if self.train == 0 {
            return Err(SweepError::corruption("train budget is zero"));
        }
        if self.remaining_train > self.train {
            return Err(SweepError::corruption(format!(
                "remaining train {} exceeds budget {}",
                self.remaining_train, self.train
            )));
        }

        let names: HashSet<&str> = self.parameters.iter().map(String::as_str).collect();
        if names.is_empty() || names.len() != self.parameters.len() {
            return Err(SweepError::corruption("parameter order is empty or has duplicates"));
        }
        if self.parameter_set.names_by_priority() != self.parameters {
            return Err(SweepError::corruption(
                "parameter order does not match the declared parameter set",
            ));
        }
        if self.parameter_index == 0 || self.parameter_index > self.parameters.len() {
            return Err(SweepError::corruption(format!(
                "parameter cursor {} outside 1..={}",
                self.parameter_index,
                self.parameters.len()
            )));
        }
        if self.parameters[self.parameter_index - 1] != self.current_parameter_key {
            return Err(SweepError::corruption(format!(
                "current parameter '{}' does not match cursor {}",
                self.current_parameter_key, self.parameter_index
            )));
        }
        if let Some(unknown) = self.selected.keys().find(|k| !names.contains(k)) {
            return Err(SweepError::corruption(format!(
                "selected binds unknown parameter '{unknown}'"
            )));
        }

        let mut seen = HashSet::new();
        let collections = self
            .remaining_configs
            .iter()
            .chain(&self.done_configs)
            .chain(&self.skipped_configs);
        for config in collections {
            if !seen.insert(config) {
                return Err(SweepError::corruption(format!(
                    "{config} appears more than once across remaining/done/skipped"
                )));
            }
        }

        if self.scores.index.len() != self.scores.entries.len() {
            return Err(SweepError::corruption("score history lists a configuration twice"));
        }
        if let Some(entry) = self.scores.iter().find(|e| e.samples.is_empty()) {
            return Err(SweepError::corruption(format!(
                "{} has an empty sample list",
                entry.config
            )));
        }
        Ok(())
    }

    pub(crate) fn record_score(&mut self, config: &Configuration, metric: Metric) {
        self.scores.record(config, metric);
    }

    /// Uniform draw from the remaining configurations; spends one trial.
    pub(crate) fn draw_trial(&mut self) -> Option<Configuration> {
        let picked = self.remaining_configs.choose(&mut self.rng).cloned()?;
        self.remaining_train = self.remaining_train.saturating_sub(1);
        Some(picked)
    }

    /// Fix `key = value` and keep only remaining configurations consistent
    /// with the whole selection.
    pub(crate) fn lock_in(&mut self, key: String, value: String) {
        self.selected.insert(key, value);
        let selected = &self.selected;
        self.remaining_configs.retain(|c| c.starts_with(selected));
    }

    /// Move on to the next parameter with a full trial budget.
    pub(crate) fn advance_parameter(&mut self) -> Result<(), SweepError> {
        self.current_parameter_key = self.get_next_key()?;
        self.remaining_train = self.train;
        Ok(())
    }

    /// Grant the current parameter another full trial budget.
    pub(crate) fn restart_round(&mut self) {
        self.remaining_train = self.train;
    }

    pub(crate) fn set_selected(&mut self, selected: Configuration) {
        self.selected = selected;
    }

    fn take_remaining(
        &mut self,
        config: &Configuration,
        transition: &str,
    ) -> Result<Configuration, SweepError> {
        let position = self
            .remaining_configs
            .iter()
            .position(|c| c == config)
            .ok_or_else(|| SweepError::InvalidTransition {
                config: config.to_string(),
                message: format!("cannot mark as {transition}: not a remaining configuration"),
            })?;
        Ok(self.remaining_configs.remove(position))
    }
}
