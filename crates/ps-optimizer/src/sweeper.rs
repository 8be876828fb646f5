//! Coordinate-wise greedy sweep over a constrained configuration space.
//!
//! Parameters are decided one at a time in ascending priority. For the
//! parameter being decided, up to `train` configurations consistent with the
//! values fixed so far are drawn at random and scored by the caller; the
//! value of the best observed configuration is then locked in and the search
//! moves on. This bounds experiment cost but gives no global-optimum
//! guarantee.

use std::fmt;

use tracing::{debug, info, warn};

use ps_types::{
    internal_error, validation_error, Configuration, Measure, Metric, ParameterSet, PsResult,
    SweepError,
};

use crate::state::{ScoreBook, SweepId, SweeperState};
use crate::store::StateStore;

/// Search budget and direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweeperOptions {
    /// Random trials per parameter decision.
    pub train: usize,
    /// Minimize when true, maximize otherwise.
    pub lower: bool,
    /// Seed for the trial draws; drawn from entropy when absent.
    pub seed: Option<u64>,
}

impl SweeperOptions {
    pub fn new(train: usize) -> Self {
        Self {
            train,
            lower: true,
            seed: None,
        }
    }

    pub fn with_lower(mut self, lower: bool) -> Self {
        self.lower = lower;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// How a sweeper treats an existing checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartMode {
    /// Continue from the checkpoint when there is one.
    Resume,
    /// Discard any checkpoint and start over.
    Fresh,
}

/// The search engine. Owns its state and checkpoints it through `S`.
#[derive(Debug)]
pub struct Sweeper<S: StateStore> {
    state: SweeperState,
    store: S,
}

impl<S: StateStore> Sweeper<S> {
    pub fn new(
        parameters: &ParameterSet,
        options: SweeperOptions,
        mut store: S,
        mode: StartMode,
    ) -> PsResult<Self> {
        if options.train == 0 {
            return Err(SweepError::InvalidTrainBudget { train: 0 }.into());
        }

        if mode == StartMode::Resume && store.exists() {
            let state = store.load()?;
            if !state.covers(parameters) {
                return Err(validation_error!(
                    "checkpoint of sweep {} was built from a different parameter set \
                     (parameters {:?}); start fresh or restore the original parameters file",
                    state.sweep_id(),
                    state.parameters()
                ));
            }
            if state.train() != options.train || state.lower() != options.lower {
                warn!(
                    "Checkpoint uses train={} lower={}, ignoring requested train={} lower={}",
                    state.train(),
                    state.lower(),
                    options.train,
                    options.lower
                );
            }
            info!(
                "Resuming sweep {}: {} remaining, {} done, {} skipped, deciding '{}'",
                state.sweep_id(),
                state.remaining_configs().len(),
                state.done_configs().len(),
                state.skipped_configs().len(),
                state.current_parameter_key()
            );
            return Ok(Self { state, store });
        }

        if mode == StartMode::Fresh {
            store.clear()?;
        }
        let state = SweeperState::new(parameters, options.train, options.lower, options.seed)?;
        info!(
            "Starting sweep {} over {} configurations ({} parameters, train={})",
            state.sweep_id(),
            state.remaining_configs().len(),
            state.parameters().len(),
            state.train()
        );
        store.save(&state)?;
        Ok(Self { state, store })
    }

    /// Whether configurations remain to be tried.
    ///
    /// Once none remain, `best` is recomputed from every recorded score.
    pub fn has_next(&mut self) -> PsResult<bool> {
        if self.state.remaining_configs().is_empty() {
            self.finalize()?;
            return Ok(false);
        }
        Ok(true)
    }

    /// The next configuration to run, or `None` when the sweep is over.
    pub fn get_next(&mut self) -> PsResult<Option<Configuration>> {
        loop {
            if self.state.remaining_configs().is_empty() {
                self.finalize()?;
                return Ok(None);
            }

            if self.state.remaining_train() > 0 {
                let config = self
                    .state
                    .draw_trial()
                    .ok_or_else(|| internal_error!("no configuration to draw from"))?;
                debug!(
                    "Trial for '{}' ({} left): {}",
                    self.state.current_parameter_key(),
                    self.state.remaining_train(),
                    config
                );
                return Ok(Some(config));
            }

            let key = self.state.current_parameter_key().to_string();
            let Some(best) = self.find_best(self.state.selected())? else {
                warn!("No scored configuration to decide '{key}' from, extending its trial budget");
                self.state.restart_round();
                continue;
            };
            let value = best
                .get(&key)
                .ok_or_else(|| internal_error!("{best} does not bind '{key}'"))?
                .to_string();
            info!("Locked in {key}={value} (best so far {best})");

            self.state.lock_in(key, value);
            if !self.state.remaining_configs().is_empty() {
                self.state.advance_parameter()?;
            }
        }
    }

    /// Record one measurement of `config`.
    pub fn score(&mut self, config: &Configuration, metric: Metric) -> PsResult<()> {
        if !metric.is_finite() {
            return Err(SweepError::malformed_metric(format!(
                "{config} cannot be scored with non-finite {metric:?}"
            ))
            .into());
        }
        if let Some(first) = self.state.scores().samples(config).and_then(|s| s.first()) {
            if first.arity() != metric.arity() {
                return Err(SweepError::malformed_metric(format!(
                    "{config} was scored with {first}, cannot add {metric}"
                ))
                .into());
            }
        }
        self.state.record_score(config, metric);
        Ok(())
    }

    /// Retire a scored configuration that completed successfully.
    pub fn done(&mut self, config: &Configuration) -> PsResult<()> {
        if self.state.scores().samples(config).is_none() {
            return Err(SweepError::UnscoredConfiguration {
                config: config.to_string(),
            }
            .into());
        }
        self.state.done(config)?;
        self.store.save(&self.state)
    }

    /// Retire a configuration whose run could not be scored.
    pub fn skipped(&mut self, config: &Configuration) -> PsResult<()> {
        self.state.skipped(config)?;
        warn!("Skipped {config}");
        self.store.save(&self.state)
    }

    /// Average of every sample recorded for `config`.
    pub fn get_score(&self, config: &Configuration) -> PsResult<Metric> {
        let samples = self.state.scores().samples(config).unwrap_or_default();
        Metric::average(samples)?.ok_or_else(|| {
            SweepError::UnscoredConfiguration {
                config: config.to_string(),
            }
            .into()
        })
    }

    /// Raw, unaveraged sample history.
    pub fn get_all_scores_by_config(&self) -> &ScoreBook {
        self.state.scores()
    }

    /// The selected configuration once it binds every parameter.
    pub fn best(&self) -> Option<&Configuration> {
        let selected = self.state.selected();
        (selected.len() == self.state.parameters().len()).then_some(selected)
    }

    pub fn has_best(&self) -> bool {
        self.best().is_some()
    }

    /// Bindings fixed so far.
    pub fn selected(&self) -> &Configuration {
        self.state.selected()
    }

    pub fn skipped_configs(&self) -> &[Configuration] {
        self.state.skipped_configs()
    }

    pub fn done_configs(&self) -> &[Configuration] {
        self.state.done_configs()
    }

    pub fn remaining_count(&self) -> usize {
        self.state.remaining_configs().len()
    }

    pub fn current_parameter(&self) -> &str {
        self.state.current_parameter_key()
    }

    pub fn sweep_id(&self) -> SweepId {
        self.state.sweep_id()
    }

    pub fn state(&self) -> &SweeperState {
        &self.state
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Best scored configuration extending `starting_with`.
    ///
    /// Candidates are visited in first-score order and a candidate only
    /// replaces the current best when strictly better, so ties and
    /// incomparable tuple metrics keep the first one seen.
    fn find_best(&self, starting_with: &Configuration) -> PsResult<Option<Configuration>> {
        let mut best: Option<(&Configuration, Metric)> = None;
        for entry in self.state.scores().iter() {
            if !entry.config.starts_with(starting_with) {
                continue;
            }
            let score = self.get_score(&entry.config)?;
            let replace = match &best {
                None => true,
                Some((_, best_score)) if self.state.lower() => score.lt(best_score),
                Some((_, best_score)) => score.gt(best_score),
            };
            if replace {
                best = Some((&entry.config, score));
            }
        }
        Ok(best.map(|(config, _)| config.clone()))
    }

    fn finalize(&mut self) -> PsResult<()> {
        if let Some(best) = self.find_best(self.state.selected())? {
            if self.state.selected() != &best {
                info!("Sweep {} best configuration: {best}", self.state.sweep_id());
            }
            self.state.set_selected(best);
        }
        Ok(())
    }
}

impl<S: StateStore> fmt::Display for Sweeper<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Parameters (by priority): {:?}", self.state.parameters())?;
        writeln!(f, "Scored configurations: {}", self.state.scores().len())?;
        writeln!(f, "Remaining configurations: {}", self.remaining_count())?;
        write!(f, "Current best configuration: {}", self.state.selected())
    }
}
