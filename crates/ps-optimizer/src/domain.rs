//! Configuration spaces: cartesian expansion and constraint filtering.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use ps_types::{Configuration, Constraint, Parameter, ParameterBinding, SweepError};

/// Constraints normalized by source binding.
///
/// Maps `source binding → {target name → allowed values}`. Constraints that
/// share a source binding are merged by unioning the allowed values of each
/// target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConstraintMap {
    rules: BTreeMap<ParameterBinding, BTreeMap<String, BTreeSet<String>>>,
}

impl ConstraintMap {
    pub fn merge(constraints: &[Constraint]) -> Self {
        let mut rules: BTreeMap<ParameterBinding, BTreeMap<String, BTreeSet<String>>> =
            BTreeMap::new();

        for constraint in constraints {
            let targets = rules.entry(constraint.source.clone()).or_default();
            for target in &constraint.targets {
                // A source already pins its own value.
                if target.name == constraint.source.name {
                    continue;
                }
                targets
                    .entry(target.name.clone())
                    .or_default()
                    .insert(target.value.clone());
            }
        }

        Self { rules }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Allowed values per target once `source` is bound.
    pub fn targets_of(&self, source: &ParameterBinding) -> Option<&BTreeMap<String, BTreeSet<String>>> {
        self.rules.get(source)
    }

    pub fn is_valid(&self, config: &Configuration) -> bool {
        self.rules.iter().all(|(source, targets)| {
            if config.get(&source.name) != Some(source.value.as_str()) {
                return true;
            }
            targets.iter().all(|(target, allowed)| {
                config
                    .get(target)
                    .is_some_and(|value| allowed.contains(value))
            })
        })
    }
}

/// Every valid configuration of `parameters` under `constraints`.
///
/// Parameters are combined in ascending priority order and values in list
/// order, which fixes the iteration order of the result.
pub fn expand(
    parameters: &[Parameter],
    constraints: &[Constraint],
) -> Result<Vec<Configuration>, SweepError> {
    validate(parameters, constraints)?;

    let mut ordered: Vec<&Parameter> = parameters.iter().collect();
    ordered.sort_by_key(|p| p.priority);

    // Cartesian product
    let mut combos: Vec<Configuration> = vec![Configuration::new()];
    for param in &ordered {
        let mut next = Vec::with_capacity(combos.len() * param.values.len());
        for existing in &combos {
            for value in &param.values {
                let mut combo = existing.clone();
                combo.insert(param.name.clone(), value.clone());
                next.push(combo);
            }
        }
        combos = next;
    }

    let rules = ConstraintMap::merge(constraints);
    if rules.is_empty() {
        return Ok(combos);
    }

    let total = combos.len();
    let valid: Vec<Configuration> = combos.into_iter().filter(|c| rules.is_valid(c)).collect();
    tracing::debug!(
        "Constraints removed {} of {} configurations",
        total - valid.len(),
        total
    );
    Ok(valid)
}

fn validate(parameters: &[Parameter], constraints: &[Constraint]) -> Result<(), SweepError> {
    if parameters.is_empty() {
        return Err(SweepError::invalid_parameters("no parameters declared"));
    }

    let mut names = HashSet::new();
    for param in parameters {
        if !names.insert(param.name.as_str()) {
            return Err(SweepError::invalid_parameters(format!(
                "duplicate parameter name '{}'",
                param.name
            )));
        }
        if param.values.is_empty() {
            return Err(SweepError::invalid_parameters(format!(
                "parameter '{}' has no values",
                param.name
            )));
        }
        let mut values = HashSet::new();
        if let Some(dup) = param.values.iter().find(|v| !values.insert(v.as_str())) {
            return Err(SweepError::invalid_parameters(format!(
                "parameter '{}' lists value '{dup}' twice",
                param.name
            )));
        }
    }

    for constraint in constraints {
        let bindings = std::iter::once(&constraint.source).chain(&constraint.targets);
        for binding in bindings {
            if !names.contains(binding.name.as_str()) {
                return Err(SweepError::invalid_parameters(format!(
                    "constraint on {} refers to unknown parameter '{}'",
                    constraint.source, binding.name
                )));
            }
        }
    }

    Ok(())
}
