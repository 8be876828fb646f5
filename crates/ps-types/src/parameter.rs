//! Tunable parameters, value constraints and concrete configurations.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use crate::errors::PsResult;

/// A named tunable with its ordered candidate values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    /// Lower priorities are decided first.
    pub priority: i64,
    pub values: Vec<String>,
}

impl Parameter {
    pub fn new<I, V>(name: impl Into<String>, priority: i64, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        Self {
            name: name.into(),
            priority,
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

/// A single `name = value` binding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParameterBinding {
    pub name: String,
    pub value: String,
}

impl ParameterBinding {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for ParameterBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

/// Restricts the values other parameters may take once `source` is bound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraint {
    pub source: ParameterBinding,
    pub targets: Vec<ParameterBinding>,
}

impl Constraint {
    pub fn new(source: ParameterBinding, targets: Vec<ParameterBinding>) -> Self {
        Self { source, targets }
    }
}

/// Contents of a parameters file.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ParameterSet {
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub constraints: Option<Vec<Constraint>>,
}

impl ParameterSet {
    pub fn new(parameters: Vec<Parameter>) -> Self {
        Self {
            parameters,
            constraints: None,
        }
    }

    pub fn with_constraints(mut self, constraints: Vec<Constraint>) -> Self {
        self.constraints = Some(constraints);
        self
    }

    pub fn constraints(&self) -> &[Constraint] {
        self.constraints.as_deref().unwrap_or_default()
    }

    /// Parameter names ordered by ascending priority; ties keep declaration order.
    pub fn names_by_priority(&self) -> Vec<String> {
        let mut ordered: Vec<&Parameter> = self.parameters.iter().collect();
        ordered.sort_by_key(|p| p.priority);
        ordered.into_iter().map(|p| p.name.clone()).collect()
    }

    pub fn from_json_str(json: &str) -> PsResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> PsResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}

/// A binding of parameter names to values.
///
/// Complete configurations bind every parameter; the sweeper's running
/// selection uses the same type with a subset of the bindings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Configuration(BTreeMap<String, String>);

impl Configuration {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// True when every binding of `partial` is also present in `self`.
    pub fn starts_with(&self, partial: &Configuration) -> bool {
        partial
            .iter()
            .all(|(name, value)| self.get(name) == Some(value))
    }

    /// `name=value` pairs joined by commas, in name order.
    pub fn label(&self) -> String {
        self.iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.label())
    }
}

impl<K, V> FromIterator<(K, V)> for Configuration
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_with_checks_every_binding() {
        let config = Configuration::new().with("a", "1").with("b", "x");
        assert!(config.starts_with(&Configuration::new()));
        assert!(config.starts_with(&Configuration::new().with("a", "1")));
        assert!(!config.starts_with(&Configuration::new().with("a", "2")));
        assert!(!config.starts_with(&Configuration::new().with("c", "1")));
    }

    #[test]
    fn label_is_name_ordered() {
        let config: Configuration = [("b", "x"), ("a", "1")].into_iter().collect();
        assert_eq!(config.label(), "a=1,b=x");
        assert_eq!(config.to_string(), "{a=1,b=x}");
    }

    #[test]
    fn names_by_priority_is_stable() {
        let set = ParameterSet::new(vec![
            Parameter::new("late", 5, ["1"]),
            Parameter::new("first", 1, ["1"]),
            Parameter::new("tie", 5, ["1"]),
        ]);
        assert_eq!(set.names_by_priority(), vec!["first", "late", "tie"]);
    }

    #[test]
    fn parameter_file_parses_with_and_without_constraints() {
        let json = r#"{
            "parameters": [
                {"name": "a", "priority": 1, "values": ["1", "2"]},
                {"name": "b", "priority": 2, "values": ["x", "y"]}
            ],
            "constraints": [
                {"source": {"name": "a", "value": "1"}, "targets": [{"name": "b", "value": "x"}]}
            ]
        }"#;
        let set = ParameterSet::from_json_str(json).unwrap();
        assert_eq!(set.parameters.len(), 2);
        assert_eq!(set.constraints().len(), 1);
        assert_eq!(set.constraints()[0].targets[0], ParameterBinding::new("b", "x"));

        let bare = ParameterSet::from_json_str(r#"{"parameters": []}"#).unwrap();
        assert!(bare.constraints().is_empty());
    }

    #[test]
    fn parameter_file_loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parameters.json");
        let set = ParameterSet::new(vec![Parameter::new("cores", 1, ["1", "2", "4"])]);
        std::fs::write(&path, serde_json::to_string(&set).unwrap()).unwrap();
        assert_eq!(ParameterSet::from_json_file(&path).unwrap(), set);
    }

    #[test]
    fn configuration_serializes_as_object() {
        let config = Configuration::new().with("a", "1");
        assert_eq!(serde_json::to_string(&config).unwrap(), r#"{"a":"1"}"#);
    }
}
