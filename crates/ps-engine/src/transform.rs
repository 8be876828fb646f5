//! Turning configurations into application arguments and labels.

use ps_types::Configuration;

/// Ordered `name value` pairs handed to the benchmarked application.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobArguments {
    pairs: Vec<(String, String)>,
}

impl JobArguments {
    pub fn new() -> Self {
        Self::default()
    }

    /// One pair per binding, in parameter name order.
    pub fn from_configuration(config: &Configuration) -> Self {
        Self {
            pairs: config
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
        }
    }

    /// Set `name` to `value`, replacing an existing pair in place.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.pairs.iter_mut().find(|(n, _)| *n == name) {
            Some(pair) => pair.1 = value,
            None => self.pairs.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Flatten to a command line; an empty name contributes only its value.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(self.pairs.len() * 2);
        for (name, value) in &self.pairs {
            if !name.is_empty() {
                args.push(name.clone());
            }
            args.push(value.clone());
        }
        args
    }
}

/// `k1=v1,k2=v2` label used in logs and result files.
pub fn configuration_label(config: &Configuration) -> String {
    config.label()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Configuration {
        Configuration::new()
            .with("--partitions", "16")
            .with("--executors", "4")
    }

    #[test]
    fn arguments_follow_name_order() {
        let args = JobArguments::from_configuration(&config());
        assert_eq!(args.to_args(), ["--executors", "4", "--partitions", "16"]);
    }

    #[test]
    fn insert_overrides_and_appends() {
        let mut args = JobArguments::from_configuration(&config());
        args.insert("--executors", "8");
        args.insert("--metrics", "/tmp/metrics.csv");
        assert_eq!(args.len(), 3);
        assert_eq!(args.get("--executors"), Some("8"));
        assert_eq!(
            args.to_args().last().map(String::as_str),
            Some("/tmp/metrics.csv")
        );
    }

    #[test]
    fn empty_name_is_positional() {
        let mut args = JobArguments::new();
        args.insert("", "10");
        args.insert("--mode", "fast");
        assert_eq!(args.to_args(), ["10", "--mode", "fast"]);
    }

    #[test]
    fn label_joins_bindings() {
        assert_eq!(configuration_label(&config()), "--executors=4,--partitions=16");
    }
}
