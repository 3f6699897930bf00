use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Active filter selections: key to one or more values.
///
/// Serialized as repeated query keys, so `dp_tags=[a, b]` becomes
/// `dp_tags=a&dp_tags=b`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Filters(BTreeMap<String, Vec<String>>);

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one value under `key`. Blank values are ignored.
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let value = value.into();
        if !value.trim().is_empty() {
            let values = self.0.entry(key.into()).or_default();
            if !values.contains(&value) {
                values.push(value);
            }
        }
        self
    }

    pub fn set<I, V>(&mut self, key: impl Into<String>, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        let key = key.into();
        self.0.remove(&key);
        for value in values {
            self.add(key.clone(), value);
        }
        self
    }

    pub fn remove(&mut self, key: &str) -> Option<Vec<String>> {
        self.0.remove(key)
    }

    pub fn get(&self, key: &str) -> &[String] {
        self.0.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(Vec::is_empty)
    }

    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.0
            .iter()
            .flat_map(|(key, values)| values.iter().map(move |v| (key.clone(), v.clone())))
            .collect()
    }

    /// Parse `key=value` arguments as given on the command line.
    pub fn parse_args<S: AsRef<str>>(args: &[S]) -> Result<Self, String> {
        let mut filters = Filters::new();
        for arg in args {
            let arg = arg.as_ref();
            let (key, value) = arg
                .split_once('=')
                .ok_or_else(|| format!("filter '{}' must look like key=value", arg))?;
            if key.trim().is_empty() {
                return Err(format!("filter '{}' has an empty key", arg));
            }
            filters.add(key.trim(), value.trim());
        }
        Ok(filters)
    }
}

/// A filter the list view offers, with its selectable values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterDetail {
    pub key: String,
    pub label: String,
    pub options: Vec<String>,
}

impl FilterDetail {
    pub fn new(key: impl Into<String>, label: impl Into<String>, options: &[&str]) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            options: options.iter().map(|o| o.to_string()).collect(),
        }
    }
}
