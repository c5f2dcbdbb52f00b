//! Append-only pipeline state.

use crate::errors::DataConflictError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An append-only mapping from output key to structured value.
///
/// Writing to an existing key raises a [`DataConflictError`]; a key, once
/// written, keeps its value for the rest of the run. Every key remembers
/// which stage wrote it (`None` for keys seeded into the initial state).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineState {
    values: HashMap<String, serde_json::Value>,
    writers: HashMap<String, Option<String>>,
    order: Vec<String>,
}

impl PipelineState {
    /// Creates a new empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a state seeded with initial values.
    ///
    /// Seeded keys have no writer stage.
    #[must_use]
    pub fn seeded(data: impl IntoIterator<Item = (String, serde_json::Value)>) -> Self {
        let mut state = Self::new();
        for (key, value) in data {
            if !state.values.contains_key(&key) {
                state.order.push(key.clone());
                state.writers.insert(key.clone(), None);
            }
            state.values.insert(key, value);
        }
        state
    }

    /// Gets a value from the state.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.values.get(key)
    }

    /// Checks if a key exists.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Writes a key on behalf of `writer`.
    ///
    /// # Errors
    ///
    /// Returns `DataConflictError` if the key already exists.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: serde_json::Value,
        writer: impl Into<String>,
    ) -> Result<(), DataConflictError> {
        let key = key.into();
        if let Some(existing) = self.writers.get(&key) {
            return Err(DataConflictError::new(key, existing.clone()));
        }

        self.order.push(key.clone());
        self.writers.insert(key.clone(), Some(writer.into()));
        self.values.insert(key, value);
        Ok(())
    }

    /// Returns the stage that wrote a key.
    ///
    /// The outer `Option` is `None` for unknown keys; the inner one is
    /// `None` for seeded keys.
    #[must_use]
    pub fn writer_of(&self, key: &str) -> Option<Option<&str>> {
        self.writers.get(key).map(Option::as_deref)
    }

    /// Returns keys in insertion order.
    #[must_use]
    pub fn keys(&self) -> &[String] {
        &self.order
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the state is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the values for the given keys that are present.
    #[must_use]
    pub fn project<'a>(
        &self,
        keys: impl IntoIterator<Item = &'a String>,
    ) -> HashMap<String, serde_json::Value> {
        keys.into_iter()
            .filter_map(|k| self.values.get(k).map(|v| (k.clone(), v.clone())))
            .collect()
    }

    /// Returns a copy of all data.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        self.values.clone()
    }

    /// Consumes the state, returning its values.
    #[must_use]
    pub fn into_values(self) -> HashMap<String, serde_json::Value> {
        self.values
    }
}
