//! Named-data map: the input bundle handed to a node's evaluate call.

use crate::error::GraphError;
use crate::model::value::{PinData, PinValue};

/// Insertion-ordered mapping from pin name to value.
///
/// An entry whose value is [`PinValue::Owned`] had its ownership transferred
/// to the reader and may be consumed destructively; a [`PinValue::Shared`]
/// entry is a read-only handout.
#[derive(Debug, Default)]
pub struct DataMap {
    entries: Vec<(String, PinValue)>,
}

impl DataMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, replacing any existing entry with the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: PinValue) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&PinValue> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Borrow an entry's payload as a concrete type.
    pub fn get_as<T: PinData>(&self, name: &str) -> Result<&T, GraphError> {
        self.get(name)
            .ok_or_else(|| GraphError::InputDoesNotExist(name.to_string()))?
            .downcast_ref()
    }

    /// Remove an entry, returning its value.
    pub fn take(&mut self, name: &str) -> Option<PinValue> {
        let index = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(index).1)
    }

    /// Remove an entry and consume it into a concrete value. Zero-copy when
    /// the entry is exclusively owned.
    pub fn extract<T: PinData + Clone>(&mut self, name: &str) -> Result<T, GraphError> {
        self.take(name)
            .ok_or_else(|| GraphError::InputDoesNotExist(name.to_string()))?
            .extract()
    }

    /// Whether ownership of the named value was transferred to the reader.
    pub fn is_exclusive(&self, name: &str) -> bool {
        self.get(name).is_some_and(PinValue::is_owned)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
