//! Numeric and text user data carried by a client.

use std::collections::BTreeMap;

/// Variable-length property map attached to every client.
///
/// Numeric slots are addressed by index and read as `0.0` when unset; text
/// properties are addressed by key and read as `""` when unset.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UserData {
    numbers: Vec<f64>,
    texts:   BTreeMap<String, String>,
}

impl UserData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Numeric value at `index`, `0.0` if never set.
    #[inline]
    pub fn number(&self, index: usize) -> f64 {
        self.numbers.get(index).copied().unwrap_or(0.0)
    }

    pub fn set_number(&mut self, index: usize, value: f64) {
        if index >= self.numbers.len() {
            self.numbers.resize(index + 1, 0.0);
        }
        self.numbers[index] = value;
    }

    /// Number of numeric slots in use (highest set index + 1).
    #[inline]
    pub fn number_len(&self) -> usize {
        self.numbers.len()
    }

    /// Replace all numeric slots at once; trailing zeros are trimmed.
    pub fn set_numbers(&mut self, mut values: Vec<f64>) {
        while values.last() == Some(&0.0) {
            values.pop();
        }
        self.numbers = values;
    }

    /// Text value for `key`, `""` if never set.
    pub fn text(&self, key: &str) -> &str {
        self.texts.get(key).map(String::as_str).unwrap_or("")
    }

    pub fn set_text(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.texts.insert(key.into(), value.into());
    }

    pub fn clear(&mut self) {
        self.numbers.clear();
        self.texts.clear();
    }
}
