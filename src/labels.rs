// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Ordered sign vocabularies. Output index `i` of the network maps to entry `i`.

use std::fs;
use std::path::Path;

use crate::error::{Result, SignError};

/// Ten emergency signs, in training order.
pub const EMERGENCY_WORDS: [&str; 10] = [
    "교통사고",
    "구해주세요",
    "깔리다",
    "배고프다",
    "병원",
    "불나다",
    "숨을안쉬다",
    "쓰러지다",
    "아빠",
    "연락해주세요",
];

/// Eight signs of the police-report vocabulary, in training order.
pub const POLICE_WORDS: [&str; 8] = [
    "경찰",
    "교통사고",
    "깔리다",
    "병원",
    "불나다",
    "숨을안쉬다",
    "쓰러지다",
    "연락해주세요",
];

/// An ordered, non-empty list of labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelVocabulary {
    labels: Vec<String>,
}

impl Default for LabelVocabulary {
    fn default() -> Self {
        Self::emergency_words()
    }
}

impl LabelVocabulary {
    /// Build a vocabulary from labels.
    ///
    /// # Errors
    ///
    /// Returns [`SignError::ConfigError`] if `labels` is empty or has duplicates.
    pub fn new<I, S>(labels: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        if labels.is_empty() {
            return Err(SignError::ConfigError("Label vocabulary is empty".to_string()));
        }
        for (i, label) in labels.iter().enumerate() {
            if labels[..i].contains(label) {
                return Err(SignError::ConfigError(format!("Duplicate label '{label}'")));
            }
        }
        Ok(Self { labels })
    }

    /// The ten-word emergency vocabulary.
    #[must_use]
    pub fn emergency_words() -> Self {
        Self {
            labels: EMERGENCY_WORDS.iter().map(ToString::to_string).collect(),
        }
    }

    /// The eight-word police vocabulary.
    #[must_use]
    pub fn police_words() -> Self {
        Self {
            labels: POLICE_WORDS.iter().map(ToString::to_string).collect(),
        }
    }

    /// Read one label per line; blank lines are skipped.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read, or
    /// [`SignError::ConfigError`] if it holds no labels or duplicates.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| SignError::IoError(format!("Failed to read labels {}: {e}", path.display())))?;
        Self::new(text.lines().map(str::trim).filter(|line| !line.is_empty()))
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    #[must_use]
    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Always false for a constructed vocabulary.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.labels
    }
}
