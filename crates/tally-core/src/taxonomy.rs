//! Category taxonomy for transaction classification
//!
//! The taxonomy is the list of labels the classification prompt asks the
//! model to choose from. It is versioned so that a change in labels can be
//! traced back to a config change rather than an edited prompt string.
//!
//! ## Configuration Resolution
//!
//! 1. Check for override in data dir (~/.local/share/tally/config/taxonomy.toml)
//! 2. Fall back to embedded defaults (compiled into binary)

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};

/// Embedded default taxonomy (compiled into binary)
const DEFAULT_TAXONOMY: &str = include_str!("../../../config/taxonomy.toml");

/// Versioned list of category labels
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CategoryTaxonomy {
    /// Bumped whenever the label list changes
    pub version: u32,
    /// Label for messages that are not transactions
    pub fallback: String,
    /// Allowed labels, in prompt order
    pub categories: Vec<String>,
}

impl CategoryTaxonomy {
    /// Load the taxonomy, preferring the user override if present
    pub fn load() -> Result<Self> {
        match default_taxonomy_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => Self::embedded(),
        }
    }

    /// The taxonomy compiled into the binary
    pub fn embedded() -> Result<Self> {
        Self::parse(DEFAULT_TAXONOMY)
    }

    /// Load from an explicit file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read taxonomy: {}", e)))?;
        Self::parse(&content)
    }

    /// Parse and validate TOML content
    pub fn parse(content: &str) -> Result<Self> {
        let taxonomy: CategoryTaxonomy = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid taxonomy TOML: {}", e)))?;
        taxonomy.check()?;
        Ok(taxonomy)
    }

    fn check(&self) -> Result<()> {
        if self.categories.is_empty() {
            return Err(Error::Config("taxonomy has no categories".into()));
        }
        if self.categories.iter().any(|c| c.trim().is_empty()) {
            return Err(Error::Config("taxonomy contains an empty label".into()));
        }
        if !self.contains(&self.fallback) {
            return Err(Error::Config(format!(
                "fallback '{}' is not one of the categories",
                self.fallback
            )));
        }
        Ok(())
    }

    /// Case-insensitive membership test
    pub fn contains(&self, label: &str) -> bool {
        let label = label.trim();
        self.categories.iter().any(|c| c.eq_ignore_ascii_case(label))
    }

    /// Render the label list the way the prompt expects it
    pub fn prompt_list(&self) -> String {
        let quoted: Vec<String> = self
            .categories
            .iter()
            .map(|c| format!("\"{}\"", c))
            .collect();
        format!("[{}]", quoted.join(", "))
    }
}

/// Default taxonomy override path
pub fn default_taxonomy_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("tally").join("config").join("taxonomy.toml"))
}
