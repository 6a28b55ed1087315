use std::path::Path;

use aka_types::{AliasExtractor, AliasTags, DEFAULT_LOCATOR_BASE};
use serde::{Deserialize, Serialize};

use crate::error::ServiceResult;

/// Configuration for alias reconciliation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    /// Line prefixes of the legacy and current alias encodings.
    pub tags: AliasTags,
    /// Scheme and host used to render record locators.
    pub locator_base: String,
    /// Who is merging, shown in history notes (e.g. the sync user name).
    pub actor_label: Option<String>,
    /// Whether a history note is attached to the primary after each merge.
    pub history_notes: bool,
    /// Name of the free-text field shown in history notes.
    pub audit_field: String,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            tags: AliasTags::default(),
            locator_base: DEFAULT_LOCATOR_BASE.to_string(),
            actor_label: None,
            history_notes: true,
            audit_field: "extra".to_string(),
        }
    }
}

impl ReconcilerConfig {
    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> ServiceResult<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a TOML file.
    pub fn load(path: impl AsRef<Path>) -> ServiceResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// The extractor matching these tags and locator base.
    pub fn extractor(&self) -> AliasExtractor {
        AliasExtractor::new(self.tags.clone(), self.locator_base.clone())
    }
}
