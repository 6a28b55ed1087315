//! The alias line embedded in a record's metadata text.
//!
//! A record carries at most one governing alias line. Two dialects exist:
//!
//! - legacy: `EdTechHub.ItemAlsoKnownAs: a; b; c`
//! - current: `KerkoCite.ItemAlsoKnownAs: a b c`
//!
//! A legacy line anywhere in the text wins over a current line anywhere in
//! the text. Write-back always drops both kinds and appends one current line.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::alias_set::{AliasSet, Dialect};
use crate::locator::{locator_to_key, DEFAULT_LOCATOR_BASE};
use crate::record::{Record, RelationKind};

/// Prefix tag of the legacy dialect line.
pub const LEGACY_TAG: &str = "EdTechHub.ItemAlsoKnownAs:";
/// Prefix tag of the current dialect line.
pub const CURRENT_TAG: &str = "KerkoCite.ItemAlsoKnownAs:";

/// The pair of line prefixes that mark an alias line.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AliasTags {
    pub legacy: String,
    pub current: String,
}

impl Default for AliasTags {
    fn default() -> Self {
        Self {
            legacy: LEGACY_TAG.to_string(),
            current: CURRENT_TAG.to_string(),
        }
    }
}

impl AliasTags {
    fn tag(&self, dialect: Dialect) -> &str {
        match dialect {
            Dialect::Legacy => &self.legacy,
            Dialect::Current => &self.current,
        }
    }

    /// Whether `line` is an alias line of either dialect.
    pub fn is_alias_line(&self, line: &str) -> bool {
        line.starts_with(&self.legacy) || line.starts_with(&self.current)
    }
}

/// Reads alias sets out of records and writes them back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AliasExtractor {
    tags: AliasTags,
    locator_base: String,
}

impl Default for AliasExtractor {
    fn default() -> Self {
        Self::new(AliasTags::default(), DEFAULT_LOCATOR_BASE)
    }
}

impl AliasExtractor {
    pub fn new(tags: AliasTags, locator_base: impl Into<String>) -> Self {
        Self {
            tags,
            locator_base: locator_base.into(),
        }
    }

    pub fn tags(&self) -> &AliasTags {
        &self.tags
    }

    /// Find the governing alias line, legacy first, and parse its remainder.
    pub fn find_line<'t>(&self, text: &'t str) -> Option<(Dialect, &'t str)> {
        [Dialect::Legacy, Dialect::Current]
            .into_iter()
            .find_map(|dialect| {
                let tag = self.tags.tag(dialect);
                text.lines()
                    .find_map(|line| line.strip_prefix(tag))
                    .map(|rest| (dialect, rest))
            })
    }

    /// The record's current alias set.
    ///
    /// Records without a metadata field yield an empty set. Records without
    /// an alias line yield a set seeded with the key derived from their
    /// locator, recomputed on every call.
    pub fn extract(&self, record: &Record) -> AliasSet {
        let Some(text) = record.metadata_text.as_deref() else {
            return AliasSet::new();
        };

        if let Some((dialect, rest)) = self.find_line(text) {
            return AliasSet::parse(rest, dialect);
        }

        let mut set = AliasSet::new();
        match self.derive_key(record) {
            Some(key) => {
                set.add(&key);
            }
            None => debug!(record = %record.key, "no alias line and no derivable key"),
        }
        set
    }

    /// `"<scope>:<key>"` derived from the record's canonical locator.
    pub fn derive_key(&self, record: &Record) -> Option<String> {
        locator_to_key(&record.locator(&self.locator_base))
    }

    /// Add keys derived from the record's `replaces` and `same-as` links.
    ///
    /// Locators that do not name a library item are skipped.
    pub fn harvest_relations(&self, record: &Record, into: &mut AliasSet) {
        for kind in RelationKind::ALIASING {
            let Some(value) = record.relations.get(kind) else {
                continue;
            };
            for locator in value.locators() {
                match locator_to_key(locator) {
                    Some(key) => {
                        into.add(&key);
                    }
                    None => debug!(record = %record.key, locator, "skipping non-item relation"),
                }
            }
        }
    }

    /// `text` with every alias line removed and one current line appended.
    ///
    /// Splits on `'\n'` only, so other lines keep their `\r` endings and a
    /// trailing newline survives as a blank line.
    pub fn rewrite(&self, text: &str, aliases: &AliasSet) -> String {
        let mut lines: Vec<&str> = if text.is_empty() {
            Vec::new()
        } else {
            text.split('\n')
                .filter(|line| !self.tags.is_alias_line(line))
                .collect()
        };
        let governing = format!("{} {}", self.tags.current, aliases.serialize());
        lines.push(&governing);
        lines.join("\n")
    }

    /// Rewrite the record's metadata in place. Returns `false` when the record
    /// has no metadata field.
    pub fn apply(&self, record: &mut Record, aliases: &AliasSet) -> bool {
        let Some(text) = record.metadata_text.as_deref() else {
            return false;
        };
        let rewritten = self.rewrite(text, aliases);
        record.set_metadata(rewritten);
        true
    }
}
