use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The two textual encodings an alias line may use.
///
/// `Legacy` separates identifiers with `;` and tolerates surrounding
/// whitespace. `Current` separates identifiers with runs of whitespace and is
/// the only dialect ever written back.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Legacy,
    #[default]
    Current,
}

impl Dialect {
    /// Split encoded text into trimmed, non-empty tokens.
    pub fn tokens(self, text: &str) -> Vec<&str> {
        match self {
            Dialect::Legacy => text
                .split(';')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .collect(),
            Dialect::Current => text.split_whitespace().collect(),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::Legacy => write!(f, "legacy"),
            Dialect::Current => write!(f, "current"),
        }
    }
}

/// A set of alternate identifiers ("also known as" keys) for one record.
///
/// The set remembers the exact text it was parsed from so that
/// [`AliasSet::changed`] can tell whether a write-back is needed. Only the
/// serialization is ever persisted; the set itself lives for one operation.
///
/// Equality compares identifiers only, not origin text or dialect.
#[derive(Clone, Debug, Default)]
pub struct AliasSet {
    ids: BTreeSet<String>,
    origin: String,
    dialect: Dialect,
}

impl AliasSet {
    /// An empty set with empty origin text.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse encoded text in the given dialect.
    ///
    /// Empty or whitespace-only tokens are dropped, so empty input yields an
    /// empty set.
    pub fn parse(text: &str, dialect: Dialect) -> Self {
        let ids = dialect
            .tokens(text)
            .into_iter()
            .map(str::to_string)
            .collect();
        Self {
            ids,
            origin: text.to_string(),
            dialect,
        }
    }

    /// Insert a trimmed identifier. Empty input is ignored.
    pub fn add(&mut self, id: &str) -> &mut Self {
        let id = id.trim();
        if !id.is_empty() && !self.ids.contains(id) {
            self.ids.insert(id.to_string());
        }
        self
    }

    /// Add every identifier of `other`.
    pub fn union(&mut self, other: &AliasSet) -> &mut Self {
        for id in &other.ids {
            self.add(id);
        }
        self
    }

    /// Whether the canonical serialization differs from the origin text.
    ///
    /// Also true for an unmodified set parsed from legacy or unsorted text,
    /// which is what migrates old records onto the current encoding.
    pub fn changed(&self) -> bool {
        self.origin.trim() != self.serialize().trim()
    }

    /// Sorted identifiers joined by single spaces.
    pub fn serialize(&self) -> String {
        self.iter().collect::<Vec<_>>().join(" ")
    }

    /// The lexicographically smallest identifier.
    pub fn first(&self) -> Option<&str> {
        self.ids.iter().next().map(String::as_str)
    }

    /// Identifiers in sorted order. Each call starts a fresh traversal.
    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.ids.iter().map(String::as_str)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id.trim())
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// The text this set was parsed from.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// The dialect the origin text was parsed with.
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }
}

impl PartialEq for AliasSet {
    fn eq(&self, other: &Self) -> bool {
        self.ids == other.ids
    }
}

impl Eq for AliasSet {}

impl fmt::Display for AliasSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialize())
    }
}

impl<S: AsRef<str>> Extend<S> for AliasSet {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        for id in iter {
            self.add(id.as_ref());
        }
    }
}

impl<S: AsRef<str>> FromIterator<S> for AliasSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = AliasSet::new();
        set.extend(iter);
        set
    }
}

impl<'a> IntoIterator for &'a AliasSet {
    type Item = &'a str;
    type IntoIter = std::iter::Map<std::collections::btree_set::Iter<'a, String>, fn(&'a String) -> &'a str>;

    fn into_iter(self) -> Self::IntoIter {
        self.ids.iter().map(String::as_str as fn(&'a String) -> &'a str)
    }
}
