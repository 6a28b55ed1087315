use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque per-library record key, e.g. `"ABCD2345"`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordKey(String);

impl RecordKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordKey({})", self.0)
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

/// Whether a library belongs to a user or a group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LibraryKind {
    User,
    Group,
}

/// The library (scope) a record lives in.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Library {
    pub kind: LibraryKind,
    pub id: String,
    /// A user library that has never been synced.
    #[serde(default)]
    pub local: bool,
}

impl Library {
    pub fn user(id: impl Into<String>) -> Self {
        Self {
            kind: LibraryKind::User,
            id: id.into(),
            local: false,
        }
    }

    pub fn local_user(id: impl Into<String>) -> Self {
        Self {
            kind: LibraryKind::User,
            id: id.into(),
            local: true,
        }
    }

    pub fn group(id: impl Into<String>) -> Self {
        Self {
            kind: LibraryKind::Group,
            id: id.into(),
            local: false,
        }
    }

    /// Path segment used in locators: `users/1`, `users/local/ab`, `groups/9`.
    pub fn path(&self) -> String {
        match (self.kind, self.local) {
            (LibraryKind::User, true) => format!("users/local/{}", self.id),
            (LibraryKind::User, false) => format!("users/{}", self.id),
            (LibraryKind::Group, _) => format!("groups/{}", self.id),
        }
    }

    /// The last segment of [`Library::path`], used as the library key.
    pub fn key(&self) -> &str {
        &self.id
    }
}

/// Host record type. Only regular records carry a metadata field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    #[default]
    Regular,
    Note,
    Attachment,
}

/// Relation kinds that contribute aliases.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RelationKind {
    Replaces,
    SameAs,
}

impl RelationKind {
    /// Kinds harvested for aliases, in harvest order.
    pub const ALIASING: [RelationKind; 2] = [RelationKind::Replaces, RelationKind::SameAs];

    /// Predicate name the host stores this relation under.
    pub fn predicate(self) -> &'static str {
        match self {
            RelationKind::Replaces => "dc:replaces",
            RelationKind::SameAs => "owl:sameAs",
        }
    }
}

/// A relation value: one locator or a list of them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RelationValue {
    One(String),
    Many(Vec<String>),
}

impl RelationValue {
    /// The value normalized to a list.
    pub fn locators(&self) -> Vec<&str> {
        match self {
            RelationValue::One(locator) => vec![locator.as_str()],
            RelationValue::Many(locators) => locators.iter().map(String::as_str).collect(),
        }
    }
}

/// Relation links keyed by host predicate name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelationLinks(BTreeMap<String, RelationValue>);

impl RelationLinks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, kind: RelationKind) -> Option<&RelationValue> {
        self.0.get(kind.predicate())
    }

    /// Insert or replace the value for `kind`.
    pub fn set(&mut self, kind: RelationKind, value: RelationValue) {
        self.0.insert(kind.predicate().to_string(), value);
    }

    /// Append one locator to `kind`, promoting a single value to a list.
    pub fn push(&mut self, kind: RelationKind, locator: impl Into<String>) {
        let locator = locator.into();
        let entry = self.0.remove(kind.predicate());
        let value = match entry {
            None => RelationValue::One(locator),
            Some(RelationValue::One(existing)) => RelationValue::Many(vec![existing, locator]),
            Some(RelationValue::Many(mut list)) => {
                list.push(locator);
                RelationValue::Many(list)
            }
        };
        self.0.insert(kind.predicate().to_string(), value);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A host record as seen by alias reconciliation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub key: RecordKey,
    pub library: Library,
    #[serde(default)]
    pub kind: RecordKind,
    /// The free-text metadata field. `None` when the record type has none.
    #[serde(default)]
    pub metadata_text: Option<String>,
    #[serde(default)]
    pub relations: RelationLinks,
    /// The dedicated DOI field, when the record type has one.
    #[serde(default)]
    pub doi: Option<String>,
}

impl Record {
    /// A regular record with an empty metadata field.
    pub fn regular(key: impl Into<String>, library: Library) -> Self {
        Self {
            key: RecordKey::new(key),
            library,
            kind: RecordKind::Regular,
            metadata_text: Some(String::new()),
            relations: RelationLinks::new(),
            doi: None,
        }
    }

    pub fn with_metadata(mut self, text: impl Into<String>) -> Self {
        self.metadata_text = Some(text.into());
        self
    }

    pub fn with_relation(mut self, kind: RelationKind, locator: impl Into<String>) -> Self {
        self.relations.push(kind, locator);
        self
    }

    pub fn is_regular(&self) -> bool {
        self.kind == RecordKind::Regular
    }

    /// The metadata text, or `""` when the record has no metadata field.
    pub fn metadata(&self) -> &str {
        self.metadata_text.as_deref().unwrap_or("")
    }

    /// Replace the metadata text. Ignored for records without the field.
    pub fn set_metadata(&mut self, text: impl Into<String>) {
        if self.metadata_text.is_some() {
            self.metadata_text = Some(text.into());
        }
    }

    /// Canonical locator under `base`, recomputed from the current library.
    pub fn locator(&self, base: &str) -> String {
        format!(
            "{}/{}/items/{}",
            base.trim_end_matches('/'),
            self.library.path(),
            self.key
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn library_paths() {
        assert_eq!(Library::user("12").path(), "users/12");
        assert_eq!(Library::local_user("ab").path(), "users/local/ab");
        assert_eq!(Library::group("9").path(), "groups/9");
        assert_eq!(Library::group("9").key(), "9");
    }

    #[test]
    fn locator_follows_library() {
        let mut record = Record::regular("K1", Library::user("5"));
        assert_eq!(record.locator("http://zotero.org/"), "http://zotero.org/users/5/items/K1");
        record.library = Library::group("77");
        assert_eq!(record.locator("http://zotero.org"), "http://zotero.org/groups/77/items/K1");
    }

    #[test]
    fn relation_push_promotes_to_list() {
        let mut links = RelationLinks::new();
        links.push(RelationKind::SameAs, "a");
        assert_eq!(links.get(RelationKind::SameAs), Some(&RelationValue::One("a".into())));
        links.push(RelationKind::SameAs, "b");
        assert_eq!(
            links.get(RelationKind::SameAs).map(RelationValue::locators),
            Some(vec!["a", "b"])
        );
        assert!(links.get(RelationKind::Replaces).is_none());
    }

    #[test]
    fn set_metadata_ignored_without_field() {
        let mut note = Record::regular("N", Library::user("1"));
        note.kind = RecordKind::Note;
        note.metadata_text = None;
        note.set_metadata("x");
        assert_eq!(note.metadata_text, None);
        assert_eq!(note.metadata(), "");
    }

    #[test]
    fn record_from_json() {
        let json = r#"{
            "key": "ABCD",
            "library": { "kind": "group", "id": "42" },
            "metadata_text": "KerkoCite.ItemAlsoKnownAs: 42:ABCD",
            "relations": {
                "dc:replaces": "http://zotero.org/groups/42/items/OLD1",
                "owl:sameAs": ["http://zotero.org/users/1/items/X", "http://zotero.org/users/1/items/Y"]
            }
        }"#;
        let record: Record = serde_json::from_str(json).unwrap();
        assert_eq!(record.kind, RecordKind::Regular);
        assert_eq!(record.key.as_str(), "ABCD");
        assert_eq!(
            record.relations.get(RelationKind::Replaces).unwrap().locators(),
            vec!["http://zotero.org/groups/42/items/OLD1"]
        );
        assert_eq!(
            record.relations.get(RelationKind::SameAs).unwrap().locators().len(),
            2
        );
    }
}
