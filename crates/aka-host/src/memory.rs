//! In-memory host for testing and ephemeral use.
//!
//! [`InMemoryHost`] keeps records and notes in maps protected by a
//! `RwLock`. It implements [`RecordHost`] and [`StructuralMerge`], renders
//! exports as RIS, and can be told to fail any operation so callers can
//! exercise their failure handling.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use aka_types::{Record, RecordKey, RelationKind, DEFAULT_LOCATOR_BASE};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{HostError, Result};
use crate::traits::{RecordHost, StructuralMerge};

/// A note created under a parent record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredNote {
    pub key: RecordKey,
    pub parent: RecordKey,
    pub text: String,
}

#[derive(Debug, Default)]
struct HostState {
    records: BTreeMap<RecordKey, Record>,
    notes: Vec<StoredNote>,
    saves: usize,
    merges: usize,
}

#[derive(Debug, Default)]
struct Faults {
    save: AtomicBool,
    note: AtomicBool,
    export: AtomicBool,
    merge: AtomicBool,
}

/// An in-memory implementation of the host collaborators.
///
/// Data is lost when the host is dropped.
#[derive(Debug)]
pub struct InMemoryHost {
    locator_base: String,
    state: RwLock<HostState>,
    faults: Faults,
}

impl InMemoryHost {
    /// Create an empty host.
    pub fn new() -> Self {
        Self::with_locator_base(DEFAULT_LOCATOR_BASE)
    }

    /// Create an empty host that renders locators under `base`.
    pub fn with_locator_base(base: impl Into<String>) -> Self {
        Self {
            locator_base: base.into(),
            state: RwLock::new(HostState::default()),
            faults: Faults::default(),
        }
    }

    /// Create a host seeded with `records`.
    pub fn with_records(records: impl IntoIterator<Item = Record>) -> Result<Self> {
        let host = Self::new();
        for record in records {
            host.insert(record)?;
        }
        Ok(host)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HostState>> {
        self.state
            .read()
            .map_err(|e| HostError::Lock(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HostState>> {
        self.state
            .write()
            .map_err(|e| HostError::Lock(e.to_string()))
    }

    /// Insert or replace a record without counting it as a save.
    pub fn insert(&self, record: Record) -> Result<()> {
        self.write()?.records.insert(record.key.clone(), record);
        Ok(())
    }

    pub fn get(&self, key: &RecordKey) -> Result<Option<Record>> {
        Ok(self.read()?.records.get(key).cloned())
    }

    /// All stored records in key order.
    pub fn records(&self) -> Result<Vec<Record>> {
        Ok(self.read()?.records.values().cloned().collect())
    }

    /// Notes created so far, in creation order.
    pub fn notes(&self) -> Result<Vec<StoredNote>> {
        Ok(self.read()?.notes.clone())
    }

    /// Number of successful [`RecordHost::save_record`] calls.
    pub fn save_count(&self) -> Result<usize> {
        Ok(self.read()?.saves)
    }

    /// Number of successful structural merges.
    pub fn merge_count(&self) -> Result<usize> {
        Ok(self.read()?.merges)
    }

    pub fn fail_saves(&self, fail: bool) {
        self.faults.save.store(fail, Ordering::SeqCst);
    }

    pub fn fail_notes(&self, fail: bool) {
        self.faults.note.store(fail, Ordering::SeqCst);
    }

    pub fn fail_exports(&self, fail: bool) {
        self.faults.export.store(fail, Ordering::SeqCst);
    }

    pub fn fail_merges(&self, fail: bool) {
        self.faults.merge.store(fail, Ordering::SeqCst);
    }

    fn ris(&self, record: &Record) -> String {
        let mut out = String::from("TY  - GEN\n");
        out.push_str(&format!("ID  - {}:{}\n", record.library.key(), record.key));
        out.push_str(&format!("UR  - {}\n", record.locator(&self.locator_base)));
        if let Some(doi) = record.doi.as_deref().filter(|d| !d.is_empty()) {
            out.push_str(&format!("DO  - {doi}\n"));
        }
        for line in record.metadata().lines().filter(|l| !l.trim().is_empty()) {
            out.push_str(&format!("N1  - {line}\n"));
        }
        out.push_str("ER  - \n");
        out
    }
}

impl Default for InMemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordHost for InMemoryHost {
    async fn save_record(&self, record: &Record) -> Result<()> {
        if self.faults.save.load(Ordering::SeqCst) {
            return Err(HostError::Save {
                key: record.key.clone(),
                reason: "injected failure".into(),
            });
        }
        let mut state = self.write()?;
        if !state.records.contains_key(&record.key) {
            return Err(HostError::NotFound(record.key.clone()));
        }
        state.records.insert(record.key.clone(), record.clone());
        state.saves += 1;
        debug!(record = %record.key, "record saved");
        Ok(())
    }

    async fn create_note(&self, parent: &Record, text: &str) -> Result<RecordKey> {
        if self.faults.note.load(Ordering::SeqCst) {
            return Err(HostError::Note {
                parent: parent.key.clone(),
                reason: "injected failure".into(),
            });
        }
        let mut state = self.write()?;
        if !state.records.contains_key(&parent.key) {
            return Err(HostError::NotFound(parent.key.clone()));
        }
        let key = RecordKey::new(format!("NOTE{:04}", state.notes.len() + 1));
        state.notes.push(StoredNote {
            key: key.clone(),
            parent: parent.key.clone(),
            text: text.to_string(),
        });
        debug!(note = %key, parent = %parent.key, "note created");
        Ok(key)
    }

    async fn export_bibliography(&self, records: &[Record]) -> Result<String> {
        if self.faults.export.load(Ordering::SeqCst) {
            return Err(HostError::Export("injected failure".into()));
        }
        Ok(records
            .iter()
            .map(|r| self.ris(r))
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

#[async_trait]
impl StructuralMerge for InMemoryHost {
    type Output = RecordKey;
    type Error = HostError;

    /// Absorb `secondaries` into `primary`.
    ///
    /// The primary gains a `replaces` link to every secondary, and the
    /// secondaries are removed from the host.
    async fn merge(&self, primary: &mut Record, secondaries: &[Record]) -> Result<RecordKey> {
        if self.faults.merge.load(Ordering::SeqCst) {
            return Err(HostError::Merge("injected failure".into()));
        }
        let mut state = self.write()?;
        for key in std::iter::once(&primary.key).chain(secondaries.iter().map(|s| &s.key)) {
            if !state.records.contains_key(key) {
                return Err(HostError::NotFound(key.clone()));
            }
        }
        for secondary in secondaries {
            primary
                .relations
                .push(RelationKind::Replaces, secondary.locator(&self.locator_base));
            state.records.remove(&secondary.key);
        }
        state.records.insert(primary.key.clone(), primary.clone());
        state.merges += 1;
        debug!(primary = %primary.key, absorbed = secondaries.len(), "records merged");
        Ok(primary.key.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aka_types::Library;

    fn record(key: &str) -> Record {
        Record::regular(key, Library::group("42")).with_metadata("note line")
    }

    #[tokio::test]
    async fn save_replaces_and_counts() {
        let host = InMemoryHost::with_records([record("A")]).unwrap();
        let mut updated = record("A");
        updated.set_metadata("changed");
        host.save_record(&updated).await.unwrap();

        assert_eq!(host.save_count().unwrap(), 1);
        let stored = host.get(&RecordKey::from("A")).unwrap().unwrap();
        assert_eq!(stored.metadata(), "changed");
    }

    #[tokio::test]
    async fn save_unknown_record_fails() {
        let host = InMemoryHost::new();
        let err = host.save_record(&record("X")).await.unwrap_err();
        assert!(matches!(err, HostError::NotFound(_)));
        assert_eq!(host.save_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn injected_save_failure() {
        let host = InMemoryHost::with_records([record("A")]).unwrap();
        host.fail_saves(true);
        let err = host.save_record(&record("A")).await.unwrap_err();
        assert!(matches!(err, HostError::Save { .. }), "got: {err}");
    }

    #[tokio::test]
    async fn notes_are_attached_to_parent() {
        let host = InMemoryHost::with_records([record("A")]).unwrap();
        let key = host.create_note(&record("A"), "<p>hi</p>").await.unwrap();
        assert_eq!(key.as_str(), "NOTE0001");

        let notes = host.notes().unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].parent.as_str(), "A");
        assert_eq!(notes[0].text, "<p>hi</p>");
    }

    #[tokio::test]
    async fn export_renders_ris() {
        let host = InMemoryHost::new();
        let mut rec = record("A");
        rec.doi = Some("10.1000/x".into());
        let text = host.export_bibliography(&[rec, record("B")]).await.unwrap();

        assert!(text.contains("ID  - 42:A\n"));
        assert!(text.contains("UR  - http://zotero.org/groups/42/items/B\n"));
        assert!(text.contains("DO  - 10.1000/x\n"));
        assert!(text.contains("N1  - note line\n"));
        assert_eq!(text.matches("ER  - ").count(), 2);
    }

    #[tokio::test]
    async fn export_failure() {
        let host = InMemoryHost::new();
        host.fail_exports(true);
        assert!(host.export_bibliography(&[]).await.is_err());
    }

    #[tokio::test]
    async fn merge_links_and_removes_secondaries() {
        let host = InMemoryHost::with_records([record("P"), record("S1"), record("S2")]).unwrap();
        let mut primary = record("P");
        let merged = host
            .merge(&mut primary, &[record("S1"), record("S2")])
            .await
            .unwrap();

        assert_eq!(merged.as_str(), "P");
        assert_eq!(host.merge_count().unwrap(), 1);
        assert_eq!(host.records().unwrap().len(), 1);
        assert_eq!(
            primary.relations.get(RelationKind::Replaces).unwrap().locators(),
            vec![
                "http://zotero.org/groups/42/items/S1",
                "http://zotero.org/groups/42/items/S2"
            ]
        );
    }

    #[tokio::test]
    async fn merge_missing_secondary_is_rejected() {
        let host = InMemoryHost::with_records([record("P")]).unwrap();
        let mut primary = record("P");
        let err = host.merge(&mut primary, &[record("GONE")]).await.unwrap_err();
        assert!(matches!(err, HostError::NotFound(ref k) if k.as_str() == "GONE"));
        assert!(primary.relations.is_empty());
    }

    #[tokio::test]
    async fn merge_through_reference() {
        let host = InMemoryHost::with_records([record("P"), record("S")]).unwrap();
        let by_ref = &host;
        let mut primary = record("P");
        StructuralMerge::merge(&by_ref, &mut primary, &[record("S")])
            .await
            .unwrap();
        assert_eq!(host.merge_count().unwrap(), 1);
    }
}
