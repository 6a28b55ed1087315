//! The process-wide alias service and the merge decorator built on it.

use std::sync::RwLock;

use aka_host::{RecordHost, StructuralMerge};
use aka_types::{DoiCandidates, Record, RecordKey};
use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::ReconcilerConfig;
use crate::error::{ReconcileError, ServiceError, ServiceResult};
use crate::history::ItemDetails;
use crate::reconciler::MergeReconciler;

/// Lifecycle of an [`AliasService`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServiceState {
    Created,
    Ready,
    Stopped,
}

/// What key assignment did to one record.
#[derive(Debug)]
pub enum AssignOutcome {
    /// The alias line already held every key.
    Unchanged,
    /// The alias line was rewritten and saved.
    Written,
    /// Not a regular record, or no metadata field.
    Skipped,
    /// The rewritten record could not be saved.
    Failed(ReconcileError),
}

#[derive(Debug)]
pub struct KeyAssignment {
    pub record: RecordKey,
    pub aliases: String,
    pub outcome: AssignOutcome,
}

#[derive(Debug)]
pub struct DetailsNote {
    pub record: RecordKey,
    pub note: Result<RecordKey, ReconcileError>,
}

/// Owns reconciliation for one process.
///
/// Constructed once with its collaborators, then [`start`](Self::start)ed.
/// Until it is ready, and after [`shutdown`](Self::shutdown), merges pass
/// straight through to the host so they are never blocked.
#[derive(Debug)]
pub struct AliasService<H> {
    reconciler: MergeReconciler<H>,
    state: RwLock<ServiceState>,
}

impl<H: RecordHost> AliasService<H> {
    pub fn new(config: ReconcilerConfig, host: H) -> Self {
        Self::from_reconciler(MergeReconciler::new(config, host))
    }

    pub fn from_reconciler(reconciler: MergeReconciler<H>) -> Self {
        Self {
            reconciler,
            state: RwLock::new(ServiceState::Created),
        }
    }

    pub fn reconciler(&self) -> &MergeReconciler<H> {
        &self.reconciler
    }

    pub fn state(&self) -> ServiceState {
        *self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_ready(&self) -> bool {
        self.state() == ServiceState::Ready
    }

    fn set_state(&self, next: ServiceState) -> ServiceState {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        std::mem::replace(&mut *state, next)
    }

    /// Mark the service ready. Starting twice is harmless.
    pub fn start(&self) {
        let previous = self.set_state(ServiceState::Ready);
        if previous != ServiceState::Ready {
            info!(
                legacy_tag = %self.reconciler.config().tags.legacy,
                current_tag = %self.reconciler.config().tags.current,
                "alias service started"
            );
        }
    }

    /// Stop reconciling. Later merges pass through untouched.
    pub fn shutdown(&self) {
        if self.set_state(ServiceState::Stopped) == ServiceState::Ready {
            info!("alias service stopped");
        }
    }

    fn require_ready(&self) -> ServiceResult<()> {
        match self.state() {
            ServiceState::Ready => Ok(()),
            other => Err(ServiceError::NotReady(other)),
        }
    }

    /// Merge through the host, reconciling aliases when the service is ready.
    pub async fn reconcile<M: StructuralMerge>(
        &self,
        primary: &mut Record,
        secondaries: &[Record],
        merge: &M,
    ) -> Result<M::Output, M::Error> {
        if !self.is_ready() {
            debug!(record = %primary.key, state = ?self.state(), "service not ready; plain merge");
            return merge.merge(primary, secondaries).await;
        }
        self.reconciler.reconcile(primary, secondaries, merge).await
    }

    /// Wrap a host merge so every call goes through [`Self::reconcile`].
    pub fn wrap<M: StructuralMerge>(&self, inner: M) -> ReconcilingMerge<'_, M, H> {
        ReconcilingMerge {
            inner,
            service: self,
        }
    }

    /// Give each regular record its full alias set: existing aliases, its
    /// preferred DOI, its own `"<library>:<key>"`, and related item keys.
    ///
    /// Records are rewritten in place; saves that fail are reported per
    /// record rather than aborting the batch.
    pub async fn assign_keys(&self, records: &mut [Record]) -> ServiceResult<Vec<KeyAssignment>> {
        self.require_ready()?;
        let extractor = self.reconciler.extractor();
        let mut results = Vec::with_capacity(records.len());

        for record in records.iter_mut() {
            if !record.is_regular() || record.metadata_text.is_none() {
                results.push(KeyAssignment {
                    record: record.key.clone(),
                    aliases: String::new(),
                    outcome: AssignOutcome::Skipped,
                });
                continue;
            }

            let mut aliases = extractor.extract(record);
            if let Some(doi) = DoiCandidates::from_record(record).preferred() {
                aliases.add(&doi);
            }
            aliases.add(&format!("{}:{}", record.library.key(), record.key));
            extractor.harvest_relations(record, &mut aliases);
            debug!(record = %record.key, aliases = %aliases, changed = aliases.changed(), "assign key");

            let outcome = if aliases.changed() {
                extractor.apply(record, &aliases);
                match self.reconciler.host().save_record(record).await {
                    Ok(()) => AssignOutcome::Written,
                    Err(e) => {
                        warn!(record = %record.key, error = %e, "failed to save assigned keys");
                        AssignOutcome::Failed(ReconcileError::AliasWriteBack(e))
                    }
                }
            } else {
                AssignOutcome::Unchanged
            };

            results.push(KeyAssignment {
                record: record.key.clone(),
                aliases: aliases.serialize(),
                outcome,
            });
        }
        Ok(results)
    }

    /// Attach an "Item details" note with its own export to each regular record.
    pub async fn save_details_note(&self, records: &[Record]) -> ServiceResult<Vec<DetailsNote>> {
        self.require_ready()?;
        let host = self.reconciler.host();
        let mut results = Vec::new();

        for record in records.iter().filter(|r| r.is_regular()) {
            let export = match host.export_bibliography(std::slice::from_ref(record)).await {
                Ok(text) => text,
                Err(e) => {
                    warn!(record = %record.key, error = %e, "details export failed");
                    String::new()
                }
            };
            let details = ItemDetails {
                actor: self.reconciler.config().actor_label.clone(),
                timestamp: self.reconciler.now(),
                export,
            };
            let note = host
                .create_note(record, &details.render())
                .await
                .map_err(ReconcileError::NoteWriteBack);
            if let Err(e) = &note {
                warn!(record = %record.key, error = %e, "failed to save details note");
            }
            results.push(DetailsNote {
                record: record.key.clone(),
                note,
            });
        }
        Ok(results)
    }
}

/// A host merge wrapped by an [`AliasService`].
///
/// Implements [`StructuralMerge`] itself, so it can stand in wherever the
/// host merge was used.
pub struct ReconcilingMerge<'s, M, H> {
    inner: M,
    service: &'s AliasService<H>,
}

impl<M, H> ReconcilingMerge<'_, M, H> {
    pub fn inner(&self) -> &M {
        &self.inner
    }
}

#[async_trait]
impl<'s, M, H> StructuralMerge for ReconcilingMerge<'s, M, H>
where
    M: StructuralMerge,
    H: RecordHost,
{
    type Output = M::Output;
    type Error = M::Error;

    async fn merge(
        &self,
        primary: &mut Record,
        secondaries: &[Record],
    ) -> Result<Self::Output, Self::Error> {
        self.service.reconcile(primary, secondaries, &self.inner).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use aka_host::InMemoryHost;
    use aka_types::{Library, RecordKind, RelationKind};

    use super::*;

    const CURRENT: &str = "KerkoCite.ItemAlsoKnownAs:";

    fn record(key: &str, text: &str) -> Record {
        Record::regular(key, Library::group("7")).with_metadata(text)
    }

    fn service(records: Vec<Record>) -> (Arc<InMemoryHost>, AliasService<Arc<InMemoryHost>>) {
        let host = Arc::new(InMemoryHost::with_records(records).unwrap());
        let service = AliasService::new(ReconcilerConfig::default(), Arc::clone(&host));
        (host, service)
    }

    #[test]
    fn lifecycle() {
        let (_, svc) = service(vec![]);
        assert_eq!(svc.state(), ServiceState::Created);
        svc.start();
        svc.start();
        assert!(svc.is_ready());
        svc.shutdown();
        assert_eq!(svc.state(), ServiceState::Stopped);
    }

    #[tokio::test]
    async fn not_ready_service_passes_merge_through() {
        let primary = record("P", &format!("{CURRENT} a"));
        let secondary = record("S", &format!("{CURRENT} b"));
        let (host, svc) = service(vec![primary.clone(), secondary.clone()]);

        let mut primary = primary;
        let key = svc
            .reconcile(&mut primary, &[secondary], host.as_ref())
            .await
            .unwrap();

        assert_eq!(key.as_str(), "P");
        assert_eq!(host.merge_count().unwrap(), 1);
        assert_eq!(host.save_count().unwrap(), 0);
        assert!(host.notes().unwrap().is_empty());
        assert_eq!(primary.metadata(), format!("{CURRENT} a"));
    }

    #[tokio::test]
    async fn wrapped_merge_reconciles() {
        let primary = record("P", &format!("{CURRENT} a"));
        let secondary = record("S", &format!("{CURRENT} b"));
        let (host, svc) = service(vec![primary.clone(), secondary.clone()]);
        svc.start();

        let merge = svc.wrap(host.as_ref());
        let mut primary = primary;
        let key = merge.merge(&mut primary, &[secondary]).await.unwrap();

        assert_eq!(key.as_str(), "P");
        assert_eq!(primary.metadata(), format!("{CURRENT} a b"));
        assert_eq!(host.notes().unwrap().len(), 1);
        assert_eq!(host.merge_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn stopped_service_stops_reconciling() {
        let primary = record("P", &format!("{CURRENT} a"));
        let secondary = record("S", &format!("{CURRENT} b"));
        let (host, svc) = service(vec![primary.clone(), secondary.clone()]);
        svc.start();
        svc.shutdown();

        let mut primary = primary;
        svc.wrap(host.as_ref())
            .merge(&mut primary, &[secondary])
            .await
            .unwrap();
        assert_eq!(primary.metadata(), format!("{CURRENT} a"));
    }

    #[tokio::test]
    async fn assign_keys_adds_doi_own_key_and_relations() {
        let mut with_doi = record("A", "shortDOI: 10.1234/short");
        with_doi.doi = Some("10.1234/long".into());
        let related = record("B", &format!("{CURRENT} B-old"))
            .with_relation(RelationKind::SameAs, "http://zotero.org/groups/7/items/C");
        let mut note = record("N", "");
        note.kind = RecordKind::Note;
        let done = record("D", &format!("{CURRENT} 7:D"));

        let (host, svc) = service(vec![with_doi.clone(), related.clone(), note.clone(), done.clone()]);
        svc.start();

        let mut records = vec![with_doi, related, note, done];
        let results = svc.assign_keys(&mut records).await.unwrap();

        assert_eq!(results.len(), 4);
        assert_eq!(results[0].aliases, "10.1234/short 7:A");
        assert!(matches!(results[0].outcome, AssignOutcome::Written));
        assert_eq!(results[1].aliases, "7:B 7:C B-old");
        assert!(matches!(results[2].outcome, AssignOutcome::Skipped));
        assert!(matches!(results[3].outcome, AssignOutcome::Unchanged));
        assert_eq!(host.save_count().unwrap(), 2);

        let stored = host.get(&RecordKey::from("A")).unwrap().unwrap();
        assert_eq!(
            stored.metadata(),
            format!("shortDOI: 10.1234/short\n{CURRENT} 10.1234/short 7:A")
        );
        assert_eq!(records[1].metadata(), format!("{CURRENT} 7:B 7:C B-old"));
    }

    #[tokio::test]
    async fn assign_keys_reports_save_failures() {
        let (host, svc) = service(vec![record("A", "")]);
        svc.start();
        host.fail_saves(true);

        let mut records = vec![record("A", "")];
        let results = svc.assign_keys(&mut records).await.unwrap();
        assert!(matches!(
            results[0].outcome,
            AssignOutcome::Failed(ReconcileError::AliasWriteBack(_))
        ));
    }

    #[tokio::test]
    async fn batch_operations_require_ready() {
        let (_, svc) = service(vec![]);
        let err = svc.assign_keys(&mut []).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotReady(ServiceState::Created)));

        svc.start();
        svc.shutdown();
        let err = svc.save_details_note(&[]).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotReady(ServiceState::Stopped)));
    }

    #[tokio::test]
    async fn details_note_per_regular_record() {
        let mut attachment = record("F", "");
        attachment.kind = RecordKind::Attachment;
        let (host, svc) = service(vec![record("A", "body"), attachment.clone()]);
        svc.start();

        let results = svc
            .save_details_note(&[record("A", "body"), attachment])
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].record.as_str(), "A");
        assert!(results[0].note.is_ok());
        let notes = host.notes().unwrap();
        assert!(notes[0].text.starts_with("<p><b>Item details ("));
        assert!(notes[0].text.contains("ID  - 7:A"));
    }
}
