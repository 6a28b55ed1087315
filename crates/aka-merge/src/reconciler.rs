use std::fmt;
use std::sync::Arc;

use aka_host::{RecordHost, StructuralMerge};
use aka_types::{AliasExtractor, AliasSet, Record};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::config::ReconcilerConfig;
use crate::error::ReconcileError;
use crate::history::HistorySnapshot;

/// Source of the timestamp written into history notes.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// What the best-effort parts of one reconciliation did.
#[derive(Debug, Default)]
pub struct ReconcileReport {
    /// The union of every alias in the group, serialized.
    pub aliases: String,
    /// The primary's metadata text was rewritten and saved.
    pub alias_written: bool,
    /// A history note was created on the primary.
    pub note_created: bool,
    /// Failures that were logged and swallowed.
    pub issues: Vec<ReconcileError>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Carries alias sets and history across a host merge.
///
/// The host merge is the only step whose outcome reaches the caller.
/// Everything else is best-effort and isolated from it.
pub struct MergeReconciler<H> {
    host: H,
    extractor: AliasExtractor,
    config: ReconcilerConfig,
    clock: Clock,
}

impl<H> fmt::Debug for MergeReconciler<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MergeReconciler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<H: RecordHost> MergeReconciler<H> {
    pub fn new(config: ReconcilerConfig, host: H) -> Self {
        Self {
            host,
            extractor: config.extractor(),
            config,
            clock: Arc::new(Utc::now),
        }
    }

    /// Replace the wall clock, e.g. to pin note timestamps in tests.
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn extractor(&self) -> &AliasExtractor {
        &self.extractor
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// Union of the primary's aliases, each secondary's aliases, and every
    /// key reachable through their `replaces` and `same-as` links.
    ///
    /// The result's origin is the primary's encoded line, so
    /// [`AliasSet::changed`] tells whether the primary needs rewriting.
    pub fn collect_aliases(&self, primary: &Record, secondaries: &[Record]) -> AliasSet {
        let mut aliases = self.extractor.extract(primary);
        self.extractor.harvest_relations(primary, &mut aliases);
        for secondary in secondaries {
            aliases.union(&self.extractor.extract(secondary));
            self.extractor.harvest_relations(secondary, &mut aliases);
        }
        aliases
    }

    /// Snapshot the group before it is merged.
    ///
    /// A failed export is logged and replaced by empty text.
    pub async fn snapshot(
        &self,
        primary: &Record,
        secondaries: &[Record],
        issues: &mut Vec<ReconcileError>,
    ) -> HistorySnapshot {
        let group: Vec<Record> = std::iter::once(primary)
            .chain(secondaries)
            .cloned()
            .collect();
        let export = match self.host.export_bibliography(&group).await {
            Ok(text) => text,
            Err(e) => {
                warn!(record = %primary.key, error = %e, "history export failed; continuing without it");
                issues.push(ReconcileError::SnapshotExport(e));
                String::new()
            }
        };
        HistorySnapshot::build(
            primary,
            secondaries,
            &export,
            self.config.actor_label.as_deref(),
            self.now(),
            &self.config.audit_field,
        )
    }

    /// Run `merge` on the group, preserving aliases and history around it.
    ///
    /// Returns exactly what `merge` returned.
    pub async fn reconcile<M: StructuralMerge>(
        &self,
        primary: &mut Record,
        secondaries: &[Record],
        merge: &M,
    ) -> Result<M::Output, M::Error> {
        self.reconcile_with_report(primary, secondaries, merge).await.0
    }

    /// Like [`Self::reconcile`], also reporting the best-effort outcomes.
    pub async fn reconcile_with_report<M: StructuralMerge>(
        &self,
        primary: &mut Record,
        secondaries: &[Record],
        merge: &M,
    ) -> (Result<M::Output, M::Error>, ReconcileReport) {
        let mut report = ReconcileReport::default();

        let aliases = self.collect_aliases(primary, secondaries);
        report.aliases = aliases.serialize();
        debug!(
            record = %primary.key,
            aliases = %aliases,
            changed = aliases.changed(),
            "merge aliases collected"
        );

        let history = if self.config.history_notes {
            Some(self.snapshot(primary, secondaries, &mut report.issues).await)
        } else {
            None
        };

        debug!(record = %primary.key, absorbed = secondaries.len(), "merging");
        let merged = merge.merge(primary, secondaries).await;
        if let Err(e) = &merged {
            warn!(record = %primary.key, error = %e, "host merge failed; skipping write-back");
        }
        if merged.is_err() {
            return (merged, report);
        }

        self.write_back(primary, &aliases, history.as_ref(), &mut report)
            .await;
        info!(
            record = %primary.key,
            alias_written = report.alias_written,
            note_created = report.note_created,
            issues = report.issues.len(),
            "merge reconciled"
        );
        (merged, report)
    }

    async fn write_back(
        &self,
        primary: &mut Record,
        aliases: &AliasSet,
        history: Option<&HistorySnapshot>,
        report: &mut ReconcileReport,
    ) {
        if aliases.changed() {
            if self.extractor.apply(primary, aliases) {
                match self.host.save_record(primary).await {
                    Ok(()) => report.alias_written = true,
                    Err(e) => {
                        warn!(record = %primary.key, error = %e, "failed to save merged aliases");
                        report.issues.push(ReconcileError::AliasWriteBack(e));
                    }
                }
            } else {
                debug!(record = %primary.key, "primary has no metadata field; aliases not written");
            }
        }

        if let Some(history) = history {
            match self.host.create_note(primary, &history.render()).await {
                Ok(note) => {
                    debug!(record = %primary.key, note = %note, "history note saved");
                    report.note_created = true;
                }
                Err(e) => {
                    warn!(record = %primary.key, error = %e, "failed to save history note");
                    report.issues.push(ReconcileError::NoteWriteBack(e));
                }
            }
        }
    }
}
