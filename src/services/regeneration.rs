//! Batch embedding regeneration.
//!
//! Regenerates vector-store embeddings for entities, relations and topics,
//! one item at a time, with progress reporting and cooperative
//! cancellation. Items are processed in kind order (entities, relations,
//! topics) so a cancelled run leaves a predictable prefix done.

use crate::models::{
    LogKind, OrgScope, RecordKind, RegenerationProgress, RegenerationStatus,
};
use crate::services::targets::{SyncTarget, load_scoped};
use crate::services::{CancellationToken, ChromaSyncService};
use crate::storage::DocumentStore;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Which record kinds to regenerate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKinds {
    /// Entities, relations and topics.
    #[default]
    All,
    /// Entities only.
    Entities,
    /// Relations only.
    Relations,
    /// Topics only.
    Topics,
}

impl TargetKinds {
    /// Kinds selected, in processing order.
    #[must_use]
    pub fn kinds(self) -> Vec<RecordKind> {
        match self {
            Self::All => RecordKind::ALL.to_vec(),
            Self::Entities => vec![RecordKind::Entity],
            Self::Relations => vec![RecordKind::Relation],
            Self::Topics => vec![RecordKind::Topic],
        }
    }

    /// Parses `all`, `entities`, `relations` or `topics`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for anything else.
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" | "" => Ok(Self::All),
            "entities" | "entity" => Ok(Self::Entities),
            "relations" | "relation" => Ok(Self::Relations),
            "topics" | "topic" => Ok(Self::Topics),
            other => Err(Error::InvalidInput(format!("unknown target kind: {other}"))),
        }
    }
}

/// Which records within the selected kinds to regenerate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegenerationMode {
    /// Only records whose sync flag is not set.
    #[default]
    Missing,
    /// Every record in scope.
    All,
}

/// Parameters of a regeneration run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegenerationRequest {
    /// Organization scope.
    pub organization: OrgScope,
    /// Record kinds.
    pub kinds: TargetKinds,
    /// Record selection.
    pub mode: RegenerationMode,
    /// Re-embed even when the vector store already holds the record.
    pub force: bool,
}

/// Receives progress snapshots.
pub trait ProgressObserver {
    /// Called after every state change.
    fn on_progress(&self, progress: &RegenerationProgress);
}

impl<F: Fn(&RegenerationProgress)> ProgressObserver for F {
    fn on_progress(&self, progress: &RegenerationProgress) {
        self(progress);
    }
}

/// Observer that ignores updates.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {
    fn on_progress(&self, _progress: &RegenerationProgress) {}
}

/// Per-kind counts of records without an embedding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingCounts {
    /// Entities.
    pub entities: usize,
    /// Relations.
    pub relations: usize,
    /// Topics.
    pub topics: usize,
    /// Sum of the three.
    pub total: usize,
}

enum Outcome {
    Success,
    Skipped(String),
    Failed(Error),
}

/// Regenerates embeddings.
pub struct RegenerationService {
    documents: Arc<dyn DocumentStore>,
    sync: Arc<ChromaSyncService>,
    item_delay: Duration,
}

impl RegenerationService {
    /// Default pause between items.
    pub const DEFAULT_ITEM_DELAY: Duration = Duration::from_millis(100);

    /// Creates a regeneration service.
    #[must_use]
    pub fn new(documents: Arc<dyn DocumentStore>, sync: Arc<ChromaSyncService>) -> Self {
        Self {
            documents,
            sync,
            item_delay: Self::DEFAULT_ITEM_DELAY,
        }
    }

    /// Sets the pause between items (zero disables it).
    #[must_use]
    pub const fn with_item_delay(mut self, delay: Duration) -> Self {
        self.item_delay = delay;
        self
    }

    /// Counts in-scope records whose sync flag is not set.
    ///
    /// # Errors
    ///
    /// Returns an error if a store read fails.
    pub fn count_missing(&self, scope: &OrgScope) -> Result<MissingCounts> {
        let mut counts = MissingCounts::default();
        for kind in RecordKind::ALL {
            let missing = self.select(kind, scope, RegenerationMode::Missing, false)?.len();
            match kind {
                RecordKind::Entity => counts.entities = missing,
                RecordKind::Relation => counts.relations = missing,
                RecordKind::Topic => counts.topics = missing,
            }
        }
        counts.total = counts.entities + counts.relations + counts.topics;
        Ok(counts)
    }

    /// Runs a regeneration.
    ///
    /// Per-item failures are logged and counted; the run continues. The
    /// cancellation token is checked before each item.
    ///
    /// # Errors
    ///
    /// Returns an error only if selecting targets fails.
    pub fn run(
        &self,
        request: &RegenerationRequest,
        cancel: &CancellationToken,
        observer: &dyn ProgressObserver,
    ) -> Result<RegenerationProgress> {
        let mut targets = Vec::new();
        for kind in request.kinds.kinds() {
            targets.extend(self.select(kind, &request.organization, request.mode, request.force)?);
        }

        let mut progress = RegenerationProgress {
            total: targets.len(),
            status: RegenerationStatus::Processing,
            ..RegenerationProgress::default()
        };
        tracing::info!(
            total = targets.len(),
            scope = %request.organization,
            force = request.force,
            "Starting embedding regeneration"
        );

        if targets.is_empty() {
            progress.status = RegenerationStatus::Completed;
            progress.log(LogKind::Info, "Nothing to regenerate");
            observer.on_progress(&progress);
            return Ok(progress);
        }

        progress.log(
            LogKind::Info,
            format!("Regenerating {} embeddings", targets.len()),
        );
        observer.on_progress(&progress);

        let last = targets.len() - 1;
        for (index, (target, organization_id)) in targets.iter().enumerate() {
            if cancel.is_cancelled() {
                progress.status = RegenerationStatus::Cancelled;
                progress.log(
                    LogKind::Info,
                    format!("Cancelled after {} of {}", progress.current, progress.total),
                );
                tracing::info!(current = progress.current, total = progress.total, "Regeneration cancelled");
                observer.on_progress(&progress);
                return Ok(progress);
            }

            let outcome = self.process(target, organization_id, request.force);
            let (kind, outcome_label) = match outcome {
                Outcome::Success => {
                    progress.stats.success += 1;
                    (LogKind::Success, "success")
                },
                Outcome::Skipped(ref reason) => {
                    progress.stats.skipped += 1;
                    progress.log(LogKind::Skip, format!("{} {}: {reason}", target.kind, target.id));
                    (LogKind::Skip, "skipped")
                },
                Outcome::Failed(ref e) => {
                    progress.stats.errors += 1;
                    progress.log(LogKind::Error, format!("{} {}: {e}", target.kind, target.id));
                    (LogKind::Error, "error")
                },
            };
            if kind == LogKind::Success {
                progress.log(
                    LogKind::Success,
                    format!("{} {} ({})", target.kind, target.id, target.label),
                );
            }
            metrics::counter!(
                "regeneration_items_total",
                "kind" => target.kind.as_str(),
                "outcome" => outcome_label
            )
            .increment(1);

            progress.current += 1;
            observer.on_progress(&progress);

            if index < last && !self.item_delay.is_zero() {
                std::thread::sleep(self.item_delay);
            }
        }

        progress.status = RegenerationStatus::Completed;
        progress.log(
            LogKind::Info,
            format!(
                "Done: {} succeeded, {} skipped, {} failed",
                progress.stats.success, progress.stats.skipped, progress.stats.errors
            ),
        );
        tracing::info!(
            success = progress.stats.success,
            skipped = progress.stats.skipped,
            errors = progress.stats.errors,
            "Embedding regeneration completed"
        );
        observer.on_progress(&progress);
        Ok(progress)
    }

    /// Selects the in-scope records of `kind` paired with their organization.
    ///
    /// Records without an organization, and relations without a topic, never
    /// reach processing.
    fn select(
        &self,
        kind: RecordKind,
        scope: &OrgScope,
        mode: RegenerationMode,
        force: bool,
    ) -> Result<Vec<(SyncTarget, String)>> {
        let only_unsynced = mode == RegenerationMode::Missing && !force;
        Ok(load_scoped(self.documents.as_ref(), kind, scope)?
            .into_iter()
            .filter(|t| !t.missing_topic)
            .filter(|t| !(only_unsynced && t.synced))
            .filter_map(|t| {
                let org = t.organization_id.clone()?;
                Some((t, org))
            })
            .collect())
    }

    fn process(&self, target: &SyncTarget, organization_id: &str, force: bool) -> Outcome {
        if !force {
            match self.sync.is_synced(target.kind, organization_id, &target.id) {
                Ok(true) => {
                    if !target.synced
                        && let Err(e) = self.sync.set_flag(target.kind, &target.id, true)
                    {
                        tracing::warn!(id = %target.id, error = %e, "Failed to set sync flag");
                    }
                    return Outcome::Skipped("already in vector store".to_string());
                },
                Ok(false) => {},
                Err(e) => return Outcome::Failed(e),
            }
        }

        match self.sync.sync_record(target.kind, &target.id) {
            Ok(()) => Outcome::Success,
            Err(e) => Outcome::Failed(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbedder;
    use crate::models::{Collection, fields_from_value};
    use crate::storage::{InMemoryDocumentStore, InMemoryVectorStore, VectorStore};
    use serde_json::json;
    use std::sync::Mutex;

    struct Fixture {
        docs: Arc<InMemoryDocumentStore>,
        vectors: Arc<InMemoryVectorStore>,
        service: RegenerationService,
    }

    fn fixture() -> Fixture {
        let docs = Arc::new(InMemoryDocumentStore::new());
        let vectors = Arc::new(InMemoryVectorStore::new());
        let sync = Arc::new(ChromaSyncService::new(
            docs.clone(),
            vectors.clone(),
            Arc::new(HashEmbedder::new(16)),
        ));
        let service =
            RegenerationService::new(docs.clone(), sync).with_item_delay(Duration::ZERO);
        Fixture {
            docs,
            vectors,
            service,
        }
    }

    fn put(docs: &InMemoryDocumentStore, collection: Collection, id: &str, v: serde_json::Value) {
        docs.set(collection, id, fields_from_value(v).unwrap()).unwrap();
    }

    #[test]
    fn test_target_kinds_parse() {
        assert_eq!(TargetKinds::parse("Topics").unwrap(), TargetKinds::Topics);
        assert!(TargetKinds::parse("pages").is_err());
    }

    #[test]
    fn test_run_counts_success_and_errors() {
        let f = fixture();
        put(&f.docs, Collection::Entities, "e1", json!({"name": "Acme", "organizationId": "o1"}));
        put(&f.docs, Collection::Entities, "e2", json!({"name": "", "organizationId": "o1"}));
        put(&f.docs, Collection::Entities, "e3", json!({"name": "Nobody"}));

        let request = RegenerationRequest::default();
        let progress = f
            .service
            .run(&request, &CancellationToken::new(), &NoopObserver)
            .unwrap();
        assert_eq!(progress.status, RegenerationStatus::Completed);
        assert_eq!(progress.total, 2);
        assert_eq!(progress.current, 2);
        assert_eq!(progress.stats.success, 1);
        assert_eq!(progress.stats.errors, 1);
        assert_eq!(f.vectors.count("entities_o1").unwrap(), 1);
    }

    #[test]
    fn test_missing_mode_skips_flagged() {
        let f = fixture();
        put(
            &f.docs,
            Collection::Topics,
            "m1-topic-a",
            json!({"title": "A", "organizationId": "o1", "chromaSynced": 1}),
        );
        put(&f.docs, Collection::Topics, "m1-topic-b", json!({"title": "B", "organizationId": "o1"}));
        let counts = f.service.count_missing(&OrgScope::All).unwrap();
        assert_eq!(counts.topics, 1);
        assert_eq!(counts.total, 1);
    }

    #[test]
    fn test_missing_mode_uses_each_topic_flag() {
        let f = fixture();
        put(
            &f.docs,
            Collection::Topics,
            "m1-topic-a",
            json!({"title": "A", "organizationId": "o1", "chromaSynced": true}),
        );
        put(
            &f.docs,
            Collection::Topics,
            "m2-topic-a",
            json!({"title": "A again", "organizationId": "o1", "chromaSynced": false}),
        );
        assert_eq!(f.service.count_missing(&OrgScope::All).unwrap().topics, 1);

        let request = RegenerationRequest {
            kinds: TargetKinds::Topics,
            ..RegenerationRequest::default()
        };
        let progress = f
            .service
            .run(&request, &CancellationToken::new(), &NoopObserver)
            .unwrap();
        assert_eq!(progress.total, 1);
        assert_eq!(progress.stats.success, 1);
        assert!(f.vectors.contains("topics_o1", "m2-topic-a").unwrap());
        assert!(!f.vectors.contains("topics_o1", "m1-topic-a").unwrap());
    }

    #[test]
    fn test_records_without_org_or_topic_are_not_selected() {
        let f = fixture();
        put(&f.docs, Collection::Entities, "e1", json!({"name": "Acme", "organizationId": "o1"}));
        put(&f.docs, Collection::Entities, "e2", json!({"name": "Nobody"}));
        put(&f.docs, Collection::Relations, "r1", json!({"sourceEntityId": "e1"}));
        let progress = f
            .service
            .run(&RegenerationRequest::default(), &CancellationToken::new(), &NoopObserver)
            .unwrap();
        assert_eq!(progress.total, 1);
        assert_eq!(progress.stats.skipped, 0);
        assert_eq!(progress.stats.success, 1);
    }

    #[test]
    fn test_present_vector_skipped_unless_forced() {
        let f = fixture();
        put(&f.docs, Collection::Entities, "e1", json!({"name": "Acme", "organizationId": "o1"}));
        f.vectors
            .upsert("entities_o1", crate::storage::VectorRecord::new("e1", vec![1.0; 16]))
            .unwrap();

        let progress = f
            .service
            .run(&RegenerationRequest::default(), &CancellationToken::new(), &NoopObserver)
            .unwrap();
        assert_eq!(progress.stats.skipped, 1);

        let forced = RegenerationRequest {
            force: true,
            ..RegenerationRequest::default()
        };
        let progress = f
            .service
            .run(&forced, &CancellationToken::new(), &NoopObserver)
            .unwrap();
        assert_eq!(progress.stats.success, 1);
    }

    #[test]
    fn test_cancellation_stops_before_next_item() {
        let f = fixture();
        for id in ["e1", "e2", "e3"] {
            put(&f.docs, Collection::Entities, id, json!({"name": id, "organizationId": "o1"}));
        }
        let cancel = CancellationToken::new();
        let seen = Mutex::new(Vec::new());
        let observer = |p: &RegenerationProgress| {
            seen.lock().unwrap().push(p.current);
            if p.current == 1 {
                cancel.cancel();
            }
        };
        let progress = f
            .service
            .run(&RegenerationRequest::default(), &cancel, &observer)
            .unwrap();
        assert_eq!(progress.status, RegenerationStatus::Cancelled);
        assert_eq!(progress.current, 1);
        assert_eq!(progress.logs.last().unwrap().kind, LogKind::Info);
    }

    #[test]
    fn test_empty_run_completes() {
        let f = fixture();
        let progress = f
            .service
            .run(&RegenerationRequest::default(), &CancellationToken::new(), &NoopObserver)
            .unwrap();
        assert_eq!(progress.status, RegenerationStatus::Completed);
        assert_eq!(progress.logs.len(), 1);
    }
}
