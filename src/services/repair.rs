//! Sync-flag repair and vector-store consistency checks.
//!
//! The document store and the vector store are written independently, so a
//! record's `chromaSynced` flag can drift from what the vector store holds.
//! [`SyncRepairService`] brings the flags back in line with vector-store
//! presence and reports records and vectors that have no counterpart.

use crate::models::{OrgScope, RecordKind, SYNC_FLAG_FIELD, SyncFlag, TopicKey};
use crate::services::ChromaSyncService;
use crate::services::targets::{SyncTarget, load_scoped, organizations};
use crate::storage::DocumentStore;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::instrument;

/// A per-record failure during repair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairError {
    /// Record ID.
    pub id: String,
    /// Error message.
    pub message: String,
}

/// Result of a flag repair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairReport {
    /// Records compared against the vector store.
    pub checked: usize,
    /// Flags rewritten.
    pub repaired: usize,
    /// Per-record failures.
    pub errors: Vec<RepairError>,
}

impl RepairReport {
    fn merge(&mut self, other: Self) {
        self.checked += other.checked;
        self.repaired += other.repaired;
        self.errors.extend(other.errors);
    }

    fn error(&mut self, id: &str, message: impl ToString) {
        self.errors.push(RepairError {
            id: id.to_string(),
            message: message.to_string(),
        });
    }
}

/// Kind of drift between the two stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InconsistencyKind {
    /// The record has no vector.
    MissingInVectorStore,
    /// A vector has no record.
    OrphanInVectorStore,
    /// The vector exists but the record's flag is not set.
    FlagMismatch,
}

/// One detected drift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inconsistency {
    /// Kind of drift.
    pub kind: InconsistencyKind,
    /// Record kind.
    pub record_kind: RecordKind,
    /// Record ID, or vector ID for orphans.
    pub id: String,
    /// Organization owning the vector collection.
    pub organization_id: String,
}

/// Result of [`SyncRepairService::repair_inconsistencies`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsistencyRepair {
    /// Records re-embedded.
    pub resynced: usize,
    /// Flags set.
    pub flags_fixed: usize,
    /// Orphan vectors removed.
    pub orphans_removed: usize,
    /// Per-item failures.
    pub errors: Vec<RepairError>,
}

/// Repairs sync flags and reconciles the two stores.
pub struct SyncRepairService {
    documents: Arc<dyn DocumentStore>,
    sync: Option<Arc<ChromaSyncService>>,
}

impl SyncRepairService {
    /// Creates a repair service. `sync` is `None` when the vector store is
    /// disabled, in which case every operation is a no-op.
    #[must_use]
    pub fn new(documents: Arc<dyn DocumentStore>, sync: Option<Arc<ChromaSyncService>>) -> Self {
        Self { documents, sync }
    }

    /// Repairs entity flags.
    ///
    /// # Errors
    ///
    /// Returns an error if loading the entities fails.
    pub fn repair_entities(&self, scope: &OrgScope) -> Result<RepairReport> {
        self.repair_kind(RecordKind::Entity, scope)
    }

    /// Repairs relation flags.
    ///
    /// # Errors
    ///
    /// Returns an error if loading the relations fails.
    pub fn repair_relations(&self, scope: &OrgScope) -> Result<RepairReport> {
        self.repair_kind(RecordKind::Relation, scope)
    }

    /// Repairs topic flags.
    ///
    /// # Errors
    ///
    /// Returns an error if loading the topics fails.
    pub fn repair_topics(&self, scope: &OrgScope) -> Result<RepairReport> {
        self.repair_kind(RecordKind::Topic, scope)
    }

    /// Repairs every kind and sums the reports.
    ///
    /// # Errors
    ///
    /// Returns an error if loading any kind fails.
    pub fn repair_all(&self, scope: &OrgScope) -> Result<RepairReport> {
        let mut report = RepairReport::default();
        for kind in RecordKind::ALL {
            report.merge(self.repair_kind(kind, scope)?);
        }
        Ok(report)
    }

    /// Sets each flag to match vector-store presence.
    ///
    /// The flag is re-read immediately before the comparison so a record
    /// synced since the listing is not reset.
    #[instrument(skip(self), fields(operation = "repair_flags", kind = %kind, scope = %scope))]
    fn repair_kind(&self, kind: RecordKind, scope: &OrgScope) -> Result<RepairReport> {
        let mut report = RepairReport::default();
        let Some(sync) = &self.sync else {
            tracing::info!("Vector store disabled, skipping flag repair");
            return Ok(report);
        };

        let mut seen = HashSet::new();
        for target in load_scoped(self.documents.as_ref(), kind, scope)? {
            if !seen.insert(target.id.clone()) {
                continue;
            }
            let Some(org) = target.organization_id.as_deref() else {
                continue;
            };
            let flagged = match self.documents.get(kind.collection(), &target.id) {
                Ok(Some(doc)) => SyncFlag::from_value(doc.get(SYNC_FLAG_FIELD)).is_synced(),
                Ok(None) => continue,
                Err(e) => {
                    report.error(&target.id, e);
                    continue;
                },
            };
            report.checked += 1;

            let present = match sync.is_synced(kind, org, &target.id) {
                Ok(present) => present,
                Err(e) => {
                    report.error(&target.id, e);
                    continue;
                },
            };
            if flagged == present {
                continue;
            }
            match sync.set_flag(kind, &target.id, present) {
                Ok(()) => {
                    report.repaired += 1;
                    tracing::debug!(id = %target.id, synced = present, "Repaired sync flag");
                },
                Err(e) => report.error(&target.id, e),
            }
        }

        tracing::info!(
            checked = report.checked,
            repaired = report.repaired,
            errors = report.errors.len(),
            "Flag repair finished"
        );
        Ok(report)
    }

    /// Compares record IDs with the vector collections' IDs.
    ///
    /// # Errors
    ///
    /// Returns an error if a store read fails.
    #[instrument(skip(self), fields(operation = "check_consistency", scope = %scope))]
    pub fn check_consistency(&self, scope: &OrgScope) -> Result<Vec<Inconsistency>> {
        let Some(sync) = &self.sync else {
            return Ok(Vec::new());
        };
        let vectors = sync.vectors();
        let collections = vectors.list_collections()?;
        let mut found = Vec::new();

        for kind in RecordKind::ALL {
            let targets = load_scoped(self.documents.as_ref(), kind, scope)?;
            let mut by_org: HashMap<String, Vec<&SyncTarget>> = HashMap::new();
            for target in &targets {
                if let Some(org) = &target.organization_id {
                    by_org.entry(org.clone()).or_default().push(target);
                }
            }

            let mut orgs: BTreeSet<String> = organizations(&targets).into_iter().collect();
            let prefix = format!("{}_", kind.vector_prefix());
            match scope {
                OrgScope::All => orgs.extend(
                    collections
                        .iter()
                        .filter_map(|c| c.strip_prefix(&prefix))
                        .map(str::to_string),
                ),
                OrgScope::Organization(org) => {
                    orgs.insert(org.clone());
                },
            }

            for org in orgs {
                let ids: HashSet<String> = vectors
                    .list_ids(&kind.vector_collection(&org))?
                    .into_iter()
                    .collect();
                let records = by_org.get(&org).map_or(&[][..], Vec::as_slice);
                let mut known = HashSet::new();
                for target in records {
                    let keys = record_keys(target);
                    let present = keys.iter().any(|k| ids.contains(k));
                    known.extend(keys);
                    let drift = if !present {
                        InconsistencyKind::MissingInVectorStore
                    } else if !target.synced {
                        InconsistencyKind::FlagMismatch
                    } else {
                        continue;
                    };
                    found.push(Inconsistency {
                        kind: drift,
                        record_kind: kind,
                        id: target.id.clone(),
                        organization_id: org.clone(),
                    });
                }
                let mut orphans: Vec<&String> = ids.iter().filter(|id| !known.contains(*id)).collect();
                orphans.sort();
                found.extend(orphans.into_iter().map(|id| Inconsistency {
                    kind: InconsistencyKind::OrphanInVectorStore,
                    record_kind: kind,
                    id: id.clone(),
                    organization_id: org.clone(),
                }));
            }
        }

        tracing::info!(inconsistencies = found.len(), "Consistency check finished");
        Ok(found)
    }

    /// Re-syncs missing records, sets mismatched flags and removes orphans.
    ///
    /// Failures are collected; processing continues.
    pub fn repair_inconsistencies(&self, inconsistencies: &[Inconsistency]) -> ConsistencyRepair {
        let mut outcome = ConsistencyRepair::default();
        let Some(sync) = &self.sync else {
            return outcome;
        };

        for item in inconsistencies {
            let result = match item.kind {
                InconsistencyKind::MissingInVectorStore => sync
                    .sync_record(item.record_kind, &item.id)
                    .map(|()| outcome.resynced += 1),
                InconsistencyKind::FlagMismatch => sync
                    .set_flag(item.record_kind, &item.id, true)
                    .map(|()| outcome.flags_fixed += 1),
                InconsistencyKind::OrphanInVectorStore => sync
                    .vectors()
                    .remove(&item.record_kind.vector_collection(&item.organization_id), &item.id)
                    .map(|removed| outcome.orphans_removed += usize::from(removed)),
            };
            if let Err(e) = result {
                tracing::warn!(id = %item.id, kind = ?item.kind, error = %e, "Failed to repair inconsistency");
                outcome.errors.push(RepairError {
                    id: item.id.clone(),
                    message: e.to_string(),
                });
            }
        }
        outcome
    }
}

/// IDs a record may be stored under in the vector store.
fn record_keys(target: &SyncTarget) -> Vec<String> {
    let mut keys = vec![target.id.clone()];
    if target.kind == RecordKind::Topic {
        let short = TopicKey::short_id(&target.id);
        if short != target.id {
            keys.push(short);
        }
    }
    keys
}
