//! Data-quality reports comparing the document store with the vector store.

// Allow cast precision loss for rate calculations over record counts.
#![allow(clippy::cast_precision_loss)]

use crate::models::{Collection, OrgScope, RecordKind};
use crate::services::targets::{SyncTarget, load_all, organizations};
use crate::storage::{DocumentStore, VectorStore};
use crate::{Result, current_timestamp};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::instrument;

/// Count difference, in percent, still reported as synced.
const SYNC_TOLERANCE_PERCENT: f64 = 5.0;

/// Sync mismatches reported individually before a summary entry.
const MISMATCH_DETAIL_LIMIT: usize = 10;

/// Overall sync state of one record kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Vector count matches the flagged records within tolerance.
    Synced,
    /// Counts differ beyond tolerance.
    Partial,
    /// Nothing synced, or the vector store could not be checked.
    Outdated,
    /// The vector store is disabled.
    NotUsed,
}

/// Kind of quality issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Records without a vector.
    MissingEmbedding,
    /// Fewer vectors than flagged records.
    VectorMissing,
    /// More vectors than flagged records.
    VectorOrphan,
    /// A flagged record has no vector.
    SyncMismatch,
    /// The vector store check failed.
    CheckError,
}

/// One quality issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityIssue {
    /// Kind.
    #[serde(rename = "type")]
    pub kind: IssueKind,
    /// Affected record, when the issue concerns a single one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
    /// Human-readable detail.
    pub details: String,
}

impl QualityIssue {
    fn summary(kind: IssueKind, details: String) -> Self {
        Self {
            kind,
            record_id: None,
            details,
        }
    }
}

/// Quality report for one record kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataQualityReport {
    /// Record kind.
    pub record_kind: RecordKind,
    /// Records in scope.
    pub total: usize,
    /// Vectors found for the scope.
    pub with_embeddings: usize,
    /// `total` minus `with_embeddings`, floored at zero.
    pub without_embeddings: usize,
    /// Sync state.
    pub sync_status: SyncStatus,
    /// Issues found.
    pub inconsistencies: Vec<QualityIssue>,
    /// Score in `0.0..=100.0`.
    pub quality_score: f64,
    /// When the report was produced.
    pub timestamp: String,
}

/// Reports for every record kind plus a weighted overall score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComprehensiveReport {
    /// Entity report.
    pub entities: DataQualityReport,
    /// Relation report.
    pub relations: DataQualityReport,
    /// Topic report.
    pub topics: DataQualityReport,
    /// Weighted score: entities 50%, relations 30%, topics 20%.
    pub overall_score: f64,
}

/// Produces data-quality reports.
pub struct QualityService {
    documents: Arc<dyn DocumentStore>,
    vectors: Option<Arc<dyn VectorStore>>,
}

impl QualityService {
    /// Creates a quality service. `vectors` is `None` when the vector store
    /// is disabled.
    #[must_use]
    pub fn new(documents: Arc<dyn DocumentStore>, vectors: Option<Arc<dyn VectorStore>>) -> Self {
        Self { documents, vectors }
    }

    /// Entity report.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the entities fails.
    pub fn entity_report(&self, scope: &OrgScope) -> Result<DataQualityReport> {
        self.report(RecordKind::Entity, scope)
    }

    /// Relation report.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the relations fails.
    pub fn relation_report(&self, scope: &OrgScope) -> Result<DataQualityReport> {
        self.report(RecordKind::Relation, scope)
    }

    /// Topic report.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the topics fails.
    pub fn topic_report(&self, scope: &OrgScope) -> Result<DataQualityReport> {
        self.report(RecordKind::Topic, scope)
    }

    /// All three reports and the overall score.
    ///
    /// # Errors
    ///
    /// Returns an error if any report fails.
    pub fn comprehensive_report(&self, scope: &OrgScope) -> Result<ComprehensiveReport> {
        let entities = self.entity_report(scope)?;
        let relations = self.relation_report(scope)?;
        let topics = self.topic_report(scope)?;
        let overall_score = topics.quality_score.mul_add(
            0.2,
            entities
                .quality_score
                .mul_add(0.5, relations.quality_score * 0.3),
        );
        Ok(ComprehensiveReport {
            entities,
            relations,
            topics,
            overall_score,
        })
    }

    /// Builds the report for one kind.
    ///
    /// Vector-store failures do not fail the report; they are recorded as a
    /// [`IssueKind::CheckError`] with status [`SyncStatus::Outdated`].
    #[instrument(skip(self), fields(operation = "quality_report", kind = %kind, scope = %scope))]
    pub fn report(&self, kind: RecordKind, scope: &OrgScope) -> Result<DataQualityReport> {
        let records: Vec<SyncTarget> = load_all(self.documents.as_ref(), kind)?
            .into_iter()
            .filter(|t| matches!(scope, OrgScope::All) || scope.includes(t.organization_id.as_deref()))
            .collect();
        let total = records.len();

        let (with_embeddings, sync_status, inconsistencies) = match &self.vectors {
            None => {
                tracing::info!("Vector store disabled, sync status not checked");
                (0, SyncStatus::NotUsed, Vec::new())
            },
            Some(vectors) => {
                let orgs = self.organizations_in_scope(&records, scope)?;
                match check_vectors(vectors.as_ref(), kind, &orgs, &records) {
                    Ok(check) => check,
                    Err(e) => {
                        tracing::warn!(error = %e, "Vector store check failed");
                        let issue = QualityIssue::summary(
                            IssueKind::CheckError,
                            format!("vector store check failed: {e}"),
                        );
                        (0, SyncStatus::Outdated, vec![issue])
                    },
                }
            },
        };

        let quality_score = score(total, with_embeddings, inconsistencies.len(), sync_status);
        tracing::info!(
            total,
            with_embeddings,
            status = ?sync_status,
            issues = inconsistencies.len(),
            quality_score,
            "Quality report generated"
        );
        Ok(DataQualityReport {
            record_kind: kind,
            total,
            with_embeddings,
            without_embeddings: total.saturating_sub(with_embeddings),
            sync_status,
            inconsistencies,
            quality_score,
            timestamp: current_timestamp(),
        })
    }

    /// Organizations whose vector collections count toward the scope: the
    /// records' own plus every stored organization.
    fn organizations_in_scope(&self, records: &[SyncTarget], scope: &OrgScope) -> Result<Vec<String>> {
        if let OrgScope::Organization(org) = scope {
            return Ok(vec![org.clone()]);
        }
        let mut orgs: BTreeSet<String> = organizations(records).into_iter().collect();
        orgs.extend(
            self.documents
                .list(Collection::Organizations)?
                .into_iter()
                .map(|doc| doc.id),
        );
        Ok(orgs.into_iter().collect())
    }
}

fn check_vectors(
    vectors: &dyn VectorStore,
    kind: RecordKind,
    orgs: &[String],
    records: &[SyncTarget],
) -> Result<(usize, SyncStatus, Vec<QualityIssue>)> {
    let mut vector_ids: HashSet<String> = HashSet::new();
    let mut vector_count = 0;
    for org in orgs {
        let collection = kind.vector_collection(org);
        vector_count += vectors.count(&collection)?;
        vector_ids.extend(vectors.list_ids(&collection)?);
    }
    let synced_count = records.iter().filter(|r| r.synced).count();
    let total = records.len();

    let mut issues = Vec::new();
    let status = sync_status(vector_count, synced_count, &mut issues);

    if total > vector_count {
        issues.push(QualityIssue::summary(
            IssueKind::MissingEmbedding,
            format!(
                "{} of {total} {} records have no embedding ({vector_count} in vector store)",
                total - vector_count,
                kind
            ),
        ));
    }

    let mismatched: Vec<&SyncTarget> = records
        .iter()
        .filter(|r| r.synced)
        .filter(|r| {
            !vector_ids.contains(&r.id)
                && !(kind == RecordKind::Topic
                    && vector_ids.contains(&crate::models::TopicKey::short_id(&r.id)))
        })
        .collect();
    for record in mismatched.iter().take(MISMATCH_DETAIL_LIMIT) {
        issues.push(QualityIssue {
            kind: IssueKind::SyncMismatch,
            record_id: Some(record.id.clone()),
            details: format!(
                "{kind} \"{}\" is flagged synced but missing from the vector store",
                if record.label.is_empty() { &record.id } else { &record.label }
            ),
        });
    }
    if mismatched.len() > MISMATCH_DETAIL_LIMIT {
        issues.push(QualityIssue::summary(
            IssueKind::SyncMismatch,
            format!(
                "{} more {kind} records are flagged synced but missing from the vector store",
                mismatched.len() - MISMATCH_DETAIL_LIMIT
            ),
        ));
    }

    Ok((vector_count, status, issues))
}

/// Classifies vector count against the flagged-record count.
fn sync_status(vector: usize, synced: usize, issues: &mut Vec<QualityIssue>) -> SyncStatus {
    let diff = vector.abs_diff(synced);
    let diff_rate = if synced > 0 {
        diff as f64 / synced as f64 * 100.0
    } else if vector > 0 {
        100.0
    } else {
        0.0
    };

    if vector == 0 && synced == 0 {
        return SyncStatus::Outdated;
    }
    if vector == 0 {
        issues.push(QualityIssue::summary(
            IssueKind::VectorMissing,
            format!("no vectors stored but {synced} records are flagged synced"),
        ));
        return SyncStatus::Outdated;
    }
    if vector == synced || diff_rate <= SYNC_TOLERANCE_PERCENT {
        return SyncStatus::Synced;
    }
    let kind = if vector < synced {
        IssueKind::VectorMissing
    } else {
        IssueKind::VectorOrphan
    };
    issues.push(QualityIssue::summary(
        kind,
        format!("flagged records: {synced}, vectors: {vector}, difference: {diff}"),
    ));
    SyncStatus::Partial
}

/// `100 - missing_rate*50 - inconsistency_rate*30 - (20 unless synced)`,
/// clamped to `0..=100`.
fn score(total: usize, with_embeddings: usize, issues: usize, status: SyncStatus) -> f64 {
    let denominator = total.max(1) as f64;
    let missing_rate = total.saturating_sub(with_embeddings) as f64 / denominator;
    let inconsistency_rate = issues as f64 / denominator;
    let status_penalty = if status == SyncStatus::Synced { 0.0 } else { 20.0 };
    missing_rate
        .mul_add(-50.0, inconsistency_rate.mul_add(-30.0, 100.0 - status_penalty))
        .clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fields_from_value;
    use crate::storage::{InMemoryDocumentStore, InMemoryVectorStore, VectorRecord};
    use serde_json::json;
    use test_case::test_case;

    #[test_case(0, 0 => SyncStatus::Outdated; "both empty")]
    #[test_case(0, 4 => SyncStatus::Outdated; "nothing stored")]
    #[test_case(10, 10 => SyncStatus::Synced; "equal")]
    #[test_case(95, 100 => SyncStatus::Synced; "within tolerance below")]
    #[test_case(105, 100 => SyncStatus::Synced; "within tolerance above")]
    #[test_case(50, 100 => SyncStatus::Partial; "missing vectors")]
    #[test_case(3, 0 => SyncStatus::Partial; "vectors without flags")]
    fn test_sync_status(vector: usize, synced: usize) -> SyncStatus {
        sync_status(vector, synced, &mut Vec::new())
    }

    #[test]
    fn test_score_bounds() {
        assert!((score(10, 10, 0, SyncStatus::Synced) - 100.0).abs() < f64::EPSILON);
        assert!((score(10, 0, 0, SyncStatus::Outdated) - 30.0).abs() < f64::EPSILON);
        assert!(score(1, 0, 10, SyncStatus::Outdated).abs() < f64::EPSILON);
        assert!((score(0, 0, 0, SyncStatus::NotUsed) - 80.0).abs() < f64::EPSILON);
    }

    fn store() -> Arc<InMemoryDocumentStore> {
        let store = Arc::new(InMemoryDocumentStore::new());
        for (id, synced) in [("e1", 1), ("e2", 1), ("e3", 0)] {
            store
                .set(
                    Collection::Entities,
                    id,
                    fields_from_value(json!({"name": id, "organizationId": "o1", "chromaSynced": synced}))
                        .unwrap(),
                )
                .unwrap();
        }
        store
    }

    #[test]
    fn test_disabled_vector_store_not_used() {
        let service = QualityService::new(store(), None);
        let report = service.entity_report(&OrgScope::All).unwrap();
        assert_eq!(report.sync_status, SyncStatus::NotUsed);
        assert_eq!(report.total, 3);
        assert_eq!(report.with_embeddings, 0);
        assert_eq!(report.without_embeddings, 3);
    }

    #[test]
    fn test_report_detects_mismatch() {
        let vectors = Arc::new(InMemoryVectorStore::new());
        vectors.upsert("entities_o1", VectorRecord::new("e1", vec![1.0, 0.0])).unwrap();
        let service = QualityService::new(store(), Some(vectors));
        let report = service.entity_report(&OrgScope::Organization("o1".into())).unwrap();
        assert_eq!(report.with_embeddings, 1);
        assert_eq!(report.sync_status, SyncStatus::Partial);
        let kinds: Vec<IssueKind> = report.inconsistencies.iter().map(|i| i.kind).collect();
        assert!(kinds.contains(&IssueKind::VectorMissing));
        assert!(kinds.contains(&IssueKind::MissingEmbedding));
        let mismatch = report
            .inconsistencies
            .iter()
            .find(|i| i.kind == IssueKind::SyncMismatch)
            .unwrap();
        assert_eq!(mismatch.record_id.as_deref(), Some("e2"));
    }

    #[test]
    fn test_comprehensive_weights() {
        let service = QualityService::new(Arc::new(InMemoryDocumentStore::new()), None);
        let report = service.comprehensive_report(&OrgScope::All).unwrap();
        assert!((report.overall_score - 80.0).abs() < 1e-9);
    }
}
