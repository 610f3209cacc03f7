//! Cascading deletion of entities and meeting notes.
//!
//! Each cascade deletes its documents as one batch, which the `SQLite` store
//! runs in a single transaction. Vectors are removed only after the batch
//! succeeds; a vector failure is logged and the cascade carries on.

use crate::models::{Collection, Entity, RecordKind, Relation, Topic};
use crate::services::ChromaSyncService;
use crate::storage::{DocumentStore, get_record, list_records};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::instrument;

/// Result of deleting one entity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityDeletion {
    /// Relations removed with the entity.
    pub relations_deleted: usize,
}

/// A per-entity failure in a bulk delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionError {
    /// Entity ID.
    pub entity_id: String,
    /// Error message.
    pub error: String,
}

/// Result of [`DeletionService::delete_entities`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkDeletion {
    /// Entities deleted.
    pub deleted: usize,
    /// Entities that could not be deleted.
    pub failed: usize,
    /// Relations removed across all entities.
    pub relations_deleted: usize,
    /// Per-entity failures.
    pub errors: Vec<DeletionError>,
}

/// Result of [`DeletionService::delete_meeting_note_with_relations`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteDeletion {
    /// Topics deleted.
    pub topics_deleted: usize,
    /// Relations deleted.
    pub relations_deleted: usize,
    /// Entities deleted.
    pub entities_deleted: usize,
    /// Whether the note itself was removed.
    pub note_deleted: bool,
}

/// Deletes records together with their dependents and vectors.
pub struct DeletionService {
    documents: Arc<dyn DocumentStore>,
    sync: Option<Arc<ChromaSyncService>>,
}

impl DeletionService {
    /// Creates a deletion service. Vector cleanup is skipped when `sync` is
    /// `None`.
    #[must_use]
    pub fn new(documents: Arc<dyn DocumentStore>, sync: Option<Arc<ChromaSyncService>>) -> Self {
        Self { documents, sync }
    }

    /// Deletes an entity, the relations that reference it and their vectors.
    ///
    /// Documents are removed as one batch; vectors are removed after it
    /// commits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the entity does not exist, or the
    /// document-store error.
    #[instrument(skip(self), fields(operation = "delete_entity"))]
    pub fn delete_entity(&self, id: &str) -> Result<EntityDeletion> {
        let store = self.documents.as_ref();
        let entity: Entity = get_record(store, Collection::Entities, id)?.ok_or_else(|| {
            Error::NotFound {
                collection: Collection::Entities.to_string(),
                id: id.to_string(),
            }
        })?;

        let relations: Vec<Relation> = list_records::<Relation>(store, Collection::Relations)?
            .into_iter()
            .filter(|r| {
                r.source_entity_id.as_deref() == Some(id) || r.target_entity_id.as_deref() == Some(id)
            })
            .collect();

        let mut plan = Plan::default();
        for relation in &relations {
            plan.relation(self.relation_vector(relation), &relation.id);
        }
        plan.document(
            Collection::Entities,
            &entity.id,
            entity.organization_id.as_deref().map(|org| (RecordKind::Entity, org)),
        );

        let existed = self.apply(&plan)?;
        let relations_deleted = existed.count(Collection::Relations);
        tracing::info!(id, name = %entity.name, relations_deleted, "Deleted entity");
        Ok(EntityDeletion { relations_deleted })
    }

    /// Deletes several entities, continuing past failures.
    pub fn delete_entities(&self, ids: &[String]) -> BulkDeletion {
        let mut outcome = BulkDeletion::default();
        for id in ids {
            match self.delete_entity(id) {
                Ok(deleted) => {
                    outcome.deleted += 1;
                    outcome.relations_deleted += deleted.relations_deleted;
                },
                Err(e) => {
                    tracing::warn!(id = %id, error = %e, "Failed to delete entity");
                    outcome.failed += 1;
                    outcome.errors.push(DeletionError {
                        entity_id: id.clone(),
                        error: e.to_string(),
                    });
                },
            }
        }
        outcome
    }

    /// Deletes a meeting note with its topics, the relations extracted from
    /// those topics and the entities tagged with the note.
    ///
    /// Entities are matched on a top-level `meetingNoteId` or on
    /// `metadata.meetingNoteId`. Nothing is touched when the note is missing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the note does not exist, or the
    /// document-store error. A failed batch leaves every document in place.
    #[instrument(skip(self), fields(operation = "delete_meeting_note"))]
    pub fn delete_meeting_note_with_relations(&self, note_id: &str) -> Result<NoteDeletion> {
        let store = self.documents.as_ref();
        if !store.exists(Collection::MeetingNotes, note_id)? {
            return Err(Error::NotFound {
                collection: Collection::MeetingNotes.to_string(),
                id: note_id.to_string(),
            });
        }

        let topics: Vec<Topic> = list_records::<Topic>(store, Collection::Topics)?
            .into_iter()
            .filter(|t| t.meeting_note().as_deref() == Some(note_id))
            .collect();
        let topic_ids: HashSet<String> = topics
            .iter()
            .flat_map(|t| [t.id.clone(), t.short_id()])
            .collect();

        let mut plan = Plan::default();
        for relation in list_records::<Relation>(store, Collection::Relations)? {
            if relation.topic_id.as_ref().is_some_and(|t| topic_ids.contains(t)) {
                plan.relation(self.relation_vector(&relation), &relation.id);
            }
        }

        for doc in store.list(Collection::Entities)? {
            let tagged_top_level = doc.str_field("meetingNoteId") == Some(note_id);
            let entity: Entity = match doc.to_record() {
                Ok(entity) => entity,
                Err(e) => {
                    tracing::warn!(id = %doc.id, error = %e, "Skipping malformed entity");
                    continue;
                },
            };
            let tagged_metadata = entity
                .metadata
                .get("meetingNoteId")
                .and_then(serde_json::Value::as_str)
                == Some(note_id);
            if tagged_top_level || tagged_metadata {
                plan.document(
                    Collection::Entities,
                    &entity.id,
                    entity.organization_id.as_deref().map(|org| (RecordKind::Entity, org)),
                );
            }
        }

        for topic in &topics {
            plan.document(
                Collection::Topics,
                &topic.id,
                topic.organization_id.as_deref().map(|org| (RecordKind::Topic, org)),
            );
        }
        plan.document(Collection::MeetingNotes, note_id, None);

        let existed = self.apply(&plan)?;
        let outcome = NoteDeletion {
            topics_deleted: existed.count(Collection::Topics),
            relations_deleted: existed.count(Collection::Relations),
            entities_deleted: existed.count(Collection::Entities),
            note_deleted: existed.count(Collection::MeetingNotes) == 1,
        };
        tracing::info!(
            note_id,
            topics = outcome.topics_deleted,
            relations = outcome.relations_deleted,
            entities = outcome.entities_deleted,
            "Deleted meeting note"
        );
        Ok(outcome)
    }

    fn relation_vector(&self, relation: &Relation) -> Option<String> {
        let sync = self.sync.as_ref()?;
        match sync.relation_organization(relation) {
            Ok(org) => org,
            Err(e) => {
                tracing::warn!(id = %relation.id, error = %e, "Failed to resolve relation organization");
                None
            },
        }
    }

    /// Deletes the planned documents in one batch, then their vectors.
    fn apply(&self, plan: &Plan) -> Result<Applied> {
        let existed = self.documents.delete_batch(&plan.documents)?;
        for (kind, organization_id, id) in &plan.vectors {
            self.remove_vector(*kind, organization_id, id);
        }
        Ok(Applied {
            documents: plan.documents.iter().map(|(c, _)| *c).zip(existed).collect(),
        })
    }

    fn remove_vector(&self, kind: RecordKind, organization_id: &str, id: &str) {
        let Some(sync) = &self.sync else {
            return;
        };
        if let Err(e) = sync.delete(kind, organization_id, id) {
            tracing::warn!(kind = %kind, id, error = %e, "Failed to remove vector, continuing");
        }
    }
}

/// Documents and vectors a cascade will remove.
#[derive(Default)]
struct Plan {
    documents: Vec<(Collection, String)>,
    vectors: Vec<(RecordKind, String, String)>,
}

impl Plan {
    fn document(&mut self, collection: Collection, id: &str, vector: Option<(RecordKind, &str)>) {
        self.documents.push((collection, id.to_string()));
        if let Some((kind, org)) = vector {
            self.vectors.push((kind, org.to_string(), id.to_string()));
        }
    }

    fn relation(&mut self, organization_id: Option<String>, id: &str) {
        self.documents.push((Collection::Relations, id.to_string()));
        if let Some(org) = organization_id {
            self.vectors.push((RecordKind::Relation, org, id.to_string()));
        }
    }
}

struct Applied {
    documents: Vec<(Collection, bool)>,
}

impl Applied {
    fn count(&self, collection: Collection) -> usize {
        self.documents
            .iter()
            .filter(|(c, existed)| *c == collection && *existed)
            .count()
    }
}
