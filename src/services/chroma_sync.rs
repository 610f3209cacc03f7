//! Per-record vector sync.
//!
//! Writes one record's embedding to `{kind}_{organizationId}` and keeps the
//! record's `chromaSynced` flag in step with the outcome.

use crate::embedding::{EMBEDDING_VERSION, Embedder, text};
use crate::models::{
    Entity, Fields, OrgScope, RecordKind, Relation, SYNC_ATTEMPT_FIELD, SYNC_ERROR_FIELD,
    SYNC_FLAG_FIELD, Topic, TopicKey, fields_from_value,
};
use crate::storage::{DocumentStore, VectorRecord, VectorStore, get_record, update_if_exists};
use crate::{Error, Result, current_timestamp};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::instrument;

/// Syncs entities, relations and topics into the vector store.
pub struct ChromaSyncService {
    documents: Arc<dyn DocumentStore>,
    vectors: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
}

impl ChromaSyncService {
    /// Creates a sync service.
    #[must_use]
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        vectors: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self {
            documents,
            vectors,
            embedder,
        }
    }

    /// Returns the vector store.
    #[must_use]
    pub fn vectors(&self) -> &dyn VectorStore {
        self.vectors.as_ref()
    }

    /// Embeds an entity and marks it synced.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the entity has no organization, or
    /// the embedding / vector-store error. The record's flag is reset on
    /// failure.
    #[instrument(skip(self, entity), fields(operation = "sync_entity", id = %entity.id))]
    pub fn sync_entity(&self, entity: &Entity) -> Result<()> {
        let org = require_org(RecordKind::Entity, &entity.id, entity.organization_id.as_deref())?;
        let metadata = json!({
            "organizationId": org,
            "name": entity.name,
            "type": entity.entity_type,
            "aliases": entity.aliases,
            "metadata": entity.metadata,
            "companyId": entity.company_id,
        });
        self.write(RecordKind::Entity, &entity.id, org, &text::entity_text(entity), metadata)
    }

    /// Embeds a relation and marks it synced.
    ///
    /// The organization comes from the relation or, failing that, from its
    /// source or target entity.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if no organization can be resolved, or
    /// the embedding / vector-store error.
    #[instrument(skip(self, relation), fields(operation = "sync_relation", id = %relation.id))]
    pub fn sync_relation(&self, relation: &Relation) -> Result<()> {
        let org = self.relation_organization(relation)?;
        let org = require_org(RecordKind::Relation, &relation.id, org.as_deref())?;

        let source = self.entity_name(relation.source_entity_id.as_deref())?;
        let target = self.entity_name(relation.target_entity_id.as_deref())?;
        let content = text::relation_text(relation, source.as_deref(), target.as_deref());
        let metadata = json!({
            "organizationId": org,
            "relationType": relation.relation_type,
            "sourceEntityId": relation.source_entity_id,
            "targetEntityId": relation.target_entity_id,
            "topicId": relation.topic_id,
            "description": relation.description,
        });
        self.write(RecordKind::Relation, &relation.id, org, &content, metadata)
    }

    /// Embeds a topic and marks it synced.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the topic has no organization, or
    /// the embedding / vector-store error.
    #[instrument(skip(self, topic), fields(operation = "sync_topic", id = %topic.id))]
    pub fn sync_topic(&self, topic: &Topic) -> Result<()> {
        let org = require_org(RecordKind::Topic, &topic.id, topic.organization_id.as_deref())?;
        let metadata = json!({
            "organizationId": org,
            "title": topic.title,
            "topicId": topic.short_id(),
            "meetingNoteId": topic.meeting_note(),
            "semanticCategory": topic.semantic_category,
            "importance": topic.importance,
            "keywords": topic.keywords,
        });
        self.write(RecordKind::Topic, &topic.id, org, &text::topic_text(topic), metadata)
    }

    /// Loads a record by ID and syncs it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the record does not exist, or the sync
    /// error.
    pub fn sync_record(&self, kind: RecordKind, id: &str) -> Result<()> {
        let not_found = || Error::NotFound {
            collection: kind.collection().to_string(),
            id: id.to_string(),
        };
        let store = self.documents.as_ref();
        match kind {
            RecordKind::Entity => {
                self.sync_entity(&get_record(store, kind.collection(), id)?.ok_or_else(not_found)?)
            },
            RecordKind::Relation => self
                .sync_relation(&get_record(store, kind.collection(), id)?.ok_or_else(not_found)?),
            RecordKind::Topic => {
                self.sync_topic(&get_record(store, kind.collection(), id)?.ok_or_else(not_found)?)
            },
        }
    }

    /// Removes a record's vector. A missing vector is not an error.
    ///
    /// Topics are also removed under their short ID.
    ///
    /// # Errors
    ///
    /// Returns the vector-store error.
    pub fn delete(&self, kind: RecordKind, organization_id: &str, id: &str) -> Result<bool> {
        let collection = kind.vector_collection(organization_id);
        let mut removed = self.vectors.remove(&collection, id)?;
        if kind == RecordKind::Topic {
            let short = TopicKey::short_id(id);
            if short != id {
                removed |= self.vectors.remove(&collection, &short)?;
            }
        }
        Ok(removed)
    }

    /// Returns true if the vector store holds the record.
    ///
    /// Topics match on either the stored ID or the short ID.
    ///
    /// # Errors
    ///
    /// Returns the vector-store error.
    pub fn is_synced(&self, kind: RecordKind, organization_id: &str, id: &str) -> Result<bool> {
        let collection = kind.vector_collection(organization_id);
        if self.vectors.contains(&collection, id)? {
            return Ok(true);
        }
        if kind == RecordKind::Topic {
            let short = TopicKey::short_id(id);
            if short != id {
                return self.vectors.contains(&collection, &short);
            }
        }
        Ok(false)
    }

    /// Returns the records of `kind` most similar to `query_text`, best first.
    ///
    /// A single organization searches `{kind}_{org}`; [`OrgScope::All`]
    /// searches every collection of the kind and merges the hits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an empty query, or the embedding /
    /// vector-store error.
    #[instrument(skip_all, fields(operation = "find_similar", kind = %kind, scope = %scope, limit = limit))]
    pub fn find_similar(
        &self,
        kind: RecordKind,
        scope: &OrgScope,
        query_text: &str,
        limit: usize,
    ) -> Result<Vec<SimilarRecord>> {
        if query_text.trim().is_empty() {
            return Err(Error::InvalidInput("search query is empty".to_string()));
        }
        if limit == 0 {
            return Ok(Vec::new());
        }

        let prefix = kind.vector_collection("");
        let collections: Vec<(String, String)> = match scope {
            OrgScope::Organization(org) => vec![(kind.vector_collection(org), org.clone())],
            OrgScope::All => self
                .vectors
                .list_collections()?
                .into_iter()
                .filter_map(|name| {
                    let org = name.strip_prefix(&prefix)?.to_string();
                    (!org.is_empty()).then_some((name, org))
                })
                .collect(),
        };

        let embedding = self.embedder.embed(query_text)?;
        let mut hits = Vec::new();
        for (collection, organization_id) in collections {
            for hit in self.vectors.query(&collection, &embedding, limit)? {
                hits.push(SimilarRecord {
                    kind,
                    title: hit_title(kind, &hit.metadata),
                    score: if hit.score.is_finite() { hit.score } else { 0.0 },
                    id: hit.id,
                    organization_id: organization_id.clone(),
                    document: hit.document,
                });
            }
        }
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        hits.truncate(limit);

        if hits.is_empty() {
            tracing::debug!(kind = %kind, scope = %scope, "Similarity search returned no hits");
        }
        Ok(hits)
    }

    /// Resolves a relation's organization from itself or its entities.
    ///
    /// # Errors
    ///
    /// Returns an error if an entity read fails.
    pub fn relation_organization(&self, relation: &Relation) -> Result<Option<String>> {
        if let Some(org) = &relation.organization_id {
            return Ok(Some(org.clone()));
        }
        for entity_id in [&relation.source_entity_id, &relation.target_entity_id]
            .into_iter()
            .flatten()
        {
            let entity: Option<Entity> =
                get_record(self.documents.as_ref(), RecordKind::Entity.collection(), entity_id)?;
            if let Some(org) = entity.and_then(|e| e.organization_id) {
                return Ok(Some(org));
            }
        }
        Ok(None)
    }

    /// Sets or clears a record's sync flag.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails. A missing record is ignored.
    pub fn set_flag(&self, kind: RecordKind, id: &str, synced: bool) -> Result<()> {
        let fields = fields_from_value(json!({
            SYNC_FLAG_FIELD: i32::from(synced),
            SYNC_ATTEMPT_FIELD: current_timestamp(),
        }))?;
        update_if_exists(self.documents.as_ref(), kind.collection(), id, fields)?;
        Ok(())
    }

    fn entity_name(&self, id: Option<&str>) -> Result<Option<String>> {
        let Some(id) = id else {
            return Ok(None);
        };
        let entity: Option<Entity> =
            get_record(self.documents.as_ref(), RecordKind::Entity.collection(), id)?;
        Ok(Some(entity.map_or_else(|| id.to_string(), |e| e.name)))
    }

    fn write(
        &self,
        kind: RecordKind,
        id: &str,
        organization_id: &str,
        content: &str,
        metadata: Value,
    ) -> Result<()> {
        match self.embed_and_upsert(kind, id, organization_id, content, metadata) {
            Ok(()) => {
                self.mark(kind, id, None)?;
                tracing::debug!(kind = %kind, id, organization_id, "Synced record to vector store");
                Ok(())
            },
            Err(e) => {
                tracing::error!(kind = %kind, id, organization_id, error = %e, "Vector sync failed");
                if let Err(flag_err) = self.mark(kind, id, Some(&e)) {
                    tracing::warn!(kind = %kind, id, error = %flag_err, "Failed to record sync error");
                }
                Err(e)
            },
        }
    }

    fn embed_and_upsert(
        &self,
        kind: RecordKind,
        id: &str,
        organization_id: &str,
        content: &str,
        metadata: Value,
    ) -> Result<()> {
        let embedding = self.embedder.embed(content)?;
        let mut metadata: Fields = fields_from_value(metadata)?;
        metadata.insert("embeddingModel".to_string(), json!(self.embedder.model_name()));
        metadata.insert("embeddingVersion".to_string(), json!(EMBEDDING_VERSION));
        metadata.insert("updatedAt".to_string(), json!(current_timestamp()));

        let record = VectorRecord::new(id, embedding)
            .with_document(content)
            .with_metadata(metadata);
        self.vectors
            .upsert(&kind.vector_collection(organization_id), record)
    }

    fn mark(&self, kind: RecordKind, id: &str, error: Option<&Error>) -> Result<()> {
        let fields = fields_from_value(json!({
            SYNC_FLAG_FIELD: i32::from(error.is_none()),
            SYNC_ERROR_FIELD: error.map(ToString::to_string),
            SYNC_ATTEMPT_FIELD: current_timestamp(),
        }))?;
        update_if_exists(self.documents.as_ref(), kind.collection(), id, fields)?;
        Ok(())
    }
}

fn require_org<'a>(kind: RecordKind, id: &str, org: Option<&'a str>) -> Result<&'a str> {
    org.filter(|o| !o.is_empty()).ok_or_else(|| {
        Error::InvalidInput(format!("{kind} '{id}' has no organization id"))
    })
}

/// A similarity search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarRecord {
    /// Record kind.
    pub kind: RecordKind,
    /// Record ID.
    pub id: String,
    /// Organization whose collection held the hit.
    pub organization_id: String,
    /// Similarity in `0.0..=1.0`, higher is closer.
    pub score: f32,
    /// Display label from the stored metadata.
    pub title: Option<String>,
    /// Embedded text.
    pub document: Option<String>,
}

fn hit_title(kind: RecordKind, metadata: &Fields) -> Option<String> {
    let key = match kind {
        RecordKind::Entity => "name",
        RecordKind::Relation => "relationType",
        RecordKind::Topic => "title",
    };
    metadata
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
