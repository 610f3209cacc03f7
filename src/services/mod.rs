//! Business logic services.
//!
//! Services orchestrate storage backends and provide high-level operations.
//! [`ServiceContainer`] wires them together from an [`OrgloomConfig`].

pub mod backend_factory;
pub mod chroma_sync;
pub mod deletion;
pub mod diagram;
pub mod integrity;
pub mod quality;
pub mod regeneration;
pub mod repair;
pub mod targets;
pub mod themes;

pub use backend_factory::{BackendFactory, BackendSet};
pub use chroma_sync::{ChromaSyncService, SimilarRecord};
pub use deletion::DeletionService;
pub use diagram::{DiagramBuilder, DiagramData};
pub use integrity::{check_data_integrity, cleanup_missing_topic_ids};
pub use quality::QualityService;
pub use regeneration::{RegenerationRequest, RegenerationService};
pub use repair::SyncRepairService;
pub use themes::ThemeService;

use crate::config::OrgloomConfig;
use crate::embedding::Embedder;
use crate::storage::{DocumentStore, VectorStore};
use crate::{Error, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cooperative cancellation flag shared between a job and its controller.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates an uncancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Jobs observe it before their next item.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns true once [`cancel`](Self::cancel) has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Clears the flag so the token can drive another run.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }
}

/// Backends plus configuration, handing out services on demand.
#[derive(Clone)]
pub struct ServiceContainer {
    documents: Arc<dyn DocumentStore>,
    vectors: Option<Arc<dyn VectorStore>>,
    embedder: Arc<dyn Embedder>,
    config: OrgloomConfig,
}

impl ServiceContainer {
    /// Opens the configured backends.
    ///
    /// # Errors
    ///
    /// Returns an error if the document store cannot be opened.
    pub fn from_config(config: OrgloomConfig) -> Result<Self> {
        let backends = BackendFactory::create_all(&config, false)?;
        Ok(Self::from_backends(backends, config))
    }

    /// Uses in-memory stores that vanish when the process exits.
    ///
    /// # Errors
    ///
    /// Returns an error if backend construction fails.
    pub fn ephemeral(config: OrgloomConfig) -> Result<Self> {
        let backends = BackendFactory::create_all(&config, true)?;
        Ok(Self::from_backends(backends, config))
    }

    /// Wraps already-built backends.
    #[must_use]
    pub fn from_backends(backends: BackendSet, config: OrgloomConfig) -> Self {
        Self {
            documents: backends.documents,
            vectors: backends.vectors,
            embedder: backends.embedder,
            config,
        }
    }

    /// Returns the document store.
    #[must_use]
    pub fn documents(&self) -> Arc<dyn DocumentStore> {
        Arc::clone(&self.documents)
    }

    /// Returns the vector store, if enabled.
    #[must_use]
    pub fn vectors(&self) -> Option<Arc<dyn VectorStore>> {
        self.vectors.clone()
    }

    /// Returns the loaded configuration.
    #[must_use]
    pub const fn config(&self) -> &OrgloomConfig {
        &self.config
    }

    /// Returns the vector sync service.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FeatureNotEnabled`] if the vector store is disabled.
    pub fn chroma_sync(&self) -> Result<Arc<ChromaSyncService>> {
        self.sync_optional()
            .ok_or_else(|| Error::FeatureNotEnabled("vector store".to_string()))
    }

    /// Returns the vector sync service when the vector store is enabled.
    #[must_use]
    pub fn sync_optional(&self) -> Option<Arc<ChromaSyncService>> {
        self.vectors.as_ref().map(|vectors| {
            Arc::new(ChromaSyncService::new(
                Arc::clone(&self.documents),
                Arc::clone(vectors),
                Arc::clone(&self.embedder),
            ))
        })
    }

    /// Returns the regeneration service with the configured item delay.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FeatureNotEnabled`] if the vector store is disabled.
    pub fn regeneration(&self) -> Result<RegenerationService> {
        Ok(RegenerationService::new(Arc::clone(&self.documents), self.chroma_sync()?)
            .with_item_delay(self.config.regeneration.item_delay()))
    }

    /// Returns the sync repair service.
    #[must_use]
    pub fn repair(&self) -> SyncRepairService {
        SyncRepairService::new(Arc::clone(&self.documents), self.sync_optional())
    }

    /// Returns the data quality service.
    #[must_use]
    pub fn quality(&self) -> QualityService {
        QualityService::new(Arc::clone(&self.documents), self.vectors.clone())
    }

    /// Returns the cascading deletion service.
    #[must_use]
    pub fn deletion(&self) -> DeletionService {
        DeletionService::new(Arc::clone(&self.documents), self.sync_optional())
    }

    /// Returns the theme service.
    #[must_use]
    pub fn themes(&self) -> ThemeService {
        ThemeService::new(Arc::clone(&self.documents))
    }

    /// Returns a diagram builder labelled from configuration.
    #[must_use]
    pub fn diagram_builder(&self) -> DiagramBuilder {
        DiagramBuilder::new(self.config.diagram.root_label.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmbeddingProvider;

    fn hash_config() -> OrgloomConfig {
        let mut config = OrgloomConfig::default();
        config.embedding.provider = EmbeddingProvider::Hash;
        config.embedding.dimensions = Some(16);
        config
    }

    #[test]
    fn test_cancellation_token() {
        let token = CancellationToken::new();
        let shared = token.clone();
        assert!(!token.is_cancelled());
        shared.cancel();
        assert!(token.is_cancelled());
        token.reset();
        assert!(!shared.is_cancelled());
    }

    #[test]
    fn test_ephemeral_container_services() {
        let container = ServiceContainer::ephemeral(hash_config()).unwrap();
        assert!(container.chroma_sync().is_ok());
        assert!(container.regeneration().is_ok());
        assert!(container.themes().list_ordered().unwrap().is_empty());
    }

    #[test]
    fn test_disabled_vector_store() {
        let mut config = hash_config();
        config.chroma.enabled = false;
        let container = ServiceContainer::ephemeral(config).unwrap();
        assert!(matches!(
            container.chroma_sync(),
            Err(Error::FeatureNotEnabled(_))
        ));
        assert!(container.sync_optional().is_none());
        assert!(container.vectors().is_none());
    }
}
