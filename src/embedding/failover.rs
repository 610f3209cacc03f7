//! Primary/secondary embedder failover.

use super::Embedder;
use crate::Result;

/// Uses `primary`, falling back to `secondary` when it fails.
///
/// Both providers must produce vectors of the same dimensions for the
/// results to share a collection; [`Embedder::dimensions`] reports the
/// primary's.
pub struct FailoverEmbedder {
    primary: Box<dyn Embedder>,
    secondary: Box<dyn Embedder>,
}

impl FailoverEmbedder {
    /// Creates a failover pair.
    #[must_use]
    pub fn new(primary: Box<dyn Embedder>, secondary: Box<dyn Embedder>) -> Self {
        Self { primary, secondary }
    }
}

impl Embedder for FailoverEmbedder {
    fn model_name(&self) -> &str {
        self.primary.model_name()
    }

    fn dimensions(&self) -> usize {
        self.primary.dimensions()
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        match self.primary.embed(text) {
            Ok(embedding) => Ok(embedding),
            Err(crate::Error::InvalidInput(msg)) => Err(crate::Error::InvalidInput(msg)),
            Err(primary_err) => {
                tracing::warn!(
                    primary = self.primary.model_name(),
                    secondary = self.secondary.model_name(),
                    error = %primary_err,
                    "Primary embedder failed, trying secondary"
                );
                self.secondary.embed(text).map_err(|secondary_err| {
                    tracing::error!(error = %secondary_err, "Secondary embedder failed");
                    primary_err
                })
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::embedding::HashEmbedder;

    struct Failing;

    impl Embedder for Failing {
        fn model_name(&self) -> &str {
            "failing"
        }
        fn dimensions(&self) -> usize {
            8
        }
        fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(Error::OperationFailed {
                operation: "embed".to_string(),
                cause: "down".to_string(),
            })
        }
    }

    #[test]
    fn test_falls_back_to_secondary() {
        let embedder =
            FailoverEmbedder::new(Box::new(Failing), Box::new(HashEmbedder::new(8)));
        assert_eq!(embedder.embed("hello").unwrap().len(), 8);
        assert_eq!(embedder.model_name(), "failing");
    }

    #[test]
    fn test_returns_primary_error_when_both_fail() {
        let embedder = FailoverEmbedder::new(Box::new(Failing), Box::new(Failing));
        let err = embedder.embed("hello").unwrap_err();
        assert!(err.to_string().contains("down"));
    }

    #[test]
    fn test_invalid_input_not_retried_on_secondary() {
        let embedder =
            FailoverEmbedder::new(Box::new(HashEmbedder::new(8)), Box::new(Failing));
        assert!(matches!(embedder.embed(""), Err(Error::InvalidInput(_))));
    }
}
