//! Theme ordering.

use crate::models::{Collection, Theme, fields_from_value};
use crate::storage::{DocumentStore, list_records};
use crate::{Error, Result, current_timestamp};
use serde_json::json;
use std::sync::Arc;

/// Position used for themes that have never been ordered.
pub const MISSING_POSITION: i64 = 999_999;

/// Sorts themes by ascending position; unpositioned themes go last.
///
/// The sort is stable, so ties keep their input order.
pub fn sort_by_position(themes: &mut [Theme]) {
    themes.sort_by_key(|t| t.position.unwrap_or(MISSING_POSITION));
}

/// Moves the item at `from` to index `to`, shifting the items between.
///
/// Out-of-range indices leave the slice unchanged.
pub fn array_move<T>(items: &mut [T], from: usize, to: usize) {
    if from >= items.len() || to >= items.len() || from == to {
        return;
    }
    if from < to {
        items[from..=to].rotate_left(1);
    } else {
        items[to..=from].rotate_right(1);
    }
}

/// Theme CRUD and drag-and-drop reordering.
pub struct ThemeService {
    store: Arc<dyn DocumentStore>,
}

impl ThemeService {
    /// Creates a theme service.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Returns all themes sorted by position.
    ///
    /// # Errors
    ///
    /// Returns an error if the store read fails.
    pub fn list_ordered(&self) -> Result<Vec<Theme>> {
        let mut themes: Vec<Theme> = list_records(self.store.as_ref(), Collection::Themes)?;
        sort_by_position(&mut themes);
        Ok(themes)
    }

    /// Moves `active_id` to the slot of `over_id` and renumbers positions
    /// `1..=n`.
    ///
    /// `expected_order` is the order the caller last saw. If the stored order
    /// differs the move is refused, so two clients cannot interleave stale
    /// reorders. Unknown IDs are a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Conflict`] on a stale `expected_order`, or an error if
    /// the store fails.
    pub fn reorder(
        &self,
        expected_order: &[String],
        active_id: &str,
        over_id: &str,
    ) -> Result<Vec<Theme>> {
        let mut themes = self.list_ordered()?;
        let current: Vec<&str> = themes.iter().map(|t| t.id.as_str()).collect();
        if current != expected_order.iter().map(String::as_str).collect::<Vec<_>>() {
            tracing::warn!(
                expected = expected_order.len(),
                stored = current.len(),
                "Theme order changed since it was loaded"
            );
            return Err(Error::Conflict("theme list changed, reload".to_string()));
        }

        let from = themes.iter().position(|t| t.id == active_id);
        let to = themes.iter().position(|t| t.id == over_id);
        let (Some(from), Some(to)) = (from, to) else {
            tracing::debug!(active_id, over_id, "Reorder with unknown theme id ignored");
            return Ok(themes);
        };
        if from == to {
            return Ok(themes);
        }

        array_move(&mut themes, from, to);
        let updates: Vec<(String, i64)> = themes
            .iter()
            .zip(1_i64..)
            .map(|(theme, position)| (theme.id.clone(), position))
            .collect();
        self.update_positions(&updates)?;
        tracing::info!(active_id, from, to, "Themes reordered");
        self.list_ordered()
    }

    /// Writes `position` (and `updatedAt`) for each theme.
    ///
    /// # Errors
    ///
    /// Returns the first store error; earlier updates are kept.
    pub fn update_positions(&self, updates: &[(String, i64)]) -> Result<()> {
        let now = current_timestamp();
        for (id, position) in updates {
            let fields = fields_from_value(json!({"position": position, "updatedAt": now}))?;
            self.store.update(Collection::Themes, id, fields)?;
        }
        Ok(())
    }

    /// Creates a theme at the end of the order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an empty title, or a store error.
    pub fn create(&self, title: &str, description: Option<&str>) -> Result<Theme> {
        let title = title.trim();
        if title.is_empty() {
            return Err(Error::InvalidInput("theme title cannot be empty".to_string()));
        }
        let next = self
            .list_ordered()?
            .iter()
            .filter_map(|t| t.position)
            .filter(|p| *p < MISSING_POSITION)
            .max()
            .unwrap_or(0)
            + 1;
        let fields = fields_from_value(json!({
            "title": title,
            "description": description,
            "initiativeIds": [],
            "position": next,
        }))?;
        let doc = self.store.add(Collection::Themes, fields)?;
        tracing::info!(theme_id = %doc.id, position = next, "Theme created");
        doc.to_record()
    }

    /// Updates a theme's title and/or description.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the theme does not exist.
    pub fn update(
        &self,
        id: &str,
        title: Option<&str>,
        description: Option<&str>,
    ) -> Result<Theme> {
        let mut patch = serde_json::Map::new();
        if let Some(title) = title {
            patch.insert("title".to_string(), json!(title));
        }
        if let Some(description) = description {
            patch.insert("description".to_string(), json!(description));
        }
        self.store.update(Collection::Themes, id, patch)?.to_record()
    }

    /// Deletes a theme, returning whether it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn delete(&self, id: &str) -> Result<bool> {
        let deleted = self.store.delete(Collection::Themes, id)?;
        if deleted {
            tracing::info!(theme_id = id, "Theme deleted");
        }
        Ok(deleted)
    }
}
