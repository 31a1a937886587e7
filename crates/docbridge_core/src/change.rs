//! Change tracking input to the save pipeline.

use crate::model::Entity;

/// The tracked state of an entity at save time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityState {
    /// The entity is new and will be inserted.
    Added,
    /// The entity exists and some properties changed.
    Modified,
    /// The entity exists and will be removed.
    Deleted,
    /// The entity exists and nothing changed. Skipped by the save pipeline.
    Unchanged,
}

/// One entity together with its tracked state.
///
/// A save batch is a slice of entries; the pipeline applies them in order,
/// all-or-nothing.
#[derive(Debug, Clone)]
pub struct ChangeEntry {
    entity: Entity,
    state: EntityState,
    /// Indexes of properties whose values changed, for `Modified` entries.
    /// Empty means "treat every non-key property as changed".
    modified: Vec<usize>,
}

impl ChangeEntry {
    /// Marks an entity for insertion.
    #[must_use]
    pub fn added(entity: Entity) -> Self {
        Self {
            entity,
            state: EntityState::Added,
            modified: Vec::new(),
        }
    }

    /// Marks an entity for a full-row update.
    #[must_use]
    pub fn modified(entity: Entity) -> Self {
        Self {
            entity,
            state: EntityState::Modified,
            modified: Vec::new(),
        }
    }

    /// Marks an entity for an update touching only the given property
    /// indexes. Unlisted properties keep their stored values.
    #[must_use]
    pub fn modified_properties(entity: Entity, modified: Vec<usize>) -> Self {
        Self {
            entity,
            state: EntityState::Modified,
            modified,
        }
    }

    /// Marks an entity for deletion.
    #[must_use]
    pub fn deleted(entity: Entity) -> Self {
        Self {
            entity,
            state: EntityState::Deleted,
            modified: Vec::new(),
        }
    }

    /// Marks an entity as clean. The save pipeline ignores it.
    #[must_use]
    pub fn unchanged(entity: Entity) -> Self {
        Self {
            entity,
            state: EntityState::Unchanged,
            modified: Vec::new(),
        }
    }

    /// Returns the tracked entity.
    #[must_use]
    pub fn entity(&self) -> &Entity {
        &self.entity
    }

    /// Returns the tracked state.
    #[must_use]
    pub fn state(&self) -> EntityState {
        self.state
    }

    /// Returns the modified property indexes for `Modified` entries.
    #[must_use]
    pub fn modified_indexes(&self) -> &[usize] {
        &self.modified
    }
}
