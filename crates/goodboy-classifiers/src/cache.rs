//! In-memory model cache shared by the loaders

use crate::model::ImageModel;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// A cache slot
#[derive(Debug, Clone)]
pub enum CachedModel {
    /// Successfully loaded handle
    Ready(Arc<ImageModel>),
    /// The last load attempt failed; retried on the next load
    Failed(String),
}

/// Load state of a single model as reported by a loader
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum ModelStatus {
    /// No load has been attempted
    NotLoaded,
    /// A handle is cached
    Ready,
    /// The last load attempt failed
    Failed(String),
}

/// Mapping from model name to cache slot.
///
/// Slots are never evicted. Locks are held only for map access, never across
/// an await point, so concurrent first loads of the same name may both run;
/// the last insert wins.
#[derive(Debug, Default)]
pub struct ModelCache {
    slots: RwLock<HashMap<String, CachedModel>>,
}

impl ModelCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a ready handle by name
    pub fn get(&self, name: &str) -> Option<Arc<ImageModel>> {
        match self.slots.read().get(name) {
            Some(CachedModel::Ready(model)) => Some(Arc::clone(model)),
            _ => None,
        }
    }

    /// Store a loaded handle, replacing whatever the slot held
    pub fn insert(&self, name: impl Into<String>, model: Arc<ImageModel>) {
        self.slots.write().insert(name.into(), CachedModel::Ready(model));
    }

    /// Record a failed load. A ready handle is never downgraded.
    pub fn mark_failed(&self, name: impl Into<String>, reason: impl Into<String>) {
        let mut slots = self.slots.write();
        let slot = slots
            .entry(name.into())
            .or_insert_with(|| CachedModel::Failed(String::new()));
        if let CachedModel::Failed(previous) = slot {
            *previous = reason.into();
        }
    }

    /// Load state of a model
    pub fn status(&self, name: &str) -> ModelStatus {
        match self.slots.read().get(name) {
            None => ModelStatus::NotLoaded,
            Some(CachedModel::Ready(_)) => ModelStatus::Ready,
            Some(CachedModel::Failed(reason)) => ModelStatus::Failed(reason.clone()),
        }
    }

    /// True when at least one slot exists and every slot holds a ready handle
    pub fn is_available(&self) -> bool {
        let slots = self.slots.read();
        !slots.is_empty()
            && slots
                .values()
                .all(|slot| matches!(slot, CachedModel::Ready(_)))
    }

    /// Number of slots (ready or failed)
    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    /// Whether the cache has no slots
    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }

    /// Names with a slot in the cache
    pub fn names(&self) -> Vec<String> {
        self.slots.read().keys().cloned().collect()
    }
}
