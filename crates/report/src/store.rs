//! Read-only persistence collaborator for project snapshots.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use thiserror::Error;

use perimeter_core::ProjectId;

use crate::model::ProjectSnapshot;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("project {0} not found")]
    NotFound(ProjectId),
    #[error("project store unavailable: {0}")]
    Unavailable(String),
}

/// Scoped, read-only access to a project's monitored assets.
///
/// One call returns the whole hierarchy the report needs; the handler never
/// issues follow-up queries mid-render.
pub trait ProjectStore: Send + Sync {
    fn fetch(&self, id: ProjectId) -> Result<ProjectSnapshot, StoreError>;
}

impl<S> ProjectStore for Arc<S>
where
    S: ProjectStore + ?Sized,
{
    fn fetch(&self, id: ProjectId) -> Result<ProjectSnapshot, StoreError> {
        (**self).fetch(id)
    }
}

/// In-memory project store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryProjectStore {
    projects: RwLock<HashMap<ProjectId, ProjectSnapshot>>,
}

impl InMemoryProjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Insert or replace a project snapshot.
    pub fn insert(&self, snapshot: ProjectSnapshot) {
        let mut projects = self
            .projects
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        projects.insert(snapshot.id, snapshot);
    }

    pub fn contains(&self, id: ProjectId) -> bool {
        let projects = self.projects.read().unwrap_or_else(PoisonError::into_inner);
        projects.contains_key(&id)
    }
}

impl ProjectStore for InMemoryProjectStore {
    fn fetch(&self, id: ProjectId) -> Result<ProjectSnapshot, StoreError> {
        let projects = self.projects.read().unwrap_or_else(PoisonError::into_inner);
        projects.get(&id).cloned().ok_or(StoreError::NotFound(id))
    }
}
