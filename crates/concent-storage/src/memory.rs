use crate::backend::{Result, StorageError, SubtaskStore};
use async_trait::async_trait;
use concent_types::{Subtask, SubtaskId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory subtask store for testing and development.
///
/// The write lock serializes concurrent mutations of the map, which stands
/// in for the row-level isolation a database backend provides.
pub struct MemoryStore {
    subtasks: Arc<RwLock<HashMap<SubtaskId, Subtask>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            subtasks: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SubtaskStore for MemoryStore {
    async fn create_subtask(&self, subtask: &Subtask) -> Result<()> {
        let mut subtasks = self.subtasks.write().await;

        if subtasks.contains_key(&subtask.subtask_id) {
            return Err(StorageError::AlreadyExists(subtask.subtask_id.to_string()));
        }

        subtasks.insert(subtask.subtask_id.clone(), subtask.clone());
        Ok(())
    }

    async fn get_subtask(&self, subtask_id: &SubtaskId) -> Result<Option<Subtask>> {
        let subtasks = self.subtasks.read().await;
        Ok(subtasks.get(subtask_id).cloned())
    }

    async fn update_subtask(&self, subtask: &Subtask) -> Result<()> {
        let mut subtasks = self.subtasks.write().await;

        match subtasks.get_mut(&subtask.subtask_id) {
            Some(existing) => {
                *existing = subtask.clone();
                Ok(())
            }
            None => Err(StorageError::NotFound(subtask.subtask_id.to_string())),
        }
    }

    async fn active_subtasks_due(&self, now: i64) -> Result<Vec<Subtask>> {
        let subtasks = self.subtasks.read().await;
        Ok(subtasks
            .values()
            .filter(|s| s.deadline_elapsed(now))
            .cloned()
            .collect())
    }

    async fn subtask_count(&self) -> Result<usize> {
        let subtasks = self.subtasks.read().await;
        Ok(subtasks.len())
    }
}
