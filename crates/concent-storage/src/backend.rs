use async_trait::async_trait;
use concent_types::{ConcentError, Subtask, SubtaskId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Subtask not found: {0}")]
    NotFound(String),

    #[error("Subtask already exists: {0}")]
    AlreadyExists(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<StorageError> for ConcentError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(id) => ConcentError::UnknownSubtask(id),
            StorageError::AlreadyExists(id) => ConcentError::CreationConflict(id),
            other => ConcentError::Storage(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Trait for subtask storage backend implementations.
///
/// Each call runs in its own transactional scope; the backend serializes
/// concurrent writes to the same subtask row. A racing double-create of the
/// same subtask id surfaces as `AlreadyExists` on exactly one of the racers,
/// which the retry orchestrator resolves by rerunning the operation against
/// the now-existing row.
#[async_trait]
pub trait SubtaskStore: Send + Sync {
    /// Insert a new subtask. Fails with `AlreadyExists` if the id is taken.
    async fn create_subtask(&self, subtask: &Subtask) -> Result<()>;

    /// Retrieve a subtask by id.
    async fn get_subtask(&self, subtask_id: &SubtaskId) -> Result<Option<Subtask>>;

    /// Overwrite an existing subtask. Fails with `NotFound` if absent.
    async fn update_subtask(&self, subtask: &Subtask) -> Result<()>;

    /// Subtasks in an active state whose deadline is at or before `now`.
    ///
    /// Drives the periodic deadline check; ordering is unspecified.
    async fn active_subtasks_due(&self, now: i64) -> Result<Vec<Subtask>>;

    /// Number of stored subtasks.
    async fn subtask_count(&self) -> Result<usize>;
}
