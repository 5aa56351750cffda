use concent_types::{ConcentError, Result};
use std::future::Future;
use tracing::info;

/// Run a lifecycle operation, retrying exactly once on a creation conflict.
///
/// Two concurrent first-reports for the same subtask id can both pass the
/// "not yet tracked" check and race to create the initial row; the loser of
/// that race surfaces `CreationConflict`. Rerunning the operation after the
/// winner committed makes it observe the existing row and take the update
/// branch instead. A second conflict is not recoverable this way and is
/// surfaced as an internal error — single-retry semantics, matching the
/// assumption that at most two requests can race on first contact.
pub async fn with_creation_retry<T, F, Fut>(operation: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match operation().await {
        Err(ConcentError::CreationConflict(subtask_id)) => {
            info!(
                subtask_id = %subtask_id,
                "Creation conflict detected; retrying the operation once"
            );
            match operation().await {
                Err(ConcentError::CreationConflict(subtask_id)) => {
                    Err(ConcentError::Storage(format!(
                        "creation conflict for subtask {} persisted after retry",
                        subtask_id
                    )))
                }
                other => other,
            }
        }
        other => other,
    }
}
