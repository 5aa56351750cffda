use concent_core::{Clock, LifecycleMachine};
use concent_storage::SubtaskStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Periodic deadline sweep.
///
/// Deadline expiry is only detected when the lifecycle machine is asked;
/// this scheduler asks, on an interval, for every active subtask whose
/// deadline has elapsed. The underlying transition is idempotent, so an
/// overlap between a sweep and a concurrent client message is harmless.
pub struct DeadlineScheduler {
    store: Arc<dyn SubtaskStore>,
    machine: Arc<LifecycleMachine>,
    clock: Arc<dyn Clock>,
    poll_interval: Duration,
}

impl DeadlineScheduler {
    pub fn new(
        store: Arc<dyn SubtaskStore>,
        machine: Arc<LifecycleMachine>,
        clock: Arc<dyn Clock>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            store,
            machine,
            clock,
            poll_interval,
        }
    }

    pub async fn run(&self) {
        let mut interval = tokio::time::interval(self.poll_interval);
        loop {
            interval.tick().await;
            match self.sweep().await {
                Ok(0) => {}
                Ok(advanced) => debug!(advanced, "Deadline sweep advanced subtasks"),
                Err(e) => error!(error = %e, "Deadline sweep failed"),
            }
        }
    }

    /// One pass over the due subtasks. Returns how many transitions fired.
    pub async fn sweep(&self) -> concent_types::Result<usize> {
        let now = self.clock.timestamp();
        let due = self
            .store
            .active_subtasks_due(now)
            .await
            .map_err(concent_types::ConcentError::from)?;

        let mut advanced = 0;
        for subtask in due {
            match self.machine.check_deadline(&subtask.subtask_id).await {
                Ok(Some(_)) => advanced += 1,
                Ok(None) => {}
                Err(e) => warn!(
                    subtask_id = %subtask.subtask_id,
                    error = %e,
                    "Deadline check failed for subtask"
                ),
            }
        }
        Ok(advanced)
    }
}
