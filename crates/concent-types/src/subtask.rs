use crate::message::{
    AckReportComputedTask, ForceGetTaskResult, RejectReportComputedTask, ReportComputedTask,
    SubtaskResultsAccepted, SubtaskResultsRejected, TaskToCompute,
};
use crate::{PublicKey, SubtaskId, TaskId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a tracked subtask.
///
/// Active states carry an enforced deadline in `Subtask::next_deadline`;
/// passive states wait for the next client message; terminal states accept
/// nothing further.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubtaskState {
    ForcingReport,
    Reported,
    ForcingResultTransfer,
    ResultUploaded,
    ForcingAcceptance,
    ForcedAcceptance,
    AdditionalVerification,
    AdditionalVerificationFailed,
    Accepted,
    Failed,
    Rejected,
    ForceTimeout,
    CannotComputeTask,
}

impl SubtaskState {
    /// Terminal states accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SubtaskState::Accepted
                | SubtaskState::Failed
                | SubtaskState::Rejected
                | SubtaskState::ForceTimeout
                | SubtaskState::CannotComputeTask
        )
    }

    /// Active states have a deadline enforced by the scheduler.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            SubtaskState::ForcingReport
                | SubtaskState::ForcingResultTransfer
                | SubtaskState::ForcingAcceptance
                | SubtaskState::AdditionalVerification
                | SubtaskState::AdditionalVerificationFailed
        )
    }
}

impl fmt::Display for SubtaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// The lifecycle entity tracked per (task_id, subtask_id) pair.
///
/// Created on the first authenticated report for an unseen id pair, mutated
/// only by the lifecycle state machine, never deleted by the core. The
/// computation deadline comes from the signed task assignment and is
/// immutable once set. The most recent stored message per protocol phase is
/// kept alongside the state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subtask {
    pub task_id: TaskId,
    pub subtask_id: SubtaskId,
    pub state: SubtaskState,
    pub provider_public_key: PublicKey,
    pub requestor_public_key: PublicKey,
    /// Absolute computation deadline from the task assignment, unix seconds.
    pub computation_deadline: i64,
    /// Result package size in bytes, from the computation report.
    pub result_package_size: u64,
    /// Deadline enforced in the current state, if the state is active.
    pub next_deadline: Option<i64>,
    pub task_to_compute: TaskToCompute,
    pub report_computed_task: ReportComputedTask,
    pub ack_report_computed_task: Option<AckReportComputedTask>,
    pub reject_report_computed_task: Option<RejectReportComputedTask>,
    pub force_get_task_result: Option<ForceGetTaskResult>,
    pub subtask_results_accepted: Option<SubtaskResultsAccepted>,
    pub subtask_results_rejected: Option<SubtaskResultsRejected>,
}

impl Subtask {
    /// Build a fresh subtask from its founding report.
    pub fn from_report(
        state: SubtaskState,
        report_computed_task: ReportComputedTask,
        next_deadline: Option<i64>,
    ) -> Self {
        let ttc = report_computed_task.task_to_compute.clone();
        Self {
            task_id: ttc.task_id().clone(),
            subtask_id: ttc.subtask_id().clone(),
            state,
            provider_public_key: ttc.provider_public_key,
            requestor_public_key: ttc.requestor_public_key,
            computation_deadline: ttc.deadline(),
            result_package_size: report_computed_task.size,
            next_deadline,
            task_to_compute: ttc,
            report_computed_task,
            ack_report_computed_task: None,
            reject_report_computed_task: None,
            force_get_task_result: None,
            subtask_results_accepted: None,
            subtask_results_rejected: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Whether the active deadline has elapsed at `now`.
    ///
    /// Always false for passive and terminal states.
    pub fn deadline_elapsed(&self, now: i64) -> bool {
        match self.next_deadline {
            Some(deadline) => self.state.is_active() && now >= deadline,
            None => false,
        }
    }
}
