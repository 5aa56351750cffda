use crate::authentication::AuthenticatedMessage;
use crate::clock::Clock;
use crate::deadlines::{concent_verification_time, download_time, subtask_verification_time};
use crate::payments::PaymentBackend;
use concent_storage::SubtaskStore;
use concent_types::{
    ConcentError, ForcePaymentRejectReason, MessageBody, ProtocolTimes, RejectReportReason,
    ReportComputedTask, Result, Subtask, SubtaskId, SubtaskState,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome reported by Concent's own verifier for a disputed result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// The recomputed result matches the provider's package.
    Match,
    /// The recomputed result differs.
    Mismatch,
    /// Verification could not be carried out.
    Error,
}

/// Whether a message arrived before the deadline governing its subtask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeadlineStatus {
    Before,
    AtOrAfter,
}

/// The subtask lifecycle state machine.
///
/// Sole writer of subtask rows: consumes authenticated messages, deadline
/// expiries and collaborator callbacks, advances the state forward per the
/// transition table, and decides the outbound response. Forced payments are
/// fired only after the transition is persisted; a payment failure is
/// logged and never rolls the state back.
pub struct LifecycleMachine {
    store: Arc<dyn SubtaskStore>,
    payments: Arc<dyn PaymentBackend>,
    clock: Arc<dyn Clock>,
    times: ProtocolTimes,
}

impl LifecycleMachine {
    pub fn new(
        store: Arc<dyn SubtaskStore>,
        payments: Arc<dyn PaymentBackend>,
        clock: Arc<dyn Clock>,
        times: ProtocolTimes,
    ) -> Self {
        Self {
            store,
            payments,
            clock,
            times,
        }
    }

    /// Apply an authenticated client message to its subtask.
    ///
    /// Returns the outbound response body, if any. Rejected messages leave
    /// the stored state untouched.
    pub async fn handle_message(
        &self,
        authenticated: &AuthenticatedMessage,
    ) -> Result<Option<MessageBody>> {
        let body = &authenticated.envelope.body;
        let subtask_id = body
            .subtask_id()
            .ok_or_else(|| {
                ConcentError::InvalidMessage("message does not reference a subtask".to_string())
            })?
            .clone();
        let now = self.clock.timestamp();

        match self
            .store
            .get_subtask(&subtask_id)
            .await
            .map_err(ConcentError::from)?
        {
            None => self.handle_unseen(&subtask_id, body, now).await,
            Some(subtask) => self.handle_existing(subtask, body, now).await,
        }
    }

    /// Deadline-only transitions, driven by the scheduler collaborator.
    ///
    /// Idempotent: once a deadline expiry has advanced the state, further
    /// calls observe the new (passive or terminal) state and do nothing.
    /// Returns the state entered, or `None` when nothing was due.
    pub async fn check_deadline(&self, subtask_id: &SubtaskId) -> Result<Option<SubtaskState>> {
        let Some(mut subtask) = self
            .store
            .get_subtask(subtask_id)
            .await
            .map_err(ConcentError::from)?
        else {
            return Err(ConcentError::UnknownSubtask(subtask_id.to_string()));
        };

        let now = self.clock.timestamp();
        if !subtask.deadline_elapsed(now) {
            return Ok(None);
        }

        let next_state = match subtask.state {
            // Requestor stayed silent; the report stands as if acknowledged.
            SubtaskState::ForcingReport => SubtaskState::Reported,
            // Result never arrived; the provider's claim is forfeited.
            SubtaskState::ForcingResultTransfer => SubtaskState::ForceTimeout,
            // Requestor stayed silent; acceptance is forced and settled.
            SubtaskState::ForcingAcceptance => SubtaskState::ForcedAcceptance,
            // Concent overran its own verification budget; the provider
            // gets the benefit of the doubt.
            SubtaskState::AdditionalVerification | SubtaskState::AdditionalVerificationFailed => {
                SubtaskState::Accepted
            }
            // deadline_elapsed is only true for active states
            _ => return Ok(None),
        };

        self.transition(&mut subtask, next_state, None).await?;

        if matches!(
            next_state,
            SubtaskState::ForcedAcceptance | SubtaskState::Accepted
        ) {
            let amount = subtask.task_to_compute.price;
            self.fire_force_payment(&subtask, amount, now).await;
        }

        Ok(Some(next_state))
    }

    /// File-transfer collaborator callback: the result package arrived.
    pub async fn register_upload(&self, subtask_id: &SubtaskId) -> Result<SubtaskState> {
        let Some(mut subtask) = self
            .store
            .get_subtask(subtask_id)
            .await
            .map_err(ConcentError::from)?
        else {
            return Err(ConcentError::UnknownSubtask(subtask_id.to_string()));
        };
        self.reject_if_terminal(&subtask)?;

        let now = self.clock.timestamp();
        if subtask.state != SubtaskState::ForcingResultTransfer {
            return Err(no_applicable_entry(
                subtask.state,
                "UploadFinished",
                "no result transfer is in progress",
            ));
        }
        if subtask.deadline_elapsed(now) {
            return Err(no_applicable_entry(
                subtask.state,
                "UploadFinished",
                "the download window has closed",
            ));
        }

        self.transition(&mut subtask, SubtaskState::ResultUploaded, None)
            .await?;
        Ok(SubtaskState::ResultUploaded)
    }

    /// Verifier collaborator callback: Concent's own verdict on a disputed
    /// result.
    pub async fn register_verification_result(
        &self,
        subtask_id: &SubtaskId,
        outcome: VerificationOutcome,
    ) -> Result<Option<MessageBody>> {
        let Some(mut subtask) = self
            .store
            .get_subtask(subtask_id)
            .await
            .map_err(ConcentError::from)?
        else {
            return Err(ConcentError::UnknownSubtask(subtask_id.to_string()));
        };
        self.reject_if_terminal(&subtask)?;

        let now = self.clock.timestamp();
        if subtask.state != SubtaskState::AdditionalVerification || subtask.deadline_elapsed(now) {
            return Err(no_applicable_entry(
                subtask.state,
                "VerificationResult",
                "no verification is in progress",
            ));
        }

        match outcome {
            VerificationOutcome::Match => {
                self.transition(&mut subtask, SubtaskState::Accepted, None)
                    .await?;
                let amount = subtask.task_to_compute.price;
                self.fire_force_payment(&subtask, amount, now).await;
                Ok(Some(MessageBody::SubtaskResultsSettled {
                    task_to_compute: subtask.task_to_compute.clone(),
                }))
            }
            VerificationOutcome::Mismatch => {
                self.transition(&mut subtask, SubtaskState::Rejected, None)
                    .await?;
                Ok(None)
            }
            VerificationOutcome::Error => {
                let deadline = now + self.times.concent_messaging_time;
                self.transition(
                    &mut subtask,
                    SubtaskState::AdditionalVerificationFailed,
                    Some(deadline),
                )
                .await?;
                Ok(None)
            }
        }
    }

    async fn handle_unseen(
        &self,
        subtask_id: &SubtaskId,
        body: &MessageBody,
        now: i64,
    ) -> Result<Option<MessageBody>> {
        let (report, initial_state) = match body {
            MessageBody::ReportComputedTask(report) => (report, SubtaskState::Reported),
            MessageBody::ForceReportComputedTask(force) => {
                (&force.report_computed_task, SubtaskState::ForcingReport)
            }
            _ => return Err(ConcentError::UnknownSubtask(subtask_id.to_string())),
        };

        let report_window =
            report.task_to_compute.deadline() + self.times.concent_messaging_time;
        if now >= report_window {
            return Err(no_applicable_creation(body, "the reporting window has closed"));
        }

        let next_deadline = match initial_state {
            SubtaskState::ForcingReport => Some(
                report.task_to_compute.deadline() + 2 * self.times.concent_messaging_time,
            ),
            _ => None,
        };

        let subtask = Subtask::from_report(initial_state, report.clone(), next_deadline);
        self.store
            .create_subtask(&subtask)
            .await
            .map_err(ConcentError::from)?;

        info!(
            task_id = %subtask.task_id,
            subtask_id = %subtask.subtask_id,
            state = %subtask.state,
            "Subtask created"
        );

        Ok(Some(MessageBody::ForceReportComputedTaskResponse {
            report_computed_task: report.clone(),
        }))
    }

    async fn handle_existing(
        &self,
        mut subtask: Subtask,
        body: &MessageBody,
        now: i64,
    ) -> Result<Option<MessageBody>> {
        self.reject_if_terminal(&subtask)?;

        // Every later message must reference the stored, signed originals.
        if let Some(task_to_compute) = body.task_to_compute() {
            if *task_to_compute != subtask.task_to_compute {
                return Err(ConcentError::InvalidMessage(
                    "task to compute does not match the stored assignment".to_string(),
                ));
            }
        }
        if let Some(report) = body.report_computed_task() {
            if *report != subtask.report_computed_task {
                return Err(ConcentError::InvalidMessage(
                    "computed task report does not match the stored report".to_string(),
                ));
            }
        }

        let status = self.deadline_status(&subtask, now);

        match (subtask.state, body, status) {
            // Duplicate first reports are re-acknowledged without a state
            // change; the retried half of a creation race lands here.
            (SubtaskState::ForcingReport, MessageBody::ForceReportComputedTask(force), _) => {
                Ok(Some(self.reack_report(&force.report_computed_task)))
            }
            (SubtaskState::Reported, MessageBody::ReportComputedTask(report), _) => {
                Ok(Some(self.reack_report(report)))
            }

            (
                SubtaskState::ForcingReport,
                MessageBody::AckReportComputedTask(ack),
                DeadlineStatus::Before,
            ) => {
                subtask.ack_report_computed_task = Some(ack.clone());
                self.transition(&mut subtask, SubtaskState::Reported, None)
                    .await?;
                Ok(Some(MessageBody::ForceReportComputedTaskResponse {
                    report_computed_task: ack.report_computed_task.clone(),
                }))
            }
            (
                SubtaskState::ForcingReport,
                MessageBody::RejectReportComputedTask(reject),
                DeadlineStatus::Before,
            ) => {
                subtask.reject_report_computed_task = Some(reject.clone());
                match reject.reason {
                    RejectReportReason::CannotComputeTask => {
                        self.transition(&mut subtask, SubtaskState::CannotComputeTask, None)
                            .await?;
                        Ok(None)
                    }
                    RejectReportReason::TaskFailure => {
                        self.transition(&mut subtask, SubtaskState::Failed, None)
                            .await?;
                        Ok(None)
                    }
                    RejectReportReason::SubtaskTimeLimitExceeded => {
                        // The report provably arrived inside the window, so
                        // the rejection is overruled with a verdict.
                        self.transition(&mut subtask, SubtaskState::Reported, None)
                            .await?;
                        Ok(Some(MessageBody::VerdictReportComputedTask {
                            report_computed_task: subtask.report_computed_task.clone(),
                        }))
                    }
                }
            }

            (
                SubtaskState::Reported | SubtaskState::ResultUploaded,
                MessageBody::SubtaskResultsAccepted(accepted),
                DeadlineStatus::Before,
            ) => {
                subtask.subtask_results_accepted = Some(accepted.clone());
                self.transition(&mut subtask, SubtaskState::Accepted, None)
                    .await?;
                Ok(None)
            }
            (
                SubtaskState::Reported | SubtaskState::ResultUploaded,
                MessageBody::SubtaskResultsRejected(rejected),
                DeadlineStatus::Before,
            ) => {
                subtask.subtask_results_rejected = Some(rejected.clone());
                self.transition(&mut subtask, SubtaskState::Rejected, None)
                    .await?;
                Ok(None)
            }
            (
                SubtaskState::Reported,
                MessageBody::ForceGetTaskResult(request),
                DeadlineStatus::Before,
            ) => {
                subtask.force_get_task_result = Some(request.clone());
                let deadline = now + download_time(subtask.result_package_size, &self.times);
                self.transition(
                    &mut subtask,
                    SubtaskState::ForcingResultTransfer,
                    Some(deadline),
                )
                .await?;
                Ok(Some(MessageBody::AckForceGetTaskResult {
                    report_computed_task: subtask.report_computed_task.clone(),
                }))
            }
            (
                SubtaskState::Reported | SubtaskState::ResultUploaded,
                MessageBody::SubtaskResultsVerify(_),
                DeadlineStatus::Before,
            ) => {
                let deadline =
                    now + concent_verification_time(&subtask.task_to_compute, &self.times);
                self.transition(
                    &mut subtask,
                    SubtaskState::AdditionalVerification,
                    Some(deadline),
                )
                .await?;
                Ok(Some(MessageBody::AckSubtaskResultsVerify {
                    report_computed_task: subtask.report_computed_task.clone(),
                }))
            }
            (
                SubtaskState::Reported | SubtaskState::ResultUploaded,
                MessageBody::ForceSubtaskResults(_),
                DeadlineStatus::AtOrAfter,
            ) => {
                let verification_deadline = self.verification_deadline(&subtask);
                if now > verification_deadline + self.times.force_acceptance_time {
                    return Err(no_applicable(
                        &subtask,
                        body,
                        "the forced acceptance window has closed",
                    ));
                }
                let deadline = now + self.times.concent_messaging_time;
                self.transition(
                    &mut subtask,
                    SubtaskState::ForcingAcceptance,
                    Some(deadline),
                )
                .await?;
                Ok(None)
            }
            (
                SubtaskState::Reported | SubtaskState::ResultUploaded,
                MessageBody::ForceSubtaskResults(_),
                DeadlineStatus::Before,
            ) => Err(no_applicable(
                &subtask,
                body,
                "forced acceptance requested before the verification deadline",
            )),

            (
                SubtaskState::ForcingAcceptance,
                MessageBody::SubtaskResultsAccepted(accepted),
                DeadlineStatus::Before,
            ) => {
                subtask.subtask_results_accepted = Some(accepted.clone());
                self.transition(&mut subtask, SubtaskState::Accepted, None)
                    .await?;
                Ok(None)
            }
            (
                SubtaskState::ForcingAcceptance,
                MessageBody::SubtaskResultsRejected(rejected),
                DeadlineStatus::Before,
            ) => {
                // A rejection given through arbitration is final; the
                // additional-verification remedy applies to results rejected
                // outside a forced acceptance, not after one.
                subtask.subtask_results_rejected = Some(rejected.clone());
                self.transition(&mut subtask, SubtaskState::Rejected, None)
                    .await?;
                Ok(None)
            }

            (SubtaskState::ForcedAcceptance, MessageBody::ForcePayment(_), _) => {
                self.handle_force_payment(subtask, now).await
            }

            _ => Err(no_applicable(
                &subtask,
                body,
                "message is not applicable in this state",
            )),
        }
    }

    async fn handle_force_payment(
        &self,
        mut subtask: Subtask,
        now: i64,
    ) -> Result<Option<MessageBody>> {
        let task_to_compute = subtask.task_to_compute.clone();

        let deposit = self
            .payments
            .get_deposit_value(&task_to_compute.requestor_payment_address)
            .await?;
        if deposit < task_to_compute.price {
            return Ok(Some(MessageBody::ForcePaymentRejected {
                reason: ForcePaymentRejectReason::TooSmallRequestorDeposit,
            }));
        }

        let already_paid: u64 = self
            .payments
            .get_list_of_payments(
                &task_to_compute.requestor_payment_address,
                &task_to_compute.provider_payment_address,
                task_to_compute.timestamp,
            )
            .await?
            .iter()
            .map(|p| p.amount)
            .sum();
        if already_paid >= task_to_compute.price {
            return Ok(Some(MessageBody::ForcePaymentRejected {
                reason: ForcePaymentRejectReason::NoUnsettledTasksFound,
            }));
        }

        let amount = task_to_compute.price - already_paid;
        self.transition(&mut subtask, SubtaskState::Accepted, None)
            .await?;
        self.fire_force_payment(&subtask, amount, now).await;

        Ok(Some(MessageBody::ForcePaymentCommitted {
            provider_payment_address: task_to_compute.provider_payment_address.clone(),
            amount,
            payment_ts: now,
        }))
    }

    fn reack_report(&self, report: &ReportComputedTask) -> MessageBody {
        MessageBody::ForceReportComputedTaskResponse {
            report_computed_task: report.clone(),
        }
    }

    fn reject_if_terminal(&self, subtask: &Subtask) -> Result<()> {
        if subtask.is_terminal() {
            return Err(ConcentError::SubtaskAlreadyFinished {
                subtask_id: subtask.subtask_id.to_string(),
                state: subtask.state.to_string(),
            });
        }
        Ok(())
    }

    /// Absolute deadline for the requestor to verify the reported result.
    fn verification_deadline(&self, subtask: &Subtask) -> i64 {
        subtask.task_to_compute.timestamp
            + subtask_verification_time(&subtask.report_computed_task, &self.times)
    }

    /// Classify `now` against the deadline governing the current state:
    /// the stored deadline for active states, the verification deadline for
    /// the passive reported states, none otherwise.
    fn deadline_status(&self, subtask: &Subtask, now: i64) -> DeadlineStatus {
        let governing = if subtask.state.is_active() {
            subtask.next_deadline
        } else {
            match subtask.state {
                SubtaskState::Reported | SubtaskState::ResultUploaded => {
                    Some(self.verification_deadline(subtask))
                }
                _ => None,
            }
        };

        match governing {
            Some(deadline) if now >= deadline => DeadlineStatus::AtOrAfter,
            _ => DeadlineStatus::Before,
        }
    }

    async fn transition(
        &self,
        subtask: &mut Subtask,
        state: SubtaskState,
        next_deadline: Option<i64>,
    ) -> Result<()> {
        let previous = subtask.state;
        subtask.state = state;
        subtask.next_deadline = next_deadline;
        self.store
            .update_subtask(subtask)
            .await
            .map_err(ConcentError::from)?;

        info!(
            subtask_id = %subtask.subtask_id,
            from = %previous,
            to = %state,
            next_deadline = ?next_deadline,
            "Subtask state advanced"
        );
        Ok(())
    }

    async fn fire_force_payment(&self, subtask: &Subtask, amount: u64, now: i64) {
        let task_to_compute = &subtask.task_to_compute;
        match self
            .payments
            .make_force_payment(
                &task_to_compute.requestor_payment_address,
                &task_to_compute.provider_payment_address,
                amount,
                now,
            )
            .await
        {
            Ok(()) => info!(
                subtask_id = %subtask.subtask_id,
                amount,
                "Forced payment submitted"
            ),
            Err(e) => warn!(
                subtask_id = %subtask.subtask_id,
                error = %e,
                "Forced payment failed; the state transition stands"
            ),
        }
    }
}

fn no_applicable(subtask: &Subtask, body: &MessageBody, reason: &str) -> ConcentError {
    ConcentError::NoApplicableTransition {
        state: subtask.state.to_string(),
        message_type: body.kind().to_string(),
        reason: reason.to_string(),
    }
}

fn no_applicable_creation(body: &MessageBody, reason: &str) -> ConcentError {
    ConcentError::NoApplicableTransition {
        state: "untracked".to_string(),
        message_type: body.kind().to_string(),
        reason: reason.to_string(),
    }
}

fn no_applicable_entry(state: SubtaskState, entry_point: &str, reason: &str) -> ConcentError {
    ConcentError::NoApplicableTransition {
        state: state.to_string(),
        message_type: entry_point.to_string(),
        reason: reason.to_string(),
    }
}
