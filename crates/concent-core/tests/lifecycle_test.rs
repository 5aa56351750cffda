use concent_core::{
    Clock, DispatchOutcome, Dispatcher, LifecycleMachine, ManualClock, MessageAuthenticator,
    MockPaymentBackend, Payment, PaymentBackend, VerificationOutcome,
};
use concent_crypto::{sign_envelope, sign_report_computed_task, sign_task_to_compute, Keypair};
use concent_storage::{MemoryStore, SubtaskStore};
use concent_types::{
    AckReportComputedTask, ComputeTaskDef, ConcentError, ForceGetTaskResult, ForcePayment,
    ForcePaymentRejectReason, ForceReportComputedTask, ForceSubtaskResults, MessageBody,
    ProtocolTimes, RejectReportComputedTask, RejectReportReason, ReportComputedTask,
    ResultsRejectReason, ServiceRefusedReason, Signature, SubtaskId, SubtaskResultsAccepted,
    SubtaskResultsRejected, SubtaskResultsVerify, SubtaskState, TaskId, TaskToCompute,
};
use async_trait::async_trait;
use std::sync::Arc;

const TASK_TIMESTAMP: i64 = 1000;
const COMPUTATION_DEADLINE: i64 = 1600;
const RESULT_SIZE: u64 = 10_485_760;
const PRICE: u64 = 5000;
// With the default protocol times the verification deadline lands at
// TASK_TIMESTAMP + 959.
const VERIFICATION_DEADLINE: i64 = 1959;

/// Payment backend whose forced payments always fail. Inquiries behave
/// normally.
struct BrokenPaymentBackend {
    deposit: u64,
}

#[async_trait]
impl PaymentBackend for BrokenPaymentBackend {
    async fn get_deposit_value(&self, _payment_address: &str) -> concent_types::Result<u64> {
        Ok(self.deposit)
    }

    async fn get_list_of_payments(
        &self,
        _requestor_payment_address: &str,
        _provider_payment_address: &str,
        _since_ts: i64,
    ) -> concent_types::Result<Vec<Payment>> {
        Ok(Vec::new())
    }

    async fn make_force_payment(
        &self,
        _requestor_payment_address: &str,
        _provider_payment_address: &str,
        _amount: u64,
        _payment_ts: i64,
    ) -> concent_types::Result<()> {
        Err(ConcentError::Payment("backend unavailable".to_string()))
    }
}

struct Harness {
    dispatcher: Dispatcher,
    store: Arc<MemoryStore>,
    payments: Arc<MockPaymentBackend>,
    clock: Arc<ManualClock>,
    provider: Keypair,
    requestor: Keypair,
}

impl Harness {
    fn new(start: i64) -> Self {
        let store = Arc::new(MemoryStore::new());
        let payments = Arc::new(MockPaymentBackend::new(10_000));
        let clock = Arc::new(ManualClock::new(start));
        Self::with_backend(start, store, payments.clone(), payments, clock)
    }

    fn with_broken_payments(start: i64) -> Self {
        let store = Arc::new(MemoryStore::new());
        let broken = Arc::new(BrokenPaymentBackend { deposit: 10_000 });
        let payments = Arc::new(MockPaymentBackend::new(10_000));
        let clock = Arc::new(ManualClock::new(start));
        Self::with_backend(start, store, broken, payments, clock)
    }

    fn with_backend(
        _start: i64,
        store: Arc<MemoryStore>,
        backend: Arc<dyn PaymentBackend>,
        payments: Arc<MockPaymentBackend>,
        clock: Arc<ManualClock>,
    ) -> Self {
        let machine = Arc::new(LifecycleMachine::new(
            store.clone(),
            backend,
            clock.clone(),
            ProtocolTimes::default(),
        ));
        let authenticator = MessageAuthenticator::new(300, 14_400);
        let dispatcher = Dispatcher::new(
            authenticator,
            machine,
            clock.clone(),
            "2.18.1".to_string(),
        );

        Self {
            dispatcher,
            store,
            payments,
            clock,
            provider: Keypair::generate(),
            requestor: Keypair::generate(),
        }
    }

    fn task_to_compute(&self, subtask_id: &str) -> TaskToCompute {
        let mut ttc = TaskToCompute {
            timestamp: TASK_TIMESTAMP,
            compute_task_def: ComputeTaskDef {
                task_id: TaskId::new("task-1"),
                subtask_id: SubtaskId::new(subtask_id),
                deadline: COMPUTATION_DEADLINE,
            },
            provider_public_key: *self.provider.public_key(),
            requestor_public_key: *self.requestor.public_key(),
            provider_payment_address: format!("0x{}", "a".repeat(40)),
            requestor_payment_address: format!("0x{}", "b".repeat(40)),
            price: PRICE,
            signature: Signature::empty(),
        };
        sign_task_to_compute(&self.requestor, &mut ttc);
        ttc
    }

    fn report(&self, subtask_id: &str) -> ReportComputedTask {
        let mut report = ReportComputedTask {
            timestamp: TASK_TIMESTAMP + 500,
            task_to_compute: self.task_to_compute(subtask_id),
            size: RESULT_SIZE,
            package_hash: "sha3:deadbeef".to_string(),
            signature: Signature::empty(),
        };
        sign_report_computed_task(&self.provider, &mut report);
        report
    }

    fn raw(&self, signer: &Keypair, body: MessageBody) -> Vec<u8> {
        let envelope = sign_envelope(signer, self.clock.timestamp(), body);
        serde_json::to_vec(&envelope).unwrap()
    }

    async fn dispatch(&self, signer: &Keypair, body: MessageBody) -> concent_types::Result<DispatchOutcome> {
        let raw = self.raw(signer, body);
        self.dispatcher.dispatch(&raw, None).await
    }

    async fn state(&self, subtask_id: &str) -> SubtaskState {
        self.store
            .get_subtask(&SubtaskId::new(subtask_id))
            .await
            .unwrap()
            .unwrap()
            .state
    }

    /// Report the subtask and leave it in REPORTED.
    async fn reported(&self, subtask_id: &str) -> ReportComputedTask {
        let report = self.report(subtask_id);
        let outcome = self
            .dispatch(
                &self.provider,
                MessageBody::ReportComputedTask(report.clone()),
            )
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            DispatchOutcome::Response(MessageBody::ForceReportComputedTaskResponse { .. })
        ));
        report
    }
}

#[tokio::test]
async fn test_first_report_creates_reported_subtask() {
    let harness = Harness::new(1500);
    harness.reported("s1").await;

    assert_eq!(harness.state("s1").await, SubtaskState::Reported);
    assert_eq!(harness.store.subtask_count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_report_after_window_is_rejected() {
    let harness = Harness::new(COMPUTATION_DEADLINE + 100);
    let report = harness.report("s1");

    let err = harness
        .dispatch(&harness.provider, MessageBody::ReportComputedTask(report))
        .await
        .unwrap_err();
    assert!(matches!(err, ConcentError::NoApplicableTransition { .. }));
    assert_eq!(harness.store.subtask_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_premature_force_acceptance_is_rejected() {
    let harness = Harness::new(1500);
    let report = harness.reported("s1").await;

    let err = harness
        .dispatch(
            &harness.provider,
            MessageBody::ForceSubtaskResults(ForceSubtaskResults {
                report_computed_task: report,
            }),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ConcentError::NoApplicableTransition { .. }));
    assert_eq!(harness.state("s1").await, SubtaskState::Reported);
}

#[tokio::test]
async fn test_unknown_subtask_is_rejected() {
    let harness = Harness::new(1500);
    let report = harness.report("s1");

    let err = harness
        .dispatch(
            &harness.requestor,
            MessageBody::AckReportComputedTask(AckReportComputedTask {
                report_computed_task: report,
            }),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ConcentError::UnknownSubtask(_)));
}

#[tokio::test]
async fn test_terminal_state_rejects_further_messages() {
    let harness = Harness::new(1500);
    let report = harness.reported("s1").await;

    let outcome = harness
        .dispatch(
            &harness.requestor,
            MessageBody::SubtaskResultsAccepted(SubtaskResultsAccepted {
                task_to_compute: report.task_to_compute.clone(),
                payment_ts: 1500,
            }),
        )
        .await
        .unwrap();
    assert_eq!(outcome, DispatchOutcome::NoContent);
    assert_eq!(harness.state("s1").await, SubtaskState::Accepted);

    let err = harness
        .dispatch(
            &harness.requestor,
            MessageBody::ForceGetTaskResult(ForceGetTaskResult {
                report_computed_task: report,
            }),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ConcentError::SubtaskAlreadyFinished { .. }));
}

#[tokio::test]
async fn test_forced_report_acknowledged_by_requestor() {
    let harness = Harness::new(1500);
    let report = harness.report("s1");

    harness
        .dispatch(
            &harness.provider,
            MessageBody::ForceReportComputedTask(ForceReportComputedTask {
                report_computed_task: report.clone(),
            }),
        )
        .await
        .unwrap();
    assert_eq!(harness.state("s1").await, SubtaskState::ForcingReport);

    let outcome = harness
        .dispatch(
            &harness.requestor,
            MessageBody::AckReportComputedTask(AckReportComputedTask {
                report_computed_task: report,
            }),
        )
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        DispatchOutcome::Response(MessageBody::ForceReportComputedTaskResponse { .. })
    ));
    assert_eq!(harness.state("s1").await, SubtaskState::Reported);
}

#[tokio::test]
async fn test_forced_report_rejection_reasons() {
    // CannotComputeTask ends the subtask in its own terminal state.
    let harness = Harness::new(1500);
    let report = harness.report("s1");
    harness
        .dispatch(
            &harness.provider,
            MessageBody::ForceReportComputedTask(ForceReportComputedTask {
                report_computed_task: report.clone(),
            }),
        )
        .await
        .unwrap();
    harness
        .dispatch(
            &harness.requestor,
            MessageBody::RejectReportComputedTask(RejectReportComputedTask {
                task_to_compute: report.task_to_compute.clone(),
                reason: RejectReportReason::CannotComputeTask,
            }),
        )
        .await
        .unwrap();
    assert_eq!(harness.state("s1").await, SubtaskState::CannotComputeTask);

    // A time-limit rejection of a report that arrived in time is overruled.
    let harness = Harness::new(1500);
    let report = harness.report("s2");
    harness
        .dispatch(
            &harness.provider,
            MessageBody::ForceReportComputedTask(ForceReportComputedTask {
                report_computed_task: report.clone(),
            }),
        )
        .await
        .unwrap();
    let outcome = harness
        .dispatch(
            &harness.requestor,
            MessageBody::RejectReportComputedTask(RejectReportComputedTask {
                task_to_compute: report.task_to_compute.clone(),
                reason: RejectReportReason::SubtaskTimeLimitExceeded,
            }),
        )
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        DispatchOutcome::Response(MessageBody::VerdictReportComputedTask { .. })
    ));
    assert_eq!(harness.state("s2").await, SubtaskState::Reported);
}

#[tokio::test]
async fn test_check_deadline_is_idempotent() {
    let harness = Harness::new(1500);
    let report = harness.report("s1");
    harness
        .dispatch(
            &harness.provider,
            MessageBody::ForceReportComputedTask(ForceReportComputedTask {
                report_computed_task: report,
            }),
        )
        .await
        .unwrap();

    // FORCING_REPORT deadline is computation_deadline + 2 * messaging_time.
    harness.clock.set(COMPUTATION_DEADLINE + 100);
    let machine = harness.dispatcher.machine();
    let first = machine
        .check_deadline(&SubtaskId::new("s1"))
        .await
        .unwrap();
    assert_eq!(first, Some(SubtaskState::Reported));

    let second = machine
        .check_deadline(&SubtaskId::new("s1"))
        .await
        .unwrap();
    assert_eq!(second, None);
    assert_eq!(harness.state("s1").await, SubtaskState::Reported);
    assert!(harness.payments.forced_payments().await.is_empty());
}

#[tokio::test]
async fn test_forced_acceptance_timeout_fires_exactly_one_payment() {
    let harness = Harness::new(1500);
    let report = harness.reported("s1").await;

    harness.clock.set(VERIFICATION_DEADLINE + 1);
    let outcome = harness
        .dispatch(
            &harness.provider,
            MessageBody::ForceSubtaskResults(ForceSubtaskResults {
                report_computed_task: report,
            }),
        )
        .await
        .unwrap();
    assert_eq!(outcome, DispatchOutcome::NoContent);
    assert_eq!(harness.state("s1").await, SubtaskState::ForcingAcceptance);

    harness.clock.advance(10);
    let machine = harness.dispatcher.machine();
    assert_eq!(
        machine.check_deadline(&SubtaskId::new("s1")).await.unwrap(),
        Some(SubtaskState::ForcedAcceptance)
    );

    let payments = harness.payments.forced_payments().await;
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].amount, PRICE);

    // A second sweep changes nothing and pays nothing again.
    assert_eq!(
        machine.check_deadline(&SubtaskId::new("s1")).await.unwrap(),
        None
    );
    assert_eq!(harness.payments.forced_payments().await.len(), 1);
}

#[tokio::test]
async fn test_force_acceptance_window_closes() {
    let harness = Harness::new(1500);
    let report = harness.reported("s1").await;

    // force_acceptance_time is 5 by default; 20 seconds past the deadline
    // is out of the window.
    harness.clock.set(VERIFICATION_DEADLINE + 20);
    let err = harness
        .dispatch(
            &harness.provider,
            MessageBody::ForceSubtaskResults(ForceSubtaskResults {
                report_computed_task: report,
            }),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ConcentError::NoApplicableTransition { .. }));
    assert_eq!(harness.state("s1").await, SubtaskState::Reported);
}

#[tokio::test]
async fn test_requestor_rejection_during_forced_acceptance_is_final() {
    let harness = Harness::new(1500);
    let report = harness.reported("s1").await;

    harness.clock.set(VERIFICATION_DEADLINE + 1);
    harness
        .dispatch(
            &harness.provider,
            MessageBody::ForceSubtaskResults(ForceSubtaskResults {
                report_computed_task: report.clone(),
            }),
        )
        .await
        .unwrap();

    let outcome = harness
        .dispatch(
            &harness.requestor,
            MessageBody::SubtaskResultsRejected(SubtaskResultsRejected {
                report_computed_task: report,
                reason: ResultsRejectReason::VerificationNegative,
            }),
        )
        .await
        .unwrap();
    assert_eq!(outcome, DispatchOutcome::NoContent);
    assert_eq!(harness.state("s1").await, SubtaskState::Rejected);
    assert!(harness.payments.forced_payments().await.is_empty());
}

#[tokio::test]
async fn test_force_payment_after_failed_settlement() {
    // The automatic settlement payment fails, but the transition to
    // FORCED_ACCEPTANCE stands; the provider's explicit claim then settles
    // the subtask.
    let harness = Harness::with_broken_payments(1500);
    let report = harness.reported("s1").await;

    harness.clock.set(VERIFICATION_DEADLINE + 1);
    harness
        .dispatch(
            &harness.provider,
            MessageBody::ForceSubtaskResults(ForceSubtaskResults {
                report_computed_task: report.clone(),
            }),
        )
        .await
        .unwrap();
    harness.clock.advance(10);
    assert_eq!(
        harness
            .dispatcher
            .machine()
            .check_deadline(&SubtaskId::new("s1"))
            .await
            .unwrap(),
        Some(SubtaskState::ForcedAcceptance)
    );

    let outcome = harness
        .dispatch(
            &harness.provider,
            MessageBody::ForcePayment(ForcePayment {
                task_to_compute: report.task_to_compute.clone(),
            }),
        )
        .await
        .unwrap();
    match outcome {
        DispatchOutcome::Response(MessageBody::ForcePaymentCommitted { amount, .. }) => {
            assert_eq!(amount, PRICE)
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(harness.state("s1").await, SubtaskState::Accepted);
}

#[tokio::test]
async fn test_force_payment_already_settled_is_rejected() {
    let harness = Harness::new(1500);
    let report = harness.reported("s1").await;

    harness.clock.set(VERIFICATION_DEADLINE + 1);
    harness
        .dispatch(
            &harness.provider,
            MessageBody::ForceSubtaskResults(ForceSubtaskResults {
                report_computed_task: report.clone(),
            }),
        )
        .await
        .unwrap();
    harness.clock.advance(10);
    harness
        .dispatcher
        .machine()
        .check_deadline(&SubtaskId::new("s1"))
        .await
        .unwrap();
    assert_eq!(harness.payments.forced_payments().await.len(), 1);

    // The settlement already paid out, so the claim finds nothing unsettled.
    let outcome = harness
        .dispatch(
            &harness.provider,
            MessageBody::ForcePayment(ForcePayment {
                task_to_compute: report.task_to_compute.clone(),
            }),
        )
        .await
        .unwrap();
    assert_eq!(
        outcome,
        DispatchOutcome::Response(MessageBody::ForcePaymentRejected {
            reason: ForcePaymentRejectReason::NoUnsettledTasksFound,
        })
    );
    assert_eq!(harness.state("s1").await, SubtaskState::ForcedAcceptance);
}

#[tokio::test]
async fn test_result_transfer_flow() {
    let harness = Harness::new(1500);
    let report = harness.reported("s1").await;

    let outcome = harness
        .dispatch(
            &harness.requestor,
            MessageBody::ForceGetTaskResult(ForceGetTaskResult {
                report_computed_task: report.clone(),
            }),
        )
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        DispatchOutcome::Response(MessageBody::AckForceGetTaskResult { .. })
    ));
    assert_eq!(
        harness.state("s1").await,
        SubtaskState::ForcingResultTransfer
    );

    let machine = harness.dispatcher.machine();
    machine
        .register_upload(&SubtaskId::new("s1"))
        .await
        .unwrap();
    assert_eq!(harness.state("s1").await, SubtaskState::ResultUploaded);

    harness
        .dispatch(
            &harness.requestor,
            MessageBody::SubtaskResultsAccepted(SubtaskResultsAccepted {
                task_to_compute: report.task_to_compute.clone(),
                payment_ts: harness.clock.timestamp(),
            }),
        )
        .await
        .unwrap();
    assert_eq!(harness.state("s1").await, SubtaskState::Accepted);
}

#[tokio::test]
async fn test_result_transfer_timeout_forfeits_the_claim() {
    let harness = Harness::new(1500);
    let report = harness.reported("s1").await;

    harness
        .dispatch(
            &harness.requestor,
            MessageBody::ForceGetTaskResult(ForceGetTaskResult {
                report_computed_task: report,
            }),
        )
        .await
        .unwrap();

    // Download deadline is now + 3 + ceil(10MB / 48KB/s) = now + 217.
    harness.clock.advance(300);
    let machine = harness.dispatcher.machine();
    assert_eq!(
        machine.check_deadline(&SubtaskId::new("s1")).await.unwrap(),
        Some(SubtaskState::ForceTimeout)
    );

    let err = machine
        .register_upload(&SubtaskId::new("s1"))
        .await
        .unwrap_err();
    assert!(matches!(err, ConcentError::SubtaskAlreadyFinished { .. }));
}

#[tokio::test]
async fn test_additional_verification_verdicts() {
    // Match: the provider is vindicated and paid.
    let harness = Harness::new(1500);
    let report = harness.reported("s1").await;
    let outcome = harness
        .dispatch(
            &harness.provider,
            MessageBody::SubtaskResultsVerify(SubtaskResultsVerify {
                report_computed_task: report.clone(),
            }),
        )
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        DispatchOutcome::Response(MessageBody::AckSubtaskResultsVerify { .. })
    ));
    assert_eq!(
        harness.state("s1").await,
        SubtaskState::AdditionalVerification
    );

    let machine = harness.dispatcher.machine();
    let settled = machine
        .register_verification_result(&SubtaskId::new("s1"), VerificationOutcome::Match)
        .await
        .unwrap();
    assert!(matches!(
        settled,
        Some(MessageBody::SubtaskResultsSettled { .. })
    ));
    assert_eq!(harness.state("s1").await, SubtaskState::Accepted);
    assert_eq!(harness.payments.forced_payments().await.len(), 1);

    // Mismatch: the rejection stands.
    let harness = Harness::new(1500);
    let report = harness.reported("s2").await;
    harness
        .dispatch(
            &harness.provider,
            MessageBody::SubtaskResultsVerify(SubtaskResultsVerify {
                report_computed_task: report,
            }),
        )
        .await
        .unwrap();
    harness
        .dispatcher
        .machine()
        .register_verification_result(&SubtaskId::new("s2"), VerificationOutcome::Mismatch)
        .await
        .unwrap();
    assert_eq!(harness.state("s2").await, SubtaskState::Rejected);
    assert!(harness.payments.forced_payments().await.is_empty());
}

#[tokio::test]
async fn test_verification_error_settles_after_grace_deadline() {
    let harness = Harness::new(1500);
    let report = harness.reported("s1").await;
    harness
        .dispatch(
            &harness.provider,
            MessageBody::SubtaskResultsVerify(SubtaskResultsVerify {
                report_computed_task: report,
            }),
        )
        .await
        .unwrap();

    let machine = harness.dispatcher.machine();
    machine
        .register_verification_result(&SubtaskId::new("s1"), VerificationOutcome::Error)
        .await
        .unwrap();
    assert_eq!(
        harness.state("s1").await,
        SubtaskState::AdditionalVerificationFailed
    );

    // The provider is not punished for Concent's inability to verify.
    harness.clock.advance(10);
    assert_eq!(
        machine.check_deadline(&SubtaskId::new("s1")).await.unwrap(),
        Some(SubtaskState::Accepted)
    );
    assert_eq!(harness.payments.forced_payments().await.len(), 1);
}

#[tokio::test]
async fn test_additional_verification_timeout_settles_for_the_provider() {
    let harness = Harness::new(1500);
    let report = harness.reported("s1").await;
    harness
        .dispatch(
            &harness.provider,
            MessageBody::SubtaskResultsVerify(SubtaskResultsVerify {
                report_computed_task: report,
            }),
        )
        .await
        .unwrap();

    // concent_verification_time is 300 at the defaults.
    harness.clock.advance(301);
    let machine = harness.dispatcher.machine();
    assert_eq!(
        machine.check_deadline(&SubtaskId::new("s1")).await.unwrap(),
        Some(SubtaskState::Accepted)
    );
    assert_eq!(harness.payments.forced_payments().await.len(), 1);
}

#[tokio::test]
async fn test_concurrent_first_reports_create_one_subtask() {
    let harness = Harness::new(1500);
    let report = harness.report("s1");
    let raw = harness.raw(
        &harness.provider,
        MessageBody::ReportComputedTask(report),
    );

    let (a, b) = tokio::join!(
        harness.dispatcher.dispatch(&raw, None),
        harness.dispatcher.dispatch(&raw, None),
    );

    // Whichever request loses the creation race is retried and lands on the
    // idempotent update branch; both callers succeed.
    assert!(matches!(
        a.unwrap(),
        DispatchOutcome::Response(MessageBody::ForceReportComputedTaskResponse { .. })
    ));
    assert!(matches!(
        b.unwrap(),
        DispatchOutcome::Response(MessageBody::ForceReportComputedTaskResponse { .. })
    ));
    assert_eq!(harness.store.subtask_count().await.unwrap(), 1);
    assert_eq!(harness.state("s1").await, SubtaskState::Reported);
}

#[tokio::test]
async fn test_incompatible_version_is_refused_without_side_effects() {
    let harness = Harness::new(1500);
    let report = harness.report("s1");
    let raw = harness.raw(
        &harness.provider,
        MessageBody::ReportComputedTask(report),
    );

    let outcome = harness
        .dispatcher
        .dispatch(&raw, Some("1.0.0"))
        .await
        .unwrap();
    assert_eq!(
        outcome,
        DispatchOutcome::Response(MessageBody::ServiceRefused {
            reason: ServiceRefusedReason::UnsupportedProtocolVersion,
        })
    );
    assert_eq!(harness.store.subtask_count().await.unwrap(), 0);

    // Same raw bytes with a compatible declaration go through.
    let outcome = harness
        .dispatcher
        .dispatch(&raw, Some("2.18.5"))
        .await
        .unwrap();
    assert!(matches!(outcome, DispatchOutcome::Response(_)));
    assert_eq!(harness.store.subtask_count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_client_authorization_handshake() {
    let harness = Harness::new(1500);
    let raw = harness.raw(
        &harness.provider,
        MessageBody::ClientAuthorization {
            client_public_key: *harness.provider.public_key(),
        },
    );
    let outcome = harness.dispatcher.dispatch(&raw, None).await.unwrap();
    assert_eq!(outcome, DispatchOutcome::NoContent);
}
