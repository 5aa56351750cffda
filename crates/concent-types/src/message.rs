use crate::canonical_json::to_canonical_json;
use crate::{PublicKey, Role, Signature, SubtaskId, TaskId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Domain separation tags for protocol message signatures.
///
/// Each independently signed payload uses its own tag so a signature can
/// never be replayed as a signature over a different payload kind.
pub mod dst {
    /// Outer envelope signature tag
    pub const ENVELOPE: &[u8] = b"CONCENT-MSG-v1";

    /// Requestor-signed task assignment tag
    pub const TASK_TO_COMPUTE: &[u8] = b"CONCENT-TTC-v1";

    /// Provider-signed computation report tag
    pub const REPORT_COMPUTED_TASK: &[u8] = b"CONCENT-RCT-v1";
}

/// The task assignment as agreed between the two parties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeTaskDef {
    pub task_id: TaskId,
    pub subtask_id: SubtaskId,
    /// Absolute computation deadline, unix seconds UTC.
    pub deadline: i64,
}

/// Task assignment message, signed by the requestor.
///
/// Both parties hold a copy; every arbitration message embeds it (directly
/// or through a [`ReportComputedTask`]) as proof of the agreed terms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskToCompute {
    pub timestamp: i64,
    pub compute_task_def: ComputeTaskDef,
    pub provider_public_key: PublicKey,
    pub requestor_public_key: PublicKey,
    pub provider_payment_address: String,
    pub requestor_payment_address: String,
    pub price: u64,
    pub signature: Signature,
}

impl TaskToCompute {
    pub fn task_id(&self) -> &TaskId {
        &self.compute_task_def.task_id
    }

    pub fn subtask_id(&self) -> &SubtaskId {
        &self.compute_task_def.subtask_id
    }

    pub fn deadline(&self) -> i64 {
        self.compute_task_def.deadline
    }

    /// Bytes covered by the requestor's signature (excludes the signature
    /// field itself).
    pub fn signable_bytes(&self) -> Vec<u8> {
        #[derive(Serialize)]
        struct SignableTaskToCompute<'a> {
            timestamp: i64,
            compute_task_def: &'a ComputeTaskDef,
            provider_public_key: &'a PublicKey,
            requestor_public_key: &'a PublicKey,
            provider_payment_address: &'a str,
            requestor_payment_address: &'a str,
            price: u64,
        }

        let signable = SignableTaskToCompute {
            timestamp: self.timestamp,
            compute_task_def: &self.compute_task_def,
            provider_public_key: &self.provider_public_key,
            requestor_public_key: &self.requestor_public_key,
            provider_payment_address: &self.provider_payment_address,
            requestor_payment_address: &self.requestor_payment_address,
            price: self.price,
        };

        let mut bytes = dst::TASK_TO_COMPUTE.to_vec();
        bytes.extend_from_slice(
            to_canonical_json(&signable)
                .expect("Failed to serialize task to compute")
                .as_bytes(),
        );
        bytes
    }
}

/// Computation report, signed by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportComputedTask {
    pub timestamp: i64,
    pub task_to_compute: TaskToCompute,
    /// Result package size in bytes.
    pub size: u64,
    pub package_hash: String,
    pub signature: Signature,
}

impl ReportComputedTask {
    pub fn task_id(&self) -> &TaskId {
        self.task_to_compute.task_id()
    }

    pub fn subtask_id(&self) -> &SubtaskId {
        self.task_to_compute.subtask_id()
    }

    /// Bytes covered by the provider's signature.
    pub fn signable_bytes(&self) -> Vec<u8> {
        #[derive(Serialize)]
        struct SignableReportComputedTask<'a> {
            timestamp: i64,
            task_to_compute: &'a TaskToCompute,
            size: u64,
            package_hash: &'a str,
        }

        let signable = SignableReportComputedTask {
            timestamp: self.timestamp,
            task_to_compute: &self.task_to_compute,
            size: self.size,
            package_hash: &self.package_hash,
        };

        let mut bytes = dst::REPORT_COMPUTED_TASK.to_vec();
        bytes.extend_from_slice(
            to_canonical_json(&signable)
                .expect("Failed to serialize computed task report")
                .as_bytes(),
        );
        bytes
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReportReason {
    CannotComputeTask,
    TaskFailure,
    SubtaskTimeLimitExceeded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultsRejectReason {
    VerificationNegative,
    ResourcesFailure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceRefusedReason {
    UnsupportedProtocolVersion,
    DuplicateRequest,
    TooSmallRequestorDeposit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForcePaymentRejectReason {
    TimestampError,
    NoUnsettledTasksFound,
    TooSmallRequestorDeposit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForceReportComputedTask {
    pub report_computed_task: ReportComputedTask,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckReportComputedTask {
    pub report_computed_task: ReportComputedTask,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectReportComputedTask {
    pub task_to_compute: TaskToCompute,
    pub reason: RejectReportReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForceGetTaskResult {
    pub report_computed_task: ReportComputedTask,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtaskResultsAccepted {
    pub task_to_compute: TaskToCompute,
    pub payment_ts: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtaskResultsRejected {
    pub report_computed_task: ReportComputedTask,
    pub reason: ResultsRejectReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForceSubtaskResults {
    pub report_computed_task: ReportComputedTask,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtaskResultsVerify {
    pub report_computed_task: ReportComputedTask,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForcePayment {
    pub task_to_compute: TaskToCompute,
}

/// Closed enumeration of every protocol message body.
///
/// Inbound variants are submitted by clients inside a signed [`Envelope`];
/// outbound variants are produced by Concent and signed by the transport
/// with the service key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MessageBody {
    // Inbound
    ClientAuthorization { client_public_key: PublicKey },
    ReportComputedTask(ReportComputedTask),
    ForceReportComputedTask(ForceReportComputedTask),
    AckReportComputedTask(AckReportComputedTask),
    RejectReportComputedTask(RejectReportComputedTask),
    ForceGetTaskResult(ForceGetTaskResult),
    SubtaskResultsAccepted(SubtaskResultsAccepted),
    SubtaskResultsRejected(SubtaskResultsRejected),
    ForceSubtaskResults(ForceSubtaskResults),
    SubtaskResultsVerify(SubtaskResultsVerify),
    ForcePayment(ForcePayment),

    // Outbound
    ServiceRefused {
        reason: ServiceRefusedReason,
    },
    ForceReportComputedTaskResponse {
        report_computed_task: ReportComputedTask,
    },
    VerdictReportComputedTask {
        report_computed_task: ReportComputedTask,
    },
    AckForceGetTaskResult {
        report_computed_task: ReportComputedTask,
    },
    AckSubtaskResultsVerify {
        report_computed_task: ReportComputedTask,
    },
    SubtaskResultsSettled {
        task_to_compute: TaskToCompute,
    },
    ForcePaymentCommitted {
        provider_payment_address: String,
        amount: u64,
        payment_ts: i64,
    },
    ForcePaymentRejected {
        reason: ForcePaymentRejectReason,
    },
}

/// Message type tag, used to key the lifecycle transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    ClientAuthorization,
    ReportComputedTask,
    ForceReportComputedTask,
    AckReportComputedTask,
    RejectReportComputedTask,
    ForceGetTaskResult,
    SubtaskResultsAccepted,
    SubtaskResultsRejected,
    ForceSubtaskResults,
    SubtaskResultsVerify,
    ForcePayment,
    ServiceRefused,
    ForceReportComputedTaskResponse,
    VerdictReportComputedTask,
    AckForceGetTaskResult,
    AckSubtaskResultsVerify,
    SubtaskResultsSettled,
    ForcePaymentCommitted,
    ForcePaymentRejected,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl MessageBody {
    pub fn kind(&self) -> MessageKind {
        match self {
            MessageBody::ClientAuthorization { .. } => MessageKind::ClientAuthorization,
            MessageBody::ReportComputedTask(_) => MessageKind::ReportComputedTask,
            MessageBody::ForceReportComputedTask(_) => MessageKind::ForceReportComputedTask,
            MessageBody::AckReportComputedTask(_) => MessageKind::AckReportComputedTask,
            MessageBody::RejectReportComputedTask(_) => MessageKind::RejectReportComputedTask,
            MessageBody::ForceGetTaskResult(_) => MessageKind::ForceGetTaskResult,
            MessageBody::SubtaskResultsAccepted(_) => MessageKind::SubtaskResultsAccepted,
            MessageBody::SubtaskResultsRejected(_) => MessageKind::SubtaskResultsRejected,
            MessageBody::ForceSubtaskResults(_) => MessageKind::ForceSubtaskResults,
            MessageBody::SubtaskResultsVerify(_) => MessageKind::SubtaskResultsVerify,
            MessageBody::ForcePayment(_) => MessageKind::ForcePayment,
            MessageBody::ServiceRefused { .. } => MessageKind::ServiceRefused,
            MessageBody::ForceReportComputedTaskResponse { .. } => {
                MessageKind::ForceReportComputedTaskResponse
            }
            MessageBody::VerdictReportComputedTask { .. } => {
                MessageKind::VerdictReportComputedTask
            }
            MessageBody::AckForceGetTaskResult { .. } => MessageKind::AckForceGetTaskResult,
            MessageBody::AckSubtaskResultsVerify { .. } => MessageKind::AckSubtaskResultsVerify,
            MessageBody::SubtaskResultsSettled { .. } => MessageKind::SubtaskResultsSettled,
            MessageBody::ForcePaymentCommitted { .. } => MessageKind::ForcePaymentCommitted,
            MessageBody::ForcePaymentRejected { .. } => MessageKind::ForcePaymentRejected,
        }
    }

    /// The embedded task assignment, however deeply nested.
    pub fn task_to_compute(&self) -> Option<&TaskToCompute> {
        match self {
            MessageBody::ReportComputedTask(rct) => Some(&rct.task_to_compute),
            MessageBody::ForceReportComputedTask(m) => {
                Some(&m.report_computed_task.task_to_compute)
            }
            MessageBody::AckReportComputedTask(m) => {
                Some(&m.report_computed_task.task_to_compute)
            }
            MessageBody::RejectReportComputedTask(m) => Some(&m.task_to_compute),
            MessageBody::ForceGetTaskResult(m) => Some(&m.report_computed_task.task_to_compute),
            MessageBody::SubtaskResultsAccepted(m) => Some(&m.task_to_compute),
            MessageBody::SubtaskResultsRejected(m) => {
                Some(&m.report_computed_task.task_to_compute)
            }
            MessageBody::ForceSubtaskResults(m) => Some(&m.report_computed_task.task_to_compute),
            MessageBody::SubtaskResultsVerify(m) => Some(&m.report_computed_task.task_to_compute),
            MessageBody::ForcePayment(m) => Some(&m.task_to_compute),
            MessageBody::ForceReportComputedTaskResponse {
                report_computed_task,
            }
            | MessageBody::VerdictReportComputedTask {
                report_computed_task,
            }
            | MessageBody::AckForceGetTaskResult {
                report_computed_task,
            }
            | MessageBody::AckSubtaskResultsVerify {
                report_computed_task,
            } => Some(&report_computed_task.task_to_compute),
            MessageBody::SubtaskResultsSettled { task_to_compute } => Some(task_to_compute),
            MessageBody::ClientAuthorization { .. }
            | MessageBody::ServiceRefused { .. }
            | MessageBody::ForcePaymentCommitted { .. }
            | MessageBody::ForcePaymentRejected { .. } => None,
        }
    }

    /// The embedded computation report, if the variant carries one.
    pub fn report_computed_task(&self) -> Option<&ReportComputedTask> {
        match self {
            MessageBody::ReportComputedTask(rct) => Some(rct),
            MessageBody::ForceReportComputedTask(m) => Some(&m.report_computed_task),
            MessageBody::AckReportComputedTask(m) => Some(&m.report_computed_task),
            MessageBody::ForceGetTaskResult(m) => Some(&m.report_computed_task),
            MessageBody::SubtaskResultsRejected(m) => Some(&m.report_computed_task),
            MessageBody::ForceSubtaskResults(m) => Some(&m.report_computed_task),
            MessageBody::SubtaskResultsVerify(m) => Some(&m.report_computed_task),
            _ => None,
        }
    }

    /// Which party signs this message kind.
    ///
    /// The signer is never self-declared for regular submissions: it is the
    /// provider or requestor key recorded in the embedded task assignment,
    /// depending on the message type.
    pub fn signer_role(&self) -> Option<Role> {
        match self {
            MessageBody::ReportComputedTask(_)
            | MessageBody::ForceReportComputedTask(_)
            | MessageBody::ForceSubtaskResults(_)
            | MessageBody::SubtaskResultsVerify(_)
            | MessageBody::ForcePayment(_) => Some(Role::Provider),
            MessageBody::AckReportComputedTask(_)
            | MessageBody::RejectReportComputedTask(_)
            | MessageBody::ForceGetTaskResult(_)
            | MessageBody::SubtaskResultsAccepted(_)
            | MessageBody::SubtaskResultsRejected(_) => Some(Role::Requestor),
            _ => None,
        }
    }

    pub fn subtask_id(&self) -> Option<&SubtaskId> {
        self.task_to_compute().map(|ttc| ttc.subtask_id())
    }

    pub fn task_id(&self) -> Option<&TaskId> {
        self.task_to_compute().map(|ttc| ttc.task_id())
    }
}

/// Signed envelope around a [`MessageBody`].
///
/// The signature covers [`dst::ENVELOPE`] plus the canonical JSON of the
/// timestamp and body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub timestamp: i64,
    pub body: MessageBody,
    pub signature: Signature,
}

impl Envelope {
    pub fn new(timestamp: i64, body: MessageBody) -> Self {
        Self {
            timestamp,
            body,
            signature: Signature::empty(),
        }
    }

    /// Bytes covered by the envelope signature.
    pub fn signable_bytes(&self) -> Vec<u8> {
        #[derive(Serialize)]
        struct SignableEnvelope<'a> {
            timestamp: i64,
            body: &'a MessageBody,
        }

        let signable = SignableEnvelope {
            timestamp: self.timestamp,
            body: &self.body,
        };

        let mut bytes = dst::ENVELOPE.to_vec();
        bytes.extend_from_slice(
            to_canonical_json(&signable)
                .expect("Failed to serialize envelope")
                .as_bytes(),
        );
        bytes
    }
}
