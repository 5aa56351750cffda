pub mod canonical_json;
pub mod error;
pub mod id;
pub mod keys;
pub mod message;
pub mod subtask;

pub use canonical_json::{canonical_hash, to_canonical_json, CanonicalJsonError};
pub use error::{ConcentError, Result};
pub use id::{SubtaskId, TaskId};
pub use keys::{PublicKey, Role, Signature, PUBLIC_KEY_LENGTH};
pub use message::{
    AckReportComputedTask, ComputeTaskDef, Envelope, ForceGetTaskResult, ForcePayment,
    ForcePaymentRejectReason, ForceReportComputedTask, ForceSubtaskResults, MessageBody,
    MessageKind, RejectReportComputedTask, RejectReportReason, ReportComputedTask,
    ResultsRejectReason, ServiceRefusedReason, SubtaskResultsAccepted, SubtaskResultsRejected,
    SubtaskResultsVerify, TaskToCompute,
};
pub use subtask::{Subtask, SubtaskState};

/// Protocol timing parameters.
///
/// Constructed once at process start from configuration and passed
/// explicitly into every component that needs it. `custom_protocol_times`
/// selects between these configured values and the reference implementation
/// with hard-coded protocol defaults in the deadline calculator.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ProtocolTimes {
    /// Allowance for a message to travel between a party and Concent, seconds.
    pub concent_messaging_time: i64,
    /// Assumed worst-case upload rate, KB/s.
    pub minimum_upload_rate: u64,
    /// Fixed lead-in added to every download time estimate, seconds.
    pub download_leadin_time: i64,
    /// Window after the verification deadline in which forced acceptance
    /// may be requested, seconds.
    pub force_acceptance_time: i64,
    /// Scale factor for the verification time Concent allots itself.
    pub verification_time_multiplier: f64,
    /// Worker threads available to Concent's own verifier.
    pub verifier_threads: u32,
    /// Use the configured values above instead of the reference protocol
    /// defaults.
    pub custom_protocol_times: bool,
}

impl Default for ProtocolTimes {
    fn default() -> Self {
        Self {
            concent_messaging_time: 2,
            minimum_upload_rate: 48, // KB/s = kbps / 8
            download_leadin_time: 3,
            force_acceptance_time: 5,
            verification_time_multiplier: 2.0,
            verifier_threads: 4,
            custom_protocol_times: true,
        }
    }
}
