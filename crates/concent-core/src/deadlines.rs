//! Deadline arithmetic for the dispute-resolution protocol.
//!
//! All functions are total over their documented input domain and panic on
//! inputs outside it: non-positive sizes, rates, or a deadline at or before
//! the task timestamp indicate an authentication gap upstream, not a
//! recoverable business error. Callers must have validated the message
//! through the authenticator first.
//!
//! `ProtocolTimes::custom_protocol_times` switches between the configured
//! timing values and the reference protocol defaults in [`reference`]; the
//! formulas are identical, only the constants differ.

use concent_types::{ProtocolTimes, ReportComputedTask, TaskToCompute};

/// Reference protocol timing constants.
///
/// Hard-coded equivalents of the configurable values, used when
/// `custom_protocol_times` is disabled so deployments without custom timing
/// behave identically regardless of what the configuration file says.
pub mod reference {
    pub const CONCENT_MESSAGING_TIME: i64 = 2;
    /// KB/s = kbps / 8
    pub const MINIMUM_UPLOAD_RATE: u64 = 48;
    pub const DOWNLOAD_LEADIN_TIME: i64 = 3;
    pub const VERIFICATION_TIME_MULTIPLIER: f64 = 2.0;
    pub const VERIFIER_THREADS: u32 = 4;
}

/// Worst-case time to download a result package, in seconds.
///
/// `rate` is in KB/s; the package is assumed to move at no less than that.
pub fn maximum_download_time(size: u64, rate: u64, leadin: i64) -> i64 {
    assert!(size > 0, "result package size must be positive");
    assert!(rate > 0, "upload rate must be positive");
    assert!(leadin >= 0, "download lead-in must not be negative");

    let bytes_per_sec = rate << 10;
    leadin + size.div_ceil(bytes_per_sec) as i64
}

/// Download time under the configured or reference timing constants.
pub fn download_time(size: u64, times: &ProtocolTimes) -> i64 {
    if times.custom_protocol_times {
        maximum_download_time(size, times.minimum_upload_rate, times.download_leadin_time)
    } else {
        maximum_download_time(
            size,
            reference::MINIMUM_UPLOAD_RATE,
            reference::DOWNLOAD_LEADIN_TIME,
        )
    }
}

/// Time the requestor is allotted to verify a reported result, in seconds,
/// counted from the task assignment timestamp.
///
/// `4 * messaging_time + 3 * download_time + 0.5 * subtask_timeout`, where
/// the subtask timeout is the span between the assignment timestamp and the
/// computation deadline. Truncated to whole seconds.
pub fn subtask_verification_time(report: &ReportComputedTask, times: &ProtocolTimes) -> i64 {
    let (messaging_time, mdt) = if times.custom_protocol_times {
        (
            times.concent_messaging_time,
            maximum_download_time(
                report.size,
                times.minimum_upload_rate,
                times.download_leadin_time,
            ),
        )
    } else {
        (
            reference::CONCENT_MESSAGING_TIME,
            maximum_download_time(
                report.size,
                reference::MINIMUM_UPLOAD_RATE,
                reference::DOWNLOAD_LEADIN_TIME,
            ),
        )
    };

    let subtask_timeout = subtask_timeout(&report.task_to_compute);

    ((4 * messaging_time + 3 * mdt) as f64 + 0.5 * subtask_timeout as f64) as i64
}

/// Time budget Concent allots itself to independently verify a disputed
/// result, in seconds.
pub fn concent_verification_time(task_to_compute: &TaskToCompute, times: &ProtocolTimes) -> i64 {
    let (multiplier, threads) = if times.custom_protocol_times {
        (times.verification_time_multiplier, times.verifier_threads)
    } else {
        (
            reference::VERIFICATION_TIME_MULTIPLIER,
            reference::VERIFIER_THREADS,
        )
    };
    assert!(threads > 0, "verifier thread count must be positive");
    assert!(multiplier > 0.0, "verification time multiplier must be positive");

    (subtask_timeout(task_to_compute) as f64 * multiplier / threads as f64) as i64
}

fn subtask_timeout(task_to_compute: &TaskToCompute) -> i64 {
    let timeout = task_to_compute.deadline() - task_to_compute.timestamp;
    assert!(
        timeout > 0,
        "subtask deadline must be after the task assignment timestamp"
    );
    timeout
}

#[cfg(test)]
mod tests {
    use super::*;
    use concent_types::{
        ComputeTaskDef, PublicKey, Signature, SubtaskId, TaskId,
    };

    fn task_to_compute(timestamp: i64, deadline: i64) -> TaskToCompute {
        TaskToCompute {
            timestamp,
            compute_task_def: ComputeTaskDef {
                task_id: TaskId::new("task-1"),
                subtask_id: SubtaskId::new("subtask-1"),
                deadline,
            },
            provider_public_key: PublicKey::from_bytes([1; 32]),
            requestor_public_key: PublicKey::from_bytes([2; 32]),
            provider_payment_address: format!("0x{}", "a".repeat(40)),
            requestor_payment_address: format!("0x{}", "b".repeat(40)),
            price: 5000,
            signature: Signature::empty(),
        }
    }

    fn report(timestamp: i64, deadline: i64, size: u64) -> ReportComputedTask {
        ReportComputedTask {
            timestamp: timestamp + 500,
            task_to_compute: task_to_compute(timestamp, deadline),
            size,
            package_hash: "sha3:deadbeef".to_string(),
            signature: Signature::empty(),
        }
    }

    #[test]
    fn test_download_time_rounds_up() {
        // 49152 bytes/s at the default 48 KB/s rate; one extra byte costs a
        // whole extra second.
        assert_eq!(maximum_download_time(49152, 48, 0), 1);
        assert_eq!(maximum_download_time(49153, 48, 0), 2);
        assert_eq!(maximum_download_time(1, 48, 3), 4);
    }

    #[test]
    fn test_download_time_monotonic_in_size_and_rate() {
        let mut previous = 0;
        for size in (1_000_000..=50_000_000).step_by(1_000_000) {
            let t = maximum_download_time(size, 48, 3);
            assert!(t >= previous, "not monotonic in size at {}", size);
            previous = t;
        }

        let mut previous = i64::MAX;
        for rate in [8, 16, 48, 128, 384, 1024] {
            let t = maximum_download_time(10_485_760, rate, 3);
            assert!(t <= previous, "not monotonic in rate at {}", rate);
            previous = t;
        }
    }

    #[test]
    fn test_subtask_verification_time_pinned_value() {
        // messaging_time=2, upload_rate=48, lead_in=3, T=1000, D=1600,
        // S=10MB: mdt = 3 + ceil(10485760/49152) = 217, so
        // 4*2 + 3*217 + 0.5*600 = 959.
        let times = ProtocolTimes::default();
        let report = report(1000, 1600, 10_485_760);
        assert_eq!(subtask_verification_time(&report, &times), 959);
    }

    #[test]
    fn test_concent_verification_time_pinned_value() {
        let times = ProtocolTimes::default();
        let ttc = task_to_compute(1000, 1600);
        // (1600 - 1000) * 2.0 / 4 = 300
        assert_eq!(concent_verification_time(&ttc, &times), 300);
    }

    #[test]
    fn test_custom_and_reference_agree_at_protocol_defaults() {
        let custom = ProtocolTimes::default();
        let reference = ProtocolTimes {
            custom_protocol_times: false,
            ..ProtocolTimes::default()
        };

        let report = report(1000, 1600, 10_485_760);
        assert_eq!(
            subtask_verification_time(&report, &custom),
            subtask_verification_time(&report, &reference)
        );
        assert_eq!(
            download_time(report.size, &custom),
            download_time(report.size, &reference)
        );
        assert_eq!(
            concent_verification_time(&report.task_to_compute, &custom),
            concent_verification_time(&report.task_to_compute, &reference)
        );
    }

    #[test]
    #[should_panic(expected = "result package size must be positive")]
    fn test_zero_size_is_a_contract_violation() {
        maximum_download_time(0, 48, 3);
    }

    #[test]
    #[should_panic(expected = "subtask deadline must be after")]
    fn test_inverted_deadline_is_a_contract_violation() {
        let ttc = task_to_compute(1600, 1000);
        concent_verification_time(&ttc, &ProtocolTimes::default());
    }
}
