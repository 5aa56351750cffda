use concent_crypto::{verify_envelope, verify_report_computed_task, verify_task_to_compute};
use concent_types::{
    ConcentError, Envelope, MessageBody, PublicKey, ReportComputedTask, Result, Role,
    TaskToCompute,
};
use tracing::debug;

/// Expected length of a payment address: `0x` plus 40 hex characters.
const PAYMENT_ADDRESS_LENGTH: usize = 42;

/// A message that passed decoding, timestamp and signature checks.
#[derive(Debug, Clone)]
pub struct AuthenticatedMessage {
    pub envelope: Envelope,
    /// The key the envelope signature verified against.
    pub signer: PublicKey,
    /// The role that key plays for the embedded task, when applicable.
    pub role: Option<Role>,
}

/// Validates inbound protocol messages: envelope decoding, timestamp
/// window, signer determination and signature verification.
///
/// Pure: no storage or network access; deadline logic happens downstream in
/// the lifecycle machine.
pub struct MessageAuthenticator {
    /// How far into the future a message timestamp may lie, seconds.
    max_future_drift: i64,
    /// Maximum accepted message age, seconds.
    max_message_age: i64,
}

impl MessageAuthenticator {
    pub fn new(max_future_drift: i64, max_message_age: i64) -> Self {
        Self {
            max_future_drift,
            max_message_age,
        }
    }

    /// Authenticate a raw submission, extracting the signer key from the
    /// message body.
    ///
    /// For regular submissions the signer is the provider or requestor key
    /// recorded in the embedded, requestor-signed task assignment — never a
    /// self-declared key. A `ClientAuthorization` handshake is the one
    /// exception: it carries its own key, and a valid signature proves
    /// possession of the private half.
    pub fn authenticate(&self, raw: &[u8], now: i64) -> Result<AuthenticatedMessage> {
        let envelope = decode_envelope(raw)?;
        self.check_timestamp(&envelope, now)?;

        let signer = expected_signer(&envelope.body)?;
        verify_envelope(&envelope, &signer)
            .map_err(|_| ConcentError::SignatureVerification)?;
        verify_embedded_payloads(&envelope.body)?;

        debug!(
            message_type = %envelope.body.kind(),
            signer = %signer,
            "Message authenticated"
        );

        Ok(AuthenticatedMessage {
            role: envelope.body.signer_role(),
            envelope,
            signer,
        })
    }

    /// Authenticate against a caller-supplied key.
    ///
    /// Used when the expected identity is already known from an earlier
    /// handshake; the envelope signature must verify against exactly that
    /// key, whatever the body declares.
    pub fn authenticate_with_key(
        &self,
        raw: &[u8],
        expected_signer: &PublicKey,
        now: i64,
    ) -> Result<AuthenticatedMessage> {
        let envelope = decode_envelope(raw)?;
        self.check_timestamp(&envelope, now)?;

        verify_envelope(&envelope, expected_signer)
            .map_err(|_| ConcentError::SignatureVerification)?;

        if let MessageBody::ClientAuthorization { client_public_key } = &envelope.body {
            if client_public_key != expected_signer {
                return Err(ConcentError::InvalidMessage(
                    "declared client public key does not match the authenticated key".to_string(),
                ));
            }
        }
        verify_embedded_payloads(&envelope.body)?;

        Ok(AuthenticatedMessage {
            role: envelope.body.signer_role(),
            envelope,
            signer: *expected_signer,
        })
    }

    fn check_timestamp(&self, envelope: &Envelope, now: i64) -> Result<()> {
        if envelope.timestamp > now + self.max_future_drift {
            return Err(ConcentError::MessageFromFuture {
                timestamp: envelope.timestamp,
                tolerance: self.max_future_drift,
            });
        }
        if envelope.timestamp < now - self.max_message_age {
            return Err(ConcentError::MessageTooOld {
                timestamp: envelope.timestamp,
                max_age: self.max_message_age,
            });
        }
        Ok(())
    }
}

fn decode_envelope(raw: &[u8]) -> Result<Envelope> {
    serde_json::from_slice(raw).map_err(|e| {
        ConcentError::InvalidMessage(format!("Unable to deserialize protocol message: {}", e))
    })
}

fn expected_signer(body: &MessageBody) -> Result<PublicKey> {
    if let MessageBody::ClientAuthorization { client_public_key } = body {
        return Ok(*client_public_key);
    }

    let role = body.signer_role().ok_or_else(|| {
        ConcentError::InvalidMessage(format!("{} is not a client submission", body.kind()))
    })?;
    let task_to_compute = body.task_to_compute().ok_or_else(|| {
        ConcentError::InvalidMessage("message carries no task to compute".to_string())
    })?;

    Ok(match role {
        Role::Provider => task_to_compute.provider_public_key,
        Role::Requestor => task_to_compute.requestor_public_key,
    })
}

/// Field validation plus verification of the independently signed payloads
/// nested in the body.
///
/// Also establishes the preconditions the deadline calculator asserts on:
/// positive result size and a deadline after the assignment timestamp.
fn verify_embedded_payloads(body: &MessageBody) -> Result<()> {
    if let Some(task_to_compute) = body.task_to_compute() {
        validate_task_to_compute(task_to_compute)?;
        verify_task_to_compute(task_to_compute)
            .map_err(|_| ConcentError::SignatureVerification)?;
    }
    if let Some(report) = body.report_computed_task() {
        validate_report_computed_task(report)?;
        verify_report_computed_task(report)
            .map_err(|_| ConcentError::SignatureVerification)?;
    }
    Ok(())
}

fn validate_task_to_compute(task_to_compute: &TaskToCompute) -> Result<()> {
    if task_to_compute.compute_task_def.task_id.as_str().is_empty() {
        return Err(ConcentError::InvalidMessage("task_id is empty".to_string()));
    }
    if task_to_compute
        .compute_task_def
        .subtask_id
        .as_str()
        .is_empty()
    {
        return Err(ConcentError::InvalidMessage(
            "subtask_id is empty".to_string(),
        ));
    }
    if task_to_compute.deadline() <= task_to_compute.timestamp {
        return Err(ConcentError::InvalidMessage(
            "subtask deadline is not after the task timestamp".to_string(),
        ));
    }
    validate_payment_address(&task_to_compute.provider_payment_address, "provider")?;
    validate_payment_address(&task_to_compute.requestor_payment_address, "requestor")?;
    Ok(())
}

fn validate_report_computed_task(report: &ReportComputedTask) -> Result<()> {
    if report.size == 0 {
        return Err(ConcentError::InvalidMessage(
            "result package size must be positive".to_string(),
        ));
    }
    Ok(())
}

fn validate_payment_address(address: &str, owner: &str) -> Result<()> {
    let malformed = || {
        ConcentError::InvalidMessage(format!(
            "{} payment address must be 0x followed by 40 hex characters",
            owner
        ))
    };

    let hex_part = address.strip_prefix("0x").ok_or_else(malformed)?;
    if address.len() != PAYMENT_ADDRESS_LENGTH
        || !hex_part.chars().all(|c| c.is_ascii_hexdigit())
    {
        return Err(malformed());
    }
    Ok(())
}
