use crate::authentication::MessageAuthenticator;
use crate::clock::Clock;
use crate::lifecycle::LifecycleMachine;
use crate::retry::with_creation_retry;
use crate::version::is_declared_version_supported;
use concent_types::{MessageBody, Result, ServiceRefusedReason};
use std::sync::Arc;
use tracing::{debug, warn};

/// What the transport should send back for a dispatched submission.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// Serialize, sign with the service key and return to the client.
    Response(MessageBody),
    /// Empty-body acknowledgment.
    NoContent,
}

/// Ordered request pipeline: authenticate, gate the protocol version, run
/// the lifecycle operation under the creation-retry orchestrator, shape the
/// outcome.
///
/// Each stage either passes its output forward or exits early; errors
/// propagate as `ConcentError` for the transport to map onto its own
/// status codes.
pub struct Dispatcher {
    authenticator: MessageAuthenticator,
    machine: Arc<LifecycleMachine>,
    clock: Arc<dyn Clock>,
    protocol_version: String,
}

impl Dispatcher {
    pub fn new(
        authenticator: MessageAuthenticator,
        machine: Arc<LifecycleMachine>,
        clock: Arc<dyn Clock>,
        protocol_version: String,
    ) -> Self {
        Self {
            authenticator,
            machine,
            clock,
            protocol_version,
        }
    }

    /// Handle one raw inbound submission.
    ///
    /// `declared_version` is the client's protocol version header, when
    /// present; clients that do not declare one are assumed compatible.
    pub async fn dispatch(
        &self,
        raw: &[u8],
        declared_version: Option<&str>,
    ) -> Result<DispatchOutcome> {
        let now = self.clock.timestamp();
        let authenticated = self.authenticator.authenticate(raw, now)?;

        if !is_declared_version_supported(declared_version, &self.protocol_version) {
            warn!(
                client_version = declared_version.unwrap_or("-"),
                concent_version = %self.protocol_version,
                "Refusing incompatible protocol version"
            );
            return Ok(DispatchOutcome::Response(MessageBody::ServiceRefused {
                reason: ServiceRefusedReason::UnsupportedProtocolVersion,
            }));
        }

        // The handshake proves key possession; there is no lifecycle
        // operation to run for it.
        if matches!(
            authenticated.envelope.body,
            MessageBody::ClientAuthorization { .. }
        ) {
            debug!(signer = %authenticated.signer, "Client authorization accepted");
            return Ok(DispatchOutcome::NoContent);
        }

        let response =
            with_creation_retry(|| self.machine.handle_message(&authenticated)).await?;

        Ok(match response {
            Some(body) => DispatchOutcome::Response(body),
            None => DispatchOutcome::NoContent,
        })
    }

    pub fn machine(&self) -> &LifecycleMachine {
        &self.machine
    }
}
