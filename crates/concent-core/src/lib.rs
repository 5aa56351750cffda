pub mod authentication;
pub mod clock;
pub mod deadlines;
pub mod lifecycle;
pub mod payments;
pub mod pipeline;
pub mod retry;
pub mod version;

pub use authentication::{AuthenticatedMessage, MessageAuthenticator};
pub use clock::{Clock, ManualClock, SystemClock};
pub use deadlines::{
    concent_verification_time, download_time, maximum_download_time, subtask_verification_time,
};
pub use lifecycle::{LifecycleMachine, VerificationOutcome};
pub use payments::{MockPaymentBackend, Payment, PaymentBackend};
pub use pipeline::{DispatchOutcome, Dispatcher};
pub use retry::with_creation_retry;
pub use version::{is_declared_version_supported, is_protocol_version_compatible};
