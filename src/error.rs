//! Failure taxonomy for the portal workflow.
//!
//! Four classes, each with a fixed handling policy:
//! - auth resolution failure → treated as "unauthenticated", redirect to login
//! - local validation → user prompt, zero network calls
//! - remote request failure → inline message, operation abandoned
//! - malformed response → handled like a remote failure, logged, never
//!   partially rendered
//!
//! No automatic retries anywhere — every retry is a fresh, explicit user
//! action.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PortalError {
    /// The session could not be resolved (network/service error). Never
    /// fatal: the gate treats the visitor as unauthenticated.
    #[error("session resolution failed: {0}")]
    AuthResolution(String),

    /// A client-side precondition was violated (empty selection on submit,
    /// no option chosen on share). No network call is made.
    #[error("{0}")]
    LocalValidation(String),

    /// A proposal request is already outstanding. The duplicate submit is a
    /// local no-op — no second request is issued.
    #[error("a proposal request is already in flight")]
    RequestInFlight,

    /// The analysis or pricing service failed: network error or non-success
    /// status. Carries the server-provided reason when one was returned.
    #[error("service request failed: {reason}")]
    RemoteRequest { reason: String },

    /// The service answered with a 2xx but the body is structurally invalid.
    #[error("malformed service response: {0}")]
    MalformedResponse(String),
}

impl PortalError {
    /// Fetch-level failures the user may retry manually. Local validation
    /// and duplicate submits are not retries — they need a different action.
    pub fn is_fetch_failure(&self) -> bool {
        matches!(
            self,
            PortalError::RemoteRequest { .. } | PortalError::MalformedResponse(_)
        )
    }
}
