// SPDX-License-Identifier: MIT
//! Proposal Requester — converts a non-empty Selection Set into exactly one
//! pricing-service request.
//!
//! At most one request is outstanding at a time. The guard is a lock, not
//! cancellation: an in-flight request runs to completion or failure, and a
//! second submit in the meantime is rejected locally without touching the
//! network.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

use crate::api::PortalApi;
use crate::error::PortalError;
use crate::loans::selection::SelectionSet;
use crate::proposal::Proposal;

pub struct ProposalRequester {
    api: Arc<PortalApi>,
    in_flight: AtomicBool,
}

impl ProposalRequester {
    pub fn new(api: Arc<PortalApi>) -> Self {
        Self {
            api,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Whether a request is outstanding — callers disable the submit action
    /// while this is true.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Request a proposal for the current selection.
    ///
    /// An empty selection is a local validation error — communicated to the
    /// user without contacting the service. A duplicate submit while a
    /// request is outstanding is rejected locally the same way.
    pub async fn request(&self, selection: &SelectionSet) -> Result<Proposal, PortalError> {
        let loan_ids = selection.selected_ids();
        if loan_ids.is_empty() {
            return Err(PortalError::LocalValidation(
                "select at least one loan to renegotiate".to_string(),
            ));
        }

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(PortalError::RequestInFlight);
        }

        info!(count = loan_ids.len(), "submitting renegotiation request");
        let result = self.api.renegotiate(&loan_ids).await;
        self.in_flight.store(false, Ordering::SeqCst);
        result
    }
}
