// SPDX-License-Identifier: MIT
//! Proposal review — a short-lived state machine for picking and exporting
//! one installment option from a proposal.
//!
//! # State machine
//!
//! ```text
//! Closed ──(proposal received)──► Open ──(option picked)──► OptionChosen
//!   ▲                              │ │                        │  │
//!   │◄──────────(cancel)───────────┘ └──(pick replaces)──────►│  │
//!   ├◄──────────(cancel)──────────────────────────────────────┘  │
//!   └◄──────────(share: summary exported)────────────────────────┘
//! ```
//!
//! Nothing survives a transition back to `Closed`: the proposal and the
//! chosen option are discarded, and reopening requires a fresh request.

use tracing::{debug, info};

use crate::error::PortalError;
use crate::proposal::{InstallmentOption, Proposal};
use crate::share::{renegotiation_summary, ShareChannel};

/// Review workflow states. The proposal travels inside the variant, so an
/// "open review without a proposal" cannot be expressed.
#[derive(Debug, Clone)]
pub enum ReviewState {
    Closed,
    Open {
        proposal: Proposal,
    },
    OptionChosen {
        proposal: Proposal,
        option: InstallmentOption,
    },
}

impl std::fmt::Display for ReviewState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReviewState::Closed => write!(f, "closed"),
            ReviewState::Open { .. } => write!(f, "open"),
            ReviewState::OptionChosen { .. } => write!(f, "option_chosen"),
        }
    }
}

#[derive(Debug, Default)]
pub struct ProposalReview {
    state: ReviewState,
}

impl Default for ReviewState {
    fn default() -> Self {
        ReviewState::Closed
    }
}

impl ProposalReview {
    pub fn new() -> Self {
        Self {
            state: ReviewState::Closed,
        }
    }

    pub fn state(&self) -> &ReviewState {
        &self.state
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, ReviewState::Closed)
    }

    /// `Closed → Open`, selection initialized to none. A review already
    /// showing a proposal must be cancelled first.
    pub fn open(&mut self, proposal: Proposal) -> Result<(), PortalError> {
        if !self.is_closed() {
            return Err(PortalError::LocalValidation(
                "a proposal is already under review".to_string(),
            ));
        }
        debug!(
            options = proposal.opcoes_parcelamento.len(),
            "opening proposal review"
        );
        self.state = ReviewState::Open { proposal };
        Ok(())
    }

    /// Pick the option whose installment count matches. Re-picking replaces
    /// the current choice; an unknown count leaves the state untouched.
    pub fn choose(&mut self, installments: u32) -> Result<(), PortalError> {
        let proposal = match &self.state {
            ReviewState::Open { proposal } | ReviewState::OptionChosen { proposal, .. } => proposal,
            ReviewState::Closed => {
                return Err(PortalError::LocalValidation(
                    "no proposal under review".to_string(),
                ))
            }
        };
        let Some(option) = proposal.option(installments) else {
            return Err(PortalError::LocalValidation(format!(
                "the proposal has no {installments}-installment option"
            )));
        };
        let option = option.clone();
        let proposal = proposal.clone();
        self.state = ReviewState::OptionChosen { proposal, option };
        Ok(())
    }

    /// Dismiss the review. The proposal and any chosen option are discarded;
    /// reopening requires a fresh request.
    pub fn cancel(&mut self) {
        if !self.is_closed() {
            debug!("proposal review dismissed");
        }
        self.state = ReviewState::Closed;
    }

    /// Export the chosen option through `channel` and close the review.
    ///
    /// Precondition: an option must be chosen. Sharing from `Open` is a local
    /// prompt — the state stays `Open` and nothing is exported.
    pub fn share(&mut self, channel: &dyn ShareChannel) -> Result<(), PortalError> {
        match &self.state {
            ReviewState::OptionChosen { proposal, option } => {
                let summary = renegotiation_summary(proposal, option);
                channel.dispatch(&summary);
                info!(installments = option.numero_parcelas, "proposal shared");
                self.state = ReviewState::Closed;
                Ok(())
            }
            ReviewState::Open { .. } => Err(PortalError::LocalValidation(
                "choose an installment option before sharing".to_string(),
            )),
            ReviewState::Closed => Err(PortalError::LocalValidation(
                "no proposal under review".to_string(),
            )),
        }
    }
}
