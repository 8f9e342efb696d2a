//! HTTP client for the analysis/pricing service.
//!
//! Two endpoints: the per-client loan analysis and the multi-loan
//! renegotiation proposal. No automatic retries — a failed call is abandoned
//! and surfaced, and any retry is a fresh explicit user action.

use anyhow::Result;
use serde::Deserialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::PortalConfig;
use crate::error::PortalError;
use crate::loans::LoanAnalysis;
use crate::proposal::Proposal;

/// Optional error body carried by non-2xx responses: `{ "error": reason }`.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

pub struct PortalApi {
    base_url: String,
    http: reqwest::Client,
}

impl PortalApi {
    pub fn new(config: &PortalConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.http_timeout_secs))
            .build()?;
        Ok(Self {
            base_url: config.api_base_url.clone(),
            http,
        })
    }

    /// Fetch the loan registry snapshot for a client.
    /// GET /api/cliente/analise/{clienteId}
    pub async fn client_analysis(&self, user_id: &Uuid) -> Result<LoanAnalysis, PortalError> {
        let url = format!("{}/api/cliente/analise/{user_id}", self.base_url);
        debug!(%url, "fetching loan analysis");
        let resp = self.http.get(&url).send().await.map_err(net_err)?;
        let resp = check_status(resp).await?;
        resp.json::<LoanAnalysis>().await.map_err(|e| {
            warn!("loan analysis body failed to decode: {e}");
            PortalError::MalformedResponse(e.to_string())
        })
    }

    /// Request a renegotiation proposal for the selected loans.
    /// POST /api/proposta/renegociar-multiplos with `{ "loan_ids": [...] }`
    ///
    /// A structurally invalid proposal is treated exactly like a fetch
    /// failure: logged and never handed to the caller.
    pub async fn renegotiate(&self, loan_ids: &[String]) -> Result<Proposal, PortalError> {
        let url = format!("{}/api/proposta/renegociar-multiplos", self.base_url);
        debug!(%url, count = loan_ids.len(), "requesting renegotiation proposal");
        let resp = self
            .http
            .post(&url)
            .json(&serde_json::json!({ "loan_ids": loan_ids }))
            .send()
            .await
            .map_err(net_err)?;
        let resp = check_status(resp).await?;

        let proposal: Proposal = resp.json().await.map_err(|e| {
            warn!("proposal body failed to decode: {e}");
            PortalError::MalformedResponse(e.to_string())
        })?;
        if let Err(issue) = proposal.validate() {
            warn!(%issue, "discarding structurally invalid proposal");
            return Err(PortalError::MalformedResponse(issue));
        }
        Ok(proposal)
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, PortalError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    // Prefer the server-provided reason when one was returned.
    let reason = resp
        .json::<ErrorBody>()
        .await
        .ok()
        .and_then(|b| b.error)
        .unwrap_or_else(|| format!("service returned {status}"));
    Err(PortalError::RemoteRequest { reason })
}

fn net_err(e: reqwest::Error) -> PortalError {
    PortalError::RemoteRequest {
        reason: e.to_string(),
    }
}
