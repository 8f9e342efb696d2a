//! Sharing channel — hands a pre-formatted summary to an external
//! message-composition surface.
//!
//! Fire-and-forget: the channel never awaits a response.

use tracing::info;

use crate::config::PortalConfig;
use crate::currency::format_brl;
use crate::proposal::{InstallmentOption, Proposal};

/// External composition surface for exporting a summary.
pub trait ShareChannel: Send + Sync {
    /// Hand `text` to the channel. Must not block on a response.
    fn dispatch(&self, text: &str);
}

/// Builds a pre-filled message-composition link and surfaces it to the user.
pub struct MessageComposerChannel {
    share_url: String,
}

impl MessageComposerChannel {
    pub fn new(config: &PortalConfig) -> Self {
        Self {
            share_url: config.share_url.clone(),
        }
    }

    /// Pre-filled composition URL for `text` (the payload travels in the
    /// `text` query parameter, percent-encoded).
    pub fn composition_url(&self, text: &str) -> String {
        match reqwest::Url::parse_with_params(&self.share_url, &[("text", text)]) {
            Ok(url) => url.into(),
            // A broken configured base is surfaced as-is; the payload is lost
            // but the user sees where it was meant to go.
            Err(_) => self.share_url.clone(),
        }
    }
}

impl ShareChannel for MessageComposerChannel {
    fn dispatch(&self, text: &str) {
        let url = self.composition_url(text);
        info!("opening share composer");
        println!("{url}");
    }
}

/// Export payload for a chosen option: aggregate balance, chosen installment
/// count, chosen installment amount, in the portal's message format.
pub fn renegotiation_summary(proposal: &Proposal, option: &InstallmentOption) -> String {
    format!(
        "*Proposta de Renegociação*\n\
         \n\
         Olá! Segue a simulação da minha renegociação:\n\
         \n\
         *Saldo Devedor Total:* {}\n\
         *Opção de Parcelamento Escolhida:*\n\
         *- Parcelas:* {}x\n\
         *- Valor da Parcela:* {}\n\
         \n\
         _Simulação gerada pelo Portal Financeiro._",
        format_brl(proposal.saldo_devedor_total),
        option.numero_parcelas,
        format_brl(option.valor_parcela),
    )
}
