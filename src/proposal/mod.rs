//! Renegotiation proposal wire types.
//!
//! A proposal is a one-shot, read-only artifact scoped to a single request:
//! it has no identifier, is never persisted, and is discarded when the review
//! closes. The amortization math behind each option belongs to the pricing
//! service — the client validates structure only, never the numbers.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub mod requester;

/// One installment option within a proposal. The installment count is the
/// natural key — unique among the options of one proposal.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct InstallmentOption {
    pub numero_parcelas: u32,
    pub valor_parcela: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Proposal {
    /// Total outstanding balance at proposal time.
    pub saldo_devedor_total: f64,
    /// Informational rate label, e.g. "0.5% a.m.".
    #[serde(default)]
    pub taxa_juros_aplicada: Option<String>,
    pub opcoes_parcelamento: Vec<InstallmentOption>,
}

impl Proposal {
    /// Structural well-formedness check. Returns the first violation found;
    /// a violating proposal is treated as a fetch failure and never rendered.
    pub fn validate(&self) -> Result<(), String> {
        if self.opcoes_parcelamento.is_empty() {
            return Err("proposal carries no installment options".to_string());
        }
        if !(self.saldo_devedor_total >= 0.0) {
            return Err("total balance is negative or not a number".to_string());
        }
        let mut seen = HashSet::new();
        for option in &self.opcoes_parcelamento {
            if option.numero_parcelas == 0 {
                return Err("installment count must be positive".to_string());
            }
            if !(option.valor_parcela >= 0.0) {
                return Err(format!(
                    "negative installment amount for the {}-installment option",
                    option.numero_parcelas
                ));
            }
            if !seen.insert(option.numero_parcelas) {
                return Err(format!(
                    "duplicate installment count {}",
                    option.numero_parcelas
                ));
            }
        }
        Ok(())
    }

    /// Option lookup by its natural key.
    pub fn option(&self, installments: u32) -> Option<&InstallmentOption> {
        self.opcoes_parcelamento
            .iter()
            .find(|o| o.numero_parcelas == installments)
    }
}
