//! Loan registry snapshot.
//!
//! Loans are immutable snapshots fetched once per view; the client never
//! mutates them, only re-fetches. Derived/display fields arrive precomputed
//! from the analysis service; each of them falls back to a zero/blank default
//! when malformed so one broken field never discards the whole row.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

pub mod selection;

/// One credit obligation as returned by the analysis service.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Loan {
    /// Stable identifier. The service stores numbers but clients post ids as
    /// strings — normalized to a string at the boundary.
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(default, deserialize_with = "string_or_blank")]
    pub descricao: Option<String>,
    /// Principal amount.
    #[serde(default, deserialize_with = "f64_or_zero")]
    pub valor_total_emprestimo: f64,
    /// Total installment count.
    #[serde(default, deserialize_with = "u32_or_zero")]
    pub quantidade_parcelas: u32,
    /// Amount of a single installment.
    #[serde(default, deserialize_with = "f64_or_zero")]
    pub valor_parcela: f64,
    /// Date of the final installment.
    #[serde(default, deserialize_with = "date_or_none")]
    pub data_ultima_parcela: Option<NaiveDate>,

    // Derived by the service:
    /// First installment date, preformatted (dd/mm/yyyy).
    #[serde(default, deserialize_with = "string_or_blank")]
    pub primeira_parcela: Option<String>,
    #[serde(default, deserialize_with = "u32_or_zero")]
    pub parcelas_pagas: u32,
    /// Installments still open.
    #[serde(default, deserialize_with = "u32_or_zero")]
    pub a_vencer: u32,
    #[serde(default, deserialize_with = "f64_or_zero")]
    pub valor_ja_pago: f64,
    /// Outstanding balance — the authoritative value used for aggregation.
    #[serde(default, deserialize_with = "f64_or_zero")]
    pub valor_a_vencer: f64,
    /// Next installment date, or the settled marker when nothing is open.
    #[serde(default, deserialize_with = "string_or_blank")]
    pub proxima_parcela: Option<String>,
}

/// Marker the service uses for a fully paid loan's next installment.
pub const SETTLED_MARKER: &str = "Quitado";

impl Loan {
    pub fn is_settled(&self) -> bool {
        self.a_vencer == 0
    }

    /// Human description with the service's numeric prefix stripped.
    pub fn display_description(&self) -> String {
        clean_description(self.descricao.as_deref().unwrap_or_default())
    }

    /// Next installment for display; settled loans show the settled marker.
    pub fn next_installment(&self) -> &str {
        match &self.proxima_parcela {
            Some(p) if !p.is_empty() => p,
            _ if self.is_settled() => SETTLED_MARKER,
            _ => "",
        }
    }
}

static DESCRIPTION_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)Empréstimo: \d+ - Empréstimo [\d,.]+ ").expect("static pattern")
});

/// Strip the `Empréstimo: N - Empréstimo X` prefix and the first `Ref. `
/// marker from a service-side description.
pub fn clean_description(desc: &str) -> String {
    DESCRIPTION_PREFIX.replace(desc, "").replacen("Ref. ", "", 1)
}

/// Registry snapshot: the user's loans plus portfolio summary totals.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoanAnalysis {
    #[serde(default, deserialize_with = "f64_or_zero")]
    pub total_emprestado: f64,
    #[serde(default, deserialize_with = "f64_or_zero")]
    pub total_pago: f64,
    #[serde(default, deserialize_with = "f64_or_zero")]
    pub total_a_vencer: f64,
    #[serde(default)]
    pub emprestimos: Vec<Loan>,
    /// Service-side note, e.g. when the user has no loans at all.
    #[serde(default, deserialize_with = "string_or_blank")]
    pub message: Option<String>,
}

impl LoanAnalysis {
    pub fn loan(&self, id: &str) -> Option<&Loan> {
        self.emprestimos.iter().find(|l| l.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.emprestimos.is_empty()
    }
}

// ─── Lenient field deserializers ──────────────────────────────────────────────
// The analysis service merges raw storage rows with computed fields; nulls and
// odd types show up in practice. Formatting-level breakage falls back to
// zero/blank instead of failing the row.

fn id_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IdRepr {
        Num(i64),
        Text(String),
    }
    Ok(match IdRepr::deserialize(d)? {
        IdRepr::Num(n) => n.to_string(),
        IdRepr::Text(s) => s,
    })
}

fn f64_or_zero<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    let v = Value::deserialize(d)?;
    Ok(v.as_f64()
        .or_else(|| v.as_str().and_then(|s| s.parse().ok()))
        .unwrap_or(0.0))
}

fn u32_or_zero<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
    let v = Value::deserialize(d)?;
    Ok(v.as_u64()
        .or_else(|| v.as_str().and_then(|s| s.parse().ok()))
        .map(|n| u32::try_from(n).unwrap_or(u32::MAX))
        .unwrap_or(0))
}

fn string_or_blank<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    let v = Value::deserialize(d)?;
    Ok(v.as_str().map(str::to_owned))
}

fn date_or_none<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
    let v = Value::deserialize(d)?;
    Ok(v.as_str().and_then(|s| s.parse().ok()))
}
